//! WebSocket Session Handling
//!
//! This module serves the browser chat client over WebSockets. The protocol
//! and the per-session state machine live in `voice_relay_core`; this module
//! owns the socket:
//!
//! - `session`: upgrades the connection, runs the read loop and the writer task,
//!   and registers the session with the relay-wide registry.

pub mod session;

pub use session::ws_handler;
