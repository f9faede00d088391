//! Voice Relay Core
//!
//! Transport-independent pieces of the relay: the wire protocol, the
//! per-connection session state machine, the session registry and the clients
//! for the external chat API. The `voice-relay-api` service wires these to
//! WebSocket connections.

pub mod audio;
pub mod gemini;
pub mod llm_client;
pub mod prompt;
pub mod protocol;
pub mod registry;
pub mod session;
