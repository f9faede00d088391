//! Voice Relay API Library Crate
//!
//! This library contains the web-facing half of the relay: configuration,
//! application state, HTTP handlers, WebSocket session handling and routing.
//! The `relay` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
