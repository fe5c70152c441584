//! Xylor API Library Crate
//!
//! This library contains the web service around the agent session protocol:
//! configuration, the streaming chat endpoint, the WebSocket session bridge,
//! and routing. The `api` binary is a thin wrapper around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_support;
