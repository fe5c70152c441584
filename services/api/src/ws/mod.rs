//! WebSocket Session Bridge
//!
//! The browser owns the room connection and relays its events here; each
//! socket gets its own `AgentSession`.
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the WebSocket connection lifecycle, from handshake to termination.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
