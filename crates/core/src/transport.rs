//! The slice of the real-time transport this crate consumes.
//!
//! The room connection itself (media negotiation, subscription, reconnects)
//! lives elsewhere. The session only sees discrete [`RoomEvent`]s and a
//! [`DataChannel`] it can publish bytes on.

use crate::participant::{Participant, TrackRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Connection lifecycle of the room as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Delivery options for a data-channel publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Ask the transport for ordered, retried delivery.
    pub reliable: bool,
}

impl SendOptions {
    pub const RELIABLE: Self = Self { reliable: true };
}

/// A payload received from the data channel, kept unprocessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPacket {
    pub payload: Vec<u8>,
    /// Identity of the sender, when the transport knows it.
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl DataPacket {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            sender: None,
            topic: None,
        }
    }
}

/// Discrete notifications the transport delivers to a session, one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    ConnectionStateChanged(ConnectionState),
    /// The full remote roster after a join or leave, or when a participant's
    /// speaking state, level or metadata changes.
    RosterChanged(Vec<Participant>),
    /// The full room-wide microphone track list after any publish,
    /// unpublish or subscription change.
    TracksChanged(Vec<TrackRef>),
    DataReceived(DataPacket),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,
    #[error("transport rejected the payload: {0}")]
    Rejected(String),
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Outbound half of the room's data channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Resolves once the transport has accepted the payload for delivery.
    async fn send(&self, payload: Vec<u8>, options: SendOptions) -> Result<(), TransportError>;
}
