//! Agent message envelope and its data-channel codec.
//!
//! Envelopes travel as one UTF-8 JSON object per data-channel message:
//!
//! ```json
//! { "type": "command", "data": { "action": "mute" }, "timestamp": 1718000000000,
//!   "v": 1, "id": "4c1f..." }
//! ```
//!
//! Only `type` and `data` are required on decode. `v`, `id` and `reply_to`
//! were added on top of the original three-field format; peers that omit them
//! are treated as version 1 with no correlation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Version stamped on every envelope this crate emits.
pub const PROTOCOL_VERSION: u32 = 1;

/// The envelope's `type` tag. Unrecognised tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    Status,
    Command,
    Response,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Status => "status",
            Self::Command => "command",
            Self::Response => "response",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "status" => Self::Status,
            "command" => Self::Command,
            "response" => Self::Response,
            _ => Self::Other(tag),
        }
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete envelope as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub data: Map<String, Value>,
    /// Sender-local milliseconds since the epoch. Informational only.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the envelope this one answers, when the peer supplies it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl AgentMessage {
    /// Version the peer claims, with unversioned peers counted as version 1.
    pub fn effective_version(&self) -> u32 {
        self.version.unwrap_or(PROTOCOL_VERSION)
    }

    /// Convenience accessor for string values in `data`.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// An envelope before the sender has stamped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl OutgoingMessage {
    pub fn new(kind: MessageType, data: Map<String, Value>) -> Self {
        Self { kind, data }
    }

    /// Completes the envelope with the send time, protocol version and a fresh id.
    pub fn stamp(self, timestamp: i64) -> AgentMessage {
        AgentMessage {
            kind: self.kind,
            data: self.data,
            timestamp,
            version: Some(PROTOCOL_VERSION),
            id: Some(uuid::Uuid::new_v4().to_string()),
            reply_to: None,
        }
    }
}

/// Reasons an inbound payload could not be turned into an [`AgentMessage`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("envelope is missing the `{0}` field")]
    MissingField(&'static str),
    #[error("envelope has an invalid shape: {0}")]
    InvalidShape(#[source] serde_json::Error),
}

/// Serializes an envelope for the data channel.
pub fn encode(message: &AgentMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

/// Parses a data-channel payload into an envelope.
pub fn decode(payload: &[u8]) -> Result<AgentMessage, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let value: Value = serde_json::from_str(text).map_err(DecodeError::InvalidJson)?;

    for field in ["type", "data"] {
        if value.get(field).is_none_or(Value::is_null) {
            return Err(DecodeError::MissingField(field));
        }
    }

    serde_json::from_value(value).map_err(DecodeError::InvalidShape)
}
