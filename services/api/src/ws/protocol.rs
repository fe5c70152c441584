//! Defines the WebSocket message protocol between the browser client and the API server.
//!
//! The browser owns the room connection. It forwards room events here, the
//! server runs the agent session against them, and data the session wants to
//! publish comes back as `publish_data` for the browser to put on the room's
//! data channel.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xylor_core::{
    AgentCommand, AgentMessage, AgentStatus, ConnectionState, OutgoingMessage, VoiceActivity,
    context::ProjectContext,
    participant::{Participant, TrackRef},
};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The room connection moved to a new lifecycle state.
    ConnectionState { state: ConnectionState },
    /// The full remote roster after a join or leave.
    Roster { participants: Vec<Participant> },
    /// The full room-wide microphone track list.
    Tracks { tracks: Vec<TrackRef> },
    /// A data-channel message received from the room (base64 payload).
    Data {
        payload: String,
        #[serde(default)]
        sender: Option<String>,
        #[serde(default)]
        topic: Option<String>,
    },
    /// One of the named agent commands.
    Command { command: AgentCommand },
    /// An arbitrary envelope for the agent; the server stamps it.
    Send { message: OutgoingMessage },
    /// Prime the agent with the user's project snapshot.
    ShareContext { context: ProjectContext },
    /// Prime the agent from the local participant's token metadata.
    ShareMetadata { metadata: String },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once the session is ready to accept events.
    Ready { session_id: Uuid },
    /// The agent status changed.
    Status { status: AgentStatus },
    /// The room's voice activity changed.
    VoiceActivity { participants: VoiceActivity },
    /// Bytes (base64) the client must publish on the room's data channel.
    PublishData { payload: String, reliable: bool },
    /// A `status` or `response` envelope received from the agent.
    AgentMessage { message: AgentMessage },
    /// Outcome of a `command`, `send` or `share_context` request.
    Sent { id: Option<String> },
    /// Reports a non-fatal error for the last client message.
    Error { message: String },
}
