//! Manages the WebSocket connection lifecycle for one agent session.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;
use xylor_core::{
    AgentMessage, AgentSession, CommandSink, DataChannel, DataPacket, MessageObserver, RoomEvent,
    SendOptions, SessionChange, TransportError,
};

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Publishes agent envelopes by asking the browser to put them on the room's data channel.
pub struct SocketChannel {
    outbound: mpsc::Sender<ServerMessage>,
}

impl SocketChannel {
    pub fn new(outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self { outbound }
    }
}

#[async_trait]
impl DataChannel for SocketChannel {
    async fn send(&self, payload: Vec<u8>, options: SendOptions) -> Result<(), TransportError> {
        self.outbound
            .send(ServerMessage::PublishData {
                payload: BASE64.encode(payload),
                reliable: options.reliable,
            })
            .await
            .map_err(|_| TransportError::NotConnected)
    }
}

/// Forwards observed agent envelopes into the session loop.
struct ForwardingObserver {
    tx: mpsc::Sender<AgentMessage>,
}

impl MessageObserver for ForwardingObserver {
    fn observe(&mut self, message: &AgentMessage) {
        if self.tx.try_send(message.clone()).is_err() {
            warn!(kind = %message.kind, "Failed to forward agent message: queue full or closed.");
        }
    }
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "ws_session", skip_all, fields(session_id = tracing::field::Empty))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    tracing::Span::current().record("session_id", tracing::field::display(session_id));
    info!("New WebSocket connection.");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);

    // A single writer owns the sink so every producer goes through one queue.
    let writer = tokio::spawn(
        async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = send_msg(&mut socket_tx, msg).await {
                    error!(error = ?e, "Failed to write to client WebSocket.");
                    break;
                }
            }
        }
        .in_current_span(),
    );

    let (observed_tx, mut observed_rx) = mpsc::channel::<AgentMessage>(32);
    let mut session = build_session(&state, out_tx.clone(), observed_tx);

    if out_tx.send(ServerMessage::Ready { session_id }).await.is_err() {
        error!("Failed to send Ready message to client.");
        writer.abort();
        return;
    }

    loop {
        tokio::select! {
            // Handle messages from the client WebSocket.
            msg_result = socket_rx.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if let Err(e) = handle_client_message(&mut session, msg, &out_tx).await {
                                    error!(error = ?e, "Failed to handle client message.");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Ignoring malformed client message.");
                                let _ = out_tx.send(ServerMessage::Error { message: format!("Invalid message: {}", e) }).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Client closed the connection. Shutting down session.");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => warn!("Ignoring binary frame; room events are JSON text."),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Err(e)) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                }
            },
            // Forward envelopes the agent sent us.
            Some(message) = observed_rx.recv() => {
                if out_tx.send(ServerMessage::AgentMessage { message }).await.is_err() {
                    break;
                }
            },
        }
    }

    drop(out_tx);
    drop(session);
    if let Err(e) = writer.await {
        warn!(error = ?e, "Writer task ended abnormally.");
    }
    info!("WebSocket connection closed and agent session terminated.");
}

/// Creates the agent session for one connection, wired to the outbound queue.
pub fn build_session(
    state: &AppState,
    outbound: mpsc::Sender<ServerMessage>,
    observed: mpsc::Sender<AgentMessage>,
) -> AgentSession {
    let channel = Arc::new(SocketChannel::new(outbound));
    let mut session = AgentSession::new(channel)
        .with_classifier(state.config.agent_matching.classifier());
    session.on_status(ForwardingObserver {
        tx: observed.clone(),
    });
    session.on_response(ForwardingObserver { tx: observed });
    session
}

/// Applies one client message to the session and queues whatever it produced.
///
/// Only a closed outbound queue is an error; bad input is reported to the client.
pub async fn handle_client_message(
    session: &mut AgentSession,
    msg: ClientMessage,
    out_tx: &mpsc::Sender<ServerMessage>,
) -> Result<()> {
    let event = match msg {
        ClientMessage::ConnectionState { state } => RoomEvent::ConnectionStateChanged(state),
        ClientMessage::Roster { participants } => RoomEvent::RosterChanged(participants),
        ClientMessage::Tracks { tracks } => RoomEvent::TracksChanged(tracks),
        ClientMessage::Data {
            payload,
            sender,
            topic,
        } => match BASE64.decode(payload.as_bytes()) {
            Ok(bytes) => RoomEvent::DataReceived(DataPacket {
                payload: bytes,
                sender,
                topic,
            }),
            Err(e) => {
                warn!(error = %e, "Data payload is not valid base64.");
                out_tx
                    .send(ServerMessage::Error {
                        message: format!("Data payload is not valid base64: {}", e),
                    })
                    .await?;
                return Ok(());
            }
        },
        ClientMessage::Command { command } => {
            info!(action = command.action(), "Sending command to agent");
            let id = session.commands().send(command).await;
            out_tx.send(ServerMessage::Sent { id }).await?;
            return Ok(());
        }
        ClientMessage::Send { message } => {
            let id = session.send_to_agent(message).await;
            out_tx.send(ServerMessage::Sent { id }).await?;
            return Ok(());
        }
        ClientMessage::ShareContext { context } => {
            info!(
                tagged = context.tagged_context.len(),
                has_data = context.structured_data.is_some(),
                "Sharing project context with agent"
            );
            let id = session.share_context(&context).await;
            out_tx.send(ServerMessage::Sent { id }).await?;
            return Ok(());
        }
        ClientMessage::ShareMetadata { metadata } => {
            let reply = match session.share_metadata(&metadata).await {
                Ok(id) => ServerMessage::Sent { id },
                Err(e) => {
                    warn!(error = %e, "Participant metadata carries no usable project context.");
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            };
            out_tx.send(reply).await?;
            return Ok(());
        }
    };

    let change = session.handle_event(event);
    push_changes(session, change, out_tx).await
}

async fn push_changes(
    session: &AgentSession,
    change: SessionChange,
    out_tx: &mpsc::Sender<ServerMessage>,
) -> Result<()> {
    if change.agent_status {
        out_tx
            .send(ServerMessage::Status {
                status: session.agent_status().clone(),
            })
            .await?;
    }
    if change.voice_activity {
        out_tx
            .send(ServerMessage::VoiceActivity {
                participants: session.voice_activity().clone(),
            })
            .await?;
    }
    Ok(())
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use serde_json::json;
    use xylor_core::{
        AgentCommand, ConnectionState, MessageType, envelope,
        participant::{Participant, TrackPublication},
    };

    struct Harness {
        session: AgentSession,
        out_tx: mpsc::Sender<ServerMessage>,
        out_rx: mpsc::Receiver<ServerMessage>,
        observed_rx: mpsc::Receiver<AgentMessage>,
    }

    impl Harness {
        fn new() -> Self {
            let state = test_state();
            let (out_tx, out_rx) = mpsc::channel(16);
            let (observed_tx, observed_rx) = mpsc::channel(16);
            let session = build_session(&state, out_tx.clone(), observed_tx);
            Self {
                session,
                out_tx,
                out_rx,
                observed_rx,
            }
        }

        async fn feed(&mut self, value: serde_json::Value) {
            let msg: ClientMessage = serde_json::from_value(value).unwrap();
            handle_client_message(&mut self.session, msg, &self.out_tx)
                .await
                .unwrap();
        }

        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(msg) = self.out_rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    #[tokio::test]
    async fn test_roster_pushes_status_and_voice_activity() {
        let mut h = Harness::new();
        h.session
            .handle_event(RoomEvent::TracksChanged(vec![xylor_core::participant::TrackRef::from_publication(
                &Participant::new("agent-7"),
                &TrackPublication::microphone("TR_1"),
            )]));
        h.drain();

        h.feed(json!({
            "type": "roster",
            "participants": [{"identity": "agent-7", "tracks": [{"sid": "TR_1", "kind": "audio"}]}]
        }))
        .await;

        let out = h.drain();
        assert_eq!(out.len(), 2);
        match &out[0] {
            ServerMessage::Status { status } => {
                assert!(status.is_connected);
                assert!(status.is_listening);
                assert_eq!(status.participant_count, 1);
            }
            other => panic!("Expected Status, got {:?}", other),
        }
        match &out[1] {
            ServerMessage::VoiceActivity { participants } => {
                assert!(participants["agent-7"].is_agent);
            }
            other => panic!("Expected VoiceActivity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_repeated_roster_pushes_nothing() {
        let mut h = Harness::new();
        let roster = json!({"type": "roster", "participants": [{"identity": "bob"}]});
        h.feed(roster.clone()).await;
        h.drain();
        h.feed(roster).await;
        assert!(h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_command_publishes_envelope_then_acknowledges() {
        let mut h = Harness::new();
        h.feed(json!({"type": "connection_state", "state": "connected"}))
            .await;
        h.feed(json!({"type": "command", "command": {"action": "set_system_prompt", "prompt": "Be concise"}}))
            .await;

        let out = h.drain();
        assert_eq!(out.len(), 2);
        let sent_id = match &out[0] {
            ServerMessage::PublishData { payload, reliable } => {
                assert!(*reliable);
                let bytes = BASE64.decode(payload).unwrap();
                let message = envelope::decode(&bytes).unwrap();
                assert_eq!(message.kind, MessageType::Command);
                assert_eq!(
                    AgentCommand::from_data(&message.data).unwrap(),
                    AgentCommand::SetSystemPrompt {
                        prompt: "Be concise".to_string()
                    }
                );
                message.id
            }
            other => panic!("Expected PublishData, got {:?}", other),
        };
        match &out[1] {
            ServerMessage::Sent { id } => assert_eq!(id, &sent_id),
            other => panic!("Expected Sent, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_command_while_disconnected_is_acknowledged_as_dropped() {
        let mut h = Harness::new();
        h.feed(json!({"type": "command", "command": {"action": "mute"}}))
            .await;
        let out = h.drain();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], ServerMessage::Sent { id: None }));
    }

    #[tokio::test]
    async fn test_response_reaches_observer_queue() {
        let mut h = Harness::new();
        let payload = BASE64.encode(br#"{"type":"response","data":{"text":"ok"}}"#);
        h.feed(json!({"type": "data", "payload": payload, "sender": "agent-7"}))
            .await;

        let observed = h.observed_rx.try_recv().unwrap();
        assert_eq!(observed.kind, MessageType::Response);
        assert_eq!(observed.data_str("text"), Some("ok"));
        assert!(h.observed_rx.try_recv().is_err());
        assert_eq!(
            h.session.last_message().unwrap().sender.as_deref(),
            Some("agent-7")
        );
        assert!(h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_bad_base64_reports_error_and_keeps_session() {
        let mut h = Harness::new();
        h.feed(json!({"type": "data", "payload": "%%%"})).await;
        let out = h.drain();
        assert!(matches!(out[0], ServerMessage::Error { .. }));
        assert!(h.session.last_message().is_none());
    }

    #[tokio::test]
    async fn test_share_context_sends_system_prompt() {
        let mut h = Harness::new();
        h.feed(json!({"type": "connection_state", "state": "connected"}))
            .await;
        h.feed(json!({
            "type": "share_context",
            "context": {"taggedContext": [{"type": "project", "id": "PROJ-9", "name": "Apollo"}]}
        }))
        .await;

        let out = h.drain();
        let ServerMessage::PublishData { payload, .. } = &out[0] else {
            panic!("Expected PublishData, got {:?}", out[0]);
        };
        let message = envelope::decode(&BASE64.decode(payload).unwrap()).unwrap();
        assert_eq!(message.data_str("action"), Some("set_system_prompt"));
        assert!(message.data_str("prompt").unwrap().contains("PROJ-9"));
        assert_eq!(h.session.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_share_metadata_primes_agent_or_reports_error() {
        let mut h = Harness::new();
        h.feed(json!({"type": "connection_state", "state": "connected"}))
            .await;
        h.feed(json!({
            "type": "share_metadata",
            "metadata": r#"{"taggedContext":[{"type":"task","id":"T-4","name":"Invoices"}]}"#
        }))
        .await;

        let out = h.drain();
        assert_eq!(out.len(), 2);
        let ServerMessage::PublishData { payload, .. } = &out[0] else {
            panic!("Expected PublishData, got {:?}", out[0]);
        };
        let message = envelope::decode(&BASE64.decode(payload).unwrap()).unwrap();
        assert!(message.data_str("prompt").unwrap().contains("T-4"));
        assert!(matches!(out[1], ServerMessage::Sent { id: Some(_) }));

        h.feed(json!({"type": "share_metadata", "metadata": "plain text"}))
            .await;
        let out = h.drain();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], ServerMessage::Error { .. }));
    }
}
