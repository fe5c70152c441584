//! Drives an `AgentSession` through a scripted room without a real transport.
//!
//! Run with `cargo run --example agent_room -- --agent-identity agent-7`.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use xylor_core::{
    AgentMessage, AgentSession, CommandSink, ConnectionState, DataChannel, DataPacket,
    MessageObserver, RoomEvent, SendOptions, TransportError,
    context::{ProjectContext, TaggedItem},
    envelope,
    participant::{Participant, TrackPublication, TrackRef},
};

#[derive(Parser, Debug)]
#[command(version, about = "Simulated agent room")]
struct Args {
    /// Identity the simulated agent joins with.
    #[arg(long, default_value = "agent-7")]
    agent_identity: String,

    /// Identity of the local user.
    #[arg(long, default_value = "alice")]
    user_identity: String,

    /// Prompt pushed to the agent after it joins.
    #[arg(long, default_value = "Answer in one sentence.")]
    prompt: String,
}

/// Prints every envelope instead of publishing it.
struct LoggingChannel;

#[async_trait]
impl DataChannel for LoggingChannel {
    async fn send(&self, payload: Vec<u8>, options: SendOptions) -> Result<(), TransportError> {
        match envelope::decode(&payload) {
            Ok(message) => info!(
                kind = %message.kind,
                data = ?message.data,
                reliable = options.reliable,
                "-> agent"
            ),
            Err(e) => info!(error = %e, "-> agent (undecodable)"),
        }
        Ok(())
    }
}

struct PrintObserver(&'static str);

impl MessageObserver for PrintObserver {
    fn observe(&mut self, message: &AgentMessage) {
        info!(observer = self.0, data = ?message.data, "<- agent");
    }
}

fn from_agent(identity: &str, value: serde_json::Value) -> RoomEvent {
    let mut packet = DataPacket::new(value.to_string().into_bytes());
    packet.sender = Some(identity.to_string());
    RoomEvent::DataReceived(packet)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    let args = Args::parse();
    let mut session = AgentSession::new(Arc::new(LoggingChannel));
    session.on_status(PrintObserver("status"));
    session.on_response(PrintObserver("response"));

    // Commands are dropped until the room connects.
    session.commands().start_listening().await;

    session.handle_event(RoomEvent::ConnectionStateChanged(ConnectionState::Connecting));
    session.handle_event(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));

    let user = Participant::new(&args.user_identity).with_track(TrackPublication::microphone("TR_user"));
    let agent = Participant::new(&args.agent_identity)
        .with_name("Voice Agent")
        .with_track(TrackPublication::microphone("TR_agent"))
        .speaking(true);

    session.handle_event(RoomEvent::RosterChanged(vec![agent.clone()]));
    info!(status = ?session.agent_status(), "Agent joined");

    let mut agent_mic = TrackRef::from_publication(&agent, &agent.tracks[0]);
    agent_mic.audio_level = Some(0.42);
    let mut user_mic = TrackRef::from_publication(&user, &user.tracks[0]);
    user_mic.is_local = true;
    session.handle_event(RoomEvent::TracksChanged(vec![user_mic, agent_mic]));
    info!(activity = ?session.voice_activity(), "Voice activity");

    let context = ProjectContext {
        tagged_context: vec![TaggedItem {
            item_type: "project".to_string(),
            id: "PROJ-9".to_string(),
            name: "Apollo".to_string(),
        }],
        structured_data: Some(json!({"tasks": [{"id": "T-1", "status": "overdue"}]})),
    };
    session.share_context(&context).await;
    session.commands().set_system_prompt(&args.prompt).await;
    session.commands().start_listening().await;

    session.handle_event(from_agent(
        &args.agent_identity,
        json!({"type": "status", "data": {"state": "listening"}, "timestamp": 1}),
    ));
    session.handle_event(from_agent(
        &args.agent_identity,
        json!({"type": "response", "data": {"text": "One task is overdue."}, "timestamp": 2}),
    ));
    session.handle_event(from_agent(&args.agent_identity, json!({"broken": true})));

    session
        .send_to_agent(xylor_core::OutgoingMessage::new(
            xylor_core::MessageType::Other("ping".to_string()),
            serde_json::Map::new(),
        ))
        .await;

    session.handle_event(RoomEvent::RosterChanged(Vec::new()));
    info!(status = ?session.agent_status(), "Agent left");

    session.handle_event(RoomEvent::ConnectionStateChanged(ConnectionState::Disconnected));
    session.commands().mute().await;
    Ok(())
}
