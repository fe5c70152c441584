//! Agent Session
//!
//! The single object the rest of an application talks to. It is fed
//! [`RoomEvent`]s one at a time, re-derives every view synchronously inside
//! [`AgentSession::handle_event`], and sends commands through the room's data
//! channel.
//!
//! Room connection state and agent presence are separate signals: the room can
//! be `Connected` while `agent_status().is_connected` is false.

use crate::{
    classifier::AgentClassifier,
    context::{ContextError, ProjectContext},
    dispatcher::{AgentCommands, CommandDispatcher, CommandSink, InboundRouter, MessageObserver, Routed},
    envelope::{self, OutgoingMessage},
    participant::{Participant, TrackRef},
    status::{AgentStatus, VoiceActivity, derive_status, derive_voice_activity},
    transport::{ConnectionState, DataChannel, DataPacket, RoomEvent},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a single event changed, so callers can push only fresh views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionChange {
    pub connection: bool,
    pub agent_status: bool,
    pub voice_activity: bool,
    /// Set when a data packet arrived and decoded; `None` for undecodable ones.
    pub message: Option<Routed>,
}

pub struct AgentSession {
    classifier: AgentClassifier,
    dispatcher: CommandDispatcher,
    router: InboundRouter,
    connection_state: ConnectionState,
    roster: Vec<Participant>,
    /// `None` until the transport reports its first track list.
    tracks: Option<Vec<TrackRef>>,
    agent_status: AgentStatus,
    voice_activity: VoiceActivity,
    last_message: Option<DataPacket>,
}

impl AgentSession {
    pub fn new(channel: Arc<dyn DataChannel>) -> Self {
        Self {
            classifier: AgentClassifier::default(),
            dispatcher: CommandDispatcher::new(channel),
            router: InboundRouter::default(),
            connection_state: ConnectionState::default(),
            roster: Vec::new(),
            tracks: None,
            agent_status: AgentStatus::default(),
            voice_activity: VoiceActivity::new(),
            last_message: None,
        }
    }

    pub fn with_classifier(mut self, classifier: AgentClassifier) -> Self {
        self.classifier = classifier;
        self.rederive_status();
        self.rederive_voice_activity();
        self
    }

    pub fn on_status(&mut self, observer: impl MessageObserver + 'static) {
        self.router.set_status_observer(Box::new(observer));
    }

    pub fn on_response(&mut self, observer: impl MessageObserver + 'static) {
        self.router.set_response_observer(Box::new(observer));
    }

    pub fn agent_status(&self) -> &AgentStatus {
        &self.agent_status
    }

    pub fn voice_activity(&self) -> &VoiceActivity {
        &self.voice_activity
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    /// The most recent raw data-channel packet, decodable or not.
    pub fn last_message(&self) -> Option<&DataPacket> {
        self.last_message.as_ref()
    }

    /// The classified agent in the current roster, if any.
    pub fn agent_participant(&self) -> Option<&Participant> {
        let identity = self.agent_status.agent_identity.as_deref()?;
        self.roster.iter().find(|p| p.identity == identity)
    }

    /// The five named commands, gated on the room connection.
    pub fn commands(&self) -> AgentCommands<'_, Self> {
        AgentCommands::new(self)
    }

    /// Primes the agent with the user's project snapshot.
    pub async fn share_context(&self, context: &ProjectContext) -> Option<String> {
        self.commands()
            .set_system_prompt(context.voice_instructions())
            .await
    }

    /// Shares the project context carried in a participant's token metadata.
    pub async fn share_metadata(&self, metadata: &str) -> Result<Option<String>, ContextError> {
        let context = ProjectContext::from_metadata(metadata)?;
        Ok(self.share_context(&context).await)
    }

    /// Applies one transport event and re-derives the affected views.
    pub fn handle_event(&mut self, event: RoomEvent) -> SessionChange {
        let mut change = SessionChange::default();
        match event {
            RoomEvent::ConnectionStateChanged(state) => {
                change.connection = state != self.connection_state;
                if change.connection {
                    info!(from = ?self.connection_state, to = ?state, "Room connection state changed");
                }
                self.connection_state = state;
            }
            RoomEvent::RosterChanged(roster) => {
                self.roster = roster;
                change.agent_status = self.rederive_status();
                change.voice_activity = self.rederive_voice_activity();
            }
            RoomEvent::TracksChanged(tracks) => {
                self.tracks = Some(tracks);
                change.agent_status = self.rederive_status();
                change.voice_activity = self.rederive_voice_activity();
            }
            RoomEvent::DataReceived(packet) => {
                change.message = self.receive(packet);
            }
        }
        change
    }

    fn receive(&mut self, packet: DataPacket) -> Option<Routed> {
        let decoded = envelope::decode(&packet.payload);
        let sender = packet.sender.clone();
        self.last_message = Some(packet);

        match decoded {
            Ok(message) => Some(self.router.route(&message)),
            Err(e) => {
                warn!(sender = ?sender, error = %e, "Dropping malformed agent message");
                None
            }
        }
    }

    fn rederive_status(&mut self) -> bool {
        let agent = self.classifier.classify(&self.roster);
        let status = derive_status(&self.roster, agent, self.tracks.as_deref());
        if status == self.agent_status {
            return false;
        }
        if status.agent_identity != self.agent_status.agent_identity {
            match &status.agent_identity {
                Some(identity) => info!(agent = %identity, "Agent joined the room"),
                None => info!("Agent left the room"),
            }
        }
        debug!(?status, "Agent status updated");
        self.agent_status = status;
        true
    }

    fn rederive_voice_activity(&mut self) -> bool {
        let activity = derive_voice_activity(
            self.tracks.as_deref().unwrap_or_default(),
            &self.roster,
            self.agent_status.agent_identity.as_deref(),
        );
        if activity == self.voice_activity {
            return false;
        }
        self.voice_activity = activity;
        true
    }
}

#[async_trait]
impl CommandSink for AgentSession {
    /// Stamps and sends a message. Skipped while the room is disconnected.
    async fn send_to_agent(&self, message: OutgoingMessage) -> Option<String> {
        if self.connection_state == ConnectionState::Disconnected {
            warn!(kind = %message.kind, "Room is disconnected; not sending message to agent");
            return None;
        }
        self.dispatcher.send_to_agent(message).await
    }
}
