//! Command Dispatcher
//!
//! Outbound, it stamps and encodes envelopes and hands them to the data
//! channel with reliable delivery. Failures are logged and swallowed so a
//! dead channel can never break the caller. Inbound, it routes decoded
//! envelopes to observers by their `type` tag; tags it does not know are
//! logged and dropped.

use crate::{
    command::AgentCommand,
    envelope::{self, AgentMessage, MessageType, OutgoingMessage, PROTOCOL_VERSION},
    transport::{DataChannel, SendOptions},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receives inbound envelopes of one kind.
#[cfg_attr(test, mockall::automock)]
pub trait MessageObserver: Send + Sync {
    fn observe(&mut self, message: &AgentMessage);
}

/// Anything that can put an unstamped envelope on the wire.
///
/// Returns the id of the sent envelope, or `None` if it was dropped.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send_to_agent(&self, message: OutgoingMessage) -> Option<String>;
}

/// Stamps, encodes and publishes envelopes over a [`DataChannel`].
pub struct CommandDispatcher {
    channel: Arc<dyn DataChannel>,
}

impl CommandDispatcher {
    pub fn new(channel: Arc<dyn DataChannel>) -> Self {
        Self { channel }
    }

    /// The five named command shortcuts, sent through this dispatcher.
    pub fn commands(&self) -> AgentCommands<'_, Self> {
        AgentCommands::new(self)
    }
}

#[async_trait]
impl CommandSink for CommandDispatcher {
    async fn send_to_agent(&self, message: OutgoingMessage) -> Option<String> {
        let envelope = message.stamp(chrono::Utc::now().timestamp_millis());
        let id = envelope.id.clone();

        let payload = match envelope::encode(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                error!(kind = %envelope.kind, error = %e, "Failed to encode message for agent");
                return None;
            }
        };

        match self.channel.send(payload, SendOptions::RELIABLE).await {
            Ok(()) => {
                debug!(kind = %envelope.kind, id = ?id, "Sent message to agent");
                id
            }
            Err(e) => {
                error!(kind = %envelope.kind, error = %e, "Failed to send message to agent");
                None
            }
        }
    }
}

/// Named command shortcuts over any [`CommandSink`].
pub struct AgentCommands<'a, S: CommandSink + ?Sized> {
    sink: &'a S,
}

impl<'a, S: CommandSink + ?Sized> AgentCommands<'a, S> {
    pub fn new(sink: &'a S) -> Self {
        Self { sink }
    }

    pub async fn send(&self, command: AgentCommand) -> Option<String> {
        let message = OutgoingMessage::new(MessageType::Command, command.to_data());
        self.sink.send_to_agent(message).await
    }

    pub async fn start_listening(&self) -> Option<String> {
        self.send(AgentCommand::StartListening).await
    }

    pub async fn stop_listening(&self) -> Option<String> {
        self.send(AgentCommand::StopListening).await
    }

    pub async fn mute(&self) -> Option<String> {
        self.send(AgentCommand::Mute).await
    }

    pub async fn unmute(&self) -> Option<String> {
        self.send(AgentCommand::Unmute).await
    }

    pub async fn set_system_prompt(&self, prompt: impl Into<String>) -> Option<String> {
        self.send(AgentCommand::SetSystemPrompt {
            prompt: prompt.into(),
        })
        .await
    }
}

/// Where an inbound envelope ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    Observed,
    Unobserved,
    Ignored,
}

/// Routes inbound envelopes to the registered observers.
#[derive(Default)]
pub struct InboundRouter {
    status_observer: Option<Box<dyn MessageObserver>>,
    response_observer: Option<Box<dyn MessageObserver>>,
}

impl InboundRouter {
    pub fn set_status_observer(&mut self, observer: Box<dyn MessageObserver>) {
        self.status_observer = Some(observer);
    }

    pub fn set_response_observer(&mut self, observer: Box<dyn MessageObserver>) {
        self.response_observer = Some(observer);
    }

    pub fn route(&mut self, message: &AgentMessage) -> Routed {
        if message.effective_version() > PROTOCOL_VERSION {
            warn!(
                version = message.effective_version(),
                supported = PROTOCOL_VERSION,
                "Agent speaks a newer protocol version"
            );
        }

        let observer = match &message.kind {
            MessageType::Status => &mut self.status_observer,
            MessageType::Response => &mut self.response_observer,
            // Commands only flow from client to agent; one arriving here is an echo.
            MessageType::Command => {
                match AgentCommand::from_data(&message.data) {
                    Ok(command) => debug!(action = command.action(), "Ignoring command sent by a peer"),
                    Err(e) => warn!(error = %e, data = ?message.data, "Ignoring invalid command envelope"),
                }
                return Routed::Ignored;
            }
            other => {
                info!(kind = %other, data = ?message.data, "Unknown agent message");
                return Routed::Ignored;
            }
        };

        match observer {
            Some(observer) => {
                observer.observe(message);
                Routed::Observed
            }
            None => {
                info!(kind = %message.kind, data = ?message.data, reply_to = ?message.reply_to, "Agent message");
                Routed::Unobserved
            }
        }
    }
}
