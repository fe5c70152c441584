pub mod classifier;
pub mod command;
pub mod context;
pub mod dispatcher;
pub mod envelope;
pub mod llm_client;
pub mod participant;
pub mod session;
pub mod status;
pub mod transport;

pub use classifier::{AgentClassifier, ClassifierRule, classify_agent};
pub use command::{AgentCommand, CommandError};
pub use dispatcher::{AgentCommands, CommandSink, MessageObserver, Routed};
pub use envelope::{AgentMessage, DecodeError, MessageType, OutgoingMessage, PROTOCOL_VERSION};
pub use session::{AgentSession, SessionChange};
pub use status::{AgentStatus, VoiceActivity, VoiceActivityEntry};
pub use transport::{ConnectionState, DataChannel, DataPacket, RoomEvent, SendOptions, TransportError};
