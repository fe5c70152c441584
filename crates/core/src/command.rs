//! The command vocabulary sent to the agent in `data.action`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A command the client can ask the agent to carry out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentCommand {
    StartListening,
    StopListening,
    Mute,
    Unmute,
    SetSystemPrompt { prompt: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command data has no `action`")]
    MissingAction,
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("invalid arguments for `{action}`: {source}")]
    InvalidArguments {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AgentCommand {
    pub const ACTIONS: [&'static str; 5] = [
        "start_listening",
        "stop_listening",
        "mute",
        "unmute",
        "set_system_prompt",
    ];

    pub fn action(&self) -> &'static str {
        match self {
            Self::StartListening => "start_listening",
            Self::StopListening => "stop_listening",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::SetSystemPrompt { .. } => "set_system_prompt",
        }
    }

    /// Renders the command as envelope `data`.
    pub fn to_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("action".into(), Value::String(self.action().into()));
        if let Self::SetSystemPrompt { prompt } = self {
            data.insert("prompt".into(), Value::String(prompt.clone()));
        }
        data
    }

    /// Validates envelope `data` against the known actions.
    pub fn from_data(data: &Map<String, Value>) -> Result<Self, CommandError> {
        let action = data
            .get("action")
            .and_then(Value::as_str)
            .ok_or(CommandError::MissingAction)?;
        if !Self::ACTIONS.contains(&action) {
            return Err(CommandError::UnknownAction(action.to_string()));
        }
        serde_json::from_value(Value::Object(data.clone())).map_err(|source| {
            CommandError::InvalidArguments {
                action: action.to_string(),
                source,
            }
        })
    }
}
