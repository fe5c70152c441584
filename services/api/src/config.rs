use std::net::SocketAddr;
use tracing::Level;
use xylor_core::{
    classifier::{AgentClassifier, ClassifierRule, DEFAULT_AGENT_KEYWORD, DEFAULT_IDENTITY_PREFIX},
    participant::ParticipantKind,
};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backend providers for the chat endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Anthropic,
}

impl Provider {
    /// Base URL of the provider's OpenAI-compatible API.
    pub fn api_base(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

/// How agent participants are recognised in a room.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentMatching {
    pub name_keyword: String,
    pub identity_prefix: String,
    /// Also accept participants the transport reports as kind `agent`.
    pub match_kind: bool,
}

impl AgentMatching {
    /// Builds the classifier every WebSocket session uses.
    pub fn classifier(&self) -> AgentClassifier {
        let classifier =
            AgentClassifier::with_keyword_and_prefix(&self.name_keyword, &self.identity_prefix);
        if self.match_kind {
            classifier.with_rule(ClassifierRule::Kind(ParticipantKind::Agent))
        } else {
            classifier
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub api_key: String,
    pub chat_model: String,
    pub log_level: Level,
    pub agent_matching: AgentMatching,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        // OpenAI wins when both keys are present.
        let (provider, api_key) = if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            (Provider::OpenAI, key)
        } else if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            (Provider::Anthropic, key)
        } else {
            return Err(ConfigError::MissingVar(
                "OPENAI_API_KEY or ANTHROPIC_API_KEY must be set".to_string(),
            ));
        };

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let match_kind_str =
            std::env::var("AGENT_MATCH_KIND").unwrap_or_else(|_| "false".to_string());
        let match_kind = match match_kind_str.to_lowercase().as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "AGENT_MATCH_KIND".to_string(),
                    format!("'{}' is not a boolean", match_kind_str),
                ));
            }
        };

        let agent_matching = AgentMatching {
            name_keyword: std::env::var("AGENT_NAME_KEYWORD")
                .unwrap_or_else(|_| DEFAULT_AGENT_KEYWORD.to_string()),
            identity_prefix: std::env::var("AGENT_IDENTITY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_PREFIX.to_string()),
            match_kind,
        };

        Ok(Self {
            bind_address,
            provider,
            api_key,
            chat_model,
            log_level,
            agent_matching,
        })
    }
}
