//! Shared fixtures for the crate's unit tests.

use crate::{
    config::{AgentMatching, Config, Provider},
    state::AppState,
};
use anyhow::{Result, anyhow};
use async_openai::error::OpenAIError;
use async_trait::async_trait;
use futures_util::stream;
use std::sync::{Arc, Mutex};
use tracing::Level;
use xylor_core::{
    classifier::{DEFAULT_AGENT_KEYWORD, DEFAULT_IDENTITY_PREFIX},
    llm_client::{ChatMessage, LLMClient, LLMStream, LLMStreamEvent},
};

/// Replays canned chunks and records every request.
#[derive(Default)]
pub struct ScriptedLLM {
    chunks: Vec<String>,
    failure: Mutex<Option<String>>,
    calls: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl ScriptedLLM {
    pub fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn stream_chat(
        &self,
        system_preamble: String,
        messages: Vec<ChatMessage>,
    ) -> Result<LLMStream> {
        self.calls.lock().unwrap().push((system_preamble, messages));
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(anyhow!(message));
        }
        let events: Vec<Result<LLMStreamEvent, OpenAIError>> = self
            .chunks
            .iter()
            .cloned()
            .map(|c| Ok(LLMStreamEvent::TextChunk(c)))
            .collect();
        Ok(Box::pin(stream::iter(events)))
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        provider: Provider::OpenAI,
        api_key: "test-key".to_string(),
        chat_model: "gpt-4o-mini".to_string(),
        log_level: Level::INFO,
        agent_matching: AgentMatching {
            name_keyword: DEFAULT_AGENT_KEYWORD.to_string(),
            identity_prefix: DEFAULT_IDENTITY_PREFIX.to_string(),
            match_kind: false,
        },
    }
}

pub fn test_state_with(chunks: Vec<&str>) -> (Arc<AppState>, Arc<ScriptedLLM>) {
    let llm = Arc::new(ScriptedLLM {
        chunks: chunks.into_iter().map(String::from).collect(),
        ..Default::default()
    });
    let state = Arc::new(AppState {
        llm_client: llm.clone(),
        config: Arc::new(test_config()),
    });
    (state, llm)
}

pub fn test_state() -> Arc<AppState> {
    test_state_with(Vec::new()).0
}
