use anyhow::Result;
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Upper bound on tokens generated per chat answer.
pub const MAX_COMPLETION_TOKENS: u32 = 2000;
pub const TEMPERATURE: f32 = 0.7;

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the conversation as the front-end keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// A generic client for interacting with an LLM.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Streams a completion for `messages`, preceded by `system_preamble`.
    async fn stream_chat(
        &self,
        system_preamble: String,
        messages: Vec<ChatMessage>,
    ) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The model identifier to use for chat completions (e.g., "gpt-4o-mini").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

/// Converts the conversation into request messages with the preamble first.
pub fn build_request_messages(
    system_preamble: String,
    messages: Vec<ChatMessage>,
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut request_messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_preamble)
            .build()?
            .into(),
    ];
    for msg in messages {
        match msg.role {
            ChatRole::User => request_messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content)
                    .build()?
                    .into(),
            ),
            ChatRole::Assistant => request_messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.content)
                    .build()?
                    .into(),
            ),
        };
    }
    Ok(request_messages)
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn stream_chat(
        &self,
        system_preamble: String,
        messages: Vec<ChatMessage>,
    ) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_request_messages(system_preamble, messages)?)
            .max_completion_tokens(MAX_COMPLETION_TOKENS)
            .temperature(TEMPERATURE)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    let content = response.choices.first()?.delta.content.clone()?;
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(LLMStreamEvent::TextChunk(content)))
                    }
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}
