//! API Models
//!
//! Request and response bodies for the REST endpoints, annotated for OpenAPI
//! generation with `utoipa`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use xylor_core::{
    context::{ProjectContext, TaggedItem},
    llm_client::ChatMessage,
};

/// Body of `POST /chat`.
#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The whole conversation so far, oldest first.
    #[schema(value_type = Vec<Object>, example = json!([{"role": "user", "content": "What is overdue?"}]))]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>, example = json!([{"type": "project", "id": "PROJ-9", "name": "Apollo"}]))]
    pub tagged_context: Vec<TaggedItem>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub structured_data: Option<Value>,
}

impl ChatRequest {
    /// The project snapshot the client attached, with empty data treated as absent.
    pub fn context(&self) -> ProjectContext {
        let structured_data = match &self.structured_data {
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(Value::Null) | None => None,
            Some(other) => Some(other.clone()),
        };
        ProjectContext {
            tagged_context: self.tagged_context.clone(),
            structured_data,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// RFC 3339 time the error was produced.
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
