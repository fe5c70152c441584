//! Project Context
//!
//! The snapshot of project-management data a user hands to the assistant:
//! items they explicitly tagged plus whatever structured data the front-end
//! fetched. The same snapshot primes both the text chat and the voice agent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An item the user pinned for the assistant's attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    #[serde(default)]
    pub tagged_context: Vec<TaggedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("participant metadata is not valid JSON: {0}")]
    InvalidMetadata(#[from] serde_json::Error),
    #[error("participant metadata is not a JSON object")]
    NotAnObject,
}

const CHAT_PREAMBLE: &str = "You are an AI assistant for project management and business operations. \
You help users understand and manage their projects, tasks, issues, communications and related business data.

CAPABILITIES:
- Analyze project status, progress and performance
- Identify overdue tasks and bottlenecks
- Summarize communications and activity
- Suggest priorities and resource allocation
- Answer questions about business metrics

RESPONSE GUIDELINES:
- Be concise but complete
- Quote specific data points and numbers when they are available
- Call out deadlines, overdue items and high-priority issues
- Offer actionable recommendations where useful
- Use bullet points or short sections when it helps readability";

const CHAT_CLOSING: &str = "IMPORTANT: Always ground answers in the data above. \
Refer to projects, tasks and other records by their real names and current status.";

impl ProjectContext {
    /// Parses the JSON metadata attached to a participant's access token.
    ///
    /// Missing `taggedContext` / `structuredData` keys are treated as empty.
    pub fn from_metadata(metadata: &str) -> Result<Self, ContextError> {
        let value: Value = serde_json::from_str(metadata)?;
        if !value.is_object() {
            return Err(ContextError::NotAnObject);
        }
        let mut context: Self = serde_json::from_value(value)?;
        if context.structured_data.as_ref().is_some_and(is_empty_value) {
            context.structured_data = None;
        }
        Ok(context)
    }

    pub fn is_empty(&self) -> bool {
        self.tagged_context.is_empty() && self.structured_data.is_none()
    }

    /// System preamble for the text chat endpoint.
    pub fn chat_system_prompt(&self) -> String {
        let mut prompt = String::from(CHAT_PREAMBLE);

        if !self.tagged_context.is_empty() {
            prompt.push_str("\n\nUSER-TAGGED CONTEXT:\nThe user tagged these items for focus:");
            for item in &self.tagged_context {
                prompt.push_str(&format!(
                    "\n- {}: {} (ID: {})",
                    item.item_type.to_uppercase(),
                    item.name,
                    item.id
                ));
            }
            prompt.push_str("\n\nPrioritize information about the tagged items.");
        }

        if let Some(data) = &self.structured_data {
            prompt.push_str("\n\nPROJECT DATA:\n");
            prompt.push_str(&pretty(data));
        }

        prompt.push_str("\n\n");
        prompt.push_str(CHAT_CLOSING);
        prompt
    }

    /// Instructions for the voice agent, sent as `set_system_prompt`.
    pub fn voice_instructions(&self) -> String {
        if self.is_empty() {
            return "You are a project assistant. No project data is available yet. \
                    Ask the user to tag some projects or tasks."
                .to_string();
        }
        let snapshot = serde_json::json!({
            "tagged_items": self.tagged_context,
            "project_data": self.structured_data,
        });
        format!(
            "You are a project assistant. Here is the project data in JSON format:\n\n{}\n\n\
             Answer questions about this data. Keep responses short and direct.",
            pretty(&snapshot)
        )
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
