//! Request/response types for the study-platform API
//!
//! The plan and task payloads are deliberately loose (`serde_json::Value`):
//! their fields are free-form and owned by the server. Only the envelopes the
//! client has to construct or inspect get concrete types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::ParseIntError;
use tracing::debug;

/// Reason attached to an update advise when the chat reply suggested steps
/// but gave no reason of its own
const AUTO_UPDATE_REASON: &str = "automatic update based on the conversation";

/// Reason attached to a manually entered advise when the user left it blank
const MANUAL_UPDATE_REASON: &str = "user requirements have changed";

/// A message in the conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Payload for a chat-turn call (`/api/chat1/stream`)
///
/// Despite the path, the endpoint answers with a single JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub lang: String,
}

/// Reply from a chat-turn call
///
/// `update_steps` and `reason` are the server's optional suggestion for which
/// plan steps the next regeneration should touch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: String,

    #[serde(default, rename = "updateSteps")]
    pub update_steps: Vec<i64>,

    #[serde(default)]
    pub reason: String,
}

impl ChatReply {
    /// Build an update advise from the server's suggestion, if it made one
    pub fn suggested_advise(&self) -> Option<Advise> {
        if self.update_steps.is_empty() {
            return None;
        }
        let reason = if self.reason.is_empty() {
            AUTO_UPDATE_REASON.to_string()
        } else {
            self.reason.clone()
        };
        Some(Advise {
            update_steps: self.update_steps.clone(),
            reason,
        })
    }
}

/// Update directive for a plan regeneration
///
/// Carried on the wire as a JSON-encoded *string* inside the `advise` field,
/// not as a nested object. Suggested step numbers are passed through without
/// range-checking against the current plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advise {
    #[serde(rename = "updateSteps")]
    pub update_steps: Vec<i64>,
    pub reason: String,
}

impl Advise {
    /// Parse a manually entered advise: comma-separated step numbers plus a
    /// free-form reason (a stand-in reason is used when it is blank)
    pub fn from_manual(steps: &str, reason: &str) -> Result<Self, ParseIntError> {
        debug!(%steps, "Advise::from_manual: called");
        let update_steps = steps
            .split(',')
            .map(|s| s.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()?;
        let reason = if reason.trim().is_empty() {
            MANUAL_UPDATE_REASON.to_string()
        } else {
            reason.trim().to_string()
        };
        Ok(Self { update_steps, reason })
    }
}

/// Payload for a plan stream-generation call
/// (`/api/learning/plan/stream_generate`)
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub lang: String,
    pub advise: Option<Advise>,
}

impl PlanRequest {
    /// Build the wire body; the advise rides along as a JSON-encoded string
    pub fn to_body(&self) -> Result<Value, serde_json::Error> {
        let mut body = serde_json::json!({
            "id": self.id,
            "messages": self.messages,
            "lang": self.lang,
        });
        if let Some(advise) = &self.advise {
            body["advise"] = Value::String(serde_json::to_string(advise)?);
        }
        Ok(body)
    }
}

/// Result of consuming one plan stream to completion
///
/// `plan` is the payload of the terminal `done` frame; `introduction` is the
/// course intro captured from an earlier frame, kept separate so the caller
/// decides whether to merge it.
#[derive(Debug, Clone, Default)]
pub struct PlanStreamOutcome {
    pub plan: Option<Value>,
    pub introduction: Option<Value>,
}

/// Payload for the search endpoints (`/api/{web,video,image}/search`)
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub search_keyword: String,
    pub lang: String,
}

/// Payload for `/api/task/update/detect`
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdateDetect {
    pub task_data: Value,
    pub user_message: String,
    pub lang: String,
    pub chat_id: String,
}

/// Payload for `/api/task/update/execute`
#[derive(Debug, Clone, Serialize)]
pub struct TaskUpdateExecute {
    pub task_data: Value,
    pub suggestion: Value,
    pub lang: String,
    pub chat_id: String,
}
