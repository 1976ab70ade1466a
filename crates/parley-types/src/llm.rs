//! Completion request/response types for Parley.
//!
//! These model the narrow contract between the conversation orchestrator
//! and the completion service: a system prompt plus the ordered history in,
//! generated text out.

use serde::{Deserialize, Serialize};

use crate::conversation::{Message, MessageRole};

/// A single `{role, content}` pair sent to the completion service.
///
/// Roles pass through verbatim from the message log (`user` / `ai`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Message> for CompletionMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Request to the completion service.
///
/// Model and output size are owned by the client configuration, not by the
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<CompletionMessage>,
}

/// Response from the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    /// Text of the first content block.
    pub content: String,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// Token usage for a completion request/response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Errors from completion service operations. All of these surface to the
/// caller as an upstream failure.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("no content in completion response")]
    EmptyResponse,

    #[error("rate limited")]
    RateLimited,

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("API key not configured (set {0})")]
    MissingApiKey(String),

    #[error("completion timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_completion_message_from_log_keeps_role() {
        let msg = Message::new(Uuid::now_v7(), MessageRole::Ai, "hi".to_string(), Utc::now());
        let cm = CompletionMessage::from(&msg);
        assert_eq!(cm.role, MessageRole::Ai);
        assert_eq!(cm.content, "hi");
    }

    #[test]
    fn test_completion_request_serialize() {
        let req = CompletionRequest {
            system: "Be Tech Guru".to_string(),
            messages: vec![CompletionMessage {
                role: MessageRole::User,
                content: "Hello".to_string(),
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["system"], "Be Tech Guru");
    }

    #[test]
    fn test_llm_error_display() {
        assert_eq!(
            LlmError::Timeout(60).to_string(),
            "completion timed out after 60s"
        );
        assert!(
            LlmError::MissingApiKey("ANTHROPIC_API_KEY".to_string())
                .to_string()
                .contains("ANTHROPIC_API_KEY")
        );
    }
}
