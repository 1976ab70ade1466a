//! Conversation and message types for Parley.
//!
//! A conversation is an ordered, persona-scoped thread of turns owned by a
//! single user. Messages are append-only and ordered by `timestamp`, with
//! insertion order as the tiebreak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::persona::PersonaId;

/// Author of a message within a conversation.
///
/// Serialized exactly as stored and as sent to the completion client:
/// `"user"` and `"ai"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Ai => write!(f, "ai"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "ai" => Ok(MessageRole::Ai),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A conversation between one user and one persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub persona_id: PersonaId,
    /// The user who started the conversation; only they may continue or read it.
    pub owner_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Always equal to the timestamp of the most recently appended message.
    pub last_message_at: DateTime<Utc>,
    /// Optimistic concurrency counter, incremented on every append.
    pub version: i64,
}

impl Conversation {
    /// Start a new, empty conversation at `now`.
    pub fn start(persona_id: PersonaId, owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            persona_id,
            owner_id,
            started_at: now,
            last_message_at: now,
            version: 0,
        }
    }
}

/// A single message within a conversation. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        conversation_id: Uuid,
        role: MessageRole,
        content: String,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            conversation_id,
            role,
            content,
            timestamp,
        }
    }
}

/// A conversation together with its full ordered message sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Inbound chat turn. `conversation_id` always wins over `persona_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatTurnRequest {
    pub conversation_id: Option<Uuid>,
    pub persona_id: Option<PersonaId>,
    #[serde(default)]
    pub message: String,
}

/// Result of a completed chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurnResponse {
    pub conversation_id: Uuid,
    pub response: String,
}
