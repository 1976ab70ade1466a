use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Authentication and authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Errors related to persona operations.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("persona not found")]
    NotFound,

    #[error("invalid persona: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors related to login, logout, and session lookup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("invalid user info: {0}")]
    InvalidUserInfo(String),

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

/// Errors that fail a chat turn.
///
/// Any variant returned after the user message was appended leaves that
/// message persisted; no AI message exists for the failed turn.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid chat request: {0}")]
    Validation(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("persona not found")]
    PersonaNotFound,

    #[error("conversation not found")]
    ConversationNotFound,

    #[error("completion failed: {0}")]
    Upstream(#[from] LlmError),

    #[error("conversation {0} is busy with another turn")]
    Conflict(String),

    #[error("turn cancelled by caller")]
    Cancelled,

    #[error("storage error: {0}")]
    Persistence(String),
}

impl From<RepositoryError> for TurnError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) => TurnError::Conflict(msg),
            other => TurnError::Persistence(other.to_string()),
        }
    }
}
