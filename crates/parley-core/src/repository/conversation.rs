//! Conversation repository and message log trait definitions.
//!
//! The message log is append-only. An append also moves the owning
//! conversation's `last_message_at` and `version` in the same transaction,
//! so `last_message_at` always equals the newest message timestamp.

use parley_types::conversation::{Conversation, Message};
use parley_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for conversation rows.
pub trait ConversationRepository: Send + Sync {
    /// Create a new conversation. Returns the created conversation.
    fn create(
        &self,
        conversation: &Conversation,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by its unique ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// List conversations owned by a user, most recent activity first.
    fn list_by_owner(
        &self,
        owner_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, RepositoryError>> + Send;
}

/// Append-only, per-conversation ordered storage of messages.
pub trait MessageLog: Send + Sync {
    /// Append a message and return the conversation's new version.
    ///
    /// Atomically inserts the message, sets the conversation's
    /// `last_message_at` to `message.timestamp`, and increments its version.
    /// Fails with `RepositoryError::Conflict` when the stored version is not
    /// `expected_version`, and `RepositoryError::NotFound` when the
    /// conversation does not exist.
    fn append(
        &self,
        message: &Message,
        expected_version: i64,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// All messages of a conversation, ordered by timestamp then insertion order.
    fn list_ordered(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Number of messages in a conversation.
    fn count(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
