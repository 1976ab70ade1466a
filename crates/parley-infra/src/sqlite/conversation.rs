//! SQLite conversation repository and message log.
//!
//! `SqliteMessageLog::append` runs in a single writer transaction: the
//! version-checked UPDATE on the conversation row and the message INSERT
//! commit together or not at all.

use parley_core::repository::conversation::{ConversationRepository, MessageLog};
use parley_types::conversation::{Conversation, Message, MessageRole};
use parley_types::error::RepositoryError;
use parley_types::persona::PersonaId;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// SQLite-backed implementation of `MessageLog`.
pub struct SqliteMessageLog {
    pool: DatabasePool,
}

impl SqliteMessageLog {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    persona_id: String,
    owner_id: String,
    started_at: String,
    last_message_at: String,
    version: i64,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            persona_id: row.try_get("persona_id")?,
            owner_id: row.try_get("owner_id")?,
            started_at: row.try_get("started_at")?,
            last_message_at: row.try_get("last_message_at")?,
            version: row.try_get("version")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))?;
        let persona_id = Uuid::parse_str(&self.persona_id)
            .map_err(|e| RepositoryError::Query(format!("invalid persona_id: {e}")))?;
        let owner_id = Uuid::parse_str(&self.owner_id)
            .map_err(|e| RepositoryError::Query(format!("invalid owner_id: {e}")))?;

        Ok(Conversation {
            id,
            persona_id: PersonaId(persona_id),
            owner_id,
            started_at: parse_datetime(&self.started_at)?,
            last_message_at: parse_datetime(&self.last_message_at)?,
            version: self.version,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    timestamp: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let role: MessageRole = self.role.parse().map_err(RepositoryError::Query)?;

        Ok(Message {
            id,
            conversation_id,
            role,
            content: self.content,
            timestamp: parse_datetime(&self.timestamp)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn create(&self, conversation: &Conversation) -> Result<Conversation, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations (id, persona_id, owner_id, started_at, last_message_at, version)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(conversation.id.to_string())
        .bind(conversation.persona_id.to_string())
        .bind(conversation.owner_id.to_string())
        .bind(format_datetime(&conversation.started_at))
        .bind(format_datetime(&conversation.last_message_at))
        .bind(conversation.version)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(conversation.clone())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let conversation_row = ConversationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(conversation_row.into_conversation()?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_owner(&self, owner_id: &Uuid) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE owner_id = ? ORDER BY last_message_at DESC, rowid DESC",
        )
        .bind(owner_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row = ConversationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            conversations.push(conversation_row.into_conversation()?);
        }

        Ok(conversations)
    }
}

// ---------------------------------------------------------------------------
// MessageLog implementation
// ---------------------------------------------------------------------------

impl MessageLog for SqliteMessageLog {
    async fn append(&self, message: &Message, expected_version: i64) -> Result<i64, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let timestamp = format_datetime(&message.timestamp);
        let conversation_id = message.conversation_id.to_string();

        let updated = sqlx::query(
            r#"UPDATE conversations
               SET last_message_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(&timestamp)
        .bind(&conversation_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if updated.rows_affected() == 0 {
            let current: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM conversations WHERE id = ?")
                    .bind(&conversation_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;

            // Dropping the transaction rolls it back.
            return Err(match current {
                None => RepositoryError::NotFound,
                Some((found,)) => RepositoryError::Conflict(format!(
                    "conversation {conversation_id} is at version {found}, expected {expected_version}"
                )),
            });
        }

        sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, role, content, timestamp)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(&conversation_id)
        .bind(message.role.to_string())
        .bind(&message.content)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(expected_version + 1)
    }

    async fn list_ordered(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(message_row.into_message()?);
        }

        Ok(messages)
    }

    async fn count(&self, conversation_id: &Uuid) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages WHERE conversation_id = ?")
            .bind(conversation_id.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count as u64)
    }
}
