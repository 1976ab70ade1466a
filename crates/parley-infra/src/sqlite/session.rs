//! SQLite-backed session store.
//!
//! Handles are never stored in plain text: the table is keyed by the
//! SHA-256 digest of the handle, so a leaked database does not leak live
//! sessions. Expired rows are ignored on read and purged on write.

use chrono::{DateTime, Utc};
use parley_core::identity::session_store::SessionStore;
use parley_types::error::RepositoryError;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::format_datetime;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionStore`.
pub struct SqliteSessionStore {
    pool: DatabasePool,
}

impl SqliteSessionStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Delete all expired sessions. Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(format_datetime(&Utc::now()))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

/// Hex SHA-256 digest of a session handle.
fn hash_handle(handle: &str) -> String {
    format!("{:x}", Sha256::digest(handle.as_bytes()))
}

impl SessionStore for SqliteSessionStore {
    async fn get(&self, handle: &str) -> Result<Option<String>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT identity FROM sessions WHERE handle_hash = ? AND expires_at > ?")
                .bind(hash_handle(handle))
                .bind(format_datetime(&Utc::now()))
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.map(|(identity,)| identity))
    }

    async fn set(
        &self,
        handle: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let purged = self.purge_expired().await?;
        if purged > 0 {
            debug!(purged, "purged expired sessions");
        }

        sqlx::query(
            r#"INSERT OR REPLACE INTO sessions (handle_hash, identity, created_at, expires_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(hash_handle(handle))
        .bind(value)
        .bind(format_datetime(&Utc::now()))
        .bind(format_datetime(&expires_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, handle: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sessions WHERE handle_hash = ?")
            .bind(hash_handle(handle))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::sqlite::test_support::test_pool;

    #[tokio::test]
    async fn test_set_get_delete() {
        let (pool, _dir) = test_pool().await;
        let store = SqliteSessionStore::new(pool);
        let expires = Utc::now() + Duration::hours(1);

        store.set("prl_abc", r#"{"k":"v"}"#, expires).await.unwrap();
        assert_eq!(
            store.get("prl_abc").await.unwrap().as_deref(),
            Some(r#"{"k":"v"}"#)
        );

        store.delete("prl_abc").await.unwrap();
        assert!(store.get("prl_abc").await.unwrap().is_none());

        // Deleting again is a no-op.
        store.delete("prl_abc").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_absent_and_purged() {
        let (pool, _dir) = test_pool().await;
        let store = SqliteSessionStore::new(pool);
        store
            .set("prl_old", "{}", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(store.get("prl_old").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_handle_is_stored_hashed() {
        let (pool, _dir) = test_pool().await;
        let store = SqliteSessionStore::new(pool.clone());
        store
            .set("prl_secret", "{}", Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let (stored,): (String,) = sqlx::query_as("SELECT handle_hash FROM sessions")
            .fetch_one(&pool.reader)
            .await
            .unwrap();
        assert_ne!(stored, "prl_secret");
        assert_eq!(stored, hash_handle("prl_secret"));
        assert_eq!(stored.len(), 64);
    }
}
