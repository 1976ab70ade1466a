//! SQLite user repository implementation.

use parley_core::repository::user::UserRepository;
use parley_types::error::RepositoryError;
use parley_types::identity::User;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime};

/// SQLite-backed implementation of `UserRepository`.
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain User.
struct UserRow {
    id: String,
    username: String,
    email: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        Ok(User {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?,
            username: self.username,
            email: self.email,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl SqliteUserRepository {
    async fn fetch_one_by(
        &self,
        sql: &str,
        key: String,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(sql)
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let user_row =
                    UserRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(user_row.into_user()?))
            }
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<User, RepositoryError> {
        sqlx::query("INSERT INTO users (id, username, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.username)
            .bind(&user.email)
            .bind(format_datetime(&user.created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| map_write_error(e, || format!("user with email '{}' already exists", user.email)))?;

        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &Uuid) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_by("SELECT * FROM users WHERE id = ?", id.to_string())
            .await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.fetch_one_by("SELECT * FROM users WHERE email = ?", email.to_string())
            .await
    }
}
