//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod conversation;
pub mod persona;
pub mod pool;
pub mod session;
pub mod user;

use chrono::{DateTime, SecondsFormat, Utc};
use parley_types::error::RepositoryError;

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Format a timestamp for storage.
///
/// Fixed-width (nanoseconds, `Z` suffix) so that lexical order in SQL
/// matches chronological order.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Map a sqlx error, turning UNIQUE violations into `RepositoryError::Conflict`.
pub(crate) fn map_write_error(e: sqlx::Error, conflict: impl FnOnce() -> String) -> RepositoryError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.message().contains("UNIQUE") => {
            RepositoryError::Conflict(conflict())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}
