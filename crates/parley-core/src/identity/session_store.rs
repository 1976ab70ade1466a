//! Session storage trait definition.

use chrono::{DateTime, Utc};
use parley_types::error::RepositoryError;

/// Key-value store mapping opaque session handles to a serialized identity.
///
/// Implementations must treat expired entries as absent.
pub trait SessionStore: Send + Sync {
    /// Fetch the stored value for a handle, if present and not expired.
    fn get(
        &self,
        handle: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Store a value under a handle until `expires_at`, replacing any previous value.
    fn set(
        &self,
        handle: &str,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a handle. Removing an unknown handle is not an error.
    fn delete(
        &self,
        handle: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
