//! User repository trait definition.

use parley_types::error::RepositoryError;
use parley_types::identity::User;
use uuid::Uuid;

/// Repository trait for user records, keyed by unique email.
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `RepositoryError::Conflict` if the
    /// email is already taken.
    fn create(
        &self,
        user: &User,
    ) -> impl std::future::Future<Output = Result<User, RepositoryError>> + Send;

    /// Get a user by ID.
    fn get_by_id(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;

    /// Get a user by email.
    fn get_by_email(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<User>, RepositoryError>> + Send;
}
