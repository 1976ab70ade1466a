//! External identity provider trait definition.

use parley_types::error::SessionError;
use parley_types::identity::UserInfo;

/// Exchanges a provider access token for the user's profile.
pub trait IdentityProvider: Send + Sync {
    fn fetch_user_info(
        &self,
        access_token: &str,
    ) -> impl std::future::Future<Output = Result<UserInfo, SessionError>> + Send;
}
