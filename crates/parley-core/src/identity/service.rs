//! Session lifecycle: login, status, and logout.
//!
//! Login takes the user info returned by the external identity provider,
//! finds or creates the matching `User` by email, and stores the typed
//! `Identity` under a freshly minted session handle.

use chrono::{Duration, Utc};
use parley_types::error::{RepositoryError, SessionError};
use parley_types::identity::{Identity, User, UserInfo};
use tracing::info;
use uuid::Uuid;

use crate::identity::gate::IdentityGate;
use crate::identity::provider::IdentityProvider;
use crate::identity::session_store::SessionStore;
use crate::repository::user::UserRepository;

/// Prefix for minted session handles.
const HANDLE_PREFIX: &str = "prl_";

/// Mint an opaque, unguessable session handle.
pub fn mint_session_handle() -> String {
    format!(
        "{HANDLE_PREFIX}{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Service owning the identity gate and the login/logout flows.
pub struct SessionService<U: UserRepository, S: SessionStore, P: IdentityProvider> {
    users: U,
    gate: IdentityGate<S>,
    provider: P,
    ttl: Duration,
}

impl<U: UserRepository, S: SessionStore, P: IdentityProvider> SessionService<U, S, P> {
    /// Create a new SessionService.
    ///
    /// - `users`: persistence for user records
    /// - `store`: session handle storage
    /// - `provider`: external identity provider used by `login_with_token`
    /// - `ttl`: how long a minted session stays valid
    pub fn new(users: U, store: S, provider: P, ttl: Duration) -> Self {
        Self {
            users,
            gate: IdentityGate::new(store),
            provider,
            ttl,
        }
    }

    /// The gate used to resolve session handles on protected operations.
    pub fn gate(&self) -> &IdentityGate<S> {
        &self.gate
    }

    /// Exchange a provider access token for a session.
    pub async fn login_with_token(&self, access_token: &str) -> Result<(User, String), SessionError> {
        if access_token.trim().is_empty() {
            return Err(SessionError::InvalidUserInfo(
                "access token is required".to_string(),
            ));
        }
        let info = self.provider.fetch_user_info(access_token).await?;
        self.login(info).await
    }

    /// Find or create the user for `info` and start a session for them.
    ///
    /// Returns the user and the new session handle.
    pub async fn login(&self, info: UserInfo) -> Result<(User, String), SessionError> {
        let email = info
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| SessionError::InvalidUserInfo("email is required".to_string()))?
            .to_string();

        let username = info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(&email).to_string());

        let user = self.find_or_create_user(&email, username).await?;

        let identity = Identity::from(&user);
        let payload = serde_json::to_string(&identity)
            .map_err(|e| SessionError::StorageError(e.to_string()))?;
        let handle = mint_session_handle();
        let expires_at = Utc::now() + self.ttl;

        self.gate
            .store()
            .set(&handle, &payload, expires_at)
            .await
            .map_err(|e| SessionError::StorageError(e.to_string()))?;

        info!(user_id = %user.id, "user logged in");
        Ok((user, handle))
    }

    /// Identity for a handle, or `None` when not logged in.
    pub async fn status(&self, handle: Option<&str>) -> Option<Identity> {
        self.gate.status(handle).await
    }

    /// End a session. Unknown or absent handles are a no-op.
    pub async fn logout(&self, handle: Option<&str>) -> Result<(), SessionError> {
        let Some(handle) = handle.map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(());
        };
        self.gate
            .store()
            .delete(handle)
            .await
            .map_err(|e| SessionError::StorageError(e.to_string()))
    }

    async fn find_or_create_user(&self, email: &str, username: String) -> Result<User, SessionError> {
        if let Some(user) = self
            .users
            .get_by_email(email)
            .await
            .map_err(|e| SessionError::StorageError(e.to_string()))?
        {
            return Ok(user);
        }

        let user = User {
            id: Uuid::now_v7(),
            username,
            email: email.to_string(),
            created_at: Utc::now(),
        };

        match self.users.create(&user).await {
            Ok(user) => {
                info!(user_id = %user.id, "created user on first login");
                Ok(user)
            }
            // Lost a race with a concurrent first login for the same email.
            Err(RepositoryError::Conflict(_)) => self
                .users
                .get_by_email(email)
                .await
                .map_err(|e| SessionError::StorageError(e.to_string()))?
                .ok_or_else(|| SessionError::StorageError("user vanished after conflict".to_string())),
            Err(e) => Err(SessionError::StorageError(e.to_string())),
        }
    }
}
