use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user record, created on the first successful external-identity login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Unique across all users; the key used to match provider logins.
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity stored in a session.
///
/// This is the only value written under a session handle. It is serialized
/// to JSON at the session boundary and must decode back into this exact
/// shape, otherwise the session is treated as unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// User-info payload supplied by the external identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
