//! Identity gate: resolves a caller's session handle into an authenticated
//! `Identity`.
//!
//! Every protected operation asks the gate first. The session payload is a
//! typed `Identity` serialized as JSON; anything that fails to decode into
//! exactly that shape is treated as unauthenticated.

use parley_types::error::AuthError;
use parley_types::identity::Identity;
use tracing::{debug, warn};

use crate::identity::session_store::SessionStore;

/// Resolves session handles against a `SessionStore`.
pub struct IdentityGate<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> IdentityGate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying session store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the identity for a session handle.
    ///
    /// Absent handle, unknown or expired handle, undecodable payload, and
    /// storage failures all yield `AuthError::Unauthenticated`.
    pub async fn resolve(&self, handle: Option<&str>) -> Result<Identity, AuthError> {
        let handle = match handle.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => return Err(AuthError::Unauthenticated),
        };

        let raw = match self.store.get(handle).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("session handle not found or expired");
                return Err(AuthError::Unauthenticated);
            }
            Err(e) => {
                warn!(error = %e, "session lookup failed");
                return Err(AuthError::Unauthenticated);
            }
        };

        serde_json::from_str::<Identity>(&raw).map_err(|e| {
            warn!(error = %e, "stored session payload is not a valid identity");
            AuthError::Unauthenticated
        })
    }

    /// Non-failing lookup: the identity for a handle, or `None`.
    pub async fn status(&self, handle: Option<&str>) -> Option<Identity> {
        self.resolve(handle).await.ok()
    }
}
