//! Session authentication extractors.
//!
//! The session handle is read from:
//! - `Authorization: Bearer <handle>` header
//! - `parley_session` cookie
//!
//! The handle is resolved to a typed [`Identity`] through the identity gate.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use parley_types::identity::Identity;

use crate::http::error::AppError;
use crate::state::AppState;

/// Name of the cookie carrying the session handle.
pub const SESSION_COOKIE: &str = "parley_session";

/// Authenticated request. Extracting this resolves the session handle,
/// rejecting with 401 when there is no valid session.
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let handle = session_handle(parts);
        let identity = state
            .session_service
            .gate()
            .resolve(handle.as_deref())
            .await?;
        Ok(Authenticated(identity))
    }
}

/// The raw session handle, if the request carries one. Never rejects.
pub struct SessionHandle(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for SessionHandle {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionHandle(session_handle(parts)))
    }
}

/// Extract the session handle from request headers. Bearer wins over the cookie.
pub fn session_handle(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(handle) = bearer {
        return Some(handle.to_string());
    }

    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|header| cookie_value(header, SESSION_COOKIE))
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`).
fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
