//! Login, session status and logout handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse};
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_types::identity::{Identity, User};

use crate::http::error::AppError;
use crate::http::extractors::auth::{SESSION_COOKIE, SessionHandle};
use crate::http::extractors::json::ApiJson;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Access token issued by the identity provider.
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub session_token: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub logged_in: bool,
    pub user: Option<Identity>,
}

fn session_cookie(handle: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={handle}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age_secs}")
}

/// POST /api/v1/auth/login - Exchange a provider access token for a session.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();

    let (user, handle) = state
        .session_service
        .login_with_token(body.access_token.trim())
        .await?;

    let cookie = session_cookie(&handle, state.config.session_ttl_hours * 3600);
    let resp = ApiResponse::timed(
        LoginResponse {
            user,
            session_token: handle,
        },
        start,
    )
    .with_link("status", "/api/v1/auth/status");

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(resp)))
}

/// GET /api/v1/auth/status - Report whether the caller has a live session.
pub async fn status(
    State(state): State<AppState>,
    SessionHandle(handle): SessionHandle,
) -> Json<ApiResponse<StatusResponse>> {
    let start = Instant::now();
    let user = state.session_service.status(handle.as_deref()).await;

    Json(ApiResponse::timed(
        StatusResponse {
            logged_in: user.is_some(),
            user,
        },
        start,
    ))
}

/// POST /api/v1/auth/logout - End the caller's session. Idempotent.
pub async fn logout(
    State(state): State<AppState>,
    SessionHandle(handle): SessionHandle,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();
    state.session_service.logout(handle.as_deref()).await?;

    let resp = ApiResponse::timed(serde_json::json!({ "logged_out": true }), start);
    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie("", 0))]),
        Json(resp),
    ))
}
