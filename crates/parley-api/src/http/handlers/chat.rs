//! Chat turn handler.
//!
//! The turn runs on its own task and observes a cancellation token. The
//! handler holds a drop guard on that token, so a client disconnect (which
//! drops the handler future) cancels the in-flight completion and the turn
//! resolves as failed with the user message kept.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use tokio_util::sync::CancellationToken;

use parley_types::conversation::{ChatTurnRequest, ChatTurnResponse};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::json::ApiJson;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/chat - Run one chat turn.
pub async fn chat_turn(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    ApiJson(body): ApiJson<ChatTurnRequest>,
) -> Result<Json<ApiResponse<ChatTurnResponse>>, AppError> {
    let start = Instant::now();

    let cancel = CancellationToken::new();
    let _disconnect_guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let turn = tokio::spawn(async move {
        orchestrator.run_turn(Some(&identity), body, &cancel).await
    });

    let response = turn
        .await
        .map_err(|e| AppError::Internal(format!("chat turn task failed: {e}")))??;
    let href = format!("/api/v1/conversations/{}", response.conversation_id);

    Ok(Json(
        ApiResponse::timed(response, start).with_link("conversation", &href),
    ))
}
