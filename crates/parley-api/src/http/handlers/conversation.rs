//! Conversation read handlers. Callers only see their own conversations.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use parley_types::conversation::{Conversation, ConversationHistory};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/conversations - Caller's conversations, most recent first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<ApiResponse<Vec<Conversation>>>, AppError> {
    let start = Instant::now();
    let conversations = state
        .orchestrator
        .list_conversations(Some(&identity))
        .await?;

    Ok(Json(
        ApiResponse::timed(conversations, start).with_link("self", "/api/v1/conversations"),
    ))
}

/// GET /api/v1/conversations/{id} - A conversation with its ordered messages.
pub async fn get_conversation(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ConversationHistory>>, AppError> {
    let start = Instant::now();
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation(format!("'{id}' is not a valid conversation id")))?;

    let history = state
        .orchestrator
        .get_conversation(Some(&identity), &id)
        .await?;
    let href = format!("/api/v1/conversations/{id}");

    Ok(Json(ApiResponse::timed(history, start).with_link("self", &href)))
}
