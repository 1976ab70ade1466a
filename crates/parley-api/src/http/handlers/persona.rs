//! Persona handlers for the REST API.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;

use parley_types::persona::{CreatePersonaRequest, Persona, PersonaId};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::json::ApiJson;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Parse a persona id path segment.
pub(crate) fn parse_persona_id(raw: &str) -> Result<PersonaId, AppError> {
    raw.parse::<PersonaId>()
        .map_err(|_| AppError::Validation(format!("'{raw}' is not a valid persona id")))
}

/// POST /api/v1/personas - Create a persona owned by the caller.
pub async fn create_persona(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    ApiJson(body): ApiJson<CreatePersonaRequest>,
) -> Result<Json<ApiResponse<Persona>>, AppError> {
    let start = Instant::now();

    let persona = state.persona_service.create(Some(&identity), body).await?;
    let href = format!("/api/v1/personas/{}", persona.id);

    Ok(Json(
        ApiResponse::timed(persona, start)
            .with_link("self", &href)
            .with_link("chat", "/api/v1/chat"),
    ))
}

/// GET /api/v1/personas - List all personas in creation order.
pub async fn list_personas(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<Persona>>>, AppError> {
    let start = Instant::now();
    let personas = state.persona_service.list().await?;

    Ok(Json(
        ApiResponse::timed(personas, start).with_link("self", "/api/v1/personas"),
    ))
}

/// GET /api/v1/personas/{id} - Get one persona.
pub async fn get_persona(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Persona>>, AppError> {
    let start = Instant::now();
    let persona_id = parse_persona_id(&id)?;
    let persona = state.persona_service.get(&persona_id).await?;
    let href = format!("/api/v1/personas/{}", persona.id);

    Ok(Json(ApiResponse::timed(persona, start).with_link("self", &href)))
}
