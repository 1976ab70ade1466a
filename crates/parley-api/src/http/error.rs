//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use parley_types::error::{AuthError, PersonaError, SessionError, TurnError};

/// Non-standard status for a request the client abandoned mid-turn.
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Persona-related errors.
    Persona(PersonaError),
    /// Chat turn and conversation errors.
    Turn(TurnError),
    /// Login/logout errors.
    Session(SessionError),
    /// Authentication or authorization failure.
    Auth(AuthError),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<PersonaError> for AppError {
    fn from(e: PersonaError) -> Self {
        AppError::Persona(e)
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        AppError::Turn(e)
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

fn auth_parts(e: &AuthError) -> (StatusCode, &'static str, String) {
    match e {
        AuthError::Unauthenticated => (
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
            "Not authenticated. Log in via POST /api/v1/auth/login.".to_string(),
        ),
        AuthError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
    }
}

impl AppError {
    /// Status, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(e)
            | AppError::Persona(PersonaError::Auth(e))
            | AppError::Session(SessionError::Auth(e))
            | AppError::Turn(TurnError::Auth(e)) => auth_parts(e),

            AppError::Persona(PersonaError::NotFound) => {
                (StatusCode::NOT_FOUND, "PERSONA_NOT_FOUND", "Persona not found".to_string())
            }
            AppError::Persona(PersonaError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Persona(e @ PersonaError::StorageError(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR", e.to_string())
            }

            AppError::Turn(TurnError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Turn(TurnError::PersonaNotFound) => {
                (StatusCode::NOT_FOUND, "PERSONA_NOT_FOUND", "Persona not found".to_string())
            }
            AppError::Turn(TurnError::ConversationNotFound) => (
                StatusCode::NOT_FOUND,
                "CONVERSATION_NOT_FOUND",
                "Conversation not found".to_string(),
            ),
            AppError::Turn(e @ TurnError::Upstream(_)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
            }
            AppError::Turn(e @ TurnError::Conflict(_)) => {
                (StatusCode::CONFLICT, "CONFLICT", e.to_string())
            }
            AppError::Turn(e @ TurnError::Cancelled) => (
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "CANCELLED",
                e.to_string(),
            ),
            AppError::Turn(e @ TurnError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR", e.to_string())
            }

            AppError::Session(SessionError::InvalidUserInfo(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Session(e @ SessionError::Provider(_)) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string())
            }
            AppError::Session(e @ SessionError::StorageError(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR", e.to_string())
            }

            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(code, %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
