//! Persona catalog service.
//!
//! Personas are a shared catalog: any authenticated user may read all of
//! them, and creation records the caller as creator. There is no update or
//! delete.

use chrono::Utc;
use parley_types::error::{AuthError, PersonaError};
use parley_types::identity::Identity;
use parley_types::persona::{CreatePersonaRequest, Persona, PersonaId};
use tracing::info;

use crate::repository::persona::PersonaRepository;

/// Service for creating and reading personas.
pub struct PersonaService<P: PersonaRepository> {
    repo: P,
}

impl<P: PersonaRepository> PersonaService<P> {
    pub fn new(repo: P) -> Self {
        Self { repo }
    }

    /// Create a persona owned by the caller.
    ///
    /// Requires an authenticated identity. Name and description are trimmed
    /// and must both be non-empty. The description is stored verbatim
    /// otherwise; it is not sanitized or length-limited.
    pub async fn create(
        &self,
        identity: Option<&Identity>,
        request: CreatePersonaRequest,
    ) -> Result<Persona, PersonaError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;

        let name = required_field(request.name, "name")?;
        let description = required_field(request.description, "description")?;

        let persona = Persona {
            id: PersonaId::new(),
            name,
            description,
            creator_id: identity.user_id,
            created_at: Utc::now(),
        };

        let created = self
            .repo
            .create(&persona)
            .await
            .map_err(|e| PersonaError::StorageError(e.to_string()))?;

        info!(persona_id = %created.id, creator_id = %identity.user_id, "persona created");
        Ok(created)
    }

    /// Get a persona by ID.
    pub async fn get(&self, id: &PersonaId) -> Result<Persona, PersonaError> {
        self.repo
            .get_by_id(id)
            .await
            .map_err(|e| PersonaError::StorageError(e.to_string()))?
            .ok_or(PersonaError::NotFound)
    }

    /// List all personas in insertion order.
    pub async fn list(&self) -> Result<Vec<Persona>, PersonaError> {
        self.repo
            .list()
            .await
            .map_err(|e| PersonaError::StorageError(e.to_string()))
    }
}

fn required_field(value: Option<String>, field: &str) -> Result<String, PersonaError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PersonaError::Validation(format!("{field} is required")))
}
