//! Persona repository trait definition.

use parley_types::error::RepositoryError;
use parley_types::persona::{Persona, PersonaId};

/// Repository trait for persona persistence.
///
/// Implementations live in parley-infra (e.g., SqlitePersonaRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
/// There is deliberately no update or delete.
pub trait PersonaRepository: Send + Sync {
    /// Create a new persona. Returns the created persona.
    fn create(
        &self,
        persona: &Persona,
    ) -> impl std::future::Future<Output = Result<Persona, RepositoryError>> + Send;

    /// Get a persona by its unique ID.
    fn get_by_id(
        &self,
        id: &PersonaId,
    ) -> impl std::future::Future<Output = Result<Option<Persona>, RepositoryError>> + Send;

    /// List all personas in insertion order.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Persona>, RepositoryError>> + Send;
}
