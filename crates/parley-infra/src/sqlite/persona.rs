//! SQLite persona repository implementation.

use parley_core::repository::persona::PersonaRepository;
use parley_types::error::RepositoryError;
use parley_types::persona::{Persona, PersonaId};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `PersonaRepository`.
pub struct SqlitePersonaRepository {
    pool: DatabasePool,
}

impl SqlitePersonaRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct PersonaRow {
    id: String,
    name: String,
    description: String,
    creator_id: String,
    created_at: String,
}

impl PersonaRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            creator_id: row.try_get("creator_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_persona(self) -> Result<Persona, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid persona id: {e}")))?;
        let creator_id = Uuid::parse_str(&self.creator_id)
            .map_err(|e| RepositoryError::Query(format!("invalid creator_id: {e}")))?;

        Ok(Persona {
            id: PersonaId(id),
            name: self.name,
            description: self.description,
            creator_id,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl PersonaRepository for SqlitePersonaRepository {
    async fn create(&self, persona: &Persona) -> Result<Persona, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO personas (id, name, description, creator_id, created_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(persona.id.to_string())
        .bind(&persona.name)
        .bind(&persona.description)
        .bind(persona.creator_id.to_string())
        .bind(format_datetime(&persona.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(persona.clone())
    }

    async fn get_by_id(&self, id: &PersonaId) -> Result<Option<Persona>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM personas WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let persona_row =
                    PersonaRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(persona_row.into_persona()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Persona>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM personas ORDER BY rowid ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut personas = Vec::with_capacity(rows.len());
        for row in &rows {
            let persona_row =
                PersonaRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            personas.push(persona_row.into_persona()?);
        }

        Ok(personas)
    }
}
