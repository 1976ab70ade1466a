//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! Services are generic over repository/session/completion traits, but AppState
//! pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parley_core::chat::orchestrator::ConversationOrchestrator;
use parley_core::identity::service::SessionService;
use parley_core::service::persona::PersonaService;
use parley_infra::config::load_service_config;
use parley_infra::data_dir::{ensure_data_dir, resolve_data_dir};
use parley_infra::identity::userinfo::HttpUserInfoProvider;
use parley_infra::llm::anthropic::AnthropicClient;
use parley_infra::llm::api_key_from_env;
use parley_infra::sqlite::conversation::{SqliteConversationRepository, SqliteMessageLog};
use parley_infra::sqlite::persona::SqlitePersonaRepository;
use parley_infra::sqlite::pool::{DatabasePool, database_url};
use parley_infra::sqlite::session::SqliteSessionStore;
use parley_infra::sqlite::user::SqliteUserRepository;
use parley_types::config::ServiceConfig;
use secrecy::SecretString;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcretePersonaService = PersonaService<SqlitePersonaRepository>;

pub type ConcreteSessionService =
    SessionService<SqliteUserRepository, SqliteSessionStore, HttpUserInfoProvider>;

pub type ConcreteOrchestrator = ConversationOrchestrator<
    SqlitePersonaRepository,
    SqliteConversationRepository,
    SqliteMessageLog,
    AnthropicClient,
>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub persona_service: Arc<ConcretePersonaService>,
    pub session_service: Arc<ConcreteSessionService>,
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub config: Arc<ServiceConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: resolve the data dir, load config,
    /// connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir).await?;

        let config = load_service_config(&data_dir).await;
        let api_key = api_key_from_env();
        if api_key.is_none() {
            tracing::warn!(
                "no completion API key configured; chat turns will fail until ANTHROPIC_API_KEY is set"
            );
        }

        Self::build(data_dir, config, api_key).await
    }

    /// Wire services against an explicit data dir, config and API key.
    pub async fn build(
        data_dir: PathBuf,
        config: ServiceConfig,
        api_key: Option<SecretString>,
    ) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let persona_service = PersonaService::new(SqlitePersonaRepository::new(db_pool.clone()));

        let session_service = SessionService::new(
            SqliteUserRepository::new(db_pool.clone()),
            SqliteSessionStore::new(db_pool.clone()),
            HttpUserInfoProvider::new(config.userinfo_url.clone())?,
            chrono::Duration::hours(config.session_ttl_hours),
        );

        let client = AnthropicClient::new(api_key, config.model.clone(), config.max_tokens)?
            .with_base_url(config.anthropic_base_url.clone());

        let orchestrator = ConversationOrchestrator::new(
            SqlitePersonaRepository::new(db_pool.clone()),
            SqliteConversationRepository::new(db_pool.clone()),
            SqliteMessageLog::new(db_pool.clone()),
            client,
        )
        .with_completion_timeout(Duration::from_secs(config.completion_timeout_secs));

        Ok(Self {
            persona_service: Arc::new(persona_service),
            session_service: Arc::new(session_service),
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            data_dir,
            db_pool,
        })
    }
}
