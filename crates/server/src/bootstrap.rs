use std::sync::Arc;
use std::time::Duration;

use leadflow_agent::{HandoffController, LeadDnaAgent, Orchestrator, StepEmitter};
use leadflow_cache::{KvStore, MemoryStore};
use leadflow_core::{AppConfig, ConfigError, LoadOptions, OrgId};
use leadflow_db::{connect_with_settings, migrations, DbPool, SqlLeadDnaRepository};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use crate::ai::AiState;
use crate::auth::{DevOrgResolver, OrgResolver, SqlOrgResolver};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: Arc<dyn KvStore>,
    /// Extraction entrypoint for the messaging ingress; turns never run it.
    pub dna: Arc<LeadDnaAgent>,
    pub orchestrator: Arc<Orchestrator>,
    pub ai_state: AiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("bootstrap api key seed failed: {0}")]
    Seed(#[source] sqlx::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    seed_bootstrap_api_key(&config, &db_pool).await?;

    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());

    let agent_state_ttl = Duration::from_secs(config.cache.agent_state_ttl_secs);
    let lead_dna_ttl = Duration::from_secs(config.cache.lead_dna_ttl_secs);
    let handoff_ttl = Duration::from_secs(config.cache.handoff_ttl_secs);
    let observability_ttl = Duration::from_secs(config.cache.observability_ttl_secs);

    let dna = Arc::new(
        LeadDnaAgent::new(store.clone(), Arc::new(SqlLeadDnaRepository::new(db_pool.clone())))
            .with_ttl(lead_dna_ttl),
    );
    let orchestrator = Arc::new(
        Orchestrator::new(
            store.clone(),
            HandoffController::new(store.clone()).with_ttl(handoff_ttl),
            StepEmitter::new(store.clone()).with_ttl(observability_ttl),
            dna.clone(),
        )
        .with_state_ttl(agent_state_ttl),
    );

    let resolver: Arc<dyn OrgResolver> = if config.auth.enabled {
        Arc::new(SqlOrgResolver::new(db_pool.clone()))
    } else {
        // Validation guarantees a dev org id whenever auth is disabled.
        let org = config.auth.dev_org_id.clone().unwrap_or_default();
        Arc::new(DevOrgResolver::new(OrgId(org)))
    };
    let ai_state = AiState {
        handoff: Arc::new(HandoffController::new(store.clone()).with_ttl(handoff_ttl)),
        emitter: Arc::new(StepEmitter::new(store.clone()).with_ttl(observability_ttl)),
        resolver,
    };

    info!(
        event_name = "system.bootstrap.ready",
        auth_enabled = config.auth.enabled,
        "application components wired"
    );

    Ok(Application { config, db_pool, store, dna, orchestrator, ai_state })
}

/// Insert the configured bootstrap API key so a freshly provisioned instance
/// can serve its first authenticated request. Idempotent across restarts.
async fn seed_bootstrap_api_key(config: &AppConfig, pool: &DbPool) -> Result<(), BootstrapError> {
    if !config.auth.enabled {
        return Ok(());
    }
    let (Some(api_key), Some(org_id)) =
        (config.auth.bootstrap_api_key.as_ref(), config.auth.dev_org_id.as_ref())
    else {
        return Ok(());
    };

    sqlx::query(
        "INSERT OR IGNORE INTO api_keys (id, organization_id, api_key, label, created_at)
         VALUES (?, ?, ?, 'bootstrap', ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(org_id)
    .bind(api_key.expose_secret())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(BootstrapError::Seed)?;

    info!(event_name = "system.bootstrap.api_key_seeded", organization_id = %org_id);
    Ok(())
}
