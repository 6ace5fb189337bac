use std::sync::Arc;

use procura_agent::semantic_matcher_from_config;
use procura_core::config::{AppConfig, ConfigError, LoadOptions};
use procura_core::matching::MatchingService;
use procura_db::{connect_with_config, migrations, DbPool, SqlMatchStore};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub matching: Arc<MatchingService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client setup failed: {0}")]
    Llm(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = Arc::new(SqlMatchStore::new(db_pool.clone()));
    let mut matching = MatchingService::new(store, &config.matching);
    match semantic_matcher_from_config(&config.llm)
        .map_err(|error| BootstrapError::Llm(error.to_string()))?
    {
        Some(semantic) => matching = matching.with_strategy(Arc::new(semantic)),
        None => warn!(
            event_name = "system.bootstrap.semantic_disabled",
            correlation_id = "bootstrap",
            "no LLM credentials configured; semantic matching disabled"
        ),
    }
    let matching = matching.with_default_strategies();

    info!(
        event_name = "system.bootstrap.matching_ready",
        correlation_id = "bootstrap",
        strategies = ?matching.strategy_kinds().iter().map(|kind| kind.name()).collect::<Vec<_>>(),
        "matching service initialized"
    );

    Ok(Application { config, db_pool, matching: Arc::new(matching) })
}

#[cfg(test)]
mod tests {
    use procura_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};
    use procura_core::domain::rfq::RfqId;
    use procura_core::matching::{MatchOptions, StrategyKind};
    use procura_db::MarketplaceSeedDataset;

    use crate::bootstrap::{bootstrap, bootstrap_with_config};

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config
    }

    #[tokio::test]
    async fn bootstrap_without_llm_key_registers_only_local_strategies() {
        let app = bootstrap_with_config(memory_config()).await.expect("bootstrap");

        let kinds = app.matching.strategy_kinds();
        assert_eq!(kinds.len(), 4);
        assert!(!kinds.contains(&StrategyKind::AiSemantic));

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_with_llm_key_registers_semantic_strategy() {
        let mut config = memory_config();
        config.llm.provider = LlmProvider::OpenAi;
        config.llm.api_key = Some("sk-test".to_string().into());

        let app = bootstrap_with_config(config).await.expect("bootstrap");

        assert!(app.matching.strategy_kinds().contains(&StrategyKind::AiSemantic));
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_database_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("postgres://localhost/procura".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn integration_smoke_covers_startup_seed_and_match_path() {
        let app = bootstrap_with_config(memory_config()).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('rfq', 'supplier', 'recommendation', 'historical_match')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables");
        assert_eq!(table_count, 4, "bootstrap should expose the marketplace tables");

        let seeded = MarketplaceSeedDataset::load(&app.db_pool).await.expect("seed");
        let rfq_id = RfqId::new(seeded.open_rfq_id);
        let matched = app
            .matching
            .find_matching_suppliers(&rfq_id, MatchOptions { limit: 2, use_advanced: true })
            .await
            .expect("match");
        assert!(!matched.is_empty());
        assert!(matched.len() <= 2);

        let stored = app
            .matching
            .get_recommendations_with_suppliers(&rfq_id, 10)
            .await
            .expect("read path");
        assert_eq!(stored.len(), matched.len());

        app.db_pool.close().await;
    }
}
