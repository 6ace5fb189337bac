pub mod config;
pub mod feedback;
pub mod matching;
pub mod migrate;
pub mod recommendations;
pub mod seed;

use std::sync::Arc;

use procura_agent::semantic_matcher_from_config;
use procura_core::config::{AppConfig, LoadOptions};
use procura_core::errors::{ApplicationError, DomainError};
use procura_core::matching::MatchingService;
use procura_db::{connect_with_config, migrations, DbPool, SqlMatchStore};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

/// Error class, message and exit code of a failed step.
pub(crate) type Failure = (&'static str, String, u8);

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, builds a runtime and runs `step` against a migrated database.
pub(crate) fn with_database<T, F, Fut>(command: &str, step: F) -> Result<T, CommandResult>
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: std::future::Future<Output = Result<T, Failure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return Err(CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            ));
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return Err(CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            ));
        }
    };

    runtime
        .block_on(async move {
            let pool = connect_with_config(&config.database)
                .await
                .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;

            let outcome = step(config, pool.clone()).await;
            pool.close().await;
            outcome
        })
        .map_err(|failure| CommandResult::from_failure(command, failure))
}

/// The same strategy set the server registers.
pub(crate) fn matching_service(config: &AppConfig, pool: DbPool) -> Result<MatchingService, Failure> {
    let store = Arc::new(SqlMatchStore::new(pool));
    let mut service = MatchingService::new(store, &config.matching);
    if let Some(semantic) = semantic_matcher_from_config(&config.llm)
        .map_err(|error| ("llm_setup", error.to_string(), 3u8))?
    {
        service = service.with_strategy(Arc::new(semantic));
    }
    Ok(service.with_default_strategies())
}

pub(crate) fn application_failure(error: ApplicationError) -> Failure {
    match &error {
        ApplicationError::Domain(DomainError::RequestNotFound { .. }) => {
            ("not_found", error.to_string(), 6)
        }
        ApplicationError::Domain(_) => ("validation", error.to_string(), 6),
        ApplicationError::Configuration(_) => ("config_validation", error.to_string(), 2),
        ApplicationError::Persistence(_) | ApplicationError::Integration(_) => {
            ("execution", error.to_string(), 5)
        }
    }
}

pub(crate) fn to_data(value: &impl Serialize) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(|error| ("serialization", error.to_string(), 5u8))
}
