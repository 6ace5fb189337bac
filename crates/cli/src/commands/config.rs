use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::{weight_env_key, weight_key, AppConfig, LoadOptions};
use procura_core::matching::StrategyKind;
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: String,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let entries = effective_entries(&config, detect_config_path().as_deref());
    match serde_json::to_value(&entries) {
        Ok(data) => CommandResult::success_with_data(
            "config",
            "effective config (source precedence: env > file > default)",
            Some(data),
        ),
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 3),
    }
}

fn effective_entries(config: &AppConfig, config_file_path: Option<&Path>) -> Vec<ConfigEntry> {
    let config_file_doc = load_config_file_doc(config_file_path);
    let entry = |key: &str, env_key: &str, value: String| ConfigEntry {
        key: key.to_string(),
        value,
        source: field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path),
    };

    let mut entries = vec![
        entry("database.url", "PROCURA_DATABASE_URL", config.database.url.clone()),
        entry(
            "database.max_connections",
            "PROCURA_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        entry(
            "database.timeout_secs",
            "PROCURA_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        entry("llm.provider", "PROCURA_LLM_PROVIDER", format!("{:?}", config.llm.provider)),
        entry("llm.model", "PROCURA_LLM_MODEL", config.llm.model.clone()),
        entry(
            "llm.base_url",
            "PROCURA_LLM_BASE_URL",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        entry(
            "llm.api_key",
            "PROCURA_LLM_API_KEY",
            config
                .llm
                .api_key
                .as_ref()
                .map(|key| redact_token(key.expose_secret()))
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        entry("llm.timeout_secs", "PROCURA_LLM_TIMEOUT_SECS", config.llm.timeout_secs.to_string()),
        entry("llm.max_retries", "PROCURA_LLM_MAX_RETRIES", config.llm.max_retries.to_string()),
        entry(
            "matching.default_limit",
            "PROCURA_MATCHING_DEFAULT_LIMIT",
            config.matching.default_limit.to_string(),
        ),
        entry(
            "matching.use_advanced",
            "PROCURA_MATCHING_USE_ADVANCED",
            config.matching.use_advanced.to_string(),
        ),
        entry(
            "matching.strategy_timeout_secs",
            "PROCURA_MATCHING_STRATEGY_TIMEOUT_SECS",
            config.matching.strategy_timeout_secs.to_string(),
        ),
        entry(
            "matching.persistence_failure",
            "PROCURA_MATCHING_PERSISTENCE_FAILURE",
            format!("{:?}", config.matching.persistence_failure),
        ),
    ];

    for kind in StrategyKind::ALL {
        entries.push(entry(
            &format!("matching.weights.{}", weight_key(kind)),
            &weight_env_key(kind),
            config.matching.weights.weight(kind).to_string(),
        ));
    }

    entries.extend([
        entry("server.bind_address", "PROCURA_SERVER_BIND_ADDRESS", config.server.bind_address.clone()),
        entry("server.port", "PROCURA_SERVER_PORT", config.server.port.to_string()),
        entry(
            "server.graceful_shutdown_secs",
            "PROCURA_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        entry("logging.level", "PROCURA_LOGGING_LEVEL", config.logging.level.clone()),
        entry("logging.format", "PROCURA_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]);

    entries
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("procura.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/procura.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use procura_core::config::AppConfig;

    use super::{contains_path, effective_entries, redact_token};

    #[test]
    fn redacts_api_keys_down_to_their_prefix() {
        assert_eq!(redact_token("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_token("opaque"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn file_values_are_attributed_to_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("procura.toml");
        fs::write(&path, "[matching]\ndefault_limit = 7\n").expect("write");

        let entries = effective_entries(&AppConfig::default(), Some(&path));
        let limit = entries.iter().find(|entry| entry.key == "matching.default_limit").expect("entry");
        let port = entries.iter().find(|entry| entry.key == "server.port").expect("entry");

        assert!(limit.source.starts_with("file ("));
        assert_eq!(port.source, "default");
    }

    #[test]
    fn lists_every_blend_weight() {
        let entries = effective_entries(&AppConfig::default(), None);
        let weights = entries.iter().filter(|entry| entry.key.starts_with("matching.weights.")).count();

        assert_eq!(weights, 5);
    }

    #[test]
    fn nested_paths_resolve_in_toml_documents() {
        let doc: toml::Value = "[llm]\nmodel = \"m\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
    }
}
