use std::path::PathBuf;

use sparza_llm::config::{non_empty, parse_or};
use sparza_pipeline::batch::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] sparza_llm::config::ConfigError),

    #[error("{var} must be between {min} and {max}, got {value}")]
    OutOfRange {
        var: &'static str,
        value: usize,
        min: usize,
        max: usize,
    },
}

/// Worker configuration loaded from environment variables.
///
/// LLM settings live in [`sparza_llm::LlmConfig`] and are only loaded by the
/// jobs that call a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub mongo_uri: String,
    pub database: String,
    /// Directory for run logs (default: `logs`).
    pub log_dir: PathBuf,
    /// Directory for intermediate results (default: `<log_dir>/cache`).
    pub cache_dir: PathBuf,
    pub concurrency: usize,
    pub batch_size: usize,
    /// Emit JSON log lines on stdout.
    pub json_logs: bool,
}

impl WorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default            |
    /// |---------------------------|--------------------|
    /// | `MONGO_CONNECTION_STRING` | required           |
    /// | `MONGO_DATABASE_NAME`     | `sparzaai`         |
    /// | `LOG_DIR`                 | `logs`             |
    /// | `CACHE_DIR`               | `<LOG_DIR>/cache`  |
    /// | `WORKER_CONCURRENCY`      | `8` (1-64)         |
    /// | `BATCH_SIZE`              | `50`               |
    /// | `LOG_FORMAT`              | text (`json`)      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mongo_uri = non_empty(&lookup, "MONGO_CONNECTION_STRING").ok_or(
            sparza_llm::config::ConfigError::Missing("MONGO_CONNECTION_STRING"),
        )?;
        let database = non_empty(&lookup, "MONGO_DATABASE_NAME").unwrap_or_else(|| "sparzaai".into());

        let log_dir = PathBuf::from(non_empty(&lookup, "LOG_DIR").unwrap_or_else(|| "logs".into()));
        let cache_dir = non_empty(&lookup, "CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| log_dir.join("cache"));

        let concurrency = check_concurrency(
            "WORKER_CONCURRENCY",
            parse_or(&lookup, "WORKER_CONCURRENCY", DEFAULT_CONCURRENCY)?,
        )?;
        let batch_size: usize = parse_or(&lookup, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::OutOfRange {
                var: "BATCH_SIZE",
                value: 0,
                min: 1,
                max: usize::MAX,
            });
        }

        let json_logs = non_empty(&lookup, "LOG_FORMAT")
            .is_some_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            mongo_uri,
            database,
            log_dir,
            cache_dir,
            concurrency,
            batch_size,
            json_logs,
        })
    }
}

/// Concurrency must be within `1..=64`.
pub fn check_concurrency(var: &'static str, value: usize) -> Result<usize, ConfigError> {
    if (1..=MAX_CONCURRENCY).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            var,
            value,
            min: 1,
            max: MAX_CONCURRENCY,
        })
    }
}
