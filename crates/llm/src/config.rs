use std::str::FromStr;
use std::time::Duration;

use sparza_core::retry::RetryPolicy;

/// Errors raised while reading configuration variables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Which completion endpoint to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenRouter,
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "ollama" => Ok(LlmProvider::Ollama),
            _ => Err(ConfigError::Invalid {
                var: "LLM_PROVIDER",
                value: s.to_string(),
            }),
        }
    }
}

/// LLM client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub openrouter_model: String,
    pub ollama_base_url: String,
    pub ollama_api_token: Option<String>,
    pub ollama_model: String,
    pub temperature: f32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts per record, including the first.
    pub max_attempts: u32,
}

impl LlmConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var               | Default                  |
    /// |-----------------------|--------------------------|
    /// | `LLM_PROVIDER`        | `openrouter`             |
    /// | `OPENROUTER_API_KEY`  | required for openrouter  |
    /// | `OPENROUTER_BASE_URL` | `https://openrouter.ai`  |
    /// | `OPENROUTER_MODEL`    | `openai/gpt-4o-mini`     |
    /// | `OLLAMA_BASE_URL`     | `http://localhost:11434` |
    /// | `OLLAMA_API_TOKEN`    | none                     |
    /// | `OLLAMA_MODEL`        | `llama3.1:8b`            |
    /// | `LLM_TEMPERATURE`     | `0.7`                    |
    /// | `LLM_TIMEOUT_SECS`    | `120`                    |
    /// | `LLM_MAX_RETRIES`     | `3`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LlmConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let provider = match non_empty(&lookup, "LLM_PROVIDER") {
            Some(value) => value.parse()?,
            None => LlmProvider::OpenRouter,
        };

        let openrouter_api_key = non_empty(&lookup, "OPENROUTER_API_KEY");
        if provider == LlmProvider::OpenRouter && openrouter_api_key.is_none() {
            return Err(ConfigError::Missing("OPENROUTER_API_KEY"));
        }

        let temperature: f32 = parse_or(&lookup, "LLM_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                var: "LLM_TEMPERATURE",
                value: temperature.to_string(),
            });
        }

        let timeout_secs: u64 = parse_or(&lookup, "LLM_TIMEOUT_SECS", 120)?;
        let max_attempts: u32 = parse_or(&lookup, "LLM_MAX_RETRIES", 3)?;

        Ok(Self {
            provider,
            openrouter_api_key,
            openrouter_base_url: non_empty(&lookup, "OPENROUTER_BASE_URL")
                .unwrap_or_else(|| "https://openrouter.ai".into()),
            openrouter_model: non_empty(&lookup, "OPENROUTER_MODEL")
                .unwrap_or_else(|| "openai/gpt-4o-mini".into()),
            ollama_base_url: non_empty(&lookup, "OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".into()),
            ollama_api_token: non_empty(&lookup, "OLLAMA_API_TOKEN"),
            ollama_model: non_empty(&lookup, "OLLAMA_MODEL").unwrap_or_else(|| "llama3.1:8b".into()),
            temperature,
            timeout: Duration::from_secs(timeout_secs),
            max_attempts: max_attempts.max(1),
        })
    }

    /// Model name for the selected provider.
    pub fn model(&self) -> &str {
        match self.provider {
            LlmProvider::OpenRouter => &self.openrouter_model,
            LlmProvider::Ollama => &self.ollama_model,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_attempts)
    }
}

/// Read a variable, treating blank values as unset.
pub fn non_empty(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset.
pub fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(lookup, var) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
