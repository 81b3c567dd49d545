//! Provider-agnostic completion trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{LlmApiError, OllamaApi, OpenRouterApi};
use crate::config::{LlmConfig, LlmProvider};

/// A text-completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `prompt` and return the raw model output.
    async fn complete(&self, prompt: &str) -> Result<String, LlmApiError>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

#[async_trait]
impl LlmClient for OpenRouterApi {
    async fn complete(&self, prompt: &str) -> Result<String, LlmApiError> {
        OpenRouterApi::complete(self, prompt).await
    }

    fn model(&self) -> &str {
        OpenRouterApi::model(self)
    }
}

#[async_trait]
impl LlmClient for OllamaApi {
    async fn complete(&self, prompt: &str) -> Result<String, LlmApiError> {
        OllamaApi::complete(self, prompt).await
    }

    fn model(&self) -> &str {
        OllamaApi::model(self)
    }
}

/// Build the client for the configured provider.
///
/// The underlying [`reqwest::Client`] carries the configured request timeout.
pub fn build_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmApiError> {
    let http = reqwest::Client::builder().timeout(config.timeout).build()?;

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenRouter => Arc::new(OpenRouterApi::with_client(
            http,
            &config.openrouter_base_url,
            config.openrouter_api_key.clone().unwrap_or_default(),
            config.openrouter_model.clone(),
            config.temperature,
        )),
        LlmProvider::Ollama => Arc::new(OllamaApi::with_client(
            http,
            &config.ollama_base_url,
            config.ollama_api_token.clone(),
            config.ollama_model.clone(),
            config.temperature,
        )),
    };

    tracing::info!(model = client.model(), provider = ?config.provider, "LLM client ready");
    Ok(client)
}
