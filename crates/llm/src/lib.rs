//! LLM completion clients for the enrichment jobs.
//!
//! - [`api`]: OpenRouter and Ollama REST clients.
//! - [`client`]: the [`LlmClient`] trait and [`build_client`].
//! - [`config`]: environment-driven [`LlmConfig`].
//! - [`retry`]: [`complete_json`], the retrying JSON completion.

pub mod api;
pub mod client;
pub mod config;
pub mod retry;

pub use api::{LlmApiError, OllamaApi, OpenRouterApi};
pub use client::{build_client, LlmClient};
pub use config::{LlmConfig, LlmProvider};
pub use retry::{complete_json, LlmError};
