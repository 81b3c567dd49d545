//! REST API clients for the OpenRouter and Ollama completion endpoints.
//!
//! Both wrap a [`reqwest::Client`] and expose a single `complete` call
//! returning the raw model text. JSON extraction and retries live in
//! [`crate::retry`].

use serde::{Deserialize, Serialize};

/// Errors from the LLM REST layer.
#[derive(Debug, thiserror::Error)]
pub enum LlmApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, body decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("LLM API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The endpoint answered 2xx but without any text.
    #[error("LLM returned an empty response")]
    EmptyResponse,
}

impl LlmApiError {
    /// Whether another attempt may succeed: transport failures, rate
    /// limiting, server errors and empty answers.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmApiError::Request(e) => !e.is_builder(),
            LlmApiError::ApiError { status, .. } => *status == 429 || *status >= 500,
            LlmApiError::EmptyResponse => true,
        }
    }
}

// ---------------------------------------------------------------------------
// OpenRouter
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for the OpenRouter chat-completions API.
pub struct OpenRouterApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenRouterApi {
    /// * `base_url` - e.g. `https://openrouter.ai`; the API path is appended.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        api_key: String,
        model: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user message and return the first choice's content.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmApiError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = parse_response(response).await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmApiError::EmptyResponse)
    }
}

// ---------------------------------------------------------------------------
// Ollama
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// HTTP client for an Ollama server's `/api/generate` endpoint.
pub struct OllamaApi {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    model: String,
    temperature: f32,
}

impl OllamaApi {
    /// * `api_token` - sent as a bearer token when the server sits behind an
    ///   authenticating proxy.
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        api_token: Option<String>,
        model: String,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
            model,
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a non-streaming generation and return the response text.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmApiError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let mut request = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let parsed: GenerateResponse = parse_response(request.send().await?).await?;
        if parsed.response.trim().is_empty() {
            return Err(LlmApiError::EmptyResponse);
        }
        Ok(parsed.response)
    }
}

// ---- private helpers ----

/// Return the response unchanged on a success status, or an
/// [`LlmApiError::ApiError`] carrying the status and body text.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LlmApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(LlmApiError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, LlmApiError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}
