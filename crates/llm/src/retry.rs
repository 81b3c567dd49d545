//! Retrying JSON completion.
//!
//! One call to [`complete_json`] covers every attempt for a single record:
//! request, JSON extraction and key check, with exponential backoff between
//! attempts. The cancellation token is observed both while a request is in
//! flight and while sleeping.

use sparza_core::json_extract::parse_json_object;
use sparza_core::retry::RetryPolicy;
use sparza_core::types::Fields;
use tokio_util::sync::CancellationToken;

use crate::api::LlmApiError;
use crate::client::LlmClient;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Every attempt failed with a retryable error.
    #[error("LLM call failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    /// A non-retryable API error (bad request, auth failure).
    #[error("LLM call failed: {0}")]
    Fatal(#[source] LlmApiError),

    #[error("LLM call cancelled")]
    Cancelled,
}

/// Call the model until it returns a JSON object carrying `required_keys`.
pub async fn complete_json(
    client: &dyn LlmClient,
    prompt: &str,
    required_keys: &[&str],
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Fields, LlmError> {
    let max_attempts = policy.max_attempts.max(1);
    let delays = policy.delays();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        attempt += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = client.complete(prompt) => result,
        };

        let failure = match result {
            Ok(text) => match parse_json_object(&text, required_keys) {
                Ok(fields) => return Ok(fields),
                Err(e) => e.to_string(),
            },
            Err(e) if e.is_retryable() => e.to_string(),
            Err(e) => {
                tracing::warn!(model = client.model(), error = %e, "LLM call rejected");
                return Err(LlmError::Fatal(e));
            }
        };

        if attempt >= max_attempts {
            return Err(LlmError::Exhausted {
                attempts: attempt,
                last: failure,
            });
        }

        let delay = delays
            .get((attempt - 1) as usize)
            .copied()
            .unwrap_or(policy.max_delay);
        tracing::debug!(
            model = client.model(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "Retrying LLM call",
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
