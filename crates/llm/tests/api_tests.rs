//! HTTP-level tests for the OpenRouter and Ollama clients against a
//! local mock server.

use assert_matches::assert_matches;
use mockito::Matcher;
use serde_json::json;
use sparza_llm::{LlmApiError, LlmClient, OllamaApi, OpenRouterApi};

fn openrouter(base_url: &str) -> OpenRouterApi {
    OpenRouterApi::with_client(
        reqwest::Client::new(),
        base_url,
        "sk-test".into(),
        "openai/gpt-4o-mini".into(),
        0.5,
    )
}

fn ollama(base_url: &str, token: Option<&str>) -> OllamaApi {
    OllamaApi::with_client(
        reqwest::Client::new(),
        base_url,
        token.map(str::to_string),
        "llama3.1:8b".into(),
        0.5,
    )
}

#[tokio::test]
async fn openrouter_returns_first_choice() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "openai/gpt-4o-mini",
            "messages": [{ "role": "user", "content": "classify this" }],
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "gen-1",
                "choices": [{ "message": { "role": "assistant", "content": "{\"dominant_topic\": \"Cards\"}" } }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let text = openrouter(&server.url()).complete("classify this").await.unwrap();
    assert_eq!(text, "{\"dominant_topic\": \"Cards\"}");
    mock.assert_async().await;
}

#[tokio::test]
async fn openrouter_surfaces_error_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v1/chat/completions")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let err = openrouter(&server.url()).complete("p").await.unwrap_err();
    assert_matches!(err, LlmApiError::ApiError { status: 429, ref body } if body == "rate limited");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn openrouter_without_choices_is_empty() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let err = openrouter(&server.url()).complete("p").await.unwrap_err();
    assert_matches!(err, LlmApiError::EmptyResponse);
}

#[tokio::test]
async fn ollama_generate_returns_response_text() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.1:8b",
            "prompt": "summarise",
            "stream": false,
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "model": "llama3.1:8b", "response": "{\"summary\": \"ok\"}", "done": true }).to_string())
        .create_async()
        .await;

    let client = ollama(&server.url(), Some("tok"));
    let text = LlmClient::complete(&client, "summarise").await.unwrap();
    assert_eq!(text, "{\"summary\": \"ok\"}");
    assert_eq!(LlmClient::model(&client), "llama3.1:8b");
    mock.assert_async().await;
}

#[tokio::test]
async fn ollama_bad_request_is_not_retryable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/generate")
        .with_status(400)
        .with_body("model not found")
        .create_async()
        .await;

    let err = ollama(&server.url(), None).complete("p").await.unwrap_err();
    assert_matches!(err, LlmApiError::ApiError { status: 400, .. });
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unreachable_server_is_retryable() {
    let err = ollama("http://127.0.0.1:1", None).complete("p").await.unwrap_err();
    assert_matches!(err, LlmApiError::Request(_));
    assert!(err.is_retryable());
}
