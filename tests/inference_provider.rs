//! Exercises `InferenceProvider::invoke`'s full HTTP round trip against a
//! mocked chat-completions endpoint: request building, response parsing,
//! and reasoning extraction all in one pass, which the unit tests in
//! `inference::provider` don't cover (they stop at `build_request_body`).

use serde_json::json;
use tzurot_core::context::compose::{Message, Role};
use tzurot_core::inference::provider::InferenceProvider;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn invoke_parses_content_and_usage_from_a_successful_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-5",
            "choices": [{ "message": { "content": "Hello there!" } }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 7 },
        })))
        .mount(&server)
        .await;

    let provider = InferenceProvider::new(&server.uri(), Some("test-key"));
    let messages = vec![Message { role: Role::User, content: "hi".to_string() }];

    let result = provider.invoke(&json!({ "model": "gpt-5" }), &messages).await.expect("successful invoke");
    assert_eq!(result.extracted.cleaned_content, "Hello there!");
    assert_eq!(result.model, Some("gpt-5".to_string()));
    assert_eq!(result.prompt_tokens, Some(42));
    assert_eq!(result.completion_tokens, Some(7));
}

#[tokio::test]
async fn invoke_extracts_inline_thinking_tags_from_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "<think>working it out</think>Final answer." } }],
        })))
        .mount(&server)
        .await;

    let provider = InferenceProvider::new(&server.uri(), Some("test-key"));
    let result = provider.invoke(&json!({}), &[]).await.expect("successful invoke");
    assert_eq!(result.extracted.cleaned_content, "Final answer.");
    assert_eq!(result.extracted.thinking_content, Some("working it out".to_string()));
}

#[tokio::test]
async fn invoke_treats_429_as_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let provider = InferenceProvider::new(&server.uri(), Some("test-key"));
    let err = provider.invoke(&json!({}), &[]).await.expect_err("429 should error");
    assert!(err.is_retriable(), "429 should be classified as retriable, got: {err}");
}

#[tokio::test]
async fn invoke_treats_400_as_rejected_not_retriable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "bad request" })))
        .mount(&server)
        .await;

    let provider = InferenceProvider::new(&server.uri(), Some("test-key"));
    let err = provider.invoke(&json!({}), &[]).await.expect_err("400 should error");
    assert!(!err.is_retriable(), "400 should not be classified as retriable, got: {err}");
}

#[tokio::test]
async fn invoke_errors_when_response_has_no_choices() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let provider = InferenceProvider::new(&server.uri(), Some("test-key"));
    let err = provider.invoke(&json!({}), &[]).await.expect_err("empty choices should error");
    assert!(!err.is_retriable());
}
