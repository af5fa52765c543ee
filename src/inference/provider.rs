//! Translates a resolved cascade document into provider-native request
//! parameters and invokes the chat completions endpoint. One generic
//! OpenAI-compatible client, not a client per vendor: the providers this
//! crate targets (OpenRouter and compatible gateways) all speak the same
//! `/v1/chat/completions` shape, reasoning field included.

use crate::context::compose::{Message, Role};
use crate::inference::reasoning::{self, ExtractedReasoning};
use crate::inference::wire::to_snake_case_document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct InferenceProvider {
    client: reqwest::Client,
    chat_completions_url: String,
    auth_header: Option<String>,
}

/// Classifies a failed invocation so the retry loop (`crate::inference::
/// retry`) and `TzurotError::Inference` mapping know how to treat it.
#[derive(Debug, Clone)]
pub enum InvokeError {
    /// 429/5xx or a transient network failure.
    Retriable(String),
    /// 4xx schema-invalid — not retried.
    Rejected(String),
    /// Anything else (malformed response body, missing choices).
    Other(String),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retriable(m) | Self::Rejected(m) | Self::Other(m) => write!(f, "{m}"),
        }
    }
}

impl InvokeError {
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable(_))
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i64,
    completion_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_details: Option<Value>,
}

/// One completed generation, already reasoning-extracted.
#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub extracted: ExtractedReasoning,
    pub model: Option<String>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
}

impl InferenceProvider {
    #[must_use]
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        let base = base_url.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            chat_completions_url: format!("{base}/chat/completions"),
            auth_header: api_key.map(|k| format!("Bearer {k}")),
        }
    }

    /// Build the wire request body: every camelCase field on `resolved`
    /// (the resolved cascade bundle) is passed straight through as a
    /// provider-native field, alongside the translated message list.
    fn build_request_body(resolved: &Value, messages: &[Message]) -> Value {
        let wire_messages: Vec<WireMessage> = messages
            .iter()
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: m.content.clone(),
            })
            .collect();

        let snake_cased = to_snake_case_document(resolved);
        let mut body = match snake_cased {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(serde_json::Map::new()),
        };

        if let Value::Object(map) = &mut body {
            map.insert("messages".to_string(), serde_json::to_value(wire_messages).unwrap_or_default());
        }

        body
    }

    /// Invoke the chat completions endpoint and return the reasoning-
    /// extracted result. Callers are responsible for the retry/backoff
    /// policy (see `crate::inference::retry`); the returned `InvokeError`
    /// tells them whether this attempt was retriable.
    pub async fn invoke(&self, resolved: &Value, messages: &[Message]) -> Result<InferenceResult, InvokeError> {
        let auth_header = self
            .auth_header
            .as_ref()
            .ok_or_else(|| InvokeError::Other("inference provider API key not configured".to_string()))?;

        let body = Self::build_request_body(resolved, messages);

        let response = self
            .client
            .post(&self.chat_completions_url)
            .header("Authorization", auth_header)
            .json(&body)
            .send()
            .await
            .map_err(|e| InvokeError::Retriable(format!("inference request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(InvokeError::Retriable(format!("provider returned HTTP {status}")));
        }
        if !status.is_success() {
            return Err(InvokeError::Rejected(format!("provider returned HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| InvokeError::Other(format!("invalid inference response JSON: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InvokeError::Other("inference provider returned no choices".to_string()))?;

        // Rewrite captured API-level reasoning into the body as tags before
        // the inline-tag post-processor runs, so both paths merge in one
        // pass.
        let details = reasoning::parse_reasoning_details(choice.message.reasoning_details.as_ref());
        let api_reasoning = reasoning::extract_api_reasoning(choice.message.reasoning.as_deref(), &details);
        let content = choice.message.content.unwrap_or_default();
        let extracted = reasoning::extract(&content, api_reasoning.as_deref());

        if reasoning::is_all_reasoning_response(&extracted) {
            tracing::warn!("model consumed its entire budget on reasoning; no visible content");
        }

        Ok(InferenceResult {
            extracted,
            model: parsed.model,
            prompt_tokens: parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: parsed.usage.as_ref().map(|u| u.completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_request_body_merges_resolved_config_and_messages() {
        let resolved = json!({ "model": "gpt-5", "temperature": 0.8 });
        let messages = vec![Message {
            role: Role::User,
            content: "hi".to_string(),
        }];

        let body = InferenceProvider::build_request_body(&resolved, &messages);
        assert_eq!(body["model"], json!("gpt-5"));
        assert_eq!(body["temperature"], json!(0.8));
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(body["messages"][0]["content"], json!("hi"));
    }

    #[test]
    fn build_request_body_passes_reasoning_through_as_top_level_field() {
        let resolved = json!({ "model": "gpt-5", "reasoning": { "effort": "high" } });
        let body = InferenceProvider::build_request_body(&resolved, &[]);
        assert_eq!(body["reasoning"]["effort"], json!("high"));
    }

    #[test]
    fn build_request_body_converts_camel_case_cascade_fields_to_snake_case() {
        let resolved = json!({ "topP": 0.9, "maxTokens": 2048, "reasoning": { "maxTokens": 1024 } });
        let body = InferenceProvider::build_request_body(&resolved, &[]);
        assert_eq!(body["top_p"], json!(0.9));
        assert_eq!(body["max_tokens"], json!(2048));
        assert_eq!(body["reasoning"]["max_tokens"], json!(1024));
        assert!(body.get("topP").is_none());
    }

    #[tokio::test]
    async fn invoke_without_api_key_errors() {
        let provider = InferenceProvider::new("https://openrouter.ai/api/v1", None);
        let result = provider.invoke(&json!({}), &[]).await;
        assert!(result.is_err());
    }
}
