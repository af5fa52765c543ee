//! Webhook-backed outbound delivery ("Outbound publish"): resolve
//! or create a per-channel webhook, post under the personality's identity,
//! fall back to a plain channel send with a name prefix if the webhook
//! fails.

use crate::error::DeliveryError;
use crate::inference::retry::{with_backoff, BackoffPolicy};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

const MAX_USERNAME_CHARS: usize = 32;
const TRUNCATED_USERNAME_CHARS: usize = 29;
const FALLBACK_USERNAME: &str = "Personality";
const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Sanitize a display name into a webhook username: strip quote and
/// mention characters, truncate to 32 chars (29 + "..." when over), fall
/// back to "Personality" when empty after stripping.
#[must_use]
pub fn sanitize_username(display_name: &str) -> String {
    let stripped: String = display_name
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '`' | '@' | '<' | '>'))
        .collect();
    let trimmed = stripped.trim();

    if trimmed.is_empty() {
        return FALLBACK_USERNAME.to_string();
    }

    let char_count = trimmed.chars().count();
    if char_count <= MAX_USERNAME_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(TRUNCATED_USERNAME_CHARS).collect();
        format!("{head}...")
    }
}

#[derive(Debug, Clone)]
struct WebhookInfo {
    id: String,
    token: String,
}

/// One delivered chunk's outcome, for the caller's partial-delivery
/// bookkeeping ("Failure semantics": "Platform 4xx on a chunk
/// past the first -> log and continue").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    Delivered,
    DeliveredViaFallback,
    Failed(String),
}

/// Posts delivery-plan chunks under a personality's webhook identity,
/// caching webhook lookups per channel and falling back to a plain
/// channel send when the webhook itself is unusable.
pub struct WebhookPublisher {
    client: reqwest::Client,
    bot_token: String,
    cache: Mutex<HashMap<String, WebhookInfo>>,
    retry_policy: BackoffPolicy,
}

impl WebhookPublisher {
    #[must_use]
    pub fn new(bot_token: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            bot_token,
            cache: Mutex::new(HashMap::new()),
            retry_policy: BackoffPolicy::default(),
        }
    }

    /// Look up or create the webhook for this channel (step 1,
    /// "Failure semantics": "Webhook creation races -> idempotent: look up
    /// first, then create").
    async fn resolve_webhook(&self, channel_id: &str) -> Result<WebhookInfo, DeliveryError> {
        if let Some(cached) = self.cache.lock().await.get(channel_id).cloned() {
            return Ok(cached);
        }

        let list_url = format!("{DISCORD_API_BASE}/channels/{channel_id}/webhooks");
        let existing: Vec<serde_json::Value> = self
            .client
            .get(&list_url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await
            .map_err(|e| DeliveryError::WebhookResolution {
                channel_id: channel_id.to_string(),
                message: e.to_string(),
            })?
            .json()
            .await
            .unwrap_or_default();

        let found = existing.iter().find_map(|w| {
            let id = w.get("id")?.as_str()?.to_string();
            let token = w.get("token")?.as_str()?.to_string();
            Some(WebhookInfo { id, token })
        });

        let info = match found {
            Some(info) => info,
            None => {
                let body = json!({ "name": "tzurot" });
                let created: serde_json::Value = self
                    .client
                    .post(&list_url)
                    .header("Authorization", format!("Bot {}", self.bot_token))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| DeliveryError::WebhookResolution {
                        channel_id: channel_id.to_string(),
                        message: e.to_string(),
                    })?
                    .json()
                    .await
                    .map_err(|e| DeliveryError::WebhookResolution {
                        channel_id: channel_id.to_string(),
                        message: e.to_string(),
                    })?;

                WebhookInfo {
                    id: created
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    token: created
                        .get("token")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                }
            }
        };

        self.cache
            .lock()
            .await
            .insert(channel_id.to_string(), info.clone());
        Ok(info)
    }

    /// Drop a cached webhook after it 404s, so the next post re-resolves
    /// (webhook cache "invalidated on 404").
    async fn invalidate(&self, channel_id: &str) {
        self.cache.lock().await.remove(channel_id);
    }

    async fn post_via_webhook(
        &self,
        channel_id: &str,
        username: &str,
        avatar_url: Option<&str>,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let info = self.resolve_webhook(channel_id).await?;
        let url = format!("{DISCORD_API_BASE}/webhooks/{}/{}", info.id, info.token);

        let mut body = json!({ "username": username, "content": content });
        if let Some(avatar) = avatar_url {
            body["avatar_url"] = json!(avatar);
        }

        let outcome = with_backoff(
            self.retry_policy,
            |status: &u16| *status >= 500,
            |_attempt| {
                let client = &self.client;
                let url = &url;
                let body = &body;
                async move {
                    let resp = client
                        .post(url)
                        .json(body)
                        .send()
                        .await
                        .map_err(|_| 502u16)?;
                    let status = resp.status().as_u16();
                    if status < 300 {
                        Ok(())
                    } else {
                        Err(status)
                    }
                }
            },
        )
        .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(404) => {
                self.invalidate(channel_id).await;
                Err(DeliveryError::WebhookResolution {
                    channel_id: channel_id.to_string(),
                    message: "webhook returned 404".to_string(),
                })
            }
            Err(status) => Err(DeliveryError::FirstChunkFailed(format!(
                "webhook post failed with HTTP {status}"
            ))),
        }
    }

    async fn post_plain_fallback(
        &self,
        channel_id: &str,
        display_name: &str,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel_id}/messages");
        let body = json!({ "content": format!("**{display_name}:** {content}") });

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::FirstChunkFailed(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::FirstChunkFailed(format!(
                "fallback send failed with HTTP {}",
                resp.status()
            )))
        }
    }

    /// Post one chunk: try the webhook first, fall back to a plain
    /// prefixed channel send if it fails (step 5).
    pub async fn post_chunk(
        &self,
        channel_id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
        content: &str,
        chunk_index: usize,
    ) -> ChunkOutcome {
        let username = sanitize_username(display_name);

        match self
            .post_via_webhook(channel_id, &username, avatar_url, content)
            .await
        {
            Ok(()) => ChunkOutcome::Delivered,
            Err(e) => {
                tracing::warn!(chunk_index, error = %e, "webhook post failed, falling back to plain send");
                match self.post_plain_fallback(channel_id, display_name, content).await {
                    Ok(()) => ChunkOutcome::DeliveredViaFallback,
                    Err(e) => ChunkOutcome::Failed(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_mention_characters() {
        assert_eq!(sanitize_username("\"Aria\" <@123>"), "Aria 123");
    }

    #[test]
    fn sanitize_empty_falls_back_to_personality() {
        assert_eq!(sanitize_username(""), "Personality");
        assert_eq!(sanitize_username("\"\""), "Personality");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long_name = "a".repeat(40);
        let sanitized = sanitize_username(&long_name);
        assert_eq!(sanitized.chars().count(), 32);
        assert!(sanitized.ends_with("..."));
        assert_eq!(&sanitized[..29], "a".repeat(29).as_str());
    }

    #[test]
    fn sanitize_passes_through_short_names_unchanged() {
        assert_eq!(sanitize_username("Aria"), "Aria");
    }

    #[test]
    fn sanitize_exactly_32_chars_is_unchanged() {
        let name = "a".repeat(32);
        assert_eq!(sanitize_username(&name), name);
    }
}
