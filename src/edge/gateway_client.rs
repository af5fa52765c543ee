//! The chat-platform websocket connection itself ("Terminate the
//! chat-platform connection"). Everything downstream of this module only
//! ever sees an [`InboundEvent`]; reconnect/heartbeat/resume plumbing lives
//! here and nowhere else.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, Instant};
use tokio_tungstenite::tungstenite::Message;

const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41250;
const DEFAULT_INTENTS: u64 = 38401; // GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAttachment {
    pub url: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// The only two dispatch events C1 cares about (inbound
/// classification operates on message creation; `Ready` only matters to
/// this module's own session bookkeeping).
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    MessageCreate {
        message_id: String,
        channel_id: String,
        guild_id: Option<String>,
        author_id: String,
        author_is_bot: bool,
        author_display_name: String,
        content: String,
        attachments: Vec<InboundAttachment>,
        referenced_message_id: Option<String>,
    },
    Ready {
        session_id: String,
        resume_gateway_url: String,
        bot_user_id: String,
    },
}

#[derive(Default)]
struct SessionState {
    session_id: Mutex<Option<String>>,
    resume_gateway_url: Mutex<Option<String>>,
    sequence: AtomicI64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            session_id: Mutex::new(None),
            resume_gateway_url: Mutex::new(None),
            sequence: AtomicI64::new(-1),
        }
    }
}

/// Connects to Discord's gateway and forwards parsed dispatch events over
/// `tx` until the socket drops, at which point the caller reconnects.
pub struct GatewayClient {
    bot_token: String,
    http: reqwest::Client,
    state: SessionState,
}

impl GatewayClient {
    #[must_use]
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            http: reqwest::Client::new(),
            state: SessionState::new(),
        }
    }

    /// Connect once and pump events until the connection is lost, returning
    /// `Ok(())` so the caller's outer loop can reconnect unconditionally
    /// ("reconnect with backoff is out of scope for a single test
    /// but the loop must not give up").
    pub async fn run(&self, tx: &mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
        let ws_url = self.resolve_ws_url().await?;
        let (stream, _) = tokio_tungstenite::connect_async(&ws_url).await?;
        let (mut write, mut read) = stream.split();

        let heartbeat_interval_ms = read_hello(&mut read).await?;
        self.send_identify_or_resume(&mut write).await?;

        let mut ticker = interval(Duration::from_millis(heartbeat_interval_ms));
        let mut awaiting_ack = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if awaiting_ack {
                        tracing::warn!("gateway heartbeat unacked, reconnecting");
                        return Ok(());
                    }
                    self.send_heartbeat(&mut write).await?;
                    awaiting_ack = true;
                }
                message = read.next() => {
                    let Some(message) = message else {
                        tracing::warn!("gateway socket closed, reconnecting");
                        return Ok(());
                    };
                    if !self.handle_message(message?, tx, &mut write, &mut awaiting_ack).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn resolve_ws_url(&self) -> anyhow::Result<String> {
        if let Some(url) = self.state.resume_gateway_url.lock().await.clone() {
            return Ok(format!("{}/?v=10&encoding=json", url.trim_end_matches('/')));
        }

        let resp: serde_json::Value = self
            .http
            .get("https://discord.com/api/v10/gateway/bot")
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await?
            .json()
            .await?;
        let base = resp.get("url").and_then(|v| v.as_str()).unwrap_or("wss://gateway.discord.gg");
        Ok(format!("{}/?v=10&encoding=json", base.trim_end_matches('/')))
    }

    async fn send_identify_or_resume<S>(&self, write: &mut S) -> anyhow::Result<()>
    where
        S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        if let Some(session_id) = self.state.session_id.lock().await.clone() {
            let payload = json!({
                "op": 6,
                "d": { "token": self.bot_token, "session_id": session_id, "seq": self.sequence() },
            });
            write.send(Message::Text(payload.to_string().into())).await?;
            return Ok(());
        }

        let payload = json!({
            "op": 2,
            "d": {
                "token": self.bot_token,
                "intents": DEFAULT_INTENTS,
                "properties": { "os": std::env::consts::OS, "browser": "tzurot", "device": "tzurot" },
            },
        });
        write.send(Message::Text(payload.to_string().into())).await?;
        Ok(())
    }

    async fn send_heartbeat<S>(&self, write: &mut S) -> anyhow::Result<()>
    where
        S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let seq = self.sequence();
        let d = if seq < 0 { serde_json::Value::Null } else { json!(seq) };
        write.send(Message::Text(json!({ "op": 1, "d": d }).to_string().into())).await?;
        Ok(())
    }

    fn sequence(&self) -> i64 {
        self.state.sequence.load(Ordering::SeqCst)
    }

    async fn handle_message<S>(
        &self,
        message: Message,
        tx: &mpsc::Sender<InboundEvent>,
        write: &mut S,
        awaiting_ack: &mut bool,
    ) -> anyhow::Result<bool>
    where
        S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let Some(text) = as_text(message) else {
            return Ok(true);
        };
        let payload: serde_json::Value = serde_json::from_str(&text)?;

        if let Some(seq) = payload.get("s").and_then(serde_json::Value::as_i64) {
            self.state.sequence.store(seq, Ordering::SeqCst);
        }

        match payload.get("op").and_then(serde_json::Value::as_u64) {
            Some(1) => {
                self.send_heartbeat(write).await?;
                Ok(true)
            }
            Some(11) => {
                *awaiting_ack = false;
                Ok(true)
            }
            Some(7) => {
                tracing::info!("gateway requested reconnect");
                Ok(false)
            }
            Some(9) => {
                *self.state.session_id.lock().await = None;
                self.state.sequence.store(-1, Ordering::SeqCst);
                Ok(false)
            }
            Some(0) => {
                if let Some(event) = parse_dispatch(
                    payload.get("t").and_then(serde_json::Value::as_str).unwrap_or(""),
                    payload.get("d").unwrap_or(&serde_json::Value::Null),
                ) {
                    if let InboundEvent::Ready { session_id, resume_gateway_url, .. } = &event {
                        *self.state.session_id.lock().await = Some(session_id.clone());
                        *self.state.resume_gateway_url.lock().await = Some(resume_gateway_url.clone());
                    }
                    tx.send(event).await.ok();
                }
                Ok(true)
            }
            _ => Ok(true),
        }
    }
}

async fn read_hello<R>(read: &mut R) -> anyhow::Result<u64>
where
    R: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = read.next().await {
        let Some(text) = as_text(message?) else { continue };
        let payload: serde_json::Value = serde_json::from_str(&text)?;
        if payload.get("op").and_then(serde_json::Value::as_u64) == Some(10) {
            let interval_ms = payload
                .get("d")
                .and_then(|d| d.get("heartbeat_interval"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS);
            return Ok(interval_ms);
        }
    }
    anyhow::bail!("gateway closed before Hello")
}

fn as_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        Message::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}

fn parse_dispatch(event_type: &str, d: &serde_json::Value) -> Option<InboundEvent> {
    match event_type {
        "READY" => {
            let session_id = d.get("session_id")?.as_str()?.to_string();
            let resume_gateway_url = d.get("resume_gateway_url")?.as_str()?.to_string();
            let bot_user_id = d.get("user")?.get("id")?.as_str()?.to_string();
            Some(InboundEvent::Ready { session_id, resume_gateway_url, bot_user_id })
        }
        "MESSAGE_CREATE" => parse_message_create(d),
        _ => None,
    }
}

fn parse_message_create(d: &serde_json::Value) -> Option<InboundEvent> {
    let author = d.get("author")?;
    let attachments = d
        .get("attachments")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|a| {
                    Some(InboundAttachment {
                        url: a.get("url")?.as_str()?.to_string(),
                        filename: a.get("filename").and_then(serde_json::Value::as_str).map(str::to_string),
                        content_type: a.get("content_type").and_then(serde_json::Value::as_str).map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(InboundEvent::MessageCreate {
        message_id: d.get("id")?.as_str()?.to_string(),
        channel_id: d.get("channel_id")?.as_str()?.to_string(),
        guild_id: d.get("guild_id").and_then(serde_json::Value::as_str).map(str::to_string),
        author_id: author.get("id")?.as_str()?.to_string(),
        author_is_bot: author.get("bot").and_then(serde_json::Value::as_bool).unwrap_or(false),
        author_display_name: author
            .get("global_name")
            .and_then(serde_json::Value::as_str)
            .or_else(|| author.get("username").and_then(serde_json::Value::as_str))
            .unwrap_or("unknown")
            .to_string(),
        content: d.get("content").and_then(serde_json::Value::as_str).unwrap_or("").to_string(),
        attachments,
        referenced_message_id: d
            .get("referenced_message")
            .and_then(|m| m.get("id"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_create_with_attachment_and_reply() {
        let payload = json!({
            "id": "msg-1",
            "channel_id": "chan-1",
            "guild_id": "guild-1",
            "content": "hi @Luna",
            "author": { "id": "user-1", "bot": false, "username": "alex" },
            "attachments": [{ "url": "https://cdn/x.png", "filename": "x.png", "content_type": "image/png" }],
            "referenced_message": { "id": "msg-0" },
        });

        let event = parse_dispatch("MESSAGE_CREATE", &payload).expect("parses");
        match event {
            InboundEvent::MessageCreate { channel_id, attachments, referenced_message_id, .. } => {
                assert_eq!(channel_id, "chan-1");
                assert_eq!(attachments.len(), 1);
                assert_eq!(referenced_message_id.as_deref(), Some("msg-0"));
            }
            InboundEvent::Ready { .. } => panic!("expected MessageCreate"),
        }
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        assert!(parse_dispatch("SOMETHING_ELSE", &json!({})).is_none());
    }

    #[test]
    fn ready_event_captures_resume_fields() {
        let payload = json!({ "session_id": "s1", "resume_gateway_url": "wss://x", "user": { "id": "bot-1" } });
        let event = parse_dispatch("READY", &payload).expect("parses");
        assert!(matches!(event, InboundEvent::Ready { .. }));
    }
}
