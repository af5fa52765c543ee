use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One inbound attachment carried through from the chat platform (
/// "Chat platform (inbound)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub mime_type: Option<String>,
    pub filename: String,
}

/// What C1 hands to C2 once it has resolved a target personality: user,
/// channel, guild, personality, content, attachments, and the message
/// being replied to, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub user_platform_id: String,
    pub user_display_handle: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub guild_name: Option<String>,
    pub channel_name: Option<String>,
    pub personality_id: Uuid,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub reply_to_message_id: Option<String>,
}

/// What C2 hands back to C1 for delivery ("Outbound publish":
/// "a delivery plan from C2 (ordered list of text chunks + optional
/// files/embeds + optional thinking-block)"). `files` and `embeds` attach
/// to the last chunk only ("Chunking").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPlan {
    pub chunks: Vec<String>,
    pub files: Vec<String>,
    pub embeds: Vec<serde_json::Value>,
    pub thinking_content: Option<String>,
}

impl DeliveryPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
