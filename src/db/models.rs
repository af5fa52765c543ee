use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a single `ConversationTurn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub platform_id: String,
    pub display_handle: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Persona {
    pub id: Uuid,
    pub user_id: Uuid,
    pub preferred_name: String,
    pub pronouns: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Personality {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub slug: String,
    pub display_name: String,
    pub avatar_ref: String,
    pub system_prompt_id: Option<Uuid>,
    pub default_llm_config_id: Uuid,
    /// Free-form per-personality context overrides (extended-context
    /// settings, error-message override, context-header toggle).
    pub context_overrides: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PersonalityAlias {
    pub alias: String,
    pub personality_id: Uuid,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LlmConfig {
    pub id: Uuid,
    pub name: String,
    pub model: String,
    pub vision_model: Option<String>,
    pub owner_user_id: Uuid,
    pub is_global: bool,
    pub is_default: bool,
    /// Full generation knob-set, camelCase keys validated against the
    /// `advanced_parameters` schema (see `cascade::advanced_params`).
    pub advanced_parameters: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserPersonalityConfig {
    pub user_id: Uuid,
    pub personality_id: Uuid,
    pub persona_override: Option<Uuid>,
    pub llm_config_override: Option<Uuid>,
    pub config_overrides: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ActivatedChannel {
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub personality_id: Uuid,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub personality_id: Uuid,
    pub persona_id: Uuid,
    pub role: TurnRole,
    pub content: String,
    pub token_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ConversationTombstone {
    pub turn_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub persona_id: Uuid,
    pub personality_id: Option<Uuid>,
    pub content: String,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
    pub chunk_group_id: Option<Uuid>,
    pub chunk_index: Option<i32>,
    pub total_chunks: Option<i32>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// A memory row plus its retrieval distance, as returned from a
/// cosine-distance similarity query. Not a DB row shape on its own.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub distance: f32,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PendingMemory {
    pub id: Uuid,
    pub turn_id: Uuid,
    pub attempt_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DenylistedEntityType {
    User,
    Channel,
    Guild,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct DenylistedEntity {
    pub entity_type: DenylistedEntityType,
    pub discord_id: String,
    pub scope: String,
    pub scope_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LlmDiagnosticLog {
    pub id: Uuid,
    pub request_id: Uuid,
    pub message_id: Option<String>,
    pub model: String,
    pub provider: String,
    pub duration_ms: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub created_at: DateTime<Utc>,
}
