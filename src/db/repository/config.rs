use crate::db::models::{LlmConfig, SystemPrompt, UserPersonalityConfig};
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct ConfigRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ConfigRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn default_llm_config(&self) -> Result<Option<LlmConfig>, DbError> {
        sqlx::query_as::<_, LlmConfig>(
            "SELECT id, name, model, vision_model, owner_user_id, is_global, is_default,
                    advanced_parameters
             FROM llm_configs WHERE is_default = true LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn default_system_prompt(&self) -> Result<Option<SystemPrompt>, DbError> {
        sqlx::query_as::<_, SystemPrompt>(
            "SELECT id, name, content, is_default FROM system_prompts WHERE is_default = true LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn llm_config_by_id(&self, id: Uuid) -> Result<Option<LlmConfig>, DbError> {
        sqlx::query_as::<_, LlmConfig>(
            "SELECT id, name, model, vision_model, owner_user_id, is_global, is_default,
                    advanced_parameters
             FROM llm_configs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn system_prompt_by_id(&self, id: Uuid) -> Result<Option<SystemPrompt>, DbError> {
        sqlx::query_as::<_, SystemPrompt>(
            "SELECT id, name, content, is_default FROM system_prompts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn user_personality_config(
        &self,
        user_id: Uuid,
        personality_id: Uuid,
    ) -> Result<Option<UserPersonalityConfig>, DbError> {
        sqlx::query_as::<_, UserPersonalityConfig>(
            "SELECT user_id, personality_id, persona_override, llm_config_override, config_overrides
             FROM user_personality_configs WHERE user_id = $1 AND personality_id = $2",
        )
        .bind(user_id)
        .bind(personality_id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }
}
