use crate::db::models::Personality;
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PersonalityRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PersonalityRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn by_slug(&self, slug: &str) -> Result<Option<Personality>, DbError> {
        sqlx::query_as::<_, Personality>(
            "SELECT id, owner_user_id, slug, display_name, avatar_ref, system_prompt_id,
                    default_llm_config_id, context_overrides
             FROM personalities WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Resolve by alias first, falling back to treating the token as a slug
    /// directly — an explicit-mention token may be either the personality's
    /// own slug or a short alias.
    pub async fn by_alias_or_slug(&self, token: &str) -> Result<Option<Personality>, DbError> {
        let by_alias = sqlx::query_as::<_, Personality>(
            "SELECT p.id, p.owner_user_id, p.slug, p.display_name, p.avatar_ref,
                    p.system_prompt_id, p.default_llm_config_id, p.context_overrides
             FROM personalities p
             JOIN personality_aliases a ON a.personality_id = p.id
             WHERE a.alias = $1",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        if by_alias.is_some() {
            return Ok(by_alias);
        }

        self.by_slug(token).await
    }

    pub async fn by_id(&self, id: Uuid) -> Result<Option<Personality>, DbError> {
        sqlx::query_as::<_, Personality>(
            "SELECT id, owner_user_id, slug, display_name, avatar_ref, system_prompt_id,
                    default_llm_config_id, context_overrides
             FROM personalities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Every alias registered for a personality, for mention stripping: the
    /// turn text may echo any of them back as a leading "@name" token, not
    /// just the slug or display name.
    pub async fn aliases_for(&self, personality_id: Uuid) -> Result<Vec<String>, DbError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT alias FROM personality_aliases WHERE personality_id = $1")
                .bind(personality_id)
                .fetch_all(self.pool)
                .await?;
        Ok(rows.into_iter().map(|(alias,)| alias).collect())
    }

    /// Personality activated (auto-responding, no mention required) for this
    /// channel, if any — at most one row per channel.
    pub async fn activated_for_channel(
        &self,
        channel_id: &str,
    ) -> Result<Option<Personality>, DbError> {
        sqlx::query_as::<_, Personality>(
            "SELECT p.id, p.owner_user_id, p.slug, p.display_name, p.avatar_ref,
                    p.system_prompt_id, p.default_llm_config_id, p.context_overrides
             FROM personalities p
             JOIN activated_channels ac ON ac.personality_id = p.id
             WHERE ac.channel_id = $1",
        )
        .bind(channel_id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }
}
