use crate::db::models::{DenylistedEntity, DenylistedEntityType};
use crate::error::DbError;
use sqlx::PgPool;

pub struct DenylistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DenylistRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether the inbound event's author, channel, or guild is denylisted.
    /// A row with `scope = 'global'` blocks everywhere; a
    /// row with `scope = 'guild'` only blocks when `scope_id` matches this
    /// event's guild.
    pub async fn is_denylisted(
        &self,
        user_id: &str,
        channel_id: &str,
        guild_id: Option<&str>,
    ) -> Result<bool, DbError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM denylisted_entities
                WHERE (
                    (entity_type = 'user' AND discord_id = $1)
                    OR (entity_type = 'channel' AND discord_id = $2)
                    OR ($3::text IS NOT NULL AND entity_type = 'guild' AND discord_id = $3)
                )
                AND (scope = 'global' OR scope_id = $3)
            )",
        )
        .bind(user_id)
        .bind(channel_id)
        .bind(guild_id)
        .fetch_one(self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn add(
        &self,
        entity_type: DenylistedEntityType,
        discord_id: &str,
        scope: &str,
        scope_id: Option<&str>,
    ) -> Result<DenylistedEntity, DbError> {
        sqlx::query_as::<_, DenylistedEntity>(
            "INSERT INTO denylisted_entities (entity_type, discord_id, scope, scope_id)
             VALUES ($1, $2, $3, $4)
             RETURNING entity_type, discord_id, scope, scope_id",
        )
        .bind(entity_type)
        .bind(discord_id)
        .bind(scope)
        .bind(scope_id)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn remove(&self, entity_type: DenylistedEntityType, discord_id: &str, scope: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM denylisted_entities WHERE entity_type = $1 AND discord_id = $2 AND scope = $3")
            .bind(entity_type)
            .bind(discord_id)
            .bind(scope)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
