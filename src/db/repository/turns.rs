use crate::db::models::{ConversationTurn, TurnRole};
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct TurnRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TurnRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a turn. Conversation history is append-only — there is no
    /// update/delete here, only insert and tombstone.
    #[allow(clippy::too_many_arguments)]
    pub async fn append(
        &self,
        channel_id: &str,
        guild_id: Option<&str>,
        personality_id: Uuid,
        persona_id: Uuid,
        role: TurnRole,
        content: &str,
        token_count: Option<i32>,
    ) -> Result<ConversationTurn, DbError> {
        sqlx::query_as::<_, ConversationTurn>(
            "INSERT INTO conversation_turns
                (channel_id, guild_id, personality_id, persona_id, role, content, token_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, channel_id, guild_id, personality_id, persona_id, role, content,
                       token_count, created_at",
        )
        .bind(channel_id)
        .bind(guild_id)
        .bind(personality_id)
        .bind(persona_id)
        .bind(role)
        .bind(content)
        .bind(token_count)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Most recent `limit` turns for (channel, personality), newest first —
    /// callers reverse to chronological order per step 1.
    pub async fn recent(
        &self,
        channel_id: &str,
        personality_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ConversationTurn>, DbError> {
        sqlx::query_as::<_, ConversationTurn>(
            "SELECT t.id, t.channel_id, t.guild_id, t.personality_id, t.persona_id, t.role,
                    t.content, t.token_count, t.created_at
             FROM conversation_turns t
             LEFT JOIN conversation_tombstones ts ON ts.turn_id = t.id
             WHERE t.channel_id = $1 AND t.personality_id = $2 AND ts.turn_id IS NULL
             ORDER BY t.created_at DESC
             LIMIT $3",
        )
        .bind(channel_id)
        .bind(personality_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Lazily backfill a cached token count for a turn that lacks one
    /// (step 1: "rows lacking a cache are measured on the fly and
    /// may be lazily backfilled").
    pub async fn backfill_token_count(&self, turn_id: Uuid, token_count: i32) -> Result<(), DbError> {
        sqlx::query("UPDATE conversation_turns SET token_count = $2 WHERE id = $1 AND token_count IS NULL")
            .bind(turn_id)
            .bind(token_count)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Fetch an assistant turn and the user turn immediately preceding it in
    /// the same channel/personality, for C5 to distill ("a (user
    /// turn, assistant turn) pair"). `None` when either side is missing —
    /// an assistant turn with no prior user turn has nothing to distill.
    pub async fn distillation_pair(
        &self,
        assistant_turn_id: Uuid,
    ) -> Result<Option<(ConversationTurn, ConversationTurn)>, DbError> {
        let Some(assistant) = sqlx::query_as::<_, ConversationTurn>(
            "SELECT id, channel_id, guild_id, personality_id, persona_id, role, content,
                    token_count, created_at
             FROM conversation_turns WHERE id = $1",
        )
        .bind(assistant_turn_id)
        .fetch_optional(self.pool)
        .await?
        else {
            return Ok(None);
        };

        let user = sqlx::query_as::<_, ConversationTurn>(
            "SELECT id, channel_id, guild_id, personality_id, persona_id, role, content,
                    token_count, created_at
             FROM conversation_turns
             WHERE channel_id = $1 AND personality_id = $2 AND role = $3 AND created_at < $4
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(&assistant.channel_id)
        .bind(assistant.personality_id)
        .bind(TurnRole::User)
        .bind(assistant.created_at)
        .fetch_optional(self.pool)
        .await?;

        Ok(user.map(|user| (user, assistant)))
    }

    /// Insert a tombstone for a hard-deleted turn (): FK-free so
    /// it outlives the turn it marks, preventing a sync job from
    /// resurrecting the row it refers to.
    pub async fn tombstone(&self, turn_id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO conversation_tombstones (turn_id) VALUES ($1)
             ON CONFLICT (turn_id) DO NOTHING",
        )
        .bind(turn_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
