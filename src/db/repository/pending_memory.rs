use crate::db::models::PendingMemory;
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PendingMemoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PendingMemoryRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, turn_id: Uuid, error: &str) -> Result<PendingMemory, DbError> {
        sqlx::query_as::<_, PendingMemory>(
            "INSERT INTO pending_memories (turn_id, attempt_count, last_error)
             VALUES ($1, 1, $2)
             RETURNING id, turn_id, attempt_count, last_error, created_at",
        )
        .bind(turn_id)
        .bind(error)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Record a fresh turn pair for C5 to distill ("Trigger: fired
    /// by C2 after persisting an assistant turn"), at attempt 0 so it's
    /// picked up by the same `due_for_retry` sweep a failed attempt would be.
    pub async fn trigger(&self, turn_id: Uuid) -> Result<PendingMemory, DbError> {
        sqlx::query_as::<_, PendingMemory>(
            "INSERT INTO pending_memories (turn_id, attempt_count, last_error)
             VALUES ($1, 0, NULL)
             RETURNING id, turn_id, attempt_count, last_error, created_at",
        )
        .bind(turn_id)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Items ready for another retry attempt, oldest first, capped at
    /// `max_attempts` ("a separate retry loop drains it with
    /// exponential backoff and capped attempts").
    pub async fn due_for_retry(&self, max_attempts: i32) -> Result<Vec<PendingMemory>, DbError> {
        sqlx::query_as::<_, PendingMemory>(
            "SELECT id, turn_id, attempt_count, last_error, created_at
             FROM pending_memories WHERE attempt_count < $1
             ORDER BY created_at ASC",
        )
        .bind(max_attempts)
        .fetch_all(self.pool)
        .await
        .map_err(Into::into)
    }

    pub async fn record_failure(&self, id: Uuid, error: &str) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE pending_memories SET attempt_count = attempt_count + 1, last_error = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn resolve(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM pending_memories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
