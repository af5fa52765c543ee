use crate::db::models::{LlmDiagnosticLog, UsageLog};
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct DiagnosticRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DiagnosticRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        request_id: Uuid,
        message_id: Option<&str>,
        model: &str,
        provider: &str,
        duration_ms: i64,
        payload: serde_json::Value,
    ) -> Result<LlmDiagnosticLog, DbError> {
        sqlx::query_as::<_, LlmDiagnosticLog>(
            "INSERT INTO llm_diagnostic_logs (request_id, message_id, model, provider, duration_ms, payload)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, request_id, message_id, model, provider, duration_ms, payload, created_at",
        )
        .bind(request_id)
        .bind(message_id)
        .bind(model)
        .bind(provider)
        .bind(duration_ms)
        .bind(payload)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Most recent diagnostic log for a given chat-platform message id — the
    /// data source behind the (out-of-core) admin debug command.
    pub async fn most_recent_for_message(
        &self,
        message_id: &str,
    ) -> Result<Option<LlmDiagnosticLog>, DbError> {
        sqlx::query_as::<_, LlmDiagnosticLog>(
            "SELECT id, request_id, message_id, model, provider, duration_ms, payload, created_at
             FROM llm_diagnostic_logs WHERE message_id = $1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(message_id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    /// 24-hour TTL sweep. Returns rows deleted.
    pub async fn sweep_expired(&self) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM llm_diagnostic_logs WHERE created_at < now() - interval '24 hours'",
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

pub struct UsageRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UsageRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: Uuid,
        provider: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Result<UsageLog, DbError> {
        sqlx::query_as::<_, UsageLog>(
            "INSERT INTO usage_logs (user_id, provider, input_tokens, output_tokens)
             VALUES ($1, $2, $3, $4)
             RETURNING id, user_id, provider, input_tokens, output_tokens, created_at",
        )
        .bind(user_id)
        .bind(provider)
        .bind(input_tokens)
        .bind(output_tokens)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }
}
