use crate::db::models::{Memory, ScoredMemory};
use crate::db::vector;
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct MemoryRepository<'a> {
    pool: &'a PgPool,
}

/// One memory row ready to insert — embedding already computed by the
/// caller (C5's distillation step, or a chunk of an oversize one).
pub struct NewMemory<'a> {
    pub persona_id: Uuid,
    pub personality_id: Option<Uuid>,
    pub content: &'a str,
    pub embedding: &'a [f32],
    pub channel_id: Option<&'a str>,
    pub guild_id: Option<&'a str>,
    pub chunk_group_id: Option<Uuid>,
    pub chunk_index: Option<i32>,
    pub total_chunks: Option<i32>,
    pub source: &'a str,
}

impl<'a> MemoryRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, m: &NewMemory<'_>) -> Result<Memory, DbError> {
        let literal = vector::to_pg_literal(m.embedding);
        sqlx::query_as::<_, Memory>(
            "INSERT INTO memories
                (persona_id, personality_id, content, embedding, channel_id, guild_id,
                 chunk_group_id, chunk_index, total_chunks, source)
             VALUES ($1, $2, $3, $4::vector, $5, $6, $7, $8, $9, $10)
             RETURNING id, persona_id, personality_id, content, channel_id, guild_id,
                       chunk_group_id, chunk_index, total_chunks, source, created_at",
        )
        .bind(m.persona_id)
        .bind(m.personality_id)
        .bind(m.content)
        .bind(literal)
        .bind(m.channel_id)
        .bind(m.guild_id)
        .bind(m.chunk_group_id)
        .bind(m.chunk_index)
        .bind(m.total_chunks)
        .bind(m.source)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Insert every chunk of one oversize memory in a single transaction
    /// ("Persistence": "Insert rows in a single transaction").
    pub async fn insert_chunk_group(&self, chunks: &[NewMemory<'_>]) -> Result<Vec<Memory>, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut out = Vec::with_capacity(chunks.len());
        for m in chunks {
            let literal = vector::to_pg_literal(m.embedding);
            let row = sqlx::query_as::<_, Memory>(
                "INSERT INTO memories
                    (persona_id, personality_id, content, embedding, channel_id, guild_id,
                     chunk_group_id, chunk_index, total_chunks, source)
                 VALUES ($1, $2, $3, $4::vector, $5, $6, $7, $8, $9, $10)
                 RETURNING id, persona_id, personality_id, content, channel_id, guild_id,
                           chunk_group_id, chunk_index, total_chunks, source, created_at",
            )
            .bind(m.persona_id)
            .bind(m.personality_id)
            .bind(m.content)
            .bind(literal)
            .bind(m.channel_id)
            .bind(m.guild_id)
            .bind(m.chunk_group_id)
            .bind(m.chunk_index)
            .bind(m.total_chunks)
            .bind(m.source)
            .fetch_one(&mut *tx)
            .await?;
            out.push(row);
        }
        tx.commit().await?;
        Ok(out)
    }

    /// Top-K nearest memories by cosine distance, scoped to a persona and
    /// optionally a personality. Never crosses persona boundaries.
    pub async fn search(
        &self,
        persona_id: Uuid,
        personality_id: Option<Uuid>,
        query_embedding: &[f32],
        top_k: i64,
        max_distance: f32,
    ) -> Result<Vec<ScoredMemory>, DbError> {
        let literal = vector::to_pg_literal(query_embedding);
        let rows: Vec<(Memory, f64)> = sqlx::query_as(
            "SELECT id, persona_id, personality_id, content, channel_id, guild_id,
                    chunk_group_id, chunk_index, total_chunks, source, created_at,
                    (embedding <-> $2::vector) AS distance
             FROM memories
             WHERE persona_id = $1
               AND ($3::uuid IS NULL OR personality_id = $3 OR personality_id IS NULL)
               AND created_at < now()
             ORDER BY embedding <-> $2::vector
             LIMIT $4",
        )
        .bind(persona_id)
        .bind(literal)
        .bind(personality_id)
        .bind(top_k)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(|row: MemoryDistanceRow| {
            let distance = row.distance;
            (row.into_memory(), distance)
        })
        .collect();

        #[allow(clippy::cast_possible_truncation)]
        let scored = rows
            .into_iter()
            .map(|(memory, distance)| ScoredMemory {
                memory,
                distance: distance as f32,
            })
            .filter(|sm| sm.distance <= max_distance)
            .collect();

        Ok(scored)
    }

    /// Fetch every sibling chunk of a chunk group, ordered by `chunk_index`,
    /// to reassemble the full text before injection (step 3).
    pub async fn chunk_group_siblings(&self, chunk_group_id: Uuid) -> Result<Vec<Memory>, DbError> {
        sqlx::query_as::<_, Memory>(
            "SELECT id, persona_id, personality_id, content, channel_id, guild_id,
                    chunk_group_id, chunk_index, total_chunks, source, created_at
             FROM memories WHERE chunk_group_id = $1 ORDER BY chunk_index ASC",
        )
        .bind(chunk_group_id)
        .fetch_all(self.pool)
        .await
        .map_err(Into::into)
    }
}

/// Intermediate row shape carrying the computed distance column; kept
/// separate from `Memory` so `Memory`'s `FromRow` stays free of a field that
/// only exists in a query result, never in a plain table row.
#[derive(sqlx::FromRow)]
struct MemoryDistanceRow {
    id: Uuid,
    persona_id: Uuid,
    personality_id: Option<Uuid>,
    content: String,
    channel_id: Option<String>,
    guild_id: Option<String>,
    chunk_group_id: Option<Uuid>,
    chunk_index: Option<i32>,
    total_chunks: Option<i32>,
    source: String,
    created_at: chrono::DateTime<chrono::Utc>,
    distance: f64,
}

impl MemoryDistanceRow {
    fn into_memory(self) -> Memory {
        Memory {
            id: self.id,
            persona_id: self.persona_id,
            personality_id: self.personality_id,
            content: self.content,
            channel_id: self.channel_id,
            guild_id: self.guild_id,
            chunk_group_id: self.chunk_group_id,
            chunk_index: self.chunk_index,
            total_chunks: self.total_chunks,
            source: self.source,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_memory_carries_chunk_fields_through() {
        let group = Uuid::new_v4();
        let m = NewMemory {
            persona_id: Uuid::new_v4(),
            personality_id: None,
            content: "hello",
            embedding: &[0.1, 0.2],
            channel_id: None,
            guild_id: None,
            chunk_group_id: Some(group),
            chunk_index: Some(0),
            total_chunks: Some(3),
            source: "distillation",
        };
        assert_eq!(m.chunk_group_id, Some(group));
        assert_eq!(m.total_chunks, Some(3));
    }
}
