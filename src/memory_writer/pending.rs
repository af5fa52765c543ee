//! Persistence and the pending-memory retry loop ("Persistence":
//! "On failure, enqueue a PendingMemory with attempt counter; a separate
//! retry loop drains it with exponential backoff and capped attempts").

use crate::db::repository::memory::{MemoryRepository, NewMemory};
use crate::db::repository::pending_memory::PendingMemoryRepository;
use crate::embeddings::EmbeddingProvider;
use crate::error::MemoryWriteError;
use crate::memory_writer::chunk::MemoryChunk;
use uuid::Uuid;

/// Identifies which persona/personality/location a distilled memory
/// belongs to — carried alongside the distilled text so the retry loop
/// doesn't need to re-derive it from the turn.
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    pub persona_id: Uuid,
    pub personality_id: Option<Uuid>,
    pub channel_id: Option<String>,
    pub guild_id: Option<String>,
}

/// Embed and insert every chunk of one distillation in a single
/// transaction ("Insert rows in a single transaction").
pub async fn persist_chunks(
    memories: &MemoryRepository<'_>,
    embedder: &dyn EmbeddingProvider,
    chunks: &[MemoryChunk],
    target: &MemoryTarget,
) -> Result<usize, MemoryWriteError> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let mut embeddings = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let vector = embedder
            .embed_one(&chunk.content)
            .await
            .map_err(|e| MemoryWriteError::Embedding(e.to_string()))?;
        embeddings.push(vector);
    }

    let rows: Vec<NewMemory<'_>> = chunks
        .iter()
        .zip(embeddings.iter())
        .map(|(chunk, embedding)| NewMemory {
            persona_id: target.persona_id,
            personality_id: target.personality_id,
            content: &chunk.content,
            embedding,
            channel_id: target.channel_id.as_deref(),
            guild_id: target.guild_id.as_deref(),
            chunk_group_id: chunk.chunk_group_id,
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
            source: "distillation",
        })
        .collect();

    let inserted = memories
        .insert_chunk_group(&rows)
        .await
        .map_err(|e| MemoryWriteError::Persist(e.to_string()))?;

    Ok(inserted.len())
}

/// Persist a fresh distillation; on failure, record it as pending rather
/// than dropping it.
pub async fn write_or_defer(
    memories: &MemoryRepository<'_>,
    pending: &PendingMemoryRepository<'_>,
    embedder: &dyn EmbeddingProvider,
    turn_id: Uuid,
    chunks: &[MemoryChunk],
    target: &MemoryTarget,
) -> Result<usize, MemoryWriteError> {
    match persist_chunks(memories, embedder, chunks, target).await {
        Ok(count) => Ok(count),
        Err(e) => {
            pending
                .enqueue(turn_id, &e.to_string())
                .await
                .map_err(|db_err| MemoryWriteError::Persist(db_err.to_string()))?;
            Err(e)
        }
    }
}

/// One attempt at draining the pending-memory queue. `redistill` re-derives
/// the chunks and target for a given turn id (typically: re-fetch the turn
/// pair, re-run distillation, re-chunk) — a closure so this loop stays
/// independent of how the caller wires up the turn lookup.
pub async fn drain_pending<F, Fut>(
    memories: &MemoryRepository<'_>,
    pending: &PendingMemoryRepository<'_>,
    embedder: &dyn EmbeddingProvider,
    max_attempts: i32,
    mut redistill: F,
) -> Result<DrainReport, MemoryWriteError>
where
    F: FnMut(Uuid) -> Fut,
    Fut: std::future::Future<Output = Option<(Vec<MemoryChunk>, MemoryTarget)>>,
{
    let due = pending
        .due_for_retry(max_attempts)
        .await
        .map_err(|e| MemoryWriteError::Persist(e.to_string()))?;

    let mut report = DrainReport::default();

    for item in due {
        let Some((chunks, target)) = redistill(item.turn_id).await else {
            // Nothing left worth remembering on retry; resolve it so it
            // doesn't keep consuming attempts forever.
            let _ = pending.resolve(item.id).await;
            report.resolved += 1;
            continue;
        };

        match persist_chunks(memories, embedder, &chunks, &target).await {
            Ok(_) => {
                let _ = pending.resolve(item.id).await;
                report.resolved += 1;
            }
            Err(e) => {
                let _ = pending.record_failure(item.id, &e.to_string()).await;
                report.still_failing += 1;
            }
        }
    }

    Ok(report)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub resolved: u32,
    pub still_failing: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_target_carries_optional_scope() {
        let target = MemoryTarget {
            persona_id: Uuid::new_v4(),
            personality_id: None,
            channel_id: Some("123".to_string()),
            guild_id: None,
        };
        assert!(target.personality_id.is_none());
        assert_eq!(target.channel_id.as_deref(), Some("123"));
    }

    #[test]
    fn drain_report_defaults_to_zero() {
        let report = DrainReport::default();
        assert_eq!(report.resolved, 0);
        assert_eq!(report.still_failing, 0);
    }
}
