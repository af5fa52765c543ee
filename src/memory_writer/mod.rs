//! C5: the memory writer. Distills a (user turn, assistant turn) pair into
//! a first-person memory, chunks it if it exceeds the embedding model's
//! token ceiling, and persists it — deferring to a pending-retry queue on
//! failure.
//!
//! C2 enqueues both the first attempt and any retry through the same
//! `pending_memories` table (`PendingMemoryRepository::trigger` vs.
//! `enqueue`), so there is exactly one sweep here (`pending::drain_pending`)
//! rather than a separate "fresh" and "retry" code path.

pub mod chunk;
pub mod distill;
pub mod pending;

use crate::db::repository::turns::TurnRepository;
use crate::inference::provider::InferenceProvider;
use chunk::{chunk_memory, MemoryChunk};
use pending::MemoryTarget;
use uuid::Uuid;

/// Re-derive the chunks and persistence target for one pending turn id
/// ("Trigger" + "Distillation" + "Chunking"). Matches the
/// `redistill` closure shape `drain_pending` expects: `None` means there is
/// nothing worth remembering, which resolves the pending row without a
/// retry.
pub async fn redistill_turn(
    provider: &InferenceProvider,
    turns: &TurnRepository<'_>,
    model: &str,
    turn_id: Uuid,
) -> Option<(Vec<MemoryChunk>, MemoryTarget)> {
    let (user_turn, assistant_turn) = turns.distillation_pair(turn_id).await.ok().flatten()?;
    let text = distill::distill(provider, model, &user_turn.content, &assistant_turn.content)
        .await
        .ok()
        .flatten()?;

    let chunks = chunk_memory(&text);
    let target = MemoryTarget {
        persona_id: assistant_turn.persona_id,
        personality_id: Some(assistant_turn.personality_id),
        channel_id: Some(assistant_turn.channel_id),
        guild_id: assistant_turn.guild_id,
    };
    Some((chunks, target))
}
