pub mod compose;
pub mod history;
pub mod mention;
pub mod retrieval;

use crate::db::models::Personality;
use crate::db::repository::{MemoryRepository, TurnRepository};
use crate::embeddings::EmbeddingProvider;
use crate::error::ContextError;
use compose::{build_system_content, check_overflow, trim_to_budget, Message, Role};
use history::{estimate_tokens, resolve_history_limit, reverse_chronological, turn_token_count};
use retrieval::{reassemble, sort_by_relevance};
use uuid::Uuid;

/// Inputs to one context assembly call ("personality id, persona
/// id, channel id, current turn text, resolved config").
pub struct AssembleInput<'a> {
    pub personality: &'a Personality,
    pub persona_id: Uuid,
    pub channel_id: &'a str,
    pub guild_id: Option<&'a str>,
    pub current_turn_text: &'a str,
    pub persona_block: &'a str,
    pub background_knowledge: &'a [String],
    pub aliases: &'a [String],
    pub context_window_tokens: i32,
    pub history_limit: u32,
    pub memory_top_k: i64,
    pub memory_max_distance: f32,
    pub include_context_header: bool,
    pub guild_name: Option<&'a str>,
    pub channel_name: Option<&'a str>,
}

pub struct AssembledContext {
    pub messages: Vec<Message>,
    pub current_turn_text: String,
}

/// Run the full context assembly algorithm (steps 1-7).
pub async fn assemble(
    turns: &TurnRepository<'_>,
    memories: &MemoryRepository<'_>,
    embedder: &dyn EmbeddingProvider,
    input: AssembleInput<'_>,
) -> Result<AssembledContext, ContextError> {
    // Step 6: mention stripping happens before anything else touches the
    // text, so both the embedding query and the prompt see the same clean
    // current turn.
    let cleaned_turn = mention::strip_leading_mentions(input.current_turn_text, input.aliases, 6);

    // Step 1: history.
    let raw_history = turns
        .recent(
            input.channel_id,
            input.personality.id,
            i64::from(input.history_limit),
        )
        .await
        .map_err(|e| ContextError::HistoryQuery(e.to_string()))?;
    let chronological = reverse_chronological(raw_history);
    let history_with_tokens: Vec<(Message, i32)> = chronological
        .iter()
        .map(|t| {
            let role = match t.role {
                crate::db::models::TurnRole::User => Role::User,
                crate::db::models::TurnRole::Assistant => Role::Assistant,
            };
            (
                Message {
                    role,
                    content: t.content.clone(),
                },
                turn_token_count(t),
            )
        })
        .collect();

    // Step 2: memory retrieval. An embedding failure degrades to "no
    // memories" rather than failing the turn (`EmbeddingFailed`:
    // "retrieval proceeds without vector results, degraded but non-fatal").
    let ordered_memories = match embedder.embed_one(&cleaned_turn).await {
        Ok(query_embedding) => {
            let scored = memories
                .search(
                    input.persona_id,
                    Some(input.personality.id),
                    &query_embedding,
                    input.memory_top_k,
                    input.memory_max_distance,
                )
                .await
                .map_err(|e| ContextError::MemoryQuery(e.to_string()))?;

            // Step 3: chunk reassembly.
            let reassembled = reassemble(memories, scored)
                .await
                .map_err(|e| ContextError::MemoryQuery(e.to_string()))?;
            sort_by_relevance(reassembled)
        }
        Err(e) => {
            tracing::warn!(error = %e, "embedding provider unavailable, proceeding without memory retrieval");
            Vec::new()
        }
    };
    let memories_with_tokens: Vec<(retrieval::ReassembledMemory, i32)> = ordered_memories
        .into_iter()
        .map(|m| {
            let tokens = estimate_tokens(&m.content);
            (m, tokens)
        })
        .collect();

    // Step 4: prompt composition (system content built before trimming so
    // we know its fixed token cost).
    let memory_refs: Vec<retrieval::ReassembledMemory> =
        memories_with_tokens.iter().map(|(m, _)| m.clone()).collect();
    let system_content = build_system_content(
        input.persona_block,
        input.background_knowledge,
        &memory_refs,
    );
    let system_tokens = estimate_tokens(&system_content);
    let current_turn_tokens = estimate_tokens(&cleaned_turn);

    // Step 5: token budgeting. The fixed cost (system content plus the
    // current turn) can't be trimmed, so check it against the window
    // before trimming history/memories at all — trimming those to zero
    // still leaves an over-budget prompt.
    let fixed_tokens = system_tokens + current_turn_tokens;
    check_overflow(fixed_tokens, input.context_window_tokens)?;

    let (trimmed_history, trimmed_memories) = trim_to_budget(
        history_with_tokens,
        memories_with_tokens,
        input.context_window_tokens,
        fixed_tokens,
    );

    let final_system_content = if trimmed_memories.len() == memory_refs.len() {
        system_content
    } else {
        build_system_content(
            input.persona_block,
            input.background_knowledge,
            &trimmed_memories,
        )
    };

    // Step 7: context metadata header.
    let user_content = if input.include_context_header {
        match (input.guild_name, input.channel_name) {
            (Some(guild), Some(channel)) => {
                let header = compose::format_context_header(guild, channel, chrono::Utc::now());
                format!("{header}\n{cleaned_turn}")
            }
            _ => cleaned_turn.clone(),
        }
    } else {
        cleaned_turn.clone()
    };

    let mut messages = Vec::with_capacity(trimmed_history.len() + 2);
    messages.push(Message {
        role: Role::System,
        content: final_system_content,
    });
    messages.extend(trimmed_history);
    messages.push(Message {
        role: Role::User,
        content: user_content,
    });

    Ok(AssembledContext {
        messages,
        current_turn_text: cleaned_turn,
    })
}

#[must_use]
pub fn resolve_history_depth(
    channel_override: Option<u32>,
    personality_override: Option<u32>,
    admin_default: u32,
) -> u32 {
    resolve_history_limit(channel_override, personality_override, admin_default)
}
