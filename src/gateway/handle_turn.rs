//! C2 orchestration: `handleTurn(envelope) -> DeliveryPlan`.
//!
//! Resolves the config cascade, calls C3 to assemble the prompt, enqueues
//! and awaits an inference job, persists the assistant turn, triggers C5,
//! and chunks the reply into the delivery plan C1 posts.

use crate::cascade::{resolve_cascade, CascadeInput, ResolvedConfig};
use crate::context::{assemble, resolve_history_depth, AssembleInput};
use crate::db::models::{Persona, Personality, TurnRole};
use crate::db::repository::{
    ConfigRepository, MemoryRepository, PendingMemoryRepository, PersonaRepository,
    PersonalityRepository, TurnRepository, UserRepository,
};
use crate::embeddings::EmbeddingProvider;
use crate::error::{CascadeError, ContextError, FailureEnvelope, FailureKind, QueueError};
use crate::gateway::envelope::{DeliveryPlan, RequestEnvelope};
use crate::inference::chunker::build_delivery_plan;
use crate::inference::job::{InferenceCompletion, InferenceJob, JobType};
use crate::inference::retry::{with_backoff, BackoffPolicy};
use crate::queue::JobQueue;
use uuid::Uuid;

/// Admin-level fallbacks used when no override applies anywhere in the
/// cascade (step 1, step 2).
#[derive(Debug, Clone, Copy)]
pub struct GatewayDefaults {
    pub history_turns: u32,
    pub memory_top_k: i64,
    pub memory_max_distance: f32,
    pub context_window_tokens: i32,
    pub max_chunk_chars: usize,
}

/// Everything `handle_turn` needs to talk to C3/C4/C5/C6. Borrowed for the
/// duration of one call; construct one per request from the long-lived
/// pool and provider the binary entry point owns.
pub struct HandleTurnContext<'a> {
    pub personalities: PersonalityRepository<'a>,
    pub users: UserRepository<'a>,
    pub personas: PersonaRepository<'a>,
    pub configs: ConfigRepository<'a>,
    pub turns: TurnRepository<'a>,
    pub memories: MemoryRepository<'a>,
    pub pending_memories: PendingMemoryRepository<'a>,
    pub embedder: &'a dyn EmbeddingProvider,
    pub queue: &'a dyn JobQueue,
    pub defaults: GatewayDefaults,
    pub enqueue_policy: BackoffPolicy,
    pub completion_policy: BackoffPolicy,
}

fn db_fail(e: crate::error::DbError) -> FailureEnvelope {
    FailureEnvelope::new(FailureKind::FatalInternal, e.to_string())
}

fn cascade_fail(e: CascadeError) -> FailureEnvelope {
    FailureEnvelope::new(FailureKind::ConfigInvalid, e.to_string())
}

fn context_fail(e: ContextError) -> FailureEnvelope {
    match e {
        ContextError::Overflow { .. } => FailureEnvelope::new(FailureKind::ContextOverflow, e.to_string()),
        other => FailureEnvelope::new(FailureKind::FatalInternal, other.to_string()),
    }
}

/// Build the persona-facing block of the system prompt: the resolved
/// system prompt text, plus a short addressing note when the user has an
/// active persona ("Persona — user-authored speaker profile").
fn build_persona_block(system_prompt: &str, persona: Option<&Persona>) -> String {
    let Some(persona) = persona else {
        return system_prompt.to_string();
    };

    let mut note = format!("The user you're speaking with goes by {}", persona.preferred_name);
    if let Some(pronouns) = &persona.pronouns {
        note.push_str(&format!(" ({pronouns})"));
    }
    note.push('.');
    if let Some(bio) = &persona.bio {
        note.push(' ');
        note.push_str(bio);
    }

    format!("{system_prompt}\n\n{note}")
}

/// Channel-settings overrides live inside the personality's
/// `context_overrides` document, keyed by channel id, since there is no
/// dedicated per-channel-settings table in the data model.
fn extract_channel_overrides(context_overrides: &serde_json::Value, channel_id: &str) -> Option<serde_json::Value> {
    context_overrides.get("channels")?.get(channel_id).cloned()
}

async fn enqueue_with_retry(
    queue: &dyn JobQueue,
    job: InferenceJob,
    policy: BackoffPolicy,
) -> Result<(), FailureEnvelope> {
    with_backoff(
        policy,
        |e: &QueueError| matches!(e, QueueError::Unavailable(_)),
        |_attempt| queue.enqueue_job(job.clone()),
    )
    .await
    .map_err(|e| FailureEnvelope::new(FailureKind::FatalInternal, e.to_string()))
}

/// Poll for the completion matching `request_id` up to `policy`'s attempt
/// budget (orchestration step iv: "Await completion").
async fn await_completion(
    queue: &dyn JobQueue,
    request_id: Uuid,
    policy: BackoffPolicy,
) -> Result<InferenceCompletion, FailureEnvelope> {
    let mut attempt = 0u32;
    loop {
        match queue.dequeue_completion().await {
            Ok(Some(completion)) if completion.request_id == request_id => return Ok(completion),
            Ok(Some(_other)) => {
                tracing::warn!("dequeued a completion for a different request id, discarding");
            }
            Ok(None) => {}
            Err(e) => return Err(FailureEnvelope::new(FailureKind::FatalInternal, e.to_string())),
        }

        attempt += 1;
        if attempt >= policy.max_attempts {
            return Err(FailureEnvelope::new(
                FailureKind::FatalInternal,
                format!("no completion for request {request_id} before deadline"),
            ));
        }
        tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
    }
}

/// Run one turn end to end (orchestration (i)-(vii)).
pub async fn handle_turn(
    ctx: &HandleTurnContext<'_>,
    envelope: RequestEnvelope,
) -> Result<DeliveryPlan, FailureEnvelope> {
    let personality = ctx
        .personalities
        .by_id(envelope.personality_id)
        .await
        .map_err(db_fail)?
        .ok_or_else(|| FailureEnvelope::new(FailureKind::ConfigInvalid, "unknown personality"))?;

    let user = ctx
        .users
        .get_or_create(&envelope.user_platform_id, &envelope.user_display_handle)
        .await
        .map_err(db_fail)?;

    // (i) Fetch persona via cascade.
    let resolved = resolve_config_cascade(ctx, &personality, user.id, &envelope.channel_id).await?;

    let persona = match resolved.persona_override {
        Some(id) => ctx
            .personas
            .by_id(id)
            .await
            .map_err(db_fail)?
            .ok_or_else(|| FailureEnvelope::new(FailureKind::ConfigInvalid, "persona override points at an unknown persona"))?,
        None => ctx
            .personas
            .get_or_create_default(user.id, &envelope.user_display_handle)
            .await
            .map_err(db_fail)?,
    };
    let persona_id = persona.id;
    let persona_block = build_persona_block(&resolved.system_prompt, Some(&persona));

    #[allow(clippy::cast_possible_truncation)]
    let personality_history_override = personality
        .context_overrides
        .get("historyTurns")
        .and_then(serde_json::Value::as_u64)
        .map(|n| n as u32);
    // A channel-level override lands in the resolved document as an opaque
    // pass-through leaf (step 5), since there's no dedicated
    // channel-settings table — it rides in on the same `config_overrides`
    // document the cascade already merges last.
    #[allow(clippy::cast_possible_truncation)]
    let channel_history_override = resolved
        .document
        .get("historyTurns")
        .and_then(serde_json::Value::as_u64)
        .map(|n| n as u32);
    let history_limit = resolve_history_depth(
        channel_history_override,
        personality_history_override,
        ctx.defaults.history_turns,
    );
    #[allow(clippy::cast_possible_truncation)]
    let context_window_tokens = resolved
        .document
        .get("contextWindowTokens")
        .and_then(serde_json::Value::as_i64)
        .map_or(ctx.defaults.context_window_tokens, |n| n as i32);
    let include_context_header = personality
        .context_overrides
        .get("includeContextHeader")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(envelope.guild_id.is_some());

    let mut aliases = ctx.personalities.aliases_for(personality.id).await.map_err(db_fail)?;
    aliases.push(personality.slug.clone());
    aliases.push(personality.display_name.clone());

    // (ii) Call C3 to assemble prompt.
    let assembled = assemble(
        &ctx.turns,
        &ctx.memories,
        ctx.embedder,
        AssembleInput {
            personality: &personality,
            persona_id,
            channel_id: &envelope.channel_id,
            guild_id: envelope.guild_id.as_deref(),
            current_turn_text: &envelope.content,
            persona_block: &persona_block,
            background_knowledge: &[],
            aliases: &aliases,
            context_window_tokens,
            history_limit,
            memory_top_k: ctx.defaults.memory_top_k,
            memory_max_distance: ctx.defaults.memory_max_distance,
            include_context_header,
            guild_name: envelope.guild_name.as_deref(),
            channel_name: envelope.channel_name.as_deref(),
        },
    )
    .await
    .map_err(context_fail)?;

    // (iii) Enqueue an inference job.
    let request_id = Uuid::new_v4();
    let job = InferenceJob {
        request_id,
        job_type: JobType::Generate,
        resolved_config: resolved.document.clone(),
        messages: assembled.messages,
        personality_id: personality.id,
        persona_id,
        show_thinking: resolved.show_thinking(),
    };
    enqueue_with_retry(ctx.queue, job, ctx.enqueue_policy).await?;

    // (iv) Await completion.
    let completion = await_completion(ctx.queue, request_id, ctx.completion_policy).await?;
    if let Some(error) = &completion.error {
        return Err(FailureEnvelope::new(FailureKind::InferenceRejected, error.clone()));
    }

    // (v) Persist assistant turn with cached token count.
    #[allow(clippy::cast_possible_truncation)]
    let completion_token_count = completion.completion_tokens.map(|t| t as i32);
    let assistant_turn = ctx
        .turns
        .append(
            &envelope.channel_id,
            envelope.guild_id.as_deref(),
            personality.id,
            persona_id,
            TurnRole::Assistant,
            &completion.content,
            completion_token_count,
        )
        .await
        .map_err(db_fail)?;

    // (vi) Trigger C5's distillation for this turn pair.
    if let Err(e) = ctx.pending_memories.trigger(assistant_turn.id).await {
        tracing::warn!(error = %e, "failed to trigger memory distillation");
    }

    // (vii) Return the chunked delivery plan + extracted thinking.
    Ok(build_delivery_plan(
        &completion.content,
        ctx.defaults.max_chunk_chars,
        Vec::new(),
        Vec::new(),
        completion.thinking_content,
    ))
}

async fn resolve_config_cascade(
    ctx: &HandleTurnContext<'_>,
    personality: &Personality,
    user_id: Uuid,
    channel_id: &str,
) -> Result<ResolvedConfig, FailureEnvelope> {
    let global_llm_config = ctx
        .configs
        .default_llm_config()
        .await
        .map_err(db_fail)?
        .ok_or_else(|| FailureEnvelope::new(FailureKind::ConfigInvalid, "no default llm config configured"))?;
    let global_system_prompt = ctx
        .configs
        .default_system_prompt()
        .await
        .map_err(db_fail)?
        .ok_or_else(|| FailureEnvelope::new(FailureKind::ConfigInvalid, "no default system prompt configured"))?;

    let personality_llm_config = ctx
        .configs
        .llm_config_by_id(personality.default_llm_config_id)
        .await
        .map_err(db_fail)?;
    let personality_system_prompt = match personality.system_prompt_id {
        Some(id) => ctx.configs.system_prompt_by_id(id).await.map_err(db_fail)?,
        None => None,
    };

    let upc = ctx
        .configs
        .user_personality_config(user_id, personality.id)
        .await
        .map_err(db_fail)?;
    let user_llm_config_override = match upc.as_ref().and_then(|u| u.llm_config_override) {
        Some(id) => ctx.configs.llm_config_by_id(id).await.map_err(db_fail)?,
        None => None,
    };
    let channel_overrides = extract_channel_overrides(&personality.context_overrides, channel_id);

    let input = CascadeInput {
        global_llm_config,
        global_system_prompt,
        personality_llm_config,
        personality_system_prompt,
        user_llm_config_override,
        user_persona_override: upc.as_ref().and_then(|u| u.persona_override),
        config_overrides: upc.as_ref().map(|u| u.config_overrides.clone()),
        channel_overrides,
    };

    resolve_cascade(&input).map_err(cascade_fail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Persona;

    fn persona(name: &str, pronouns: Option<&str>, bio: Option<&str>) -> Persona {
        Persona {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            preferred_name: name.to_string(),
            pronouns: pronouns.map(str::to_string),
            bio: bio.map(str::to_string),
        }
    }

    #[test]
    fn persona_block_passes_through_without_a_persona() {
        assert_eq!(build_persona_block("You are Luna.", None), "You are Luna.");
    }

    #[test]
    fn persona_block_appends_addressing_note() {
        let p = persona("Alex", Some("they/them"), Some("Loves astronomy."));
        let block = build_persona_block("You are Luna.", Some(&p));
        assert!(block.contains("You are Luna."));
        assert!(block.contains("Alex"));
        assert!(block.contains("they/them"));
        assert!(block.contains("Loves astronomy."));
    }

    #[test]
    fn channel_overrides_extracted_by_id() {
        let doc = serde_json::json!({ "channels": { "c1": { "temperature": 0.1 } } });
        let out = extract_channel_overrides(&doc, "c1");
        assert_eq!(out, Some(serde_json::json!({ "temperature": 0.1 })));
        assert_eq!(extract_channel_overrides(&doc, "c2"), None);
    }

    #[test]
    fn channel_overrides_missing_when_no_channels_section() {
        let doc = serde_json::json!({});
        assert_eq!(extract_channel_overrides(&doc, "c1"), None);
    }
}
