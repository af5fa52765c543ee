//! The combined, fully wired process: runs C1's chat-platform connection
//! plus C2's `handle_turn` as a direct in-process call, and spawns C4's job
//! consumer and C5's pending-memory sweep as background tasks sharing one
//! pool and one in-process queue. `gateway`, `worker`, and `memory-writer`
//! exist as separately runnable binaries for a topology with a real broker
//! between them; this binary does not use them (see crate-root
//! `DESIGN.md`).

use clap::Parser;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tzurot_core::config::Config;
use tzurot_core::db::repository::{
    ConfigRepository, DenylistRepository, DiagnosticRepository, MemoryRepository, PendingMemoryRepository,
    PersonaRepository, PersonalityRepository, TurnRepository, UserRepository,
};
use tzurot_core::edge::classify::{extract_leading_mention_token, is_self_authored, resolve_personality, should_forward};
use tzurot_core::edge::dedup_send::SendDedupTracker;
use tzurot_core::edge::{
    compute_fingerprint, Classification, ClassificationSignals, FingerprintCache, GatewayClient, InboundEvent,
    WebhookPublisher,
};
use tzurot_core::embeddings::{create_embedding_provider, EmbeddingProvider};
use tzurot_core::gateway::envelope::Attachment;
use tzurot_core::gateway::{handle_turn, GatewayDefaults, HandleTurnContext, RequestEnvelope};
use tzurot_core::inference::provider::InferenceProvider;
use tzurot_core::inference::retry::BackoffPolicy;
use tzurot_core::inference::worker::process_job;
use tzurot_core::memory_writer::pending::drain_pending;
use tzurot_core::memory_writer::redistill_turn;
use tzurot_core::queue::{InMemoryQueue, JobQueue};
use tzurot_core::startup::{init_process, spawn_health_server, warn_if_queue_url_unsupported};

#[derive(Parser, Debug)]
#[command(name = "edge-receiver", about = "Combined C1/C2/C4/C5 process")]
struct Args {
    #[arg(long, default_value_t = 256)]
    queue_capacity: usize,

    #[arg(long, default_value_t = 5)]
    memory_sweep_interval_secs: u64,
}

/// Everything the inbound event loop needs, shared across tasks. Built
/// once at startup from `Config`.
struct EdgeRuntime {
    pool: PgPool,
    embedder: Arc<dyn EmbeddingProvider>,
    queue: Arc<InMemoryQueue>,
    webhooks: WebhookPublisher,
    defaults: GatewayDefaults,
    enqueue_policy: BackoffPolicy,
    completion_policy: BackoffPolicy,
    fingerprints: Mutex<FingerprintCache>,
    dedup: Mutex<SendDedupTracker>,
    dedup_threshold: f32,
    bot_user_id: Mutex<String>,
    chunk_delay: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_process();
    let args = Args::parse();
    let config = Config::load()?;
    warn_if_queue_url_unsupported(&config.queue_url);
    spawn_health_server(config.health_port, "edge-receiver");

    let pool = tzurot_core::db::connect(&config.database_url).await?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_embedding_provider(
        &config.embedding_provider,
        config.embedding_api_key.as_deref(),
        &config.embedding_model,
        config.embedding_dims,
    ));
    let provider = Arc::new(InferenceProvider::new(
        "https://openrouter.ai/api/v1",
        config.model_api_key.as_deref(),
    ));
    let queue = Arc::new(InMemoryQueue::new(args.queue_capacity));

    let distill_model = {
        let configs = ConfigRepository::new(&pool);
        configs
            .default_llm_config()
            .await?
            .map(|c| c.model)
            .unwrap_or_else(|| "gpt-5".to_string())
    };

    spawn_worker_task(pool.clone(), provider.clone(), queue.clone());
    spawn_memory_writer_task(
        pool.clone(),
        provider.clone(),
        embedder.clone(),
        distill_model,
        args.memory_sweep_interval_secs,
    );
    spawn_diagnostic_log_sweep(pool.clone());

    let runtime = Arc::new(EdgeRuntime {
        pool,
        embedder,
        queue,
        webhooks: WebhookPublisher::new(config.discord_bot_token.clone()),
        defaults: GatewayDefaults {
            history_turns: config.default_history_turns,
            #[allow(clippy::cast_possible_wrap)]
            memory_top_k: config.default_memory_top_k as i64,
            memory_max_distance: config.memory_similarity_floor,
            context_window_tokens: 8000,
            max_chunk_chars: config.max_message_chars,
        },
        enqueue_policy: BackoffPolicy::default(),
        completion_policy: BackoffPolicy::default(),
        fingerprints: Mutex::new(FingerprintCache::new(config.fingerprint_cache_capacity)),
        dedup: Mutex::new(SendDedupTracker::new()),
        dedup_threshold: config.send_dedup_similarity_threshold,
        bot_user_id: Mutex::new(String::new()),
        chunk_delay: Duration::from_millis(config.chunk_delay_ms),
    });

    let (tx, mut rx) = mpsc::channel(128);
    tokio::spawn(run_gateway_connection(config.discord_bot_token.clone(), tx));

    tracing::info!("edge-receiver started");
    while let Some(event) = rx.recv().await {
        match event {
            InboundEvent::Ready { bot_user_id, .. } => {
                tracing::info!("gateway session ready");
                *runtime.bot_user_id.lock().await = bot_user_id;
            }
            InboundEvent::MessageCreate { .. } => {
                let runtime = runtime.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_message_create(&runtime, event).await {
                        tracing::error!(error = %e, "failed to handle inbound message");
                    }
                });
            }
        }
    }

    Ok(())
}

/// Reconnect with capped exponential backoff forever; a single dropped
/// connection must never end the process.
async fn run_gateway_connection(bot_token: String, tx: mpsc::Sender<InboundEvent>) {
    let client = GatewayClient::new(bot_token);
    let mut backoff = Duration::from_secs(1);
    loop {
        match client.run(&tx).await {
            Ok(()) => backoff = Duration::from_secs(1),
            Err(e) => {
                tracing::warn!(error = %e, "gateway connection failed");
                backoff = (backoff * 2).min(Duration::from_secs(60));
            }
        }
        tokio::time::sleep(backoff).await;
    }
}

fn spawn_worker_task(pool: PgPool, provider: Arc<InferenceProvider>, queue: Arc<InMemoryQueue>) {
    tokio::spawn(async move {
        loop {
            match queue.dequeue_job().await {
                Ok(Some(job)) => {
                    let diagnostics = DiagnosticRepository::new(&pool);
                    let request_id = job.request_id;
                    match process_job(&diagnostics, &provider, BackoffPolicy::default(), "openrouter", job).await {
                        Ok(completion) => {
                            if let Err(e) = queue.publish_completion(completion).await {
                                tracing::error!(error = %e, %request_id, "failed to publish completion");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, %request_id, "job processing failed"),
                    }
                }
                Ok(None) => tokio::time::sleep(Duration::from_millis(100)).await,
                Err(e) => {
                    tracing::error!(error = %e, "dequeue failed");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    });
}

fn spawn_memory_writer_task(
    pool: PgPool,
    provider: Arc<InferenceProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    model: String,
    sweep_interval_secs: u64,
) {
    tokio::spawn(async move {
        loop {
            let turns = TurnRepository::new(&pool);
            let memories = MemoryRepository::new(&pool);
            let pending = PendingMemoryRepository::new(&pool);
            if let Err(e) = drain_pending(&memories, &pending, embedder.as_ref(), 5, |turn_id| {
                redistill_turn(&provider, &turns, &model, turn_id)
            })
            .await
            {
                tracing::warn!(error = %e, "pending-memory sweep failed");
            }
            tokio::time::sleep(Duration::from_secs(sweep_interval_secs)).await;
        }
    });
}

/// Background loop purging `llm_diagnostic_logs` rows past their 24-hour
/// TTL. No external scheduler is wired into this deployment, so the sweep
/// runs as a long-lived task on the same process rather than an external
/// cron.
fn spawn_diagnostic_log_sweep(pool: PgPool) {
    const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let diagnostics = DiagnosticRepository::new(&pool);
            match diagnostics.sweep_expired().await {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!(deleted, "swept expired diagnostic logs");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "diagnostic log sweep failed"),
            }
        }
    });
}

async fn handle_message_create(runtime: &EdgeRuntime, event: InboundEvent) -> anyhow::Result<()> {
    let InboundEvent::MessageCreate {
        message_id,
        channel_id,
        guild_id,
        author_id,
        author_is_bot,
        author_display_name,
        content,
        attachments,
        referenced_message_id,
    } = event
    else {
        return Ok(());
    };

    let bot_user_id = runtime.bot_user_id.lock().await.clone();
    if author_is_bot && is_self_authored(&author_id, &bot_user_id, &[]) {
        return Ok(());
    }

    let fingerprint = compute_fingerprint(&message_id, None, &content, &channel_id);
    if runtime.fingerprints.lock().await.observe(fingerprint) {
        return Ok(());
    }

    let personalities = PersonalityRepository::new(&runtime.pool);

    // Reply-chain and DM-autoresponse signals aren't modeled by this
    // schema; only explicit mention and channel activation are resolved.
    let explicit_mention = match extract_leading_mention_token(&content) {
        Some(token) => personalities.by_alias_or_slug(token).await?.map(|p| p.id),
        None => None,
    };
    let channel_activation = personalities.activated_for_channel(&channel_id).await?.map(|p| p.id);

    let signals = ClassificationSignals {
        explicit_mention,
        reply_target: None,
        channel_activation,
        dm_autoresponse: None,
    };
    let classification = resolve_personality(&signals);
    let is_denylisted = DenylistRepository::new(&runtime.pool)
        .is_denylisted(&author_id, &channel_id, guild_id.as_deref())
        .await?;
    if !should_forward(&classification, is_denylisted) {
        return Ok(());
    }
    let Classification::Target(personality_id) = classification else {
        return Ok(());
    };

    let personality = personalities
        .by_id(personality_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("resolved personality {personality_id} no longer exists"))?;

    let envelope = RequestEnvelope {
        user_platform_id: author_id,
        user_display_handle: author_display_name,
        channel_id: channel_id.clone(),
        guild_id,
        guild_name: None,
        channel_name: None,
        personality_id,
        // `handle_turn`'s context-assembly step strips the leading mention
        // itself, against the personality's own aliases (step 6);
        // this content is passed through unmodified.
        content,
        attachments: attachments
            .into_iter()
            .map(|a| Attachment {
                url: a.url,
                mime_type: a.content_type,
                filename: a.filename.unwrap_or_default(),
            })
            .collect(),
        reply_to_message_id: referenced_message_id,
    };

    let ctx = HandleTurnContext {
        personalities: PersonalityRepository::new(&runtime.pool),
        users: UserRepository::new(&runtime.pool),
        personas: PersonaRepository::new(&runtime.pool),
        configs: ConfigRepository::new(&runtime.pool),
        turns: TurnRepository::new(&runtime.pool),
        memories: MemoryRepository::new(&runtime.pool),
        pending_memories: PendingMemoryRepository::new(&runtime.pool),
        embedder: runtime.embedder.as_ref(),
        queue: runtime.queue.as_ref(),
        defaults: runtime.defaults,
        enqueue_policy: runtime.enqueue_policy,
        completion_policy: runtime.completion_policy,
    };

    let plan = match handle_turn(&ctx, envelope).await {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!(error = %e, "turn handling failed");
            return Ok(());
        }
    };

    let display_name = personality.display_name.clone();
    let avatar_url = if personality.avatar_ref.is_empty() {
        None
    } else {
        Some(personality.avatar_ref.clone())
    };

    if let Some(thinking) = &plan.thinking_content {
        let spoiler = format!("\u{1f4ad} **Thinking:** ||{thinking}||");
        let outcome = runtime
            .webhooks
            .post_chunk(&channel_id, &display_name, avatar_url.as_deref(), &spoiler, 0)
            .await;
        tracing::debug!(outcome = ?outcome, "posted thinking block");
    }

    for (index, chunk) in plan.chunks.iter().enumerate() {
        let is_duplicate = {
            let dedup = runtime.dedup.lock().await;
            dedup.is_duplicate(&channel_id, &display_name, chunk, runtime.dedup_threshold)
        };
        if is_duplicate {
            tracing::debug!(chunk_index = index, "suppressing near-duplicate chunk");
            continue;
        }

        let outcome = runtime
            .webhooks
            .post_chunk(&channel_id, &display_name, avatar_url.as_deref(), chunk, index)
            .await;
        tracing::debug!(chunk_index = index, outcome = ?outcome, "posted chunk");
        runtime.dedup.lock().await.record(&channel_id, &display_name, chunk);

        if index + 1 < plan.chunks.len() {
            tokio::time::sleep(runtime.chunk_delay).await;
        }
    }

    Ok(())
}
