//! C5 standalone process: sweeps `pending_memories` and distills/chunks/
//! persists whatever is due. Written for a future topology
//! where a real message broker replaces the in-process queue; today
//! `edge-receiver` runs this same sweep as a background task instead of
//! spawning this binary (see crate-root `DESIGN.md`).

use clap::Parser;
use std::time::Duration;
use tzurot_core::config::Config;
use tzurot_core::db::repository::{ConfigRepository, MemoryRepository, PendingMemoryRepository, TurnRepository};
use tzurot_core::embeddings::create_embedding_provider;
use tzurot_core::inference::provider::InferenceProvider;
use tzurot_core::memory_writer::pending::drain_pending;
use tzurot_core::memory_writer::redistill_turn;
use tzurot_core::startup::{init_process, spawn_health_server, warn_if_queue_url_unsupported};

#[derive(Parser, Debug)]
#[command(name = "memory-writer", about = "C5 pending-memory distillation sweep")]
struct Args {
    /// Seconds between sweeps of `pending_memories`.
    #[arg(long, default_value_t = 5)]
    sweep_interval_secs: u64,

    /// Capped retry attempts before a pending memory is abandoned.
    #[arg(long, default_value_t = 5)]
    max_attempts: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_process();
    let args = Args::parse();
    let config = Config::load()?;
    warn_if_queue_url_unsupported(&config.queue_url);
    spawn_health_server(config.health_port, "memory-writer");

    let pool = tzurot_core::db::connect(&config.database_url).await?;
    let embedder = create_embedding_provider(
        &config.embedding_provider,
        config.embedding_api_key.as_deref(),
        &config.embedding_model,
        config.embedding_dims,
    );
    let provider = InferenceProvider::new("https://openrouter.ai/api/v1", config.model_api_key.as_deref());

    let configs = ConfigRepository::new(&pool);
    let model = configs
        .default_llm_config()
        .await?
        .map(|c| c.model)
        .unwrap_or_else(|| "gpt-5".to_string());

    tracing::info!(model, sweep_interval_secs = args.sweep_interval_secs, "memory-writer started");

    loop {
        let turns = TurnRepository::new(&pool);
        let memories = MemoryRepository::new(&pool);
        let pending = PendingMemoryRepository::new(&pool);

        let report = drain_pending(&memories, &pending, embedder.as_ref(), args.max_attempts, |turn_id| {
            redistill_turn(&provider, &turns, &model, turn_id)
        })
        .await;

        match report {
            Ok(report) if report.resolved > 0 || report.still_failing > 0 => {
                tracing::info!(resolved = report.resolved, still_failing = report.still_failing, "drained pending memories");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "pending-memory sweep failed"),
        }

        tokio::time::sleep(Duration::from_secs(args.sweep_interval_secs)).await;
    }
}
