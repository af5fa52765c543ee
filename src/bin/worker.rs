//! C4 standalone process: consumes `InferenceJob`s from the job queue and
//! publishes `InferenceCompletion`s back. Written against the
//! same `JobQueue` trait C2 enqueues through; today this binary owns its
//! own `InMemoryQueue`, which only a broker-backed `JobQueue` impl would
//! let a separate C2 process actually feed (see crate-root `DESIGN.md`).

use clap::Parser;
use std::time::Duration;
use tzurot_core::config::Config;
use tzurot_core::db::repository::DiagnosticRepository;
use tzurot_core::inference::provider::InferenceProvider;
use tzurot_core::inference::retry::BackoffPolicy;
use tzurot_core::inference::worker::process_job;
use tzurot_core::queue::{InMemoryQueue, JobQueue};
use tzurot_core::startup::{init_process, spawn_health_server, warn_if_queue_url_unsupported};

#[derive(Parser, Debug)]
#[command(name = "worker", about = "C4 inference job consumer")]
struct Args {
    /// Milliseconds to idle when the queue is empty before polling again.
    #[arg(long, default_value_t = 200)]
    poll_interval_ms: u64,

    #[arg(long, default_value = "openrouter")]
    provider_name: String,

    #[arg(long, default_value_t = 256)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_process();
    let args = Args::parse();
    let config = Config::load()?;
    warn_if_queue_url_unsupported(&config.queue_url);
    spawn_health_server(config.health_port, "worker");

    let pool = tzurot_core::db::connect(&config.database_url).await?;
    let provider = InferenceProvider::new("https://openrouter.ai/api/v1", config.model_api_key.as_deref());
    let policy = BackoffPolicy::default();

    // Standalone topology: this process's queue is only ever fed by jobs
    // enqueued in this same process, since nothing here wires it to a
    // broker transport. `edge-receiver` is the process that actually runs
    // C2 and C4 against one shared queue.
    let queue = InMemoryQueue::new(args.queue_capacity);

    tracing::info!(provider = args.provider_name.as_str(), "worker started");
    run_worker_loop(&pool, &provider, &queue, policy, &args.provider_name, args.poll_interval_ms).await
}

async fn run_worker_loop(
    pool: &sqlx::PgPool,
    provider: &InferenceProvider,
    queue: &dyn JobQueue,
    policy: BackoffPolicy,
    provider_name: &str,
    poll_interval_ms: u64,
) -> anyhow::Result<()> {
    loop {
        match queue.dequeue_job().await? {
            Some(job) => {
                let diagnostics = DiagnosticRepository::new(pool);
                let request_id = job.request_id;
                match process_job(&diagnostics, provider, policy, provider_name, job).await {
                    Ok(completion) => {
                        if let Err(e) = queue.publish_completion(completion).await {
                            tracing::error!(error = %e, %request_id, "failed to publish completion");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, %request_id, "job processing failed"),
                }
            }
            None => tokio::time::sleep(Duration::from_millis(poll_interval_ms)).await,
        }
    }
}
