//! C2 standalone process: exposes `handle_turn` over HTTP so a separately
//! deployed C1 can call it without sharing process memory.
//! `edge-receiver` calls `handle_turn` in-process instead of over this
//! endpoint; this binary is the topology for a deployment that splits C1
//! and C2 onto different hosts (see crate-root `DESIGN.md`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use sqlx::PgPool;
use tower_http::timeout::TimeoutLayer;
use tzurot_core::config::Config;
use tzurot_core::db::repository::{
    ConfigRepository, DiagnosticRepository, MemoryRepository, PendingMemoryRepository, PersonaRepository,
    PersonalityRepository, TurnRepository, UserRepository,
};
use tzurot_core::embeddings::{create_embedding_provider, EmbeddingProvider};
use tzurot_core::error::FailureEnvelope;
use tzurot_core::gateway::{handle_turn, DeliveryPlan, GatewayDefaults, HandleTurnContext, RequestEnvelope};
use tzurot_core::inference::retry::BackoffPolicy;
use tzurot_core::queue::{InMemoryQueue, JobQueue};
use tzurot_core::startup::{init_process, spawn_health_server, warn_if_queue_url_unsupported};

/// A turn touches the model provider and the embedding provider in series;
/// this bounds how long a caller will wait before getting a 408 instead of
/// a hung connection.
const TURN_TIMEOUT_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "gateway", about = "C2 turn-handling HTTP endpoint")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8090)]
    port: u16,
}

struct AppState {
    pool: PgPool,
    embedder: Box<dyn EmbeddingProvider>,
    queue: Box<dyn JobQueue>,
    defaults: GatewayDefaults,
    enqueue_policy: BackoffPolicy,
    completion_policy: BackoffPolicy,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_process();
    let args = Args::parse();
    let config = Config::load()?;
    warn_if_queue_url_unsupported(&config.queue_url);
    spawn_health_server(config.health_port, "gateway");

    let pool = tzurot_core::db::connect(&config.database_url).await?;
    let embedder = create_embedding_provider(
        &config.embedding_provider,
        config.embedding_api_key.as_deref(),
        &config.embedding_model,
        config.embedding_dims,
    );

    spawn_diagnostic_log_sweep(pool.clone());

    let state = Arc::new(AppState {
        pool,
        embedder,
        // Standalone topology: only jobs enqueued through this same
        // process's handler ever reach this queue. See the module doc.
        queue: Box::new(InMemoryQueue::new(256)),
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
    });

    let app = Router::new()
        .route("/turn", post(post_turn))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(TURN_TIMEOUT_SECS)));
    let addr: std::net::SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
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

struct ApiError(FailureEnvelope);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.kind.is_user_visible() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, self.0.to_string()).into_response()
    }
}

async fn post_turn(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<RequestEnvelope>,
) -> Result<Json<DeliveryPlan>, ApiError> {
    let ctx = HandleTurnContext {
        personalities: PersonalityRepository::new(&state.pool),
        users: UserRepository::new(&state.pool),
        personas: PersonaRepository::new(&state.pool),
        configs: ConfigRepository::new(&state.pool),
        turns: TurnRepository::new(&state.pool),
        memories: MemoryRepository::new(&state.pool),
        pending_memories: PendingMemoryRepository::new(&state.pool),
        embedder: state.embedder.as_ref(),
        queue: state.queue.as_ref(),
        defaults: state.defaults,
        enqueue_policy: state.enqueue_policy,
        completion_policy: state.completion_policy,
    };

    handle_turn(&ctx, envelope).await.map(Json).map_err(ApiError)
}
