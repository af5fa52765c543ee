//! Shared process bootstrap for the four binaries: TLS provider install,
//! logging, and the readiness endpoint every long-running process exposes
//! on `Config.health_port` ("Diagnostics").

use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Installs the rustls crypto provider and the process-wide tracing
/// subscriber. Call once at the top of each binary's `main`.
pub fn init_process() {
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("warning: failed to install default crypto provider: {e:?}");
    }

    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: tracing subscriber already set");
    }
}

/// `Config::queue_url` names the job-queue backend the deployment expects;
/// only the in-process `memory://` backend exists today (see crate-root
/// `DESIGN.md`, "Cross-process job queue"), so anything else is a
/// misconfiguration worth surfacing at startup rather than silently
/// ignoring.
pub fn warn_if_queue_url_unsupported(queue_url: &str) {
    if queue_url != "memory://local" {
        tracing::warn!(queue_url, "QUEUE_URL is set but only the in-process queue is implemented; ignoring");
    }
}

/// Spawn the `GET /health` readiness endpoint and return its join handle.
/// Each binary reports its own name so a probe can tell which process it
/// hit.
pub fn spawn_health_server(port: u16, process_name: &'static str) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = Router::new()
            .route("/health", get(move || async move { process_name }))
            .layer(TimeoutLayer::new(Duration::from_secs(HEALTH_TIMEOUT_SECS)));
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "health server exited");
                }
            }
            Err(e) => tracing::error!(error = %e, port, "failed to bind health server"),
        }
    })
}
