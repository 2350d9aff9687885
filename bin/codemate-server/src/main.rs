//! codemate-server – entry point.
//!
//! Startup order:
//! 1. Load `.env` and parse configuration from environment variables.
//! 2. Initialise structured tracing (stdout, plus an optional rolling file).
//! 3. Open the SQLite database; without it the server runs stateless.
//! 4. Fetch missing model artifacts when asked to, then load the model.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod entities;
mod error;
mod extract;
mod middleware;
mod routes;
mod schemas;
mod security;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use codemate_core::model::fetch_missing;
use codemate_core::ModelAdapter;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{Config, DEV_JWT_SECRET};
use crate::entities::SqliteStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg)?;
    info!(version = env!("CARGO_PKG_VERSION"), "codemate-server starting");

    if cfg.enable_auth && cfg.jwt_secret == DEV_JWT_SECRET {
        warn!("CODEMATE_JWT_SECRET is not set; tokens are signed with the development secret");
    }

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = match SqliteStore::connect(&cfg.database_url).await {
        Ok(store) => {
            info!(database_url = %cfg.database_url, "database ready");
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!(
                database_url = %cfg.database_url,
                error = %e,
                "database unavailable; history, suggestions and accounts are disabled"
            );
            None
        }
    };

    // ── 4. Model ───────────────────────────────────────────────────────────────
    if cfg.model_download {
        match fetch_missing(&cfg.model, &cfg.hub).await {
            Ok(written) if written.is_empty() => info!("model artifacts already present"),
            Ok(written) => info!(files = ?written, "model artifacts downloaded"),
            Err(e) => warn!(error = %e, "model download failed"),
        }
    }
    let model = Arc::new(ModelAdapter::new(cfg.model.clone()));
    if model.initialize().await {
        info!(path = %cfg.model.model_path.display(), "model loaded");
    } else {
        warn!("model not loaded; chat answers come from the mock responder");
    }

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let addr = cfg.bind_address;
    let state = AppState::new(cfg, model, store);
    let app = routes::build(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("codemate-server stopped");
    Ok(())
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer and must live until shutdown.
fn init_tracing(cfg: &Config) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: CODEMATE_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let stdout = fmt::layer().with_target(true).with_thread_ids(true);
    if cfg.log_json {
        layers.push(stdout.json().boxed());
    } else {
        layers.push(stdout.boxed());
    }

    let mut guard = None;
    if let Some(path) = &cfg.log_file {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let prefix = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("codemate-server.log");
        let appender = tracing_appender::rolling::daily(dir, prefix);
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().json().with_writer(writer).with_ansi(false).boxed());
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;
    Ok(guard)
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
