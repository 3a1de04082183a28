//! taskboard-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or human-readable, optional file).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Mark tasks left in flight by the previous process as abandoned.
//! 5. Optionally run one retention pass, then arm the periodic runner.
//! 6. Build the Axum router and serve HTTP with graceful shutdown.
//! 7. Stop the periodic runner and close the pool.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use taskboard_core::{sweep_abandoned, Cleanup, PeriodicRunner, RetentionEngine, SqliteStore};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Held until exit so the file writer flushes.
    let _log_guard = init_tracing(&cfg);

    info!(version = env!("CARGO_PKG_VERSION"), "taskboard-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = Arc::new(SqliteStore::connect(&cfg.database_url).await?);
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Recovery sweep ──────────────────────────────────────────────────────
    sweep_abandoned(store.as_ref()).await?;

    // ── 5. Retention ───────────────────────────────────────────────────────────
    let retention = Arc::new(RetentionEngine::new(
        Arc::clone(&store),
        cfg.cleanup.retention(),
    ));
    if cfg.cleanup.enabled && cfg.cleanup.on_startup {
        if let Err(e) = retention.run_cleanup().await {
            error!(error = %e, "startup cleanup failed");
        }
    }

    let mut runner = PeriodicRunner::new(Arc::clone(&retention), cfg.cleanup.interval());
    if cfg.cleanup.enabled {
        runner.start();
        info!(
            interval_hours = cfg.cleanup.interval_hours.max(1),
            "periodic cleanup armed"
        );
    }

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let state = Arc::new(AppState::new(cfg, Arc::clone(&store)));
    let app = routes::build(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // ── 7. Teardown ────────────────────────────────────────────────────────────
    runner.stop().await;
    store.close().await;

    served?;
    info!("taskboard-server stopped");
    Ok(())
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `TASKBOARD_LOG`; a malformed `TASKBOARD_LOG` falls
/// back to `info` with a warning on stderr, since the subscriber is not up
/// yet to report it.
fn init_tracing(cfg: &Config) -> Option<WorkerGuard> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: TASKBOARD_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_layer = if cfg.log_json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    };

    let (file_layer, guard) = match cfg.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "taskboard-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
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
        use tokio::signal::unix::{signal, SignalKind};
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
