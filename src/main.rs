//! Expense Cache - HTTP host for the namespaced memoization cache
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load configuration from environment variables
//! 3. Build the cache and its storage backend
//! 4. Load persistent namespaces and start the sweep task
//! 5. Serve the HTTP API
//! 6. On SIGINT/SIGTERM, destroy the cache (final flush) and exit

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expense_cache::api::create_router;
use expense_cache::{AppState, CacheLifecycle, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expense_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Expense Cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: namespaces={}, persistent={:?}, port={}, cleanup_interval={}ms, storage={:?}",
        config.cache.namespaces.len(),
        config.cache.persistent_namespaces,
        config.server_port,
        config.cache.cleanup_interval.as_millis(),
        config.storage_dir
    );

    let state = AppState::from_config(&config);
    let lifecycle = Arc::new(CacheLifecycle::start(state.cache.clone(), config.cache.cleanup_interval).await);

    #[cfg(unix)]
    spawn_suspend_listener(lifecycle.clone())?;

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    lifecycle
        .run_until_exit(server)
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Treats SIGUSR1 as "host going to background" and flushes.
#[cfg(unix)]
fn spawn_suspend_listener(lifecycle: Arc<CacheLifecycle>) -> anyhow::Result<()> {
    let mut suspend = signal::unix::signal(signal::unix::SignalKind::user_defined1())
        .context("failed to install SIGUSR1 handler")?;

    tokio::spawn(async move {
        while suspend.recv().await.is_some() {
            if lifecycle.is_destroyed() {
                break;
            }
            lifecycle.on_suspend().await;
        }
    });
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
