//! Chat server: real-time delivery for the corporate messenger.
//!
//! Main entry point that wires the crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use messenger_api::{AppState, build_router};
use messenger_core::config::AppConfig;
use messenger_core::error::AppError;
use messenger_database::{ChatRepository, DatabasePool};
use messenger_realtime::{MemoryOfflineStore, RealtimeEngine};

#[tokio::main]
async fn main() {
    let env = std::env::var("MESSENGER_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting chat server v{}", env!("CARGO_PKG_VERSION"));

    let db_pool = DatabasePool::connect(&config.database).await?;
    let chat_repo = Arc::new(ChatRepository::new(db_pool.pool().clone()));

    let engine = RealtimeEngine::new(
        config.realtime.clone(),
        chat_repo.clone(),
        chat_repo,
        Arc::new(MemoryOfflineStore::new()),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let app = build_router(AppState::new(Arc::new(config), engine.clone()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Chat server listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(AppError::internal(format!("Server error: {e}"))),
                Err(e) => Err(AppError::internal(format!("Server task failed: {e}"))),
            };
        }
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    // Open WebSocket sessions keep the HTTP server alive, so they are closed
    // before the server is asked to drain.
    let report = engine.shutdown().await;
    tracing::info!(
        sessions_closed = report.sessions_closed,
        offline_pending = report.offline_pending,
        "Delivery engine stopped"
    );
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task failed during shutdown"),
        Err(_) => tracing::warn!("Graceful shutdown timed out, forcing exit"),
    }

    db_pool.close().await;
    tracing::info!("Chat server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
