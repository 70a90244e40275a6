//! Tally Server binary.
//!
//! Opens both stores, starts the reconciliation task and serves the HTTP
//! API until Ctrl-C. On shutdown the reconciler drains staged clicks once
//! more before the pools are closed.

use std::sync::Arc;

use tally_server::config::Config;
use tally_server::db::{LocalStore, RemoteStore};
use tally_server::sync::{Reconciler, SyncSettings};
use tally_server::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Tally Server on {}:{}", config.host, config.port);
    tracing::debug!(?config, "Loaded configuration");

    // Open stores
    let local = LocalStore::connect(&config.local_database_url).await?;
    local.ensure_schema().await?;

    let remote = Arc::new(RemoteStore::connect(&config.remote_database_url).await?);
    remote.ensure_schema().await?;
    tracing::info!("Counter tables ready");

    // Start reconciliation
    let reconciler = Reconciler::new(
        local.clone(),
        Arc::clone(&remote),
        SyncSettings::from(&config),
    );
    let sync = reconciler.spawn();

    // Build application state
    let state = AppState {
        local: local.clone(),
        remote: remote.clone(),
        config: Arc::new(config.clone()),
        sync_status: sync.status(),
    };

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sync.shutdown().await;
    local.close().await;
    remote.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
