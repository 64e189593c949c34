mod api;
mod config;
mod store;
mod uploads;

use anyhow::{Context, Result};
use api::AppState;
use config::Config;
use std::sync::Arc;
use store::RecipeStore;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uploads::UploadStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        "Starting recipe service"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    // Connecting to the store is fatal when it fails; the process must not
    // begin serving without it
    let store = Arc::new(
        RecipeStore::new(&config.database)
            .await
            .context("Failed to initialize recipe store")?,
    );

    // Run migrations if enabled
    if config.database.run_migrations {
        store
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    let upload_store = Arc::new(UploadStore::new(&config.uploads));

    let state = AppState {
        store,
        uploads: upload_store,
    };

    // Spawn API server task
    let http_config = config.http.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_server(state, &http_config).await {
            error!(error = %e, "API server error");
        }
    });

    info!("Recipe service started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down recipe service");

    api_handle.abort();

    info!("Recipe service stopped");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();

    builder
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
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
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
