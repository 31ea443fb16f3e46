//! Route Mirror - local snapshot of a remote route table
//!
//! This binary keeps re-reading the upstream route list, reconciles each
//! pass into an in-memory table and serves that table over HTTP alongside
//! health and metrics endpoints.

use mirror_lib::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    source::FileSource,
    sync::SyncLoopBuilder,
    RawRoute, RouteTable,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const MIRROR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting route-mirror");

    let config = config::MirrorConfig::load()?;
    info!(
        instance = %config.instance_name,
        source = %config.source_path,
        rest_interval_ms = config.rest_interval_ms,
        "Mirror configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::SYNC_ENGINE).await;
    health_registry.register(components::REMOTE_SOURCE).await;

    let table = Arc::new(RouteTable::new());
    let source = Arc::new(FileSource::<RawRoute>::new(&config.source_path));

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(MIRROR_VERSION, &source.path().display().to_string());

    let sync_loop = SyncLoopBuilder::new()
        .source(source)
        .table(Arc::clone(&table))
        .config(config.sync_config())
        .health(health_registry.clone())
        .logger(logger.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(
        health_registry,
        table,
        sync_loop.engine().subscribe(),
    ));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sync_handle = tokio::spawn(sync_loop.run(shutdown_rx));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    if shutdown_tx.send(()).is_err() {
        warn!("Sync loop already stopped");
    }
    let stats = sync_handle.await?;
    info!(
        cycles_completed = stats.cycles_completed,
        cycles_aborted = stats.cycles_aborted,
        start_failures = stats.start_failures,
        "Table sync stopped"
    );

    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
