//! blackholed — traffic sink daemon.

use std::sync::Arc;

use anyhow::{Context, Result};

use blackhole_api::ApiState;
use blackhole_core::{BlackholeConfig, ConfigStore, SinkSettings};
use blackhole_services::{ActivityLog, HttpFetcher, InterfaceMonitor, SinkWorker, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    let config_path = BlackholeConfig::write_default_if_missing().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to write default config");
        BlackholeConfig::file_path()
    });

    let mut config = BlackholeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BlackholeConfig::default()
    });
    if let Err(e) = config.sink.validate() {
        tracing::warn!(error = %e, "invalid sink settings, using defaults");
        config.sink = SinkSettings::default();
    }

    tracing::info!(
        config = %config_path.display(),
        urls = config.sink.urls.len(),
        quota_gb = config.sink.daily_quota_min_gb,
        "blackholed starting"
    );

    // Shared state
    let store = ConfigStore::with_persistence(config_path, config.clone());
    let activity = ActivityLog::new();
    let fetcher = HttpFetcher::new(&config.engine).context("failed to build HTTP client")?;
    let sink = SinkWorker::new(
        store.clone(),
        fetcher,
        config.engine.clone(),
        Arc::new(SystemClock),
        activity.clone(),
    );
    let monitor = InterfaceMonitor::new(&config.monitor);
    tracing::info!(interfaces = ?monitor.interfaces(), "interface monitor ready");

    // ── Shutdown channel ─────────────────────────────────────────────────────

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let monitor_task = tokio::spawn(monitor.clone().refresh_loop(shutdown_tx.subscribe()));

    let state = ApiState {
        sink: sink.clone(),
        config: store,
        monitor,
        activity,
    };

    // ── Serve until shutdown ─────────────────────────────────────────────────

    let served = blackhole_api::serve(
        state,
        &config.network.bind,
        config.network.api_port,
        shutdown_tx.subscribe(),
    )
    .await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "API server failed");
    }

    let _ = shutdown_tx.send(());
    sink.shutdown().await;
    if let Err(e) = monitor_task.await {
        tracing::error!(error = %e, "interface monitor task failed");
    }
    tracing::info!("blackholed stopped");

    served.context("API server")
}
