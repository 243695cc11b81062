//! Blackhole integration test harness.
//!
//! Every test runs the real API router on a loopback listener, backed by a
//! real `SinkWorker` with the reqwest fetcher. Download targets are served by
//! a second local axum server, so nothing leaves the machine.
//!
//!   cargo test --test integration

mod api;
mod engine;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use blackhole_api::ApiState;
use blackhole_core::{BlackholeConfig, ConfigStore, EngineSettings};
use blackhole_services::{ActivityLog, HttpFetcher, InterfaceMonitor, SinkWorker, SystemClock};

pub const MIB: usize = 1024 * 1024;

// ── File server ───────────────────────────────────────────────────────────────

/// Serves `/blob/{mib}` (that many MiB of zeros, at most 64) and `/broken`
/// (always 500).
pub async fn start_file_server() -> Result<String> {
    let blob = Bytes::from(vec![0u8; 64 * MIB]);
    let app = Router::new()
        .route(
            "/blob/{mib}",
            get(|State(blob): State<Bytes>, Path(mib): Path<usize>| async move {
                blob.slice(..(mib.min(64) * MIB))
            }),
        )
        .route(
            "/broken",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .with_state(blob);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

// ── Daemon under test ─────────────────────────────────────────────────────────

pub struct Daemon {
    pub base: String,
    pub sink: SinkWorker,
    pub store: ConfigStore,
    client: reqwest::Client,
    shutdown_tx: broadcast::Sender<()>,
}

/// Engine tuned for tests: short pauses, 1 MiB accounting chunks.
pub fn fast_engine() -> EngineSettings {
    EngineSettings {
        chunk_size: MIB,
        rest_min_ms: 10,
        rest_max_ms: 20,
        error_backoff_min_ms: 50,
        error_backoff_max_ms: 100,
        empty_wait_ms: 50,
        ..EngineSettings::default()
    }
}

pub fn temp_config_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("blackhole-it-{}-{}", name, std::process::id()))
        .join("config.toml")
}

impl Daemon {
    /// Wire up the same components `blackholed` does and serve them on an
    /// ephemeral port.
    pub async fn start(mut config: BlackholeConfig, persist: Option<PathBuf>) -> Result<Self> {
        config.engine = fast_engine();
        let store = match persist {
            Some(path) => ConfigStore::with_persistence(path, config.clone()),
            None => ConfigStore::in_memory(config.clone()),
        };
        let activity = ActivityLog::new();
        let sink = SinkWorker::new(
            store.clone(),
            HttpFetcher::new(&config.engine)?,
            config.engine.clone(),
            Arc::new(SystemClock),
            activity.clone(),
        );
        let state = ApiState {
            sink: sink.clone(),
            config: store.clone(),
            monitor: InterfaceMonitor::new(&config.monitor),
            activity,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = blackhole_api::serve_on(listener, state, rx).await {
                eprintln!("API server failed: {e:#}");
            }
        });

        Ok(Self {
            base: format!("http://{addr}/api"),
            sink,
            store,
            client: reqwest::Client::new(),
            shutdown_tx,
        })
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        let status = StatusCode::from_u16(resp.status().as_u16())?;
        Ok((status, resp.json().await.context("response is not JSON")?))
    }

    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = self.client.post(format!("{}{}", self.base, path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.with_context(|| format!("POST {path}"))?;
        let status = StatusCode::from_u16(resp.status().as_u16())?;
        Ok((status, resp.json().await.context("response is not JSON")?))
    }

    pub async fn status(&self) -> Result<Value> {
        let (code, body) = self.get("/downonly/status").await?;
        if code != StatusCode::OK {
            bail!("status returned {code}: {body}");
        }
        Ok(body)
    }

    /// Poll `/downonly/status` until `done` holds or `timeout` passes.
    pub async fn wait_for_status(
        &self,
        timeout: Duration,
        done: impl Fn(&Value) -> bool,
    ) -> Result<Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.status().await?;
            if done(&status) {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("timed out waiting for status, last: {status}");
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn stop(self) {
        self.sink.shutdown().await;
        let _ = self.shutdown_tx.send(());
    }
}
