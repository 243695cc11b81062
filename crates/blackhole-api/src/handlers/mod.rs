//! HTTP API handlers — exposes sink and monitor state as JSON.

pub mod config;
pub mod monitor;
pub mod sink;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use blackhole_core::ConfigStore;
use blackhole_services::{ActivityLog, InterfaceMonitor, SinkWorker};

#[derive(Clone)]
pub struct ApiState {
    pub sink: SinkWorker,
    pub config: ConfigStore,
    pub monitor: InterfaceMonitor,
    /// Same log the sink writes to.
    pub activity: ActivityLog,
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Error responses carry `{"error": msg}`.
pub type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, msg: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": msg.to_string() })))
}

// Re-export handler functions for use in router setup.
pub use config::{handle_config_get, handle_config_update};
pub use monitor::{handle_interface_history, handle_interface_stats, handle_interfaces};
pub use sink::{handle_history, handle_logs, handle_speed, handle_status, handle_toggle};
