//! /downonly status, toggle, speed, history and logs handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use blackhole_core::sink_types::{HistoryResponse, LogsResponse, SpeedResponse};
use blackhole_core::{StatusSnapshot, ToggleResponse};
use blackhole_services::history::{self, DEFAULT_MONTH};

use super::{api_error, ApiError, ApiState};

// ── /downonly/status ──────────────────────────────────────────────────────────

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.sink.status())
}

// ── /downonly/toggle ──────────────────────────────────────────────────────────

pub async fn handle_toggle(State(state): State<ApiState>) -> Json<ToggleResponse> {
    let result = state.sink.toggle().await;
    tracing::info!(
        is_running = result.is_running,
        status = result.status.as_str(),
        "sink toggled via API"
    );
    Json(result)
}

// ── /downonly/speed ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SpeedQuery {
    pub interface: Option<String>,
}

pub async fn handle_speed(
    State(state): State<ApiState>,
    Query(query): Query<SpeedQuery>,
) -> Json<SpeedResponse> {
    let interface = query
        .interface
        .filter(|name| !name.is_empty())
        .or_else(|| state.monitor.default_interface())
        .unwrap_or_default();
    let (speed, _) = state.sink.speed();
    Json(SpeedResponse {
        interface,
        speed,
        timestamp: chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    })
}

// ── /downonly/history ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub month: Option<u32>,
}

pub async fn handle_history(
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let month = query.month.unwrap_or(DEFAULT_MONTH);
    history::sink_history(month)
        .map(Json)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

// ── /downonly/logs ────────────────────────────────────────────────────────────

pub async fn handle_logs(State(state): State<ApiState>) -> Json<LogsResponse> {
    Json(LogsResponse {
        max_entries: state.activity.capacity(),
        entries: state.activity.entries(),
    })
}
