//! /monitor handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use blackhole_core::sink_types::{InterfaceHistory, InterfaceStats};

use super::{api_error, ApiError, ApiState};

pub async fn handle_interfaces(State(state): State<ApiState>) -> Json<Vec<String>> {
    Json(state.monitor.interfaces())
}

pub async fn handle_interface_stats(
    State(state): State<ApiState>,
    Path(iface): Path<String>,
) -> Result<Json<InterfaceStats>, ApiError> {
    state
        .monitor
        .stats(&iface)
        .map(Json)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e))
}

pub async fn handle_interface_history(
    State(state): State<ApiState>,
    Path(iface): Path<String>,
) -> Json<InterfaceHistory> {
    Json(state.monitor.history(&iface))
}
