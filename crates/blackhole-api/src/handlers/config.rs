//! /downonly/config handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use blackhole_core::{ConfigError, ConfigPatch, SinkSettings};

use super::{api_error, ApiError, ApiState};

pub async fn handle_config_get(State(state): State<ApiState>) -> Json<SinkSettings> {
    Json(state.config.get_config())
}

/// Merge, validate and persist, then hand the result to the sink.
pub async fn handle_config_update(
    State(state): State<ApiState>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<Value>, ApiError> {
    let quota_changed = patch.changes_quota();
    let settings = state.config.update_config(patch).map_err(|e| {
        let status = match e {
            ConfigError::Invalid(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %e, "config update rejected");
        api_error(status, e)
    })?;

    state.sink.apply_config(&settings, quota_changed);
    state.activity.push("configuration updated");
    Ok(Json(json!({ "ok": true })))
}
