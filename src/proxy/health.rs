use axum::{
    extract::State,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::proxy::state::AppState;

pub async fn health_check_handler(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "ok",
        "uptime": state.core.monitor.uptime_secs(),
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "version": env!("CARGO_PKG_VERSION")
    }))
    .into_response()
}

pub async fn stats_handler(State(state): State<AppState>) -> Response {
    Json(json!({
        "requests": state.core.monitor.snapshot(),
        "cache": state.core.cache.stats(),
        "queue": state.core.queue.snapshot(),
        "sessions": { "active": state.core.sessions.active_count() }
    }))
    .into_response()
}
