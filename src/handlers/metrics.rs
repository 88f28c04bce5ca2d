// Metrics endpoint

use crate::core::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

/// Returns JSON with registry statistics:
/// - Registrations accepted/rejected
/// - Queries and misses, hit rate
/// - Tracked files and peers
/// - Uptime and requests per second
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = state.metrics.get_snapshot(&state.registry);

    (StatusCode::OK, Json(snapshot)).into_response()
}
