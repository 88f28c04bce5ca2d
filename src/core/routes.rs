// HTTP routes configuration

use crate::core::state::{AppState, PeerState};
use crate::handlers::{chunk, fallback, health, metrics, query, register};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Tracker router: registration, lookup and operational endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/register", post(register::register_handler))
        .route("/query/{file_hash}", get(query::query_handler))
        .route("/health", get(health::health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        // 404 fallback for all unmatched routes
        .fallback(fallback::tracker_fallback)
        .with_state(state)
}

/// Peer router: serves chunks from the local store
pub fn build_peer_router(state: Arc<PeerState>) -> Router {
    Router::new()
        .route("/download/{file_hash}/{chunk_index}", get(chunk::chunk_handler))
        .route("/health", get(health::health_handler))
        .fallback(fallback::peer_fallback)
        .with_state(state)
}
