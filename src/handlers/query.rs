use crate::core::error::RegistryError;
use crate::core::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Look up a file's metadata and swarm
///
/// GET /query/{file_hash}
#[instrument(skip(state))]
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Path(file_hash): Path<String>,
) -> Result<Response, RegistryError> {
    state.metrics.increment_queries();

    let snapshot = state.registry.query(&file_hash).map_err(|e| {
        debug!(error = %e, "Query miss");
        state.metrics.increment_query_misses();
        e
    })?;

    debug!(
        num_chunks = snapshot.record.chunk_count(),
        peers = snapshot.peers.len(),
        "Query hit"
    );

    Ok((StatusCode::OK, Json(snapshot.to_response())).into_response())
}
