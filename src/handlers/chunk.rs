use crate::core::error::ChunkServeError;
use crate::core::state::PeerState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Serve one chunk of a locally stored file
///
/// GET /download/{file_hash}/{chunk_index}
///
/// A non-numeric index is reported as 404 like any other unknown chunk.
#[instrument(skip(state))]
pub async fn chunk_handler(
    State(state): State<Arc<PeerState>>,
    Path((file_hash, chunk_index)): Path<(String, String)>,
) -> Result<Response, ChunkServeError> {
    let index: u32 = chunk_index.parse().map_err(|_| ChunkServeError::NotFound)?;

    let chunk = state
        .chunk_store
        .read_chunk(&file_hash, index)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to read chunk");
            ChunkServeError::InternalError("Failed to read chunk".to_string())
        })?
        .ok_or_else(|| {
            debug!("Chunk not found");
            ChunkServeError::NotFound
        })?;

    debug!(bytes = chunk.len(), "Serving chunk");

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        chunk,
    )
        .into_response())
}
