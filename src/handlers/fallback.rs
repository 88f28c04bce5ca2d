use crate::models::wire::ErrorResponse;
use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use tracing::debug;

/// 404 for unmatched tracker routes
pub async fn tracker_fallback(uri: Uri) -> Response {
    not_found(uri, "Invalid endpoint. Valid endpoints: POST /register, GET /query/{file_hash}, GET /health, GET /metrics")
}

/// 404 for unmatched peer routes
pub async fn peer_fallback(uri: Uri) -> Response {
    not_found(uri, "Invalid endpoint. Valid endpoints: GET /download/{file_hash}/{chunk_index}, GET /health")
}

fn not_found(uri: Uri, message: &str) -> Response {
    debug!(path = %uri.path(), "Unmatched route");

    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
        }),
    )
        .into_response()
}
