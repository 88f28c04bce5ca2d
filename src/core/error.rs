// Centralized error handling for the tracker and peers

use crate::models::wire::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

/// Malformed input, rejected before any state is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter format: {0}")]
    InvalidFormat(String),

    #[error("Parameter out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors returned by the tracker registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid registration: {0}")]
    Validation(#[from] ValidationError),

    #[error(
        "Metadata mismatch for {file_hash}: registered as {expected_size} bytes in {expected_chunk_size}-byte chunks, got {size} bytes in {chunk_size}-byte chunks"
    )]
    MetadataMismatch {
        file_hash: String,
        expected_size: u64,
        expected_chunk_size: u64,
        size: u64,
        chunk_size: u64,
    },

    #[error("File not found: {0}")]
    NotFound(String),
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = match &self {
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::MetadataMismatch { .. } => StatusCode::CONFLICT,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Errors returned by a peer's chunk server
#[derive(Error, Debug)]
pub enum ChunkServeError {
    #[error("Chunk not found")]
    NotFound,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl IntoResponse for ChunkServeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChunkServeError::NotFound => StatusCode::NOT_FOUND,
            ChunkServeError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Failure of a single chunk fetch from a single peer.
///
/// Always recovered by failover inside a download; only surfaces as
/// [`DownloadError::ChunkUnavailable`] once every peer has failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Chunk not found on peer")]
    NotFound,

    #[error("Peer returned status {0}")]
    Status(u16),

    #[error("Chunk length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
}

/// Terminal outcome of a failed download
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid file hash: {0}")]
    InvalidFingerprint(#[from] ValidationError),

    #[error("Unknown file: {0}")]
    UnknownFile(String),

    #[error("No peers available for {0}")]
    NoPeersAvailable(String),

    #[error("Chunk {0} unavailable from every known peer")]
    ChunkUnavailable(u32),

    #[error("Integrity failure: expected {expected}, assembled file hashes to {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Tracker query failed: {0}")]
    Tracker(#[source] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_registry_error_status_codes() {
        let cases = [
            (
                RegistryError::Validation(ValidationError::MissingParameter("file_hash".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::MetadataMismatch {
                    file_hash: "a".repeat(40),
                    expected_size: 10,
                    expected_chunk_size: 4,
                    size: 11,
                    chunk_size: 4,
                },
                StatusCode::CONFLICT,
            ),
            (RegistryError::NotFound("a".repeat(40)), StatusCode::NOT_FOUND),
        ];

        for (error, expected) in cases {
            let response = error.into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[tokio::test]
    async fn test_registry_error_body_is_json() {
        let response = RegistryError::NotFound("abc".to_string()).into_response();

        let (_, body) = response.into_parts();
        let bytes = Body::new(body).collect().await.unwrap().to_bytes();
        let parsed: ErrorResponse = serde_json::from_slice(&bytes).unwrap();

        assert!(!parsed.success);
        assert_eq!(parsed.error, "File not found: abc");
    }

    #[test]
    fn test_chunk_serve_error_status_codes() {
        assert_eq!(ChunkServeError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ChunkServeError::InternalError("disk".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
