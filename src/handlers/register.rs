use crate::core::error::{RegistryError, ValidationError};
use crate::core::state::AppState;
use crate::models::wire::{RegisterRequest, SuccessResponse};
use crate::utils::time::current_timestamp;
use crate::wal::wal::WalOperation;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Register a peer as holding a file
///
/// POST /register
///
/// # Flow
/// 1. Parse the JSON body (malformed bodies are a 400, not a 422)
/// 2. Validate fields and the chunk layout
/// 3. Apply to the registry (409 on conflicting metadata)
/// 4. Log changes to the WAL when configured
#[instrument(skip(state, payload))]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, RegistryError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Malformed register body");
        state.metrics.increment_rejected();
        RegistryError::Validation(ValidationError::InvalidFormat(rejection.body_text()))
    })?;

    let registration = request
        .validate(state.config.registry.default_chunk_size)
        .map_err(|e| {
            warn!(error = %e, "Registration validation failed");
            state.metrics.increment_rejected();
            RegistryError::Validation(e)
        })?;

    // Changes reach the WAL under the file's lock, in the order they applied
    let outcome = state
        .registry
        .register_logged(&registration, current_timestamp(), |_| {
            let Some(wal) = &state.wal else { return };
            if let Err(e) = wal.log_operation(WalOperation::register(&registration)) {
                warn!(error = %e, "Failed to log registration to WAL");
            }
        })
        .map_err(|e| {
            warn!(
                file_hash = %registration.file_hash,
                peer_address = %registration.peer_address,
                error = %e,
                "Registration rejected"
            );
            state.metrics.increment_rejected();
            e
        })?;

    if outcome.is_change() {
        info!(
            file_hash = %registration.file_hash,
            peer_address = %registration.peer_address,
            file_size = registration.file_size,
            num_chunks = registration.num_chunks(),
            outcome = ?outcome,
            "Peer registered"
        );
    } else {
        debug!(
            file_hash = %registration.file_hash,
            peer_address = %registration.peer_address,
            "Peer registration refreshed"
        );
    }

    state.metrics.increment_registrations();

    Ok((
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            message: "Peer registered successfully.".to_string(),
        }),
    )
        .into_response())
}
