use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::state::AppState;
use crate::stores::registry::Registry;
use crate::utils::time::current_timestamp;
use crate::validation::params::ValidatedRegistration;
use crate::wal::wal::{Wal, WalOperation};

/// Apply replayed WAL operations to an empty registry.
///
/// Lines that no longer validate or conflict with an earlier record are
/// skipped with a warning. Returns the number of operations applied.
pub fn apply_wal_operations(registry: &Registry, operations: &[WalOperation]) -> usize {
    let mut applied = 0;

    for op in operations {
        match op {
            WalOperation::Register {
                file_hash,
                file_size,
                chunk_size,
                peer_address,
            } => {
                let registration = match ValidatedRegistration::new(file_hash, peer_address, *file_size, *chunk_size) {
                    Ok(registration) => registration,
                    Err(e) => {
                        warn!(file_hash = %file_hash, error = %e, "Skipping invalid WAL registration");
                        continue;
                    }
                };

                // Timestamps are not logged, replayed peers count as just seen
                match registry.register_validated(&registration, current_timestamp()) {
                    Ok(_) => applied += 1,
                    Err(e) => {
                        warn!(file_hash = %file_hash, error = %e, "Skipping conflicting WAL registration");
                    }
                }
            }
            WalOperation::Expire {
                file_hash,
                peer_address,
            } => {
                if registry.expire_peer(file_hash, peer_address) {
                    applied += 1;
                }
            }
        }
    }

    applied
}

/// Replay the WAL into the registry, then rewrite it as one REGISTER line per
/// live (file, peer) pair
pub fn restore_from_wal(state: &AppState) -> Result<()> {
    let Some(wal) = &state.wal else {
        return Ok(());
    };

    info!(wal_path = %wal.path().display(), "Replaying WAL operations");
    let operations = wal.replay().context("Failed to replay WAL")?;
    let applied = apply_wal_operations(&state.registry, &operations);

    let live: Vec<WalOperation> = state
        .registry
        .registrations()
        .iter()
        .map(WalOperation::register)
        .collect();
    wal.compact(&live).context("Failed to compact WAL")?;

    info!(
        operations_replayed = operations.len(),
        operations_applied = applied,
        files_loaded = state.registry.file_count(),
        peers_loaded = state.registry.total_peers(),
        "WAL replay completed"
    );

    Ok(())
}

/// Prune peers that have not re-registered within `peer_timeout` seconds,
/// logging each removal to the WAL
pub fn expire_stale_peers(registry: &Registry, wal: Option<&Wal>, peer_timeout: i64) -> usize {
    registry.cleanup_stale_peers(peer_timeout, |file_hash, peer_address| {
        let Some(wal) = wal else { return };
        let op = WalOperation::Expire {
            file_hash: file_hash.to_string(),
            peer_address: peer_address.to_string(),
        };
        if let Err(e) = wal.log_operation(op) {
            warn!(error = %e, "Failed to log peer expiry to WAL");
        }
    })
}

/// Spawn a background task that periodically cleans up stale peers
pub fn spawn_cleanup_task(
    registry: Arc<Registry>,
    wal: Option<Arc<Wal>>,
    cleanup_interval: u64,
    peer_timeout: i64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));

        loop {
            interval.tick().await;

            debug!("Running peer cleanup");
            let removed = expire_stale_peers(&registry, wal.as_deref(), peer_timeout);

            if removed > 0 {
                info!(
                    removed_peers = removed,
                    active_peers = registry.total_peers(),
                    tracked_files = registry.file_count(),
                    "Peer cleanup completed"
                );
            } else {
                debug!("Peer cleanup completed, no stale peers found");
            }
        }
    })
}
