use crate::core::error::RegistryError;
use crate::models::file_record::FileRecord;
use crate::models::peer::PeerEntry;
use crate::models::wire::QueryResponse;
use crate::utils::hex::normalize_fingerprint;
use crate::utils::time::{current_timestamp, is_expired};
use crate::validation::params::ValidatedRegistration;
use dashmap::DashMap;

/// A file and the peers advertising it, always stored together
#[derive(Debug)]
struct FileEntry {
    record: FileRecord,
    peers: Vec<PeerEntry>,
}

/// What a successful registration changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First registration for this fingerprint
    NewFile,
    /// Known file, new peer
    NewPeer,
    /// Peer was already registered; only its last-seen time moved
    Refreshed,
}

impl RegisterOutcome {
    /// Whether the registration changed the peer set
    pub fn is_change(self) -> bool {
        !matches!(self, RegisterOutcome::Refreshed)
    }
}

/// Consistent copy of one file's registry state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub record: FileRecord,
    pub peers: Vec<String>,
}

impl FileSnapshot {
    pub fn to_response(&self) -> QueryResponse {
        QueryResponse {
            peers: self.peers.clone(),
            file_size: self.record.size,
            num_chunks: self.record.chunk_count(),
            chunk_size: self.record.chunk_size,
        }
    }
}

/// Tracker-side map from fingerprint to file metadata and swarm.
///
/// Each fingerprint lives in one DashMap shard, so every mutation of a file
/// runs under that shard's write lock and queries clone under its read lock.
pub struct Registry {
    files: DashMap<String, FileEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            files: DashMap::with_capacity(capacity),
        }
    }

    /// Register `peer_address` as holding the file identified by `file_hash`
    pub fn register(
        &self,
        file_hash: &str,
        peer_address: &str,
        size: u64,
        chunk_size: u64,
    ) -> Result<RegisterOutcome, RegistryError> {
        let validated = ValidatedRegistration::new(file_hash, peer_address, size, chunk_size)?;
        self.register_validated(&validated, current_timestamp())
    }

    /// Apply an already validated registration observed at `now`
    pub fn register_validated(
        &self,
        registration: &ValidatedRegistration,
        now: i64,
    ) -> Result<RegisterOutcome, RegistryError> {
        self.register_logged(registration, now, |_| {})
    }

    /// Like `register_validated`, but runs `on_change` for a new file or
    /// peer while the file's shard lock is still held, so log order matches
    /// the order mutations were applied.
    pub fn register_logged(
        &self,
        registration: &ValidatedRegistration,
        now: i64,
        on_change: impl FnOnce(RegisterOutcome),
    ) -> Result<RegisterOutcome, RegistryError> {
        let mut created = false;
        let mut entry = self
            .files
            .entry(registration.file_hash.clone())
            .or_insert_with(|| {
                created = true;
                FileEntry {
                    record: FileRecord::new(
                        registration.file_hash.clone(),
                        registration.file_size,
                        registration.chunk_size,
                    ),
                    peers: Vec::new(),
                }
            });

        let record = &entry.record;
        if !record.same_layout(registration.file_size, registration.chunk_size) {
            return Err(RegistryError::MetadataMismatch {
                file_hash: registration.file_hash.clone(),
                expected_size: record.size,
                expected_chunk_size: record.chunk_size,
                size: registration.file_size,
                chunk_size: registration.chunk_size,
            });
        }

        if let Some(existing) = entry
            .peers
            .iter_mut()
            .find(|p| p.address == registration.peer_address)
        {
            existing.last_seen = existing.last_seen.max(now);
            return Ok(RegisterOutcome::Refreshed);
        }

        entry
            .peers
            .push(PeerEntry::new(registration.peer_address.clone(), now));

        let outcome = if created {
            RegisterOutcome::NewFile
        } else {
            RegisterOutcome::NewPeer
        };
        on_change(outcome);
        Ok(outcome)
    }

    /// Snapshot of a file's metadata and peers
    pub fn query(&self, file_hash: &str) -> Result<FileSnapshot, RegistryError> {
        let file_hash = normalize_fingerprint(file_hash)
            .map_err(|_| RegistryError::NotFound(file_hash.to_string()))?;

        let entry = self
            .files
            .get(&file_hash)
            .ok_or_else(|| RegistryError::NotFound(file_hash.clone()))?;

        Ok(FileSnapshot {
            record: entry.record.clone(),
            peers: entry.peers.iter().map(|p| p.address.clone()).collect(),
        })
    }

    /// Drop a single peer from a file's swarm, returning whether it was present
    pub fn expire_peer(&self, file_hash: &str, peer_address: &str) -> bool {
        match self.files.get_mut(file_hash) {
            Some(mut entry) => {
                let before = entry.peers.len();
                entry.peers.retain(|p| p.address != peer_address);
                entry.peers.len() != before
            }
            None => false,
        }
    }

    /// Remove peers whose last registration is older than `timeout` seconds.
    ///
    /// File records are kept even when their swarm becomes empty.
    /// `on_expire` sees each removed `(file_hash, peer_address)` while that
    /// file's shard lock is held. Returns how many peers were removed.
    pub fn cleanup_stale_peers(&self, timeout: i64, mut on_expire: impl FnMut(&str, &str)) -> usize {
        let current_time = current_timestamp();
        let mut removed = 0;

        for mut entry in self.files.iter_mut() {
            let (file_hash, file) = entry.pair_mut();
            file.peers.retain(|peer| {
                let stale = is_expired(peer.last_seen, timeout, current_time);
                if stale {
                    on_expire(file_hash, &peer.address);
                    removed += 1;
                }
                !stale
            });
        }

        removed
    }

    /// Every live (file, peer) pair as a registration, for WAL compaction
    pub fn registrations(&self) -> Vec<ValidatedRegistration> {
        let mut out = Vec::with_capacity(self.total_peers());

        for entry in self.files.iter() {
            for peer in &entry.peers {
                out.push(ValidatedRegistration {
                    file_hash: entry.record.fingerprint.clone(),
                    peer_address: peer.address.clone(),
                    file_size: entry.record.size,
                    chunk_size: entry.record.chunk_size,
                });
            }
        }

        out
    }

    /// Total number of (file, peer) pairs
    pub fn total_peers(&self) -> usize {
        self.files.iter().map(|entry| entry.peers.len()).sum()
    }

    /// Number of known files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
