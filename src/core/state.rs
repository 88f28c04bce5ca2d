// Shared state handed to request handlers

use crate::core::config::TrackerConfig;
use crate::metrics::collector::Metrics;
use crate::stores::{chunk_store::ChunkStore, registry::Registry};
use crate::wal::wal::Wal;
use std::sync::Arc;

/// Tracker application state
/// 
/// All fields are wrapped in Arc for efficient cloning across threads.
#[derive(Clone)]
pub struct AppState {
    /// Fingerprint to file metadata and swarm
    pub registry: Arc<Registry>,
    
    /// Request counters for `/metrics`
    pub metrics: Arc<Metrics>,
    
    /// Write-Ahead Log, present when persistence is configured
    pub wal: Option<Arc<Wal>>,
    
    pub config: Arc<TrackerConfig>,
}

impl AppState {
    pub fn new(config: TrackerConfig, wal: Option<Wal>) -> Self {
        let registry = Arc::new(Registry::with_capacity(config.registry.file_capacity));

        Self {
            registry,
            metrics: Arc::new(Metrics::new()),
            wal: wal.map(Arc::new),
            config: Arc::new(config),
        }
    }
}

/// Peer chunk server state
#[derive(Clone)]
pub struct PeerState {
    pub chunk_store: Arc<ChunkStore>,
}

impl PeerState {
    pub fn new(chunk_store: Arc<ChunkStore>) -> Self {
        Self { chunk_store }
    }
}
