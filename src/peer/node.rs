use crate::api::client::TrackerClient;
use crate::api::peer_client::HttpChunkFetcher;
use crate::core::config::PeerConfig;
use crate::core::routes::build_peer_router;
use crate::core::server;
use crate::core::state::PeerState;
use crate::download::orchestrator::{DownloadOptions, Orchestrator};
use crate::models::file_record::FileRecord;
use crate::models::wire::RegisterRequest;
use crate::stores::chunk_store::ChunkStore;
use crate::utils::net::default_advertise_address;
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// A peer: local chunk store, tracker client and chunk server
pub struct PeerNode {
    config: PeerConfig,
    store: Arc<ChunkStore>,
    tracker: TrackerClient,
}

/// Registration announcing that `address` serves `record`
pub fn registration_for(record: &FileRecord, address: &str) -> RegisterRequest {
    RegisterRequest {
        file_hash: Some(record.fingerprint.clone()),
        peer_address: Some(address.to_string()),
        file_size: Some(record.size),
        num_chunks: Some(record.chunk_count() as u64),
        chunk_size: Some(record.chunk_size),
    }
}

impl PeerNode {
    pub async fn open(config: PeerConfig) -> Result<Self> {
        let store = ChunkStore::open(&config.peer.storage_dir).await?;
        let tracker = TrackerClient::new(
            &config.peer.tracker_url,
            Duration::from_secs(config.peer.tracker_timeout_secs),
        )?;

        info!(
            storage_dir = %config.peer.storage_dir.display(),
            stored_files = store.len(),
            tracker_url = %tracker.base_url(),
            "Peer opened"
        );

        Ok(Self {
            config,
            store: Arc::new(store),
            tracker,
        })
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    /// Address other peers reach this one on
    pub fn advertise_address(&self) -> String {
        self.config
            .peer
            .advertise_address
            .clone()
            .unwrap_or_else(|| default_advertise_address(self.config.peer.listen_port))
    }

    /// Chunk a local file into the store and register it with the tracker
    pub async fn publish(&self, path: &Path) -> Result<FileRecord> {
        let record = self
            .store
            .import(path, self.config.peer.chunk_size)
            .await
            .context(format!("Failed to import {}", path.display()))?;

        let address = self.advertise_address();
        self.tracker
            .register(&registration_for(&record, &address))
            .await?;

        info!(
            file_hash = %record.fingerprint,
            file_size = record.size,
            num_chunks = record.chunk_count(),
            peer_address = %address,
            "File published"
        );

        Ok(record)
    }

    /// Re-register every stored file, returning how many the tracker accepted
    pub async fn advertise_all(&self) -> usize {
        let address = self.advertise_address();
        let mut accepted = 0;

        for record in self.store.records() {
            match self.tracker.register(&registration_for(&record, &address)).await {
                Ok(()) => accepted += 1,
                Err(e) => {
                    warn!(file_hash = %record.fingerprint, error = %e, "Failed to re-advertise file");
                }
            }
        }

        info!(advertised = accepted, stored = self.store.len(), "Stored files advertised");
        accepted
    }

    /// Download a file into `output`, or `{output_dir}/{file_hash}` by default
    pub async fn download(&self, file_hash: &str, output: Option<PathBuf>) -> Result<(PathBuf, u64)> {
        let output = output.unwrap_or_else(|| self.config.download.output_dir.join(file_hash.trim()));

        let fetcher = HttpChunkFetcher::new(Duration::from_secs(self.config.download.fetch_timeout_secs))?;
        let tracker = TrackerClient::new(
            &self.config.peer.tracker_url,
            Duration::from_secs(self.config.peer.tracker_timeout_secs),
        )?;
        let orchestrator = Orchestrator::new(
            tracker,
            fetcher,
            DownloadOptions {
                max_in_flight: self.config.download.max_in_flight,
                shuffle_peers: self.config.download.shuffle_peers,
            },
        );

        let written = orchestrator
            .download(file_hash, &output)
            .await
            .context(format!("Download of {} failed", file_hash))?;

        Ok((output, written))
    }

    /// Bind the configured chunk server address
    async fn bind(&self) -> Result<TcpListener> {
        server::bind(&self.config.peer.bind, self.config.peer.listen_port).await
    }

    /// Bind, then publish `path`. The tracker only learns this peer's
    /// address once the listener exists.
    pub async fn bind_and_publish(&self, path: &Path) -> Result<(TcpListener, FileRecord)> {
        let listener = self.bind().await?;
        let record = self.publish(path).await?;
        Ok((listener, record))
    }

    /// Bind, then re-advertise every stored file
    pub async fn bind_and_advertise(&self) -> Result<(TcpListener, usize)> {
        let listener = self.bind().await?;
        let advertised = self.advertise_all().await;
        Ok((listener, advertised))
    }

    pub async fn serve_on(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let state = Arc::new(PeerState::new(Arc::clone(&self.store)));
        server::run(listener, build_peer_router(state), shutdown).await
    }
}
