use crate::core::error::{DownloadError, FetchError, RegistryError};
use crate::download::session::{Assignment, DownloadSession};
use crate::download::writer::OrderedWriter;
use crate::models::file_record::FileRecord;
use crate::models::wire::QueryResponse;
use crate::stores::registry::Registry;
use crate::utils::hex::normalize_fingerprint;
use anyhow::anyhow;
use bytes::Bytes;
use rand::seq::SliceRandom;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Where a download learns a file's layout and swarm
pub trait Directory: Send + Sync {
    /// `None` when the fingerprint is unknown
    fn lookup(
        &self,
        file_hash: &str,
    ) -> impl Future<Output = anyhow::Result<Option<QueryResponse>>> + Send;
}

/// Fetches one chunk from one peer
pub trait ChunkFetcher: Send + Sync + 'static {
    fn fetch_chunk(
        &self,
        peer: &str,
        file_hash: &str,
        index: u32,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

impl Directory for Registry {
    async fn lookup(&self, file_hash: &str) -> anyhow::Result<Option<QueryResponse>> {
        match self.query(file_hash) {
            Ok(snapshot) => Ok(Some(snapshot.to_response())),
            Err(RegistryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Upper bound on concurrent chunk fetches, clamped to at least 1
    pub max_in_flight: usize,
    /// Shuffle the peer list before assigning chunks
    pub shuffle_peers: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            shuffle_peers: false,
        }
    }
}

/// Downloads a file from its swarm with per-chunk failover.
///
/// The output only ever appears at its final path complete and verified.
/// Until then bytes go to a temporary file next to it, which is removed on
/// any failure and when the download future is dropped.
pub struct Orchestrator<D, F> {
    directory: D,
    fetcher: Arc<F>,
    options: DownloadOptions,
}

type FetchOutcome = (Assignment, Result<Bytes, FetchError>);

/// How far past the write position fetches may run, per fetch slot.
/// Bounds the chunks held in memory while an early chunk is slow.
const WINDOW_PER_SLOT: u32 = 4;

impl<D: Directory, F: ChunkFetcher> Orchestrator<D, F> {
    pub fn new(directory: D, fetcher: F, options: DownloadOptions) -> Self {
        Self {
            directory,
            fetcher: Arc::new(fetcher),
            options,
        }
    }

    /// Download `file_hash` to `output_path`, returning the bytes written
    #[instrument(skip(self, output_path), fields(output = %output_path.display()))]
    pub async fn download(&self, file_hash: &str, output_path: &Path) -> Result<u64, DownloadError> {
        let file_hash = normalize_fingerprint(file_hash)?;

        let info = self
            .directory
            .lookup(&file_hash)
            .await
            .map_err(DownloadError::Tracker)?
            .ok_or_else(|| DownloadError::UnknownFile(file_hash.clone()))?;

        if info.peers.is_empty() {
            return Err(DownloadError::NoPeersAvailable(file_hash));
        }

        let record = FileRecord::new(file_hash.clone(), info.file_size, info.chunk_size);
        if info.chunk_size == 0 || record.chunk_count() != info.num_chunks {
            return Err(DownloadError::Tracker(anyhow!(
                "Inconsistent layout for {}: {} bytes, {} chunks of {} bytes",
                file_hash,
                info.file_size,
                info.num_chunks,
                info.chunk_size
            )));
        }

        let mut peers = info.peers;
        if self.options.shuffle_peers {
            peers.shuffle(&mut rand::rng());
        }

        info!(
            file_hash = %file_hash,
            file_size = record.size,
            num_chunks = info.num_chunks,
            peers = peers.len(),
            "Starting download"
        );

        let dir = match output_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        tokio::fs::create_dir_all(dir).await?;

        let (file, temp_path) = tempfile::Builder::new()
            .prefix(".chunkswarm-")
            .suffix(".part")
            .tempfile_in(dir)?
            .into_parts();
        let mut writer = OrderedWriter::new(tokio::fs::File::from_std(file));

        let mut session = DownloadSession::new(peers, info.num_chunks);
        // Dropping the set aborts every outstanding fetch
        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
        let max_in_flight = self.options.max_in_flight.max(1);
        let window = u32::try_from(max_in_flight)
            .unwrap_or(u32::MAX)
            .saturating_mul(WINDOW_PER_SLOT);

        loop {
            while tasks.len() < max_in_flight {
                // The chunk at the write position is always in flight or
                // inside the window, so this never stalls the pool
                match session.peek_index() {
                    Some(index) if index.saturating_sub(writer.next_index()) < window => {}
                    _ => break,
                }
                let Some(assignment) = session.next_assignment() else {
                    break;
                };
                let expected = record
                    .chunk_len(assignment.index)
                    .ok_or(DownloadError::ChunkUnavailable(assignment.index))?;
                self.spawn_fetch(&mut tasks, &session, &file_hash, assignment, expected);
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (assignment, result) = joined.map_err(std::io::Error::other)?;

            match result {
                Ok(data) => {
                    session.record_success(assignment.index);
                    writer.accept(assignment.index, data).await?;
                    debug!(
                        index = assignment.index,
                        completed = session.completed(),
                        written_through = writer.next_index(),
                        held = writer.held(),
                        "Chunk received"
                    );
                }
                Err(e) => {
                    warn!(
                        index = assignment.index,
                        peer = %session.peer(assignment.peer),
                        error = %e,
                        "Chunk fetch failed"
                    );
                    match session.record_failure(assignment.index, assignment.peer) {
                        Some(next) => {
                            debug!(index = assignment.index, peer = %session.peer(next), "Retrying chunk");
                        }
                        None => return Err(DownloadError::ChunkUnavailable(assignment.index)),
                    }
                }
            }
        }

        if !session.is_complete() {
            return Err(DownloadError::ChunkUnavailable(writer.next_index()));
        }

        let (actual, written) = writer.finish().await?;
        if actual != file_hash {
            warn!(expected = %file_hash, actual = %actual, "Assembled file failed verification");
            return Err(DownloadError::IntegrityFailure {
                expected: file_hash,
                actual,
            });
        }

        temp_path.persist(output_path).map_err(|e| e.error)?;

        info!(file_hash = %file_hash, bytes = written, "Download complete");
        Ok(written)
    }

    fn spawn_fetch(
        &self,
        tasks: &mut JoinSet<FetchOutcome>,
        session: &DownloadSession,
        file_hash: &str,
        assignment: Assignment,
        expected: u64,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let peer = session.peer(assignment.peer).to_string();
        let file_hash = file_hash.to_string();

        tasks.spawn(async move {
            let result = fetcher
                .fetch_chunk(&peer, &file_hash, assignment.index)
                .await
                .and_then(|data| {
                    if data.len() as u64 == expected {
                        Ok(data)
                    } else {
                        Err(FetchError::LengthMismatch {
                            expected,
                            actual: data.len() as u64,
                        })
                    }
                });
            (assignment, result)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::chunker;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const CHUNK_SIZE: u64 = 100;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    struct FakeDirectory(Option<QueryResponse>);

    impl Directory for FakeDirectory {
        async fn lookup(&self, _file_hash: &str) -> anyhow::Result<Option<QueryResponse>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        data: Vec<u8>,
        /// (peer, chunk) pairs that fail
        failing: HashSet<(String, u32)>,
        /// Peers whose chunks come back with one byte flipped
        corrupt: HashSet<String>,
        /// Peers whose chunks come back one byte short
        truncate: HashSet<String>,
        /// Peers that never answer
        hang: HashSet<String>,
        /// Chunk answered only after a delay
        slow: Option<(u32, Duration)>,
        /// Fetches started by the time the slow chunk was answered
        started_before_slow: Mutex<Option<usize>>,
        calls: Mutex<Vec<(String, u32)>>,
    }

    impl FakeFetcher {
        fn new(data: &[u8]) -> Self {
            Self {
                data: data.to_vec(),
                ..Self::default()
            }
        }

        fn fail(mut self, peer: &str, index: u32) -> Self {
            self.failing.insert((peer.to_string(), index));
            self
        }
    }

    impl ChunkFetcher for FakeFetcher {
        async fn fetch_chunk(&self, peer: &str, _file_hash: &str, index: u32) -> Result<Bytes, FetchError> {
            self.calls.lock().unwrap().push((peer.to_string(), index));

            if self.hang.contains(peer) {
                std::future::pending::<()>().await;
            }
            if let Some((slow_index, delay)) = self.slow {
                if slow_index == index {
                    tokio::time::sleep(delay).await;
                    let started = self.calls.lock().unwrap().len();
                    *self.started_before_slow.lock().unwrap() = Some(started);
                }
            }
            if self.failing.contains(&(peer.to_string(), index)) {
                return Err(FetchError::Transport("connection refused".to_string()));
            }

            let start = (index as u64 * CHUNK_SIZE) as usize;
            let end = (start + CHUNK_SIZE as usize).min(self.data.len());
            let mut chunk = self.data[start..end].to_vec();

            if self.corrupt.contains(peer) {
                chunk[0] ^= 0xff;
            }
            if self.truncate.contains(peer) {
                chunk.pop();
            }

            Ok(Bytes::from(chunk))
        }
    }

    fn directory_for(data: &[u8], peers: &[&str]) -> FakeDirectory {
        let record = FileRecord::new(chunker::fingerprint(data), data.len() as u64, CHUNK_SIZE);
        FakeDirectory(Some(QueryResponse {
            peers: peers.iter().map(|p| p.to_string()).collect(),
            file_size: record.size,
            num_chunks: record.chunk_count(),
            chunk_size: CHUNK_SIZE,
        }))
    }

    fn orchestrator(directory: FakeDirectory, fetcher: FakeFetcher) -> Orchestrator<FakeDirectory, FakeFetcher> {
        Orchestrator::new(
            directory,
            fetcher,
            DownloadOptions {
                max_in_flight: 2,
                shuffle_peers: false,
            },
        )
    }

    fn dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_download_success() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(250);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let orch = orchestrator(directory_for(&data, &["a", "b"]), FakeFetcher::new(&data));
        let written = orch.download(&hash, &output).await.unwrap();

        assert_eq!(written, 250);
        assert_eq!(std::fs::read(&output).unwrap(), data);
        // Only the output remains
        assert_eq!(dir_entries(temp_dir.path()), 1);

        let mut calls = orch.fetcher.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![("a".to_string(), 0), ("a".to_string(), 2), ("b".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_failover_to_next_peer() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(300);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let fetcher = FakeFetcher::new(&data).fail("a", 0);
        let orch = orchestrator(directory_for(&data, &["a", "b", "c"]), fetcher);

        orch.download(&hash, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), data);

        let calls = orch.fetcher.calls.lock().unwrap().clone();
        assert!(calls.contains(&("a".to_string(), 0)));
        assert!(calls.contains(&("b".to_string(), 0)));
    }

    #[tokio::test]
    async fn test_every_peer_failing_is_chunk_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(50);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let fetcher = FakeFetcher::new(&data).fail("a", 0).fail("b", 0).fail("c", 0);
        let orch = orchestrator(directory_for(&data, &["a", "b", "c"]), fetcher);

        let err = orch.download(&hash, &output).await.unwrap_err();
        assert!(matches!(err, DownloadError::ChunkUnavailable(0)));
        assert!(!output.exists());
        assert_eq!(dir_entries(temp_dir.path()), 0);
        assert_eq!(orch.fetcher.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_integrity_failure() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(250);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let mut fetcher = FakeFetcher::new(&data);
        fetcher.corrupt.insert("a".to_string());
        let orch = orchestrator(directory_for(&data, &["a"]), fetcher);

        let err = orch.download(&hash, &output).await.unwrap_err();
        assert!(matches!(err, DownloadError::IntegrityFailure { .. }));
        assert_eq!(dir_entries(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_short_chunk_fails_over() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(250);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let mut fetcher = FakeFetcher::new(&data);
        fetcher.truncate.insert("a".to_string());
        let orch = orchestrator(directory_for(&data, &["a", "b"]), fetcher);

        orch.download(&hash, &output).await.unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), data);
    }

    #[tokio::test]
    async fn test_unknown_file() {
        let temp_dir = TempDir::new().unwrap();
        let orch = orchestrator(FakeDirectory(None), FakeFetcher::default());

        let err = orch
            .download(&"0".repeat(40), &temp_dir.path().join("out.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::UnknownFile(_)));
    }

    #[tokio::test]
    async fn test_empty_swarm_is_no_peers_available() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(10);
        let hash = chunker::fingerprint(&data);

        let orch = orchestrator(directory_for(&data, &[]), FakeFetcher::new(&data));
        let err = orch.download(&hash, &temp_dir.path().join("out.bin")).await.unwrap_err();

        assert!(matches!(err, DownloadError::NoPeersAvailable(_)));
        assert_eq!(dir_entries(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_malformed_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let orch = orchestrator(FakeDirectory(None), FakeFetcher::default());

        let err = orch.download("not-a-hash", &temp_dir.path().join("out.bin")).await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidFingerprint(_)));
    }

    #[tokio::test]
    async fn test_cancelled_download_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(250);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let mut fetcher = FakeFetcher::new(&data);
        fetcher.hang.insert("b".to_string());
        let orch = orchestrator(directory_for(&data, &["a", "b"]), fetcher);

        let result = tokio::time::timeout(Duration::from_millis(100), orch.download(&hash, &output)).await;
        assert!(result.is_err());
        assert_eq!(dir_entries(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_single_in_flight_still_completes() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(1000);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("nested").join("out.bin");

        let fetcher = FakeFetcher::new(&data).fail("a", 3).fail("b", 4);
        let orch = Orchestrator::new(
            directory_for(&data, &["a", "b"]),
            fetcher,
            DownloadOptions {
                max_in_flight: 0,
                shuffle_peers: true,
            },
        );

        assert_eq!(orch.download(&hash, &output).await.unwrap(), 1000);
        assert_eq!(std::fs::read(&output).unwrap(), data);
    }

    #[tokio::test]
    async fn test_slow_first_chunk_bounds_read_ahead() {
        let temp_dir = TempDir::new().unwrap();
        let data = sample(100_000);
        let hash = chunker::fingerprint(&data);
        let output = temp_dir.path().join("out.bin");

        let mut fetcher = FakeFetcher::new(&data);
        fetcher.slow = Some((0, Duration::from_millis(200)));
        let orch = orchestrator(directory_for(&data, &["a", "b"]), fetcher);

        assert_eq!(orch.download(&hash, &output).await.unwrap(), 100_000);
        assert_eq!(std::fs::read(&output).unwrap(), data);

        // 1000 chunks, 2 fetch slots: only the window past chunk 0 was fetched
        let started = orch.fetcher.started_before_slow.lock().unwrap().unwrap();
        assert!(started <= (2 * WINDOW_PER_SLOT) as usize, "read ahead {} chunks", started);
        assert_eq!(orch.fetcher.calls.lock().unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_registry_as_directory() {
        let registry = Registry::new();
        let hash = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
        registry.register(hash, "10.0.0.1:5001", 2_621_440, 1024 * 1024).unwrap();

        let found = registry.lookup(hash).await.unwrap().unwrap();
        assert_eq!(found.num_chunks, 3);
        assert!(registry.lookup(&"0".repeat(40)).await.unwrap().is_none());
    }
}
