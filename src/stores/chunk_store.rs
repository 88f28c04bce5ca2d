use crate::chunking::chunker;
use crate::models::file_record::FileRecord;
use crate::utils::hex::normalize_fingerprint;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MANIFEST_EXTENSION: &str = "json";

/// On-disk store of published chunks.
///
/// Layout: `{dir}/{file_hash}_{index}` per chunk and `{dir}/{file_hash}.json`
/// holding the file's [`FileRecord`]. Blobs are written once and never
/// modified, so reads take no locks.
pub struct ChunkStore {
    dir: PathBuf,
    records: DashMap<String, FileRecord>,
}

impl ChunkStore {
    /// Open (creating if needed) a store and index every manifest in it
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .context(format!("Failed to create chunk store directory {}", dir.display()))?;

        let store = Self {
            dir,
            records: DashMap::new(),
        };
        store.load_manifests().await?;

        Ok(store)
    }

    async fn load_manifests(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .context(format!("Failed to read chunk store directory {}", self.dir.display()))?;

        while let Some(entry) = entries.next_entry().await.context("Failed to list chunk store")? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
                continue;
            }

            match read_manifest(&path).await {
                Ok(record) => {
                    debug!(file_hash = %record.fingerprint, "Loaded chunk manifest");
                    self.records.insert(record.fingerprint.clone(), record);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable manifest");
                }
            }
        }

        Ok(())
    }

    /// Chunk a local file into the store and return its record.
    ///
    /// Re-importing content that is already stored is a no-op.
    pub async fn import(&self, path: &Path, chunk_size: u64) -> Result<FileRecord> {
        let bytes = tokio::fs::read(path)
            .await
            .context(format!("Failed to read {}", path.display()))?;

        if bytes.is_empty() {
            bail!("Cannot publish empty file {}", path.display());
        }

        let split = chunker::split(&bytes, chunk_size).context("Failed to split file")?;
        let record = split.record();

        if let Some(existing) = self.get(&record.fingerprint) {
            if existing.same_layout(record.size, record.chunk_size) {
                debug!(file_hash = %record.fingerprint, "File already in chunk store");
                return Ok(existing);
            }
            bail!(
                "File {} is already stored with {}-byte chunks",
                record.fingerprint,
                existing.chunk_size
            );
        }

        for chunk in &split.chunks {
            let target = self.chunk_path(&record.fingerprint, chunk.index);
            write_atomic(&target, chunk.data).await?;
        }

        let manifest = serde_json::to_vec_pretty(&record).context("Failed to serialize manifest")?;
        write_atomic(&self.manifest_path(&record.fingerprint), &manifest).await?;

        self.records.insert(record.fingerprint.clone(), record.clone());

        info!(
            file_hash = %record.fingerprint,
            file_size = record.size,
            num_chunks = record.chunk_count(),
            "File imported into chunk store"
        );

        Ok(record)
    }

    /// Read one chunk, `None` if the file or index is unknown locally
    pub async fn read_chunk(&self, file_hash: &str, index: u32) -> Result<Option<Bytes>> {
        let Ok(file_hash) = normalize_fingerprint(file_hash) else {
            return Ok(None);
        };

        let Some(expected_len) = self.get(&file_hash).and_then(|r| r.chunk_len(index)) else {
            return Ok(None);
        };

        let path = self.chunk_path(&file_hash, index);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(file_hash = %file_hash, index, "Chunk listed in manifest but missing on disk");
                return Ok(None);
            }
            Err(e) => return Err(e).context(format!("Failed to read chunk {}", path.display())),
        };

        if data.len() as u64 != expected_len {
            bail!(
                "Chunk {} of {} is corrupt: {} bytes on disk, expected {}",
                index,
                file_hash,
                data.len(),
                expected_len
            );
        }

        Ok(Some(Bytes::from(data)))
    }

    pub fn get(&self, file_hash: &str) -> Option<FileRecord> {
        self.records.get(file_hash).map(|entry| entry.value().clone())
    }

    /// Every stored file
    pub fn records(&self) -> Vec<FileRecord> {
        self.records.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn chunk_path(&self, file_hash: &str, index: u32) -> PathBuf {
        self.dir.join(format!("{}_{}", file_hash, index))
    }

    fn manifest_path(&self, file_hash: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_hash, MANIFEST_EXTENSION))
    }
}

async fn read_manifest(path: &Path) -> Result<FileRecord> {
    let content = tokio::fs::read(path).await.context("Failed to read manifest")?;
    let record: FileRecord = serde_json::from_slice(&content).context("Failed to parse manifest")?;

    let fingerprint = normalize_fingerprint(&record.fingerprint).context("Invalid file_hash in manifest")?;
    if record.size == 0 || record.chunk_size == 0 {
        bail!("Manifest for {} has an empty layout", fingerprint);
    }

    Ok(FileRecord::new(fingerprint, record.size, record.chunk_size))
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data)
        .await
        .context(format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .context(format!("Failed to move {} into place", path.display()))?;
    Ok(())
}
