use crate::utils::hex::bytes_to_hex;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Writes chunks to the output strictly in index order.
///
/// Chunks arriving early are held until the gap before them fills. The
/// whole-file hash is updated as bytes reach the file.
pub struct OrderedWriter {
    file: File,
    hasher: Sha1,
    next: u32,
    held: BTreeMap<u32, Bytes>,
    written: u64,
}

impl OrderedWriter {
    pub fn new(file: File) -> Self {
        Self {
            file,
            hasher: Sha1::new(),
            next: 0,
            held: BTreeMap::new(),
            written: 0,
        }
    }

    pub async fn accept(&mut self, index: u32, data: Bytes) -> std::io::Result<()> {
        if index < self.next {
            return Ok(());
        }
        self.held.insert(index, data);

        while let Some(data) = self.held.remove(&self.next) {
            self.hasher.update(&data);
            self.file.write_all(&data).await?;
            self.written += data.len() as u64;
            self.next += 1;
        }

        Ok(())
    }

    /// Chunks written so far
    pub fn next_index(&self) -> u32 {
        self.next
    }

    /// Number of chunks received but not yet written
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Flush to disk and return the hex SHA-1 and byte count of what was written
    pub async fn finish(mut self) -> std::io::Result<(String, u64)> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok((bytes_to_hex(&self.hasher.finalize()), self.written))
    }
}
