use crate::core::error::ValidationError;
use crate::models::file_record::{chunk_count, FileRecord};
use crate::utils::hex::bytes_to_hex;
use sha1::{Digest, Sha1};

/// Chunk size used when none is configured (1 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// One contiguous slice of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: u32,
    pub data: &'a [u8],
}

/// Result of splitting a file: its fingerprint and ordered chunks
#[derive(Debug)]
pub struct SplitFile<'a> {
    pub fingerprint: String,
    pub chunk_size: u64,
    pub chunks: Vec<Chunk<'a>>,
}

impl SplitFile<'_> {
    pub fn size(&self) -> u64 {
        self.chunks.iter().map(|c| c.data.len() as u64).sum()
    }

    /// Registry metadata for the split file
    pub fn record(&self) -> FileRecord {
        FileRecord::new(self.fingerprint.clone(), self.size(), self.chunk_size)
    }
}

/// SHA-1 of the whole content, lowercase hex
pub fn fingerprint(bytes: &[u8]) -> String {
    bytes_to_hex(&Sha1::digest(bytes))
}

/// Split `bytes` into `chunk_size` slices, the last one possibly shorter.
///
/// Empty input yields zero chunks; rejecting empty files is up to the caller.
pub fn split(bytes: &[u8], chunk_size: u64) -> Result<SplitFile<'_>, ValidationError> {
    if chunk_size == 0 {
        return Err(ValidationError::OutOfRange("chunk_size must be greater than 0".to_string()));
    }

    let count = chunk_count(bytes.len() as u64, chunk_size);
    if count > u32::MAX as u64 {
        return Err(ValidationError::OutOfRange(format!(
            "{} bytes in {}-byte chunks exceeds the maximum chunk count",
            bytes.len(),
            chunk_size
        )));
    }

    // chunk_size can exceed usize on 32-bit targets; any such size is one chunk
    let step = usize::try_from(chunk_size).unwrap_or(usize::MAX);
    let chunks = bytes
        .chunks(step)
        .enumerate()
        .map(|(index, data)| Chunk {
            index: index as u32,
            data,
        })
        .collect();

    Ok(SplitFile {
        fingerprint: fingerprint(bytes),
        chunk_size,
        chunks,
    })
}

/// Concatenate chunks in index order
pub fn reassemble(chunks: &[Chunk<'_>]) -> Vec<u8> {
    let mut ordered: Vec<&Chunk<'_>> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);

    let total = ordered.iter().map(|c| c.data.len()).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in ordered {
        out.extend_from_slice(chunk.data);
    }
    out
}
