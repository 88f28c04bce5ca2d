use serde::{Deserialize, Serialize};

/// Metadata of a published file, keyed by its fingerprint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Lowercase hex SHA-1 of the whole file
    #[serde(rename = "file_hash")]
    pub fingerprint: String,
    /// Total size in bytes
    #[serde(rename = "file_size")]
    pub size: u64,
    /// Size of every chunk except possibly the last
    pub chunk_size: u64,
}

impl FileRecord {
    pub fn new(fingerprint: String, size: u64, chunk_size: u64) -> Self {
        Self {
            fingerprint,
            size,
            chunk_size,
        }
    }

    /// Number of chunks, always derived from `size` and `chunk_size`
    pub fn chunk_count(&self) -> u32 {
        chunk_count(self.size, self.chunk_size) as u32
    }

    /// Byte offset of chunk `index` within the file
    pub fn chunk_offset(&self, index: u32) -> u64 {
        index as u64 * self.chunk_size
    }

    /// Expected length of chunk `index`, `None` when out of range
    pub fn chunk_len(&self, index: u32) -> Option<u64> {
        if index >= self.chunk_count() {
            return None;
        }
        let offset = self.chunk_offset(index);
        Some((self.size - offset).min(self.chunk_size))
    }

    /// Whether another registration describes the same chunk layout
    pub fn same_layout(&self, size: u64, chunk_size: u64) -> bool {
        self.size == size && self.chunk_size == chunk_size
    }
}

/// ceil(size / chunk_size); zero when either side is zero
pub fn chunk_count(size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_chunk_layout_with_short_tail() {
        let record = FileRecord::new("a".repeat(40), 2_621_440, MIB);

        assert_eq!(record.chunk_count(), 3);
        assert_eq!(record.chunk_len(0), Some(MIB));
        assert_eq!(record.chunk_len(1), Some(MIB));
        assert_eq!(record.chunk_len(2), Some(MIB / 2));
        assert_eq!(record.chunk_len(3), None);
        assert_eq!(record.chunk_offset(2), 2 * MIB);
    }

    #[test]
    fn test_chunk_layout_exact_multiple() {
        let record = FileRecord::new("a".repeat(40), 4096, 1024);

        assert_eq!(record.chunk_count(), 4);
        assert_eq!(record.chunk_len(3), Some(1024));
    }

    #[test]
    fn test_chunk_count_edge_cases() {
        assert_eq!(chunk_count(0, 1024), 0);
        assert_eq!(chunk_count(1, 1024), 1);
        assert_eq!(chunk_count(1024, 0), 0);
        assert_eq!(chunk_count(1025, 1024), 2);
    }

    #[test]
    fn test_same_layout() {
        let record = FileRecord::new("a".repeat(40), 100, 10);
        assert!(record.same_layout(100, 10));
        assert!(!record.same_layout(101, 10));
        assert!(!record.same_layout(100, 20));
    }
}
