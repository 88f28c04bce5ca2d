use crate::validation::params::ValidatedRegistration;
use anyhow::{anyhow, bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// WAL operation types
#[derive(Debug, Clone, PartialEq)]
pub enum WalOperation {
    Register {
        file_hash: String,
        file_size: u64,
        chunk_size: u64,
        peer_address: String,
    },
    Expire {
        file_hash: String,
        peer_address: String,
    },
}

impl WalOperation {
    pub fn register(registration: &ValidatedRegistration) -> Self {
        WalOperation::Register {
            file_hash: registration.file_hash.clone(),
            file_size: registration.file_size,
            chunk_size: registration.chunk_size,
            peer_address: registration.peer_address.clone(),
        }
    }

    // Addresses go last so splitn keeps them intact
    fn to_line(&self) -> String {
        match self {
            WalOperation::Register {
                file_hash,
                file_size,
                chunk_size,
                peer_address,
            } => format!("REGISTER|{}|{}|{}|{}", file_hash, file_size, chunk_size, peer_address),
            WalOperation::Expire {
                file_hash,
                peer_address,
            } => format!("EXPIRE|{}|{}", file_hash, peer_address),
        }
    }

    fn from_line(line: &str) -> Result<Self> {
        let (op, rest) = line.split_once('|').context("Missing operation type")?;

        match op {
            "REGISTER" => {
                let parts: Vec<&str> = rest.splitn(4, '|').collect();
                if parts.len() != 4 {
                    bail!("Invalid REGISTER format");
                }
                let file_size = parts[1].parse::<u64>().context("Invalid file_size")?;
                let chunk_size = parts[2].parse::<u64>().context("Invalid chunk_size")?;

                Ok(WalOperation::Register {
                    file_hash: parts[0].to_string(),
                    file_size,
                    chunk_size,
                    peer_address: parts[3].to_string(),
                })
            }
            "EXPIRE" => {
                let (file_hash, peer_address) = rest.split_once('|').context("Invalid EXPIRE format")?;

                Ok(WalOperation::Expire {
                    file_hash: file_hash.to_string(),
                    peer_address: peer_address.to_string(),
                })
            }
            _ => bail!("Unknown operation type"),
        }
    }
}

/// Append-only log of registry changes, replayed on startup
pub struct Wal {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl Wal {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open WAL file")?;

        Ok(Wal {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn log_operation(&self, op: WalOperation) -> Result<()> {
        let line = op.to_line();
        let mut file = self.file.lock().map_err(|_| anyhow!("WAL lock poisoned"))?;
        writeln!(file, "{}", line).context("Failed to write to WAL")?;
        file.flush().context("Failed to flush WAL")?;
        Ok(())
    }

    pub fn replay(&self) -> Result<Vec<WalOperation>> {
        let file = File::open(&self.path).context("Failed to open WAL for replay")?;
        let reader = BufReader::new(file);
        let mut operations = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from WAL")?;
            let line = line.trim();

            // Skip empty lines
            if line.is_empty() {
                continue;
            }

            match WalOperation::from_line(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse WAL line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }

    /// Replace the log's contents with `operations`
    pub fn compact(&self, operations: &[WalOperation]) -> Result<()> {
        let mut file = self.file.lock().map_err(|_| anyhow!("WAL lock poisoned"))?;
        file.set_len(0).context("Failed to truncate WAL")?;

        for op in operations {
            writeln!(file, "{}", op.to_line()).context("Failed to write to WAL")?;
        }

        file.flush().context("Failed to flush WAL after compaction")?;
        file.sync_all().context("Failed to sync WAL after compaction")?;
        Ok(())
    }
}
