use crate::chunking::chunker::DEFAULT_CHUNK_SIZE;
use crate::validation::params::parse_peer_address;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration of the tracker binary
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default = "default_tracker_logging")]
    pub logging: LoggingConfig,
}

/// Configuration of the peer binary
#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    #[serde(default)]
    pub peer: PeerSection,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default = "default_peer_logging")]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_tracker_port")]
    pub port: u16,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Chunk size assumed when a registration only carries `num_chunks`
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: u64,
    #[serde(default = "default_file_capacity")]
    pub file_capacity: usize,
    /// Write-ahead log location; no persistence when absent
    #[serde(default)]
    pub wal_path: Option<PathBuf>,
    /// Seconds after which a peer that has not re-registered is dropped
    #[serde(default)]
    pub peer_timeout: Option<i64>,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerSection {
    #[serde(default = "default_tracker_url")]
    pub tracker_url: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_peer_port")]
    pub listen_port: u16,
    /// Address registered with the tracker; discovered when absent
    #[serde(default)]
    pub advertise_address: Option<String>,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub tracker_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_shuffle_peers")]
    pub shuffle_peers: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

// Default value functions
fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_tracker_port() -> u16 {
    5000
}

fn default_peer_port() -> u16 {
    5001
}

fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_file_capacity() -> usize {
    10_000
}

fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

fn default_tracker_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("chunks")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_in_flight() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shuffle_peers() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

fn default_tracker_logging() -> LoggingConfig {
    LoggingConfig::default()
}

fn default_peer_logging() -> LoggingConfig {
    LoggingConfig {
        format: "console".to_string(),
        ..LoggingConfig::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_tracker_port(),
            num_threads: default_num_threads(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: default_chunk_size(),
            file_capacity: default_file_capacity(),
            wal_path: None,
            peer_timeout: None,
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl Default for PeerSection {
    fn default() -> Self {
        Self {
            tracker_url: default_tracker_url(),
            bind: default_bind(),
            listen_port: default_peer_port(),
            advertise_address: None,
            storage_dir: default_storage_dir(),
            chunk_size: default_chunk_size(),
            tracker_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_in_flight: default_max_in_flight(),
            fetch_timeout_secs: default_request_timeout_secs(),
            shuffle_peers: default_shuffle_peers(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            registry: RegistryConfig::default(),
            logging: default_tracker_logging(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            peer: PeerSection::default(),
            download: DownloadConfig::default(),
            logging: default_peer_logging(),
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).context(format!("Failed to read config file: {}", path.display()))
}

impl TrackerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::parse(&read_file(path)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: TrackerConfig = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("Server port must be greater than 0");
        }

        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if self.registry.default_chunk_size == 0 {
            bail!("default_chunk_size must be greater than 0");
        }

        if self.registry.file_capacity == 0 {
            bail!("file_capacity must be greater than 0");
        }

        if self.registry.cleanup_interval == 0 {
            bail!("cleanup_interval must be greater than 0");
        }

        if let Some(peer_timeout) = self.registry.peer_timeout {
            // Validate that peer_timeout is greater than cleanup_interval
            if peer_timeout <= self.registry.cleanup_interval as i64 {
                bail!(
                    "peer_timeout ({}) must be greater than cleanup_interval ({})",
                    peer_timeout,
                    self.registry.cleanup_interval
                );
            }
        }

        self.logging.validate()
    }
}

impl PeerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::parse(&read_file(path)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: PeerConfig = toml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.peer.tracker_url.starts_with("http://") && !self.peer.tracker_url.starts_with("https://") {
            bail!("tracker_url must be an http(s) URL, got '{}'", self.peer.tracker_url);
        }

        if self.peer.listen_port == 0 {
            bail!("listen_port must be greater than 0");
        }

        if let Some(address) = &self.peer.advertise_address {
            parse_peer_address(address).context("Invalid advertise_address")?;
        }

        if self.peer.chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }

        if self.peer.tracker_timeout_secs == 0 {
            bail!("tracker_timeout_secs must be greater than 0");
        }

        if self.download.max_in_flight == 0 {
            bail!("max_in_flight must be greater than 0");
        }

        if self.download.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be greater than 0");
        }

        self.logging.validate()
    }
}

impl LoggingConfig {
    pub fn is_console(&self) -> bool {
        self.console || self.format == "console"
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.format
            );
        }

        Ok(())
    }
}
