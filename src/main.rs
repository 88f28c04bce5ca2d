use anyhow::{Context, Result};
use chunkswarm::core::config::TrackerConfig;
use chunkswarm::core::routes::build_router;
use chunkswarm::core::server::{self, shutdown_signal};
use chunkswarm::core::startup::{restore_from_wal, spawn_cleanup_task};
use chunkswarm::core::state::AppState;
use chunkswarm::core::tracing_init::init_tracing;
use chunkswarm::wal::wal::Wal;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("tracker.toml")
    };

    // A missing default config means all defaults; an explicit path must exist
    let config = if args.len() > 1 || config_path.exists() {
        TrackerConfig::from_file(&config_path).context(format!(
            "Failed to load configuration from '{}'. \
            See tracker.example.toml for the available settings.",
            config_path.display()
        ))?
    } else {
        TrackerConfig::default()
    };

    init_tracing(&config.logging)?;

    // Build Tokio runtime with configured number of threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.num_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path))
}

async fn async_main(config: TrackerConfig, config_path: PathBuf) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        bind = %config.server.bind,
        port = config.server.port,
        num_threads = config.server.num_threads,
        default_chunk_size = config.registry.default_chunk_size,
        log_level = %config.logging.level,
        log_format = %config.logging.format,
        "Tracker starting"
    );

    let wal = match &config.registry.wal_path {
        Some(path) => {
            let wal = Wal::new(path.clone()).context("Failed to initialize WAL")?;
            info!(wal_path = %path.display(), "WAL initialized");
            Some(wal)
        }
        None => {
            info!("No wal_path configured, registry is in-memory only");
            None
        }
    };

    let state = AppState::new(config.clone(), wal);
    restore_from_wal(&state)?;

    if let Some(peer_timeout) = config.registry.peer_timeout {
        spawn_cleanup_task(
            Arc::clone(&state.registry),
            state.wal.clone(),
            config.registry.cleanup_interval,
            peer_timeout,
        );

        info!(
            cleanup_interval_seconds = config.registry.cleanup_interval,
            peer_timeout_seconds = peer_timeout,
            "Peer cleanup task started"
        );
    }

    info!(
        files = state.registry.file_count(),
        peers = state.registry.total_peers(),
        "Tracker startup complete"
    );

    let listener = server::bind(&config.server.bind, config.server.port).await?;
    server::run(listener, build_router(Arc::new(state)), shutdown_signal()).await?;

    info!("Shutting down gracefully");

    Ok(())
}
