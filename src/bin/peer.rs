use anyhow::{Context, Result};
use chunkswarm::core::config::PeerConfig;
use chunkswarm::core::server::shutdown_signal;
use chunkswarm::core::tracing_init::init_tracing;
use chunkswarm::peer::node::PeerNode;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;

const DEFAULT_CONFIG: &str = "peer.toml";

/// Share files with a chunkswarm swarm and download from it
#[derive(Parser, Debug)]
#[command(name = "chunkswarm-peer", version, about)]
struct Cli {
    /// Peer configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk a file, register it with the tracker and serve it
    Register {
        /// File to publish
        path: PathBuf,
    },
    /// Fetch a file from its swarm and verify it
    Download {
        /// SHA-1 of the file, 40 hex characters
        file_hash: String,
        /// Output path, defaults to `{output_dir}/{file_hash}`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-advertise and serve every stored file
    Serve,
}

fn load_config(path: &Path) -> Result<PeerConfig> {
    if path.as_os_str() == DEFAULT_CONFIG && !path.exists() {
        return Ok(PeerConfig::default());
    }

    PeerConfig::from_file(path).context(format!(
        "Failed to load configuration from '{}'. \
        See peer.example.toml for the available settings.",
        path.display()
    ))
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config)?;
    init_tracing(&config.logging)?;

    let node = PeerNode::open(config).await?;

    match cli.command {
        Command::Register { path } => {
            let (listener, record) = node.bind_and_publish(&path).await?;
            println!("{}", record.fingerprint);

            info!(peer_address = %node.advertise_address(), "Serving chunks");
            node.serve_on(listener, shutdown_signal()).await
        }
        Command::Download { file_hash, output } => {
            let (path, written) = node.download(&file_hash, output).await?;
            println!("{} ({} bytes)", path.display(), written);
            Ok(())
        }
        Command::Serve => {
            let (listener, _) = node.bind_and_advertise().await?;

            info!(peer_address = %node.advertise_address(), "Serving chunks");
            node.serve_on(listener, shutdown_signal()).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
