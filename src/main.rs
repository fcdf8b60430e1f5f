use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::task::JoinError;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ava_chain::config::NodeConfig;
use ava_chain::crypto::{generate_keypair, save_keypair};
use ava_chain::errors::ChainResult;
use ava_chain::node::Node;

#[derive(Parser)]
#[command(author, version, about = "Stake-weighted polling finality node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the node using the provided configuration file
    Start {
        #[arg(short, long, default_value = "config/node.toml")]
        config: PathBuf,
    },
    /// Generate a default node configuration file
    GenerateConfig {
        #[arg(short, long, default_value = "config/node.toml")]
        path: PathBuf,
    },
    /// Generate a new Ed25519 session key
    Keygen {
        #[arg(short, long, default_value = "keys/session.toml")]
        path: PathBuf,
    },
    /// Load a configuration file strictly and report any problem
    CheckConfig {
        #[arg(short, long, default_value = "config/node.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => start_node(config).await?,
        Commands::GenerateConfig { path } => generate_config(path)?,
        Commands::Keygen { path } => keygen(path)?,
        Commands::CheckConfig { config } => check_config(config)?,
    }

    Ok(())
}

async fn start_node(config_path: PathBuf) -> Result<()> {
    let config = if config_path.exists() {
        NodeConfig::load(&config_path)?
    } else {
        let config = NodeConfig::default();
        config.save(&config_path)?;
        config
    };

    let node = Node::new(config)?;
    let (handle, node_task) = node.start();

    tokio::select! {
        res = node_task => return handle_join(res),
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    handle.shutdown().await?;
    Ok(())
}

fn generate_config(path: PathBuf) -> Result<()> {
    let config = NodeConfig::default();
    config.ensure_directories()?;
    config.save(&path)?;
    info!(?path, "wrote default configuration");
    Ok(())
}

fn keygen(path: PathBuf) -> Result<()> {
    let keypair = generate_keypair();
    save_keypair(&path, &keypair)?;
    info!(
        ?path,
        public_key = %hex::encode(keypair.verifying_key().to_bytes()),
        "generated session key"
    );
    Ok(())
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = NodeConfig::load(&path)?;
    info!(
        ?path,
        data_dir = %config.data_dir.display(),
        confidence_threshold = config.avalanche.confidence_threshold,
        min_quorum_stake = config.avalanche.min_quorum_stake,
        persist_peers = config.avalanche.persist_peers,
        "configuration is valid"
    );
    Ok(())
}

fn handle_join(result: Result<ChainResult<()>, JoinError>) -> Result<()> {
    let inner = result?;
    inner?;
    Ok(())
}
