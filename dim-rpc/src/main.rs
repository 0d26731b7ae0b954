//! DIM RPC Gateway
//!
//! Serves wallet creation, transfer signing and broadcasting for the NEM
//! mainnet, testnet and mijin networks.

use anyhow::{Context, Result};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dim_rpc::{
    config::Config,
    rpc::{start_rpc_server, HostFilter, RpcState},
    Gateway, NetworkRegistry, NodeClient, Vault,
};

#[derive(Parser)]
#[command(name = "dim-rpc")]
#[command(about = "RPC gateway for NEM wallets and DIM mosaic transfers")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Allow connections from any host (insecure)
    #[arg(long)]
    allow_remote: bool,

    /// Allow an address in addition to localhost; `*` matches one segment,
    /// e.g. 192.168.178.* or 10.0.*.*
    #[arg(long = "allow", value_name = "ADDRESS")]
    allow: Vec<String>,

    /// Config file (default: ~/.dim-rpc/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Vault file path
    #[arg(long)]
    vault: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.allow_remote {
        config.server.allow_remote = true;
    }
    config.server.allow.extend(cli.allow);
    if let Some(vault) = cli.vault {
        config.vault.path = Some(vault);
    }

    if config.server.allow_remote {
        warn!("dim-rpc allows remote connections, this is potentially insecure!");
    }

    let vault_path = config.vault_path();
    let vault = Vault::open(&vault_path)
        .with_context(|| format!("Failed to open vault at {}", vault_path.display()))?;
    info!("Vault: {}", vault_path.display());

    let registry = NetworkRegistry::default().with_peer_overrides(&config.peer_overrides());
    let client = NodeClient::new(config.node_timeout())?;
    let gateway = Gateway::new(registry, client, vault, config.bip38_params())
        .with_default_currency(&config.node.default_currency);

    let filter = HostFilter::new(config.server.allow_remote, &config.server.allow);
    let state = Arc::new(RpcState::new(gateway, filter));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    start_rpc_server(addr, state).await
}
