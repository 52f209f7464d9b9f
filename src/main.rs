//! `olaf-relay` — a federated end-to-end-encrypted chat relay.
//!
//! A relay accepts client connections and maintains links to a static set
//! of neighbour relays (§3's "neighbourhood"), forwarding directed and
//! broadcast chat frames between them without ever being able to read their
//! contents. See `SPEC_FULL.md` for the wire protocol and the module layout
//! this binary wires together: codec, connection, registry, router, and
//! this file's supervisor.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use olaf_relay::config::{Cli, RelayConfig};
use olaf_relay::crypto::RsaCrypto;
use olaf_relay::supervisor::Relay;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::from_cli(cli);
    let server_name = config.server_name();

    let relay = Relay::boot(config, Arc::new(RsaCrypto)).await?;
    tracing::info!(relay = %server_name, "olaf-relay started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    relay.shutdown().await;

    Ok(())
}
