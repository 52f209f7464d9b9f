//! Thin entry point for the file-upload sidecar (EXPANSION §E5). The actual
//! HTTP surface lives in `olaf_relay::sidecar` so it can be unit tested
//! without a socket; this binary only wires up CLI flags and logging.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "olaf-file-sidecar", about = "File-upload sidecar for an OLAF relay")]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "SIDECAR_BIND_ADDRESS", default_value = "0.0.0.0:8001")]
    bind_address: SocketAddr,

    /// Base URL advertised in upload responses, e.g. `http://localhost:8001`.
    #[arg(long, env = "SIDECAR_PUBLIC_BASE_URL")]
    public_base_url: String,

    /// Directory uploaded files are stored in.
    #[arg(long, env = "SIDECAR_UPLOAD_DIR", default_value = "files")]
    upload_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    olaf_relay::sidecar::serve(cli.bind_address, cli.upload_dir, cli.public_base_url).await?;
    Ok(())
}
