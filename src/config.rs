//! Boot-time configuration (§6 "Configuration", EXPANSION §E4).
//!
//! Mirrors the `__main__` block of `original_source/server/OlafServer.py`:
//! `BIND_ADDRESS`, `HOST`, `WS_PORT`, `NEIGHBOURS` are read from the
//! environment, with `clap` flags layered on top so the same binary can be
//! driven without a `.env` file. `HTTP_PORT` belongs to `bin/file_sidecar.rs`
//! instead — the upload sidecar is its own binary (`SIDECAR_BIND_ADDRESS`),
//! not a task spawned inside this one.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

use crate::error::RelayError;
use crate::identity::load_neighbour_key;

/// Command-line flags. Every flag has an environment-variable fallback via
/// `#[arg(env = "...")]`, so `RelayConfig` can be built from either source —
/// the flag wins if both are present.
#[derive(Parser, Debug)]
#[command(name = "olaf-relay", about = "A federated OLAF/Neighbourhood chat relay")]
pub struct Cli {
    /// Address to bind the listening socket to.
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// This relay's advertised hostname, used both for key filenames and as
    /// the address neighbours dial.
    #[arg(long, env = "HOST")]
    pub host: String,

    /// Port the chat protocol listens on.
    #[arg(long, env = "WS_PORT")]
    pub ws_port: u16,

    /// Comma-separated `host:port` list of neighbour relays.
    #[arg(long, env = "NEIGHBOURS", value_delimiter = ',', default_value = "")]
    pub neighbours: Vec<String>,

    /// Directory holding `<host>_<port>_{public,private}_key.pem` files.
    #[arg(long, env = "KEYS_DIR")]
    pub keys_dir: Option<PathBuf>,
}

/// The neighbourhood configuration (§3): a static mapping from address to
/// the expected identity key, loaded once before the listener opens.
#[derive(Debug, Clone)]
pub struct NeighbourhoodConfig {
    pub expected_keys: HashMap<String, String>,
}

impl NeighbourhoodConfig {
    pub fn contains(&self, address: &str) -> bool {
        self.expected_keys.contains_key(address)
    }
}

/// Fully resolved runtime configuration.
pub struct RelayConfig {
    pub bind_address: String,
    pub host: String,
    pub ws_port: u16,
    pub neighbour_addresses: Vec<String>,
    pub keys_dir: PathBuf,
}

impl RelayConfig {
    pub fn server_name(&self) -> String {
        format!("{}:{}", self.host, self.ws_port)
    }

    /// Resolves from `Cli`, applying the `dirs`-based default keys
    /// directory when `KEYS_DIR` isn't set.
    pub fn from_cli(cli: Cli) -> Self {
        let keys_dir = cli.keys_dir.unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("olaf-relay")
                .join("keys")
        });
        let neighbour_addresses = cli
            .neighbours
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            bind_address: cli.bind_address,
            host: cli.host,
            ws_port: cli.ws_port,
            neighbour_addresses,
            keys_dir,
        }
    }

    /// Loads each neighbour's pre-shared public key from the keys
    /// directory. A missing key file is Fatal — the relay aborts before
    /// opening the listener (§6, §7).
    pub fn load_neighbourhood(&self) -> Result<NeighbourhoodConfig, RelayError> {
        let mut expected_keys = HashMap::new();
        for address in &self.neighbour_addresses {
            let (host, port) = split_host_port(address)?;
            let key = load_neighbour_key(&self.keys_dir, &host, port)?;
            expected_keys.insert(address.clone(), key);
        }
        Ok(NeighbourhoodConfig { expected_keys })
    }
}

/// Splits `"host:port"` into its parts, defaulting the port to 80 the same
/// way `get_server_host_port` does in `original_source/server/OlafServer.py`
/// when a bare hostname is given.
pub fn split_host_port(address: &str) -> Result<(String, u16), RelayError> {
    match address.split_once(':') {
        Some((host, port)) => {
            let port: u16 = port
                .parse()
                .map_err(|_| RelayError::Fatal(format!("invalid port in neighbour address '{address}'")))?;
            Ok((host.to_string(), port))
        }
        None => Ok((address.to_string(), 80)),
    }
}
