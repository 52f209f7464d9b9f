//! The `IdPersistence` capability (§6) — generate-or-load this relay's own
//! keypair from the keys directory, matching `WebSocketServer.load_keys` in
//! `original_source/server/OlafServer.py` one for one: two files per relay,
//! `<host>_<port>_public_key.pem` and `<host>_<port>_private_key.pem`,
//! generated on first boot if absent.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::crypto::Crypto;
use crate::error::RelayError;

/// This relay's own PEM-encoded keypair plus the identity key derived from
/// the public half.
pub struct RelayIdentity {
    pub public_pem: String,
    pub private_pem: String,
}

fn key_paths(keys_dir: &Path, host: &str, port: u16) -> (PathBuf, PathBuf) {
    let public = keys_dir.join(format!("{host}_{port}_public_key.pem"));
    let private = keys_dir.join(format!("{host}_{port}_private_key.pem"));
    (public, private)
}

/// Loads this relay's keypair from `keys_dir`, generating and persisting a
/// fresh one if the files don't exist yet. Any I/O failure here is Fatal:
/// the relay cannot establish an identity without it (§7).
pub fn load_or_generate(
    crypto: &dyn Crypto,
    keys_dir: &Path,
    host: &str,
    port: u16,
) -> Result<RelayIdentity, RelayError> {
    let (public_path, private_path) = key_paths(keys_dir, host, port);

    if public_path.exists() && private_path.exists() {
        let public_pem = fs::read_to_string(&public_path)
            .map_err(|e| RelayError::Fatal(format!("failed to read {}: {e}", public_path.display())))?;
        let private_pem = fs::read_to_string(&private_path)
            .map_err(|e| RelayError::Fatal(format!("failed to read {}: {e}", private_path.display())))?;
        info!(path = %public_path.display(), "loaded relay keypair from disk");
        return Ok(RelayIdentity { public_pem, private_pem });
    }

    fs::create_dir_all(keys_dir)
        .map_err(|e| RelayError::Fatal(format!("failed to create keys dir {}: {e}", keys_dir.display())))?;

    let keypair = crypto.generate_keypair()?;
    fs::write(&public_path, &keypair.public_pem)
        .map_err(|e| RelayError::Fatal(format!("failed to write {}: {e}", public_path.display())))?;
    fs::write(&private_path, &keypair.private_pem)
        .map_err(|e| RelayError::Fatal(format!("failed to write {}: {e}", private_path.display())))?;

    info!(path = %public_path.display(), "generated and persisted new relay keypair");
    Ok(RelayIdentity {
        public_pem: keypair.public_pem,
        private_pem: keypair.private_pem,
    })
}

/// Loads a neighbour's expected public key from `<keys_dir>/<host>_<port>_public_key.pem`.
/// This file must be pre-shared before the neighbourhood is started; a
/// missing file is Fatal (§6, §7) since the relay can't even gate the
/// address allow-list without it.
pub fn load_neighbour_key(keys_dir: &Path, host: &str, port: u16) -> Result<String, RelayError> {
    let (public_path, _) = key_paths(keys_dir, host, port);
    fs::read_to_string(&public_path).map_err(|e| {
        RelayError::Fatal(format!(
            "missing neighbour public key {}: {e}",
            public_path.display()
        ))
    })
}
