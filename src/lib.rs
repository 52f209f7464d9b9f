//! Library surface shared by the two binaries this crate ships: the relay
//! itself (`src/main.rs`) and the file-upload sidecar (`src/bin/file_sidecar.rs`).
//! Splitting into a library keeps both binaries honest about depending on
//! the same codec, crypto, and identity logic rather than drifting apart.

pub mod codec;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod registry;
pub mod router;
pub mod sidecar;
pub mod supervisor;
