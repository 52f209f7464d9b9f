//! Frame Codec (C1) — parsing and schema validation of OLAF wire frames.
//!
//! A frame is a single JSON object. This module is pure: it never touches
//! the network and never checks signatures (see `SPEC_FULL.md` §9 — that's
//! an extension point, not this core's job). It only decides whether a
//! JSON value has the shape a given frame type requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

/// An identity key as the core sees it: an opaque PEM blob. Equality is
/// byte-equality after whitespace normalization (§3).
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(pub String);

impl IdentityKey {
    fn normalized(&self) -> String {
        self.0.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl PartialEq for IdentityKey {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl std::hash::Hash for IdentityKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.normalized())
    }
}

/// The inner payload of a `signed_data` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SignedPayload {
    #[serde(rename = "hello")]
    Hello { public_key: IdentityKey },
    #[serde(rename = "server_hello")]
    ServerHello { sender: String },
    #[serde(rename = "chat")]
    Chat {
        destination_servers: Vec<String>,
        iv: String,
        symm_keys: Vec<String>,
        chat: String,
    },
    #[serde(rename = "public_chat")]
    PublicChat { sender: String, message: String },
}

/// One row of a `client_list` response: a relay's address and its roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerClients {
    pub address: String,
    pub clients: Vec<IdentityKey>,
}

/// A fully decoded and schema-validated top-level frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "signed_data")]
    SignedData {
        data: SignedPayload,
        counter: u64,
        signature: String,
    },
    #[serde(rename = "client_list_request")]
    ClientListRequest,
    #[serde(rename = "client_list")]
    ClientList { servers: Vec<ServerClients> },
    #[serde(rename = "client_update")]
    ClientUpdate { clients: Vec<IdentityKey> },
    #[serde(rename = "client_update_request")]
    ClientUpdateRequest,
    /// Not a frame the relay parses from the wire, but the shape of what it
    /// emits on validation failure. Kept in the same enum so `encode` has a
    /// single entry point for every outbound frame the relay might send.
    #[serde(rename = "error")]
    Error { error: String },
}

impl Frame {
    /// Parses and schema-validates one JSON object per §4.1's required-field
    /// tables. `serde`'s derived `Deserialize` already enforces "does every
    /// required field exist and have a plausible shape" for us via the
    /// internally-tagged enums above; this wrapper turns the raw
    /// `serde_json` error into the taxonomy's `Malformed` variant and
    /// distinguishes "unknown `type`" from "missing field" the way §4.1
    /// calls for.
    pub fn decode(raw: &str) -> Result<Frame, RelayError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RelayError::Malformed(format!("invalid JSON: {e}")))?;

        let type_field = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::Malformed("missing top-level 'type' field".into()))?;

        const KNOWN: &[&str] = &[
            "signed_data",
            "client_list_request",
            "client_list",
            "client_update",
            "client_update_request",
        ];
        if !KNOWN.contains(&type_field) {
            return Err(RelayError::Malformed(format!("unknown type '{type_field}'")));
        }

        if type_field == "signed_data" {
            let data = value
                .get("data")
                .ok_or_else(|| RelayError::Malformed("signed_data missing 'data'".into()))?;
            let data_type = data
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| RelayError::Malformed("signed_data.data missing 'type'".into()))?;
            const KNOWN_DATA: &[&str] = &["hello", "server_hello", "chat", "public_chat"];
            if !KNOWN_DATA.contains(&data_type) {
                return Err(RelayError::Malformed(format!(
                    "unknown signed_data type '{data_type}'"
                )));
            }
        }

        serde_json::from_value(value).map_err(|e| RelayError::Malformed(e.to_string()))
    }

    /// Serializes a frame back to a JSON line for the wire.
    pub fn encode(&self) -> String {
        // Frames are always well-formed by construction; failure here would
        // mean a bug, not bad input.
        serde_json::to_string(self).expect("Frame must always serialize")
    }

    pub fn error(message: impl Into<String>) -> Frame {
        Frame::Error { error: message.into() }
    }
}
