//! The relay's error taxonomy.
//!
//! Every failure the core can hit falls into one of the variants below. The
//! variant determines how it's handled: some are recovered locally (an error
//! frame, maybe a close), some are silent, and exactly one (`Fatal`) aborts
//! the whole process. See `SPEC_FULL.md` §7 for the full propagation rule.

use thiserror::Error;

/// Errors raised by the codec, registry, connection and router.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Schema violation or bad JSON. Recovered with an error frame; the
    /// connection is closed only if this was the very first frame received.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// A frame arrived from a connection in the wrong state, e.g. `chat`
    /// before `hello`. Always followed by an error frame and a close.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// `counter <= last_counter` on this connection. Dropped silently.
    #[error("replayed counter {counter} <= last seen {last_counter}")]
    Replay { counter: u64, last_counter: u64 },

    /// A `chat` frame named a destination address this relay has no
    /// neighbour for. Logged and dropped.
    #[error("unknown destination address: {0}")]
    RoutingMiss(String),

    /// A send to a peer failed because the peer is already gone. Never
    /// propagated back to the frame's ingress connection.
    #[error("peer gone: {0}")]
    PeerGone(String),

    /// Cannot load keys, cannot bind a listener, or a configured
    /// neighbour's key file is missing. Only the Supervisor raises this,
    /// and only to abort the process.
    #[error("fatal startup error: {0}")]
    Fatal(String),
}

impl RelayError {
    /// The string the relay puts in the wire-level `{"error": "..."}` frame.
    /// `Fatal` never reaches the wire (the process exits before it could).
    pub fn wire_message(&self) -> String {
        match self {
            RelayError::Malformed(msg) => format!("Message does not fit OLAF protocol standard: {msg}"),
            RelayError::ProtocolViolation(msg) => msg.clone(),
            RelayError::Replay { .. } => "replayed counter".to_string(),
            RelayError::RoutingMiss(addr) => format!("unknown destination server: {addr}"),
            RelayError::PeerGone(_) => "peer gone".to_string(),
            RelayError::Fatal(msg) => msg.clone(),
        }
    }

    /// Whether accepting this error should also close the connection it
    /// came from, per §7's propagation rule.
    pub fn closes_connection(&self) -> bool {
        matches!(self, RelayError::ProtocolViolation(_) | RelayError::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
