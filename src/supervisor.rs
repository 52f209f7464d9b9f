//! Supervisor (C5) — boots the relay: loads or generates this relay's
//! identity, opens the listener, dials every configured neighbour with
//! backoff, and owns the `Registry` for the life of the process.
//!
//! The backoff schedule is this core's one deliberate departure from
//! `original_source/server/OlafServer.py`, which retries a failed neighbour
//! dial on a flat 5-second timer forever. EXPANSION §E7 upgrades that to
//! bounded exponential backoff so a neighbour that's down for an extended
//! window doesn't get hammered once every five seconds indefinitely.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::codec::{Frame, SignedPayload};
use crate::config::{split_host_port, RelayConfig};
use crate::connection;
use crate::crypto::Crypto;
use crate::error::RelayError;
use crate::identity::{self, RelayIdentity};
use crate::registry::Registry;
use crate::router::Router;

const DIAL_BACKOFF_INITIAL: Duration = Duration::from_secs(5);
const DIAL_BACKOFF_MAX: Duration = Duration::from_secs(180);

/// The running relay: everything a clean shutdown needs to tear down.
pub struct Relay {
    pub registry: Arc<Registry>,
    pub router: Arc<Router>,
    listener_task: tokio::task::JoinHandle<()>,
    dial_tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Relay {
    /// Loads identity, opens the listener, and starts one dial task per
    /// configured neighbour. Returns once the listener is bound and
    /// accepting — dialing and accepting both continue in the background.
    pub async fn boot(config: RelayConfig, crypto: Arc<dyn Crypto>) -> Result<Self, RelayError> {
        let identity = Arc::new(identity::load_or_generate(
            crypto.as_ref(),
            &config.keys_dir,
            &config.host,
            config.ws_port,
        )?);
        let neighbourhood = config.load_neighbourhood()?;

        let registry = Arc::new(Registry::new(config.server_name()));
        let router = Arc::new(Router::new(registry.clone(), neighbourhood));

        let bind_addr = format!("{}:{}", config.bind_address, config.ws_port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| RelayError::Fatal(format!("failed to bind {bind_addr}: {e}")))?;
        info!(address = %bind_addr, "listening for connections");

        let listener_task = tokio::spawn(accept_loop(listener, registry.clone(), router.clone()));

        let mut dial_tasks = Vec::new();
        for address in &config.neighbour_addresses {
            dial_tasks.push(tokio::spawn(dial_loop(
                address.clone(),
                config.server_name(),
                identity.clone(),
                crypto.clone(),
                registry.clone(),
                router.clone(),
            )));
        }

        Ok(Self {
            registry,
            router,
            listener_task,
            dial_tasks,
        })
    }

    /// Stops accepting new connections and dialing, then closes every
    /// active connection with a normal-closure reason and waits out the
    /// bounded drain deadline (§4.5, §5 "Cancellation") before returning.
    pub async fn shutdown(self) {
        self.listener_task.abort();
        for task in self.dial_tasks {
            task.abort();
        }
        let conns = self.registry.all_connections().await;
        info!(count = conns.len(), "closing active connections for shutdown");
        for conn in conns {
            let _ = conn.send(Frame::error("relay shutting down")).await;
            conn.close();
        }
        tokio::time::sleep(connection::DRAIN_DEADLINE).await;
        info!("relay shutdown complete");
    }
}

async fn accept_loop(listener: TcpListener, registry: Arc<Registry>, router: Arc<Router>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let label = peer_addr.to_string();
                info!(peer = %label, "accepted connection");
                connection::spawn(stream, label, registry.clone(), router.clone());
            }
            Err(e) => {
                warn!(error = %e, "accept failed, continuing");
            }
        }
    }
}

/// Repeatedly dials a neighbour, sending this relay's `server_hello` as the
/// first frame on every successful connection, until the process is
/// stopped. Uses bounded exponential backoff between attempts (EXPANSION
/// §E7); a dropped link restarts the schedule from the initial delay.
async fn dial_loop(
    address: String,
    self_name: String,
    identity: Arc<RelayIdentity>,
    crypto: Arc<dyn Crypto>,
    registry: Arc<Registry>,
    router: Arc<Router>,
) {
    let mut backoff = DIAL_BACKOFF_INITIAL;
    loop {
        match dial_once(&address, &self_name, &identity, crypto.as_ref(), &registry, &router).await {
            Ok(()) => {
                backoff = DIAL_BACKOFF_INITIAL;
            }
            Err(e) => {
                warn!(neighbour = %address, error = %e, delay = ?backoff, "neighbour dial failed, retrying");
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, DIAL_BACKOFF_MAX);
    }
}

async fn dial_once(
    address: &str,
    self_name: &str,
    identity: &RelayIdentity,
    crypto: &dyn Crypto,
    registry: &Arc<Registry>,
    router: &Arc<Router>,
) -> Result<(), RelayError> {
    let (host, port) = split_host_port(address)?;
    let stream = TcpStream::connect((host.as_str(), port))
        .await
        .map_err(|e| RelayError::Fatal(format!("connect to {address} failed: {e}")))?;
    info!(neighbour = %address, "dialed neighbour");

    let handle = connection::spawn(stream, address.to_string(), registry.clone(), router.clone());
    handle.try_classify(connection::ConnClass::Neighbour);
    registry.add_neighbour(address.to_string(), handle.clone()).await;

    let hello = Frame::SignedData {
        data: SignedPayload::ServerHello { sender: self_name.to_string() },
        counter: 1,
        signature: crypto.sign(self_name.as_bytes(), &identity.private_pem)?,
    };
    handle
        .send(hello)
        .await
        .map_err(|_| RelayError::Fatal(format!("failed to send server_hello to {address}")))?;

    // Immediately ask the new link for its roster too, rather than waiting
    // on spontaneous gossip (EXPANSION §E7, matching `connect_to_server` in
    // `original_source/server/OlafServer.py`).
    handle
        .send(Frame::ClientUpdateRequest)
        .await
        .map_err(|_| RelayError::Fatal(format!("failed to send client_update_request to {address}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let mut backoff = DIAL_BACKOFF_INITIAL;
        for _ in 0..10 {
            backoff = std::cmp::min(backoff * 2, DIAL_BACKOFF_MAX);
        }
        assert_eq!(backoff, DIAL_BACKOFF_MAX);
    }
}
