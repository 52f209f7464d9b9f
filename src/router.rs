//! Router (C4) — decides what happens to a frame once the codec has
//! validated its shape and the registry can tell us who's connected.
//!
//! Handlers below are grouped the way §4.4 lists them: classification
//! (hello / server_hello), directed delivery (chat), broadcast (public_chat),
//! roster queries (client_list_request / client_list), and membership
//! gossip (client_update / client_update_request). Replay protection is a
//! single per-connection monotonic counter (§4.4, §8) — the open question
//! of its scope is resolved in favour of "one counter per connection",
//! since that's the only scope a relay can check without coordinating state
//! across neighbours it doesn't otherwise synchronize.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::codec::{Frame, SignedPayload};
use crate::config::NeighbourhoodConfig;
use crate::connection::{ConnClass, ConnHandle, ConnId};
use crate::error::RelayError;
use crate::registry::Registry;

/// C4: holds the replay-protection counters and the static neighbourhood
/// allow-list; everything else it needs (who's connected) it asks the
/// Registry for.
pub struct Router {
    registry: Arc<Registry>,
    neighbourhood: NeighbourhoodConfig,
    /// Last accepted counter per connection. A `Mutex` rather than the
    /// registry's `RwLock` since every signed frame writes to it.
    counters: Mutex<HashMap<ConnId, u64>>,
}

impl Router {
    pub fn new(registry: Arc<Registry>, neighbourhood: NeighbourhoodConfig) -> Self {
        Self {
            registry,
            neighbourhood,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// The entry point the connection's reader loop calls for every decoded
    /// frame. Never returns an error to the caller: failures are handled
    /// here (an error frame sent back, a close, or a silent drop) per §7's
    /// per-variant propagation rule.
    pub async fn route(&self, conn: ConnHandle, frame: Frame) {
        match frame {
            Frame::SignedData { data, counter, signature } => {
                if let Err(e) = self.check_counter(&conn, counter).await {
                    // Replay is silent; nothing else is (§7).
                    if !matches!(e, RelayError::Replay { .. }) {
                        let _ = conn.send(Frame::error(e.wire_message())).await;
                    }
                    return;
                }
                self.route_signed(conn, data, counter, signature).await;
            }
            Frame::ClientListRequest => self.handle_client_list_request(conn).await,
            Frame::ClientList { .. } => {
                // Never legitimately received — a relay only sends these.
                self.reject_unexpected(conn, "client_list is not accepted inbound").await;
            }
            Frame::ClientUpdate { clients } => self.handle_client_update(conn, clients).await,
            Frame::ClientUpdateRequest => self.handle_client_update_request(conn).await,
            Frame::Error { error } => {
                warn!(peer = %conn.label, %error, "peer reported an error");
            }
        }
    }

    async fn check_counter(&self, conn: &ConnHandle, counter: u64) -> Result<(), RelayError> {
        let mut counters = self.counters.lock().await;
        let last = counters.get(&conn.id).copied().unwrap_or(0);
        if counter <= last {
            return Err(RelayError::Replay {
                counter,
                last_counter: last,
            });
        }
        counters.insert(conn.id, counter);
        Ok(())
    }

    /// Drops a torn-down connection's replay counter. Without this the map
    /// grows by one entry per connection for the life of the process — under
    /// the churn §1/S5 describe (clients and neighbours reconnecting
    /// indefinitely) that's an unbounded leak, which violates §5's
    /// bounded-resource model. Called once a connection has left the
    /// Registry for good; a connection id is never reused (`ConnId::next`),
    /// so there's no risk of forgetting a still-live connection.
    pub async fn forget_conn(&self, id: ConnId) {
        self.counters.lock().await.remove(&id);
    }

    async fn route_signed(&self, conn: ConnHandle, data: SignedPayload, counter: u64, signature: String) {
        match data {
            SignedPayload::Hello { public_key } => self.handle_hello(conn, public_key).await,
            SignedPayload::ServerHello { sender } => self.handle_server_hello(conn, sender).await,
            SignedPayload::Chat {
                destination_servers,
                iv,
                symm_keys,
                chat,
            } => {
                self.handle_chat(conn, destination_servers, iv, symm_keys, chat, counter, signature)
                    .await;
            }
            SignedPayload::PublicChat { sender, message } => {
                self.handle_public_chat(conn, sender, message, counter, signature).await;
            }
        }
    }

    /// (a) `hello` classifies an Unregistered connection as a Client, tells
    /// every neighbour about the grown local roster, and broadcasts the
    /// refreshed `client_list` to every local client — including the one
    /// that just said hello (§4.4.a; matches
    /// `signed_data_handler_hello`/`broadcast_client_list` in
    /// `original_source/server/OlafServer.py`).
    async fn handle_hello(&self, conn: ConnHandle, public_key: crate::codec::IdentityKey) {
        if conn.class() != ConnClass::Unregistered {
            self.protocol_violation(conn, "hello received on an already-classified connection").await;
            return;
        }
        if !conn.try_classify(ConnClass::Client) {
            self.protocol_violation(conn, "hello received on an already-classified connection").await;
            return;
        }
        info!(peer = %conn.label, "client classified via hello");
        self.registry.add_client(public_key, conn.clone()).await;
        self.gossip_local_roster(&self.registry).await;
        self.broadcast_client_list(&self.registry).await;
    }

    /// (h) `server_hello` classifies an Unregistered connection as a
    /// Neighbour, provided its claimed address is one we were configured to
    /// expect (§3's static neighbourhood). No signature check (§9: relay-side
    /// signature verification is an extension point, deliberately left out
    /// of this core).
    async fn handle_server_hello(&self, conn: ConnHandle, sender: String) {
        if conn.class() != ConnClass::Unregistered {
            self.protocol_violation(conn, "server_hello received on an already-classified connection").await;
            return;
        }
        if !self.neighbourhood.contains(&sender) {
            self.protocol_violation(conn, format!("server_hello from unconfigured address '{sender}'")).await;
            return;
        }
        if !conn.try_classify(ConnClass::Neighbour) {
            self.protocol_violation(conn, "server_hello received on an already-classified connection").await;
            return;
        }
        info!(peer = %conn.label, address = %sender, "neighbour classified via server_hello");
        self.registry.add_neighbour(sender, conn.clone()).await;
        let _ = conn.send(Frame::ClientUpdateRequest).await;
    }

    /// (b)/(c) a directed `chat`: deliver locally if this relay is one of
    /// the named destinations, and forward verbatim (same counter and
    /// signature as received — §4.4.c, §8 invariant 4) to every other named
    /// destination that's a live neighbour. A destination naming the
    /// ingress neighbour itself is dropped (loop prevention); a destination
    /// this relay has no neighbour link for is a `RoutingMiss` — logged and
    /// dropped, not fatal to the rest of the fan-out.
    async fn handle_chat(
        &self,
        conn: ConnHandle,
        destination_servers: Vec<String>,
        iv: String,
        symm_keys: Vec<String>,
        chat: String,
        counter: u64,
        signature: String,
    ) {
        if conn.class() == ConnClass::Unregistered {
            self.protocol_violation(conn, "chat received before classification").await;
            return;
        }
        let frame = Frame::SignedData {
            data: SignedPayload::Chat {
                destination_servers: destination_servers.clone(),
                iv,
                symm_keys,
                chat,
            },
            counter,
            signature,
        };

        let self_address = self.registry.self_address().to_string();
        let ingress_address = self.registry.address_of_neighbour(&conn).await;
        for destination in destination_servers {
            if destination == self_address {
                for client in self.registry.all_local_clients().await {
                    let _ = client.send(frame.clone()).await;
                }
                continue;
            }
            if ingress_address.as_deref() == Some(destination.as_str()) {
                // Loop prevention: never bounce a chat back to the neighbour
                // it arrived from (§4.4.c).
                continue;
            }
            match self.registry.find_neighbour(&destination).await {
                Some(neighbour) => {
                    let _ = neighbour.send(frame.clone()).await;
                }
                None => {
                    let err = RelayError::RoutingMiss(destination);
                    warn!(error = %err, "no neighbour link for chat destination");
                }
            }
        }
    }

    /// (d) `public_chat`: flood to every local client — including the
    /// sender, per `relay_public_chat` in
    /// `original_source/server/OlafServer.py` which sends to all of
    /// `self.clients` unconditionally — and every neighbour *except* the
    /// ingress connection, forwarding the frame verbatim (same counter and
    /// signature as received — §8 invariant 3/4). The loop-prevention rule
    /// in §4.4.d is about the neighbour→neighbour hop only; a local client
    /// sees its own broadcast echoed back exactly like any other client's.
    async fn handle_public_chat(&self, conn: ConnHandle, sender: String, message: String, counter: u64, signature: String) {
        if conn.class() == ConnClass::Unregistered {
            self.protocol_violation(conn, "public_chat received before classification").await;
            return;
        }
        let frame = Frame::SignedData {
            data: SignedPayload::PublicChat { sender, message },
            counter,
            signature,
        };
        for client in self.registry.all_local_clients().await {
            let _ = client.send(frame.clone()).await;
        }
        for neighbour in self.registry.all_neighbours().await {
            if neighbour.id == conn.id {
                continue;
            }
            let _ = neighbour.send(frame.clone()).await;
        }
    }

    /// (e) `client_list_request`: only valid from a classified connection
    /// (§4.4.e, §8 boundary: unregistered → error + close). Answers with a
    /// full neighbourhood snapshot.
    async fn handle_client_list_request(&self, conn: ConnHandle) {
        if conn.class() == ConnClass::Unregistered {
            self.protocol_violation(conn, "client_list_request received before classification").await;
            return;
        }
        let snapshot = self.registry.snapshot_roster().await;
        let _ = conn.send(snapshot.into_frame()).await;
    }

    /// (f) `client_update`: only meaningful from a Neighbour, reporting its
    /// own local roster. The refreshed neighbourhood view is rebroadcast to
    /// every local client so UIs stay current (§4.4.f; matches
    /// `client_update_handler`'s own call to `broadcast_client_list` in
    /// `original_source/server/OlafServer.py`).
    async fn handle_client_update(&self, conn: ConnHandle, clients: Vec<crate::codec::IdentityKey>) {
        if conn.class() != ConnClass::Neighbour {
            self.protocol_violation(conn, "client_update received from a non-neighbour connection").await;
            return;
        }
        if let Some(address) = self.registry.address_of_neighbour(&conn).await {
            self.registry.update_neighbour_roster(address, clients).await;
            self.broadcast_client_list(&self.registry).await;
        }
    }

    /// (g) `client_update_request`: only valid from a classified connection
    /// (§4.4.h). Answers with this relay's own local roster (not the whole
    /// neighbourhood — that's `client_list_request`).
    async fn handle_client_update_request(&self, conn: ConnHandle) {
        if conn.class() == ConnClass::Unregistered {
            self.protocol_violation(conn, "client_update_request received before classification").await;
            return;
        }
        let roster = self.registry.local_roster().await;
        let _ = conn.send(Frame::ClientUpdate { clients: roster }).await;
    }

    /// Pushes this relay's current local roster out to every neighbour.
    /// Called after any change to local membership (§4.4 handler g).
    pub async fn gossip_local_roster(&self, registry: &Registry) {
        let roster = registry.local_roster().await;
        let frame = Frame::ClientUpdate { clients: roster };
        for neighbour in registry.all_neighbours().await {
            let _ = neighbour.send(frame.clone()).await;
        }
    }

    /// Broadcasts a fresh whole-neighbourhood `client_list` snapshot to
    /// every local client. Called after any membership change — a client
    /// hello, a client or neighbour disconnect, or an inbound neighbour
    /// `client_update` (§4.4.a/f; matches `broadcast_client_list` in
    /// `original_source/server/OlafServer.py`, called unconditionally after
    /// every `disconnect()` regardless of whether it was a client or a
    /// neighbour).
    pub async fn broadcast_client_list(&self, registry: &Registry) {
        let frame = registry.snapshot_roster().await.into_frame();
        for client in registry.all_local_clients().await {
            let _ = client.send(frame.clone()).await;
        }
    }

    async fn protocol_violation(&self, conn: ConnHandle, message: impl Into<String>) {
        let message = message.into();
        warn!(peer = %conn.label, %message, "protocol violation");
        let _ = conn.send(Frame::error(message)).await;
        conn.close();
    }

    async fn reject_unexpected(&self, conn: ConnHandle, message: &str) {
        warn!(peer = %conn.label, %message, "rejected unexpected frame");
        let _ = conn.send(Frame::error(message)).await;
    }
}
