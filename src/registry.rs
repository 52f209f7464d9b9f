//! Registry (C3) — the relay's single source of truth for "who is
//! connected right now" and "what does the neighbourhood look like".
//!
//! Every operation here is linearizable: callers take the lock, read or
//! mutate, and release it before doing any I/O. Fan-out lists are computed
//! under the lock and then handed back to the caller, which sends *outside*
//! the lock (§5) — the Registry itself never calls `ConnHandle::send`.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;

use crate::codec::{Frame, IdentityKey};
use crate::connection::{ConnClass, ConnHandle};
use crate::router::Router;

/// The mutable membership state, behind a single `RwLock` (§4.3: all four
/// maps move together under one lock so a snapshot is always consistent).
struct State {
    /// Clients directly connected to this relay, keyed by their identity key.
    local_clients: HashMap<IdentityKey, ConnHandle>,
    /// Neighbour relays this process has a live link to, keyed by the
    /// address they were dialed/accepted as (`host:port`).
    neighbours: HashMap<String, ConnHandle>,
    /// The last roster a neighbour reported for itself, via `client_update`.
    remote_rosters: HashMap<String, Vec<IdentityKey>>,
}

/// C3: owns the membership state and exposes the operations §4.3 names.
pub struct Registry {
    state: RwLock<State>,
    /// This relay's own address, used to build this relay's row in a
    /// `client_list` response (§4.1).
    self_address: String,
}

/// A consistent snapshot of the whole neighbourhood's membership, as seen
/// from this relay — this relay's own local roster plus every known remote
/// roster. Used to answer `client_list_request` (§4.4 handler b).
pub struct RosterSnapshot {
    pub self_address: String,
    pub local_clients: Vec<IdentityKey>,
    pub remote_rosters: Vec<(String, Vec<IdentityKey>)>,
}

impl Registry {
    pub fn new(self_address: String) -> Self {
        Self {
            state: RwLock::new(State {
                local_clients: HashMap::new(),
                neighbours: HashMap::new(),
                remote_rosters: HashMap::new(),
            }),
            self_address,
        }
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    /// Registers a newly classified client connection. Invariant I2 (§4.3):
    /// a reconnecting client with the same identity key replaces, rather
    /// than duplicates, the previous handle — the old connection is closed
    /// so there is never more than one live writer per identity key.
    pub async fn add_client(&self, identity_key: IdentityKey, handle: ConnHandle) -> Option<ConnHandle> {
        let mut state = self.state.write().await;
        let previous = state.local_clients.insert(identity_key, handle);
        if let Some(previous) = &previous {
            previous.close();
        }
        previous
    }

    /// Registers a newly classified neighbour connection, replacing any
    /// existing link at the same address (a redial racing the old link).
    pub async fn add_neighbour(&self, address: String, handle: ConnHandle) -> Option<ConnHandle> {
        let mut state = self.state.write().await;
        let previous = state.neighbours.insert(address, handle);
        if let Some(previous) = &previous {
            previous.close();
        }
        previous
    }

    /// Removes whichever entry (client or neighbour) matches this
    /// connection's id. A connection that classified as a neighbour also
    /// drops its last-known roster — a disconnected relay's clients are no
    /// longer reachable through it.
    async fn remove_conn(&self, handle: &ConnHandle) -> bool {
        let mut state = self.state.write().await;
        match handle.class() {
            ConnClass::Client => {
                let key = state
                    .local_clients
                    .iter()
                    .find(|(_, v)| **v == *handle)
                    .map(|(k, _)| k.clone());
                if let Some(key) = key {
                    state.local_clients.remove(&key);
                    return true;
                }
                false
            }
            ConnClass::Neighbour => {
                let address = state
                    .neighbours
                    .iter()
                    .find(|(_, v)| **v == *handle)
                    .map(|(k, _)| k.clone());
                if let Some(address) = address {
                    state.neighbours.remove(&address);
                    state.remote_rosters.remove(&address);
                    return true;
                }
                false
            }
            ConnClass::Unregistered => false,
        }
    }

    /// Removes the connection from whichever map it's in. If it was a local
    /// client, the shrunken roster is gossiped to every neighbour (§4.4
    /// handler g). Either way, a fresh `client_list` is broadcast to the
    /// remaining local clients — matching `disconnect()`'s unconditional
    /// trailing `broadcast_client_list()` call in
    /// `original_source/server/OlafServer.py`, which runs whether the
    /// departing connection was a client or a neighbour.
    pub async fn remove_conn_and_gossip(&self, handle: &ConnHandle, router: &Router) {
        let was_client = handle.class() == ConnClass::Client;
        if !self.remove_conn(handle).await {
            return;
        }
        info!(peer = %handle.label, class = ?handle.class(), "connection removed from registry");
        if was_client {
            router.gossip_local_roster(self).await;
        }
        router.broadcast_client_list(self).await;
    }

    /// Looks up a currently connected client by identity key (§4.4 handler a).
    pub async fn find_client(&self, identity_key: &IdentityKey) -> Option<ConnHandle> {
        self.state.read().await.local_clients.get(identity_key).cloned()
    }

    /// Looks up a currently connected neighbour by address (§4.4 handlers
    /// a/c/g: directed chat forwarding, gossip fan-out).
    pub async fn find_neighbour(&self, address: &str) -> Option<ConnHandle> {
        self.state.read().await.neighbours.get(address).cloned()
    }

    /// The reverse of `find_neighbour`: given a connection already known to
    /// be a neighbour, what address is it registered under. Used by the
    /// router to attribute an inbound `client_update` to the right roster
    /// entry (§4.4 handler f).
    pub async fn address_of_neighbour(&self, handle: &ConnHandle) -> Option<String> {
        self.state
            .read()
            .await
            .neighbours
            .iter()
            .find(|(_, v)| **v == *handle)
            .map(|(k, _)| k.clone())
    }

    /// Every currently connected neighbour, for broadcast-shaped fan-out
    /// (public chat, membership gossip).
    pub async fn all_neighbours(&self) -> Vec<ConnHandle> {
        self.state.read().await.neighbours.values().cloned().collect()
    }

    /// Every currently connected local client, for public-chat fan-out
    /// (§4.4 handler d).
    pub async fn all_local_clients(&self) -> Vec<ConnHandle> {
        self.state.read().await.local_clients.values().cloned().collect()
    }

    /// Every connection registered right now, client or neighbour. Used
    /// only by the Supervisor on a clean shutdown (§4.5): "close every
    /// active connection with a normal-closure reason, drain pending
    /// sends".
    pub async fn all_connections(&self) -> Vec<ConnHandle> {
        let state = self.state.read().await;
        state
            .local_clients
            .values()
            .cloned()
            .chain(state.neighbours.values().cloned())
            .collect()
    }

    /// The identity keys of every locally connected client, the shape a
    /// `client_update` frame carries (§4.1).
    pub async fn local_roster(&self) -> Vec<IdentityKey> {
        self.state.read().await.local_clients.keys().cloned().collect()
    }

    /// Records a neighbour's self-reported roster, replacing whatever was
    /// known before (§4.4 handler f: `client_update`).
    pub async fn update_neighbour_roster(&self, address: String, clients: Vec<IdentityKey>) {
        let mut state = self.state.write().await;
        state.remote_rosters.insert(address, clients);
    }

    /// A point-in-time view of the whole neighbourhood's membership, used to
    /// answer `client_list_request` (§4.4 handler b).
    pub async fn snapshot_roster(&self) -> RosterSnapshot {
        let state = self.state.read().await;
        RosterSnapshot {
            self_address: self.self_address.clone(),
            local_clients: state.local_clients.keys().cloned().collect(),
            remote_rosters: state
                .remote_rosters
                .iter()
                .map(|(addr, clients)| (addr.clone(), clients.clone()))
                .collect(),
        }
    }
}

impl RosterSnapshot {
    /// Converts the snapshot into the `servers` list a `client_list` frame
    /// carries — this relay's own row first, then every known neighbour.
    pub fn into_frame(self) -> Frame {
        let mut servers = vec![crate::codec::ServerClients {
            address: self.self_address,
            clients: self.local_clients,
        }];
        for (address, clients) in self.remote_rosters {
            servers.push(crate::codec::ServerClients { address, clients });
        }
        Frame::ClientList { servers }
    }
}
