//! Connection registry: the single source of truth for who is online.
//!
//! The registry maps each assigned [`ClientId`] to its [`ClientSession`].
//! Identities are handed out from a monotonically increasing counter and never
//! reused, even after the client leaves. Handing out an identity and making it
//! visible are separate steps, so a client can be greeted with its identity
//! before anyone else can address it.
//!
//! ## Thread safety
//!
//! The registry itself is not `Sync`. It lives inside
//! [`RelayState`](super::state::RelayState) behind the relay's single lock.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use chat_relay_core::ClientId;

use super::connection::ConnectionHandle;

/// One registered client.
///
/// `C` is the connection handle type; the daemon uses [`ConnectionHandle`].
#[derive(Debug, Clone)]
pub struct ClientSession<C = ConnectionHandle> {
    pub id: ClientId,
    /// Non-owning handle; the session worker owns the read side.
    pub connection: C,
    /// Peer address, informational only.
    pub address: SocketAddr,
}

/// Registry mapping identities to live client sessions.
#[derive(Debug)]
pub struct ConnectionRegistry<C = ConnectionHandle> {
    clients: BTreeMap<ClientId, ClientSession<C>>,
    last_id: u64,
}

impl<C> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self {
            clients: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<C> ConnectionRegistry<C> {
    /// Create a new, empty registry. The first identity handed out is `1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next unused identity without registering it.
    pub fn reserve_id(&mut self) -> ClientId {
        self.last_id += 1;
        ClientId::new(self.last_id)
    }

    /// Make a reserved `id` visible with its connection.
    pub fn insert(&mut self, id: ClientId, connection: C, address: SocketAddr) {
        self.clients.insert(
            id,
            ClientSession {
                id,
                connection,
                address,
            },
        );
    }

    /// Return the session for `id`, or `None` if it is not registered.
    pub fn lookup(&self, id: ClientId) -> Option<&ClientSession<C>> {
        self.clients.get(&id)
    }

    /// Remove `id`. Removing an absent id is a no-op that returns `None`.
    pub fn remove(&mut self, id: ClientId) -> Option<ClientSession<C>> {
        self.clients.remove(&id)
    }

    /// Registered identities in ascending order.
    pub fn list_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    /// Take every registered session out, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<ClientSession<C>> {
        std::mem::take(&mut self.clients).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
