//! Shared relay state: the registry and the history store behind one lock.
//!
//! Every read and write of either structure goes through [`RelayState`] while
//! the caller holds the single [`SharedRelayState`] mutex. Operations that must
//! be atomic with respect to each other (target lookup plus history append for
//! a forward, removal plus the "registry now empty" check, draining plus
//! refusing new clients) are single methods here so they always run under one
//! lock acquisition.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_relay_core::protocol::format_record;
use chat_relay_core::{ClientId, CommandError, PairKey};

use super::connection::ConnectionHandle;
use super::history::HistoryStore;
use super::registry::{ClientSession, ConnectionRegistry};

/// Outcome of removing a client from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    /// The client was registered and has now been removed.
    pub removed: bool,
    /// This removal left the registry empty.
    pub registry_emptied: bool,
}

/// A forward that passed validation: the record is already in history and
/// still has to be written to `target`.
#[derive(Debug, Clone)]
pub struct RoutedMessage<C = ConnectionHandle> {
    pub target: ClientId,
    pub connection: C,
    pub record: String,
}

/// Registry and history, guarded together.
#[derive(Debug)]
pub struct RelayState<C = ConnectionHandle> {
    registry: ConnectionRegistry<C>,
    history: HistoryStore,
    /// Set when the registry is drained or emptied by the last departure.
    /// No client is registered after that.
    closed: bool,
}

impl<C> Default for RelayState<C> {
    fn default() -> Self {
        Self {
            registry: ConnectionRegistry::default(),
            history: HistoryStore::default(),
            closed: false,
        }
    }
}

impl<C: Clone> RelayState<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry<C> {
        &self.registry
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Hand out an identity for a new client, unless the relay is closed.
    pub fn reserve_id(&mut self) -> Option<ClientId> {
        (!self.closed).then(|| self.registry.reserve_id())
    }

    /// Make a reserved identity visible. Returns `false`, leaving the
    /// registry untouched, when the relay closed after the reservation.
    pub fn register(&mut self, id: ClientId, connection: C, address: SocketAddr) -> bool {
        if self.closed {
            return false;
        }
        self.registry.insert(id, connection, address);
        true
    }

    pub fn list_ids(&self) -> Vec<ClientId> {
        self.registry.list_ids()
    }

    /// Look up `target` and, if present, append `"<sender>: <message>"` to
    /// the pair's history. Returns the target's handle so the caller can
    /// write the record outside the lock.
    ///
    /// An unknown target never touches history.
    pub fn route_forward(
        &mut self,
        sender: ClientId,
        target: ClientId,
        message: &str,
    ) -> Result<RoutedMessage<C>, CommandError> {
        let connection = self
            .registry
            .lookup(target)
            .map(|session| session.connection.clone())
            .ok_or_else(|| CommandError::ClientNotFound(target.into()))?;

        let record = format_record(sender, message);
        self.history
            .append(PairKey::new(sender, target), record.clone());

        Ok(RoutedMessage {
            target,
            connection,
            record,
        })
    }

    /// Ordered history between `requester` and `target`.
    pub fn history_for(
        &self,
        requester: ClientId,
        target: ClientId,
    ) -> Result<Vec<String>, CommandError> {
        if requester == target {
            return Err(CommandError::SameClient);
        }
        self.history
            .get(PairKey::new(requester, target))
            .map(<[String]>::to_vec)
            .ok_or_else(|| CommandError::HistoryNotFound(target.into()))
    }

    /// Remove `id` and report whether this removal emptied the registry.
    /// Emptying it closes the relay to new clients.
    ///
    /// Idempotent: a second call for the same id reports
    /// `removed: false, registry_emptied: false`.
    pub fn depart(&mut self, id: ClientId) -> Departure {
        let removed = self.registry.remove(id).is_some();
        let registry_emptied = removed && self.registry.is_empty();
        if registry_emptied {
            self.closed = true;
        }
        Departure {
            removed,
            registry_emptied,
        }
    }

    /// Close the relay to new clients and take every registered session out
    /// of the registry.
    pub fn drain_clients(&mut self) -> Vec<ClientSession<C>> {
        self.closed = true;
        self.registry.drain()
    }
}

/// The relay's single process-wide lock.
pub type SharedRelayState<C = ConnectionHandle> = Arc<Mutex<RelayState<C>>>;

/// Create a new empty [`SharedRelayState`].
pub fn new_relay_state<C>() -> SharedRelayState<C> {
    Arc::new(Mutex::new(RelayState::default()))
}

/// Acquire the relay lock. A worker that panicked while holding it cannot
/// leave either map half-updated (every method mutates one entry), so the
/// poisoned guard is taken over rather than propagated.
pub fn lock_state<C>(state: &SharedRelayState<C>) -> MutexGuard<'_, RelayState<C>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
