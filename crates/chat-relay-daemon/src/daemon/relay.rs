//! The relay: shared state plus the shutdown flag.
//!
//! [`Relay`] is the only way listener and session code touch the registry and
//! history. Each method takes the lock once, does its work, and releases it
//! before any network I/O.

use chat_relay_core::protocol::SHUTDOWN_FAREWELL;
use chat_relay_core::{ClientId, CommandError};
use tracing::{debug, info, warn};

use super::connection::ConnectionHandle;
use super::shutdown::{ShutdownCoordinator, ShutdownReason};
use super::state::{
    Departure, RoutedMessage, SharedRelayState, lock_state, new_relay_state,
};

/// Cloneable handle to the relay's shared state and shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct Relay {
    state: SharedRelayState,
    shutdown: ShutdownCoordinator,
}

impl Relay {
    pub fn new() -> Self {
        Self::with_shutdown(ShutdownCoordinator::new())
    }

    pub fn with_shutdown(shutdown: ShutdownCoordinator) -> Self {
        Self {
            state: new_relay_state(),
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// The underlying lock, for inspection.
    pub fn state(&self) -> &SharedRelayState {
        &self.state
    }

    /// Hand out an identity for a freshly accepted connection. `None` once
    /// the relay has closed to new clients.
    pub fn reserve_id(&self) -> Option<ClientId> {
        lock_state(&self.state).reserve_id()
    }

    /// Make a reserved identity visible to `list` and `Forward`. Returns
    /// `false` when the relay closed since the reservation; the caller still
    /// owns the connection and must turn it away.
    pub fn register(&self, id: ClientId, connection: ConnectionHandle) -> bool {
        let address = connection.peer_addr();
        lock_state(&self.state).register(id, connection, address)
    }

    /// Snapshot of online identities, ascending.
    pub fn list_ids(&self) -> Vec<ClientId> {
        lock_state(&self.state).list_ids()
    }

    /// Validate the target and append to history in one lock acquisition.
    pub fn route_forward(
        &self,
        sender: ClientId,
        target: ClientId,
        message: &str,
    ) -> Result<RoutedMessage, CommandError> {
        lock_state(&self.state).route_forward(sender, target, message)
    }

    pub fn history_for(
        &self,
        requester: ClientId,
        target: ClientId,
    ) -> Result<Vec<String>, CommandError> {
        lock_state(&self.state).history_for(requester, target)
    }

    /// Remove `id` from the registry. When this removal empties it, the
    /// shutdown flag is set.
    pub fn depart(&self, id: ClientId) -> Departure {
        let departure = lock_state(&self.state).depart(id);
        if departure.removed {
            debug!("Client {id} removed from registry");
        }
        if departure.registry_emptied {
            info!("No more clients, shutting down the server");
            self.shutdown.signal(ShutdownReason::LastClientLeft);
        }
        departure
    }

    /// Operator interrupt: clear the registry, say goodbye to and close every
    /// client that was in it, then set the shutdown flag.
    ///
    /// Clearing the registry closes it in the same lock acquisition, so a
    /// client accepted while the farewells go out is turned away by the
    /// listener rather than registered.
    ///
    /// Returns the number of clients that were online.
    pub async fn interrupt(&self) -> usize {
        let sessions = lock_state(&self.state).drain_clients();
        info!("Server is shutting down; notifying {} client(s)", sessions.len());

        for session in &sessions {
            if let Err(e) = session.connection.send_line(SHUTDOWN_FAREWELL).await {
                warn!("Could not send farewell to client {}: {e}", session.id);
            }
            session.connection.close().await;
        }

        self.shutdown.signal(ShutdownReason::OperatorInterrupt);
        sessions.len()
    }
}
