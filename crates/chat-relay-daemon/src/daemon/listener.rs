//! TCP listener for the relay.
//!
//! The accept loop races each accept against the shutdown flag and bounds it
//! by the configured poll interval; when the interval elapses with no new
//! connection the loop re-checks the flag and waits again. Each accepted
//! connection is given an identity, greeted with it, then registered and
//! handed to a [`SessionWorker`] spawned into the caller's [`JoinSet`]. The
//! greeting is always the first line a client reads. A connection that arrives
//! once the relay is closed gets the shutdown farewell instead.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_relay_core::config::RelayConfig;
use chat_relay_core::protocol::{SHUTDOWN_FAREWELL, greeting};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::connection::ConnectionHandle;
use super::relay::Relay;
use super::session::{SessionEnd, SessionWorker};

/// Bound relay listener, ready to run its accept loop.
pub struct RelayListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    poll_interval: Duration,
    max_frame_bytes: usize,
}

impl RelayListener {
    /// Bind the address from `config`.
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let addr = config.bind_addr().context("Failed to resolve listen address")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let local_addr = listener.local_addr()?;
        info!("Relay listening on {local_addr}, waiting for clients...");

        Ok(Self {
            listener,
            local_addr,
            poll_interval: config.accept_poll_interval(),
            max_frame_bytes: config.server.max_frame_bytes,
        })
    }

    /// Address actually bound (useful when the configured port is 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the shutdown flag is set.
    pub async fn run(self, relay: &Relay, sessions: &mut JoinSet<SessionEnd>) {
        info!("Accept loop started");
        let shutdown = relay.shutdown().clone();

        while !shutdown.is_shutdown() {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                accepted = tokio::time::timeout(self.poll_interval, self.listener.accept()) => accepted,
            };

            match accepted {
                // Poll interval elapsed: loop around and re-check the flag.
                Err(_elapsed) => {}
                Ok(Ok((stream, addr))) => {
                    self.admit(stream, addr, relay, sessions).await;
                }
                Ok(Err(e)) => {
                    error!("Accept error on {}: {e}", self.local_addr);
                    // Brief pause before retrying to avoid a tight error loop
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }

            reap_finished(sessions);
        }

        info!("Accept loop stopped");
    }

    async fn admit(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        relay: &Relay,
        sessions: &mut JoinSet<SessionEnd>,
    ) {
        let (reader, connection) = match ConnectionHandle::split(stream, self.max_frame_bytes) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Dropping connection from {addr}: {e}");
                return;
            }
        };

        let id = match relay.reserve_id() {
            Some(id) if !relay.shutdown().is_shutdown() => id,
            _ => return turn_away(&connection, addr).await,
        };

        if let Err(e) = connection.send_line(&greeting(id)).await {
            warn!("Could not greet client {id}: {e}");
            connection.close().await;
            return;
        }

        if !relay.register(id, connection.clone()) {
            return turn_away(&connection, addr).await;
        }
        info!("Client {id} connected from {addr}; starting session");

        let worker = SessionWorker::new(id, reader, connection, relay.clone());
        sessions.spawn(worker.run());
    }
}

async fn turn_away(connection: &ConnectionHandle, addr: SocketAddr) {
    debug!("Turning away {addr}: shutdown in progress");
    if let Err(e) = connection.send_line(SHUTDOWN_FAREWELL).await {
        debug!("Could not send farewell to {addr}: {e}");
    }
    connection.close().await;
}

fn reap_finished(sessions: &mut JoinSet<SessionEnd>) {
    while let Some(result) = sessions.try_join_next() {
        if let Err(e) = result {
            error!("Session task failed: {e}");
        }
    }
}
