//! Per-connection session worker.
//!
//! Each accepted connection gets one [`SessionWorker`] running in its own
//! task. The worker moves through `Active → Closing → Closed`:
//!
//! - **Active**: read one line at a time, racing every read against the
//!   shutdown flag, and dispatch it as a [`Command`]. Malformed commands and
//!   unknown targets are answered with an error line; the loop continues.
//! - **Closing**: entered on `exit`, end of stream, a connection error, or the
//!   shutdown flag. Closes the write handle (once) and removes the client from
//!   the registry if it is still there.
//! - **Closed**: the worker returns a [`SessionEnd`] describing why.

use chat_relay_core::protocol::{
    GOODBYE, RECEIPT, format_id_list, forward_ack, history_header,
};
use chat_relay_core::{ClientId, Command, CommandError, TargetId};
use tracing::{debug, info, warn};

use super::connection::{ConnectionError, ConnectionHandle, LineReader};
use super::relay::Relay;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent `exit`.
    Exit,
    /// Peer closed the stream.
    PeerClosed,
    /// Reset, oversized frame or other I/O failure.
    ConnectionLost(String),
    /// The shutdown flag was observed.
    Shutdown,
}

/// What the read loop does after a command.
enum Flow {
    Continue,
    Stop(SessionEnd),
}

pub struct SessionWorker {
    id: ClientId,
    reader: LineReader,
    connection: ConnectionHandle,
    relay: Relay,
}

impl SessionWorker {
    /// Create a worker for an already registered client.
    pub fn new(
        id: ClientId,
        reader: LineReader,
        connection: ConnectionHandle,
        relay: Relay,
    ) -> Self {
        Self {
            id,
            reader,
            connection,
            relay,
        }
    }

    /// Drive the session to completion.
    pub async fn run(mut self) -> SessionEnd {
        info!(
            "Receiving messages from client {} [{}]",
            self.id,
            self.connection.peer_addr()
        );

        let end = self.read_loop().await;
        self.close().await;

        info!("Session for client {} closed: {:?}", self.id, end);
        end
    }

    async fn read_loop(&mut self) -> SessionEnd {
        let shutdown = self.relay.shutdown().clone();
        loop {
            if shutdown.is_shutdown() {
                return SessionEnd::Shutdown;
            }

            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return SessionEnd::Shutdown,
                read = self.reader.next_line() => read,
            };

            let line = match read {
                Ok(line) => line,
                Err(e) => return connection_end(self.id, e),
            };

            match self.dispatch(&line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop(end)) => return end,
                Err(e) => return connection_end(self.id, e),
            }
        }
    }

    async fn dispatch(&self, line: &str) -> Result<Flow, ConnectionError> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                debug!("Client {} sent malformed command {line:?}: {e}", self.id);
                self.reply(&e.to_string()).await?;
                return Ok(Flow::Continue);
            }
        };

        match command {
            Command::List => {
                let ids = self.relay.list_ids();
                self.reply(&format_id_list(&ids)).await?;
            }
            Command::Forward { target, message } => {
                self.forward(target, &message).await?;
            }
            Command::History { target } => {
                self.history(target).await?;
            }
            Command::Exit => {
                if let Err(e) = self.reply(GOODBYE).await {
                    debug!("Client {} left before the goodbye was sent: {e}", self.id);
                }
                self.relay.depart(self.id);
                return Ok(Flow::Stop(SessionEnd::Exit));
            }
            Command::Message(text) => {
                info!(
                    "Client {} [{}] sent a message: {text}",
                    self.id,
                    self.connection.peer_addr()
                );
                self.reply(RECEIPT).await?;
            }
            Command::Empty => {
                debug!("Ignoring empty line from client {}", self.id);
            }
        }
        Ok(Flow::Continue)
    }

    /// Route to the target, push the record to it, then acknowledge.
    ///
    /// A failed push is reported to the sender; the target's own session
    /// discovers the broken connection on its next read.
    async fn forward(&self, target: TargetId, message: &str) -> Result<(), ConnectionError> {
        let routed = match target.client() {
            Some(id) => self.relay.route_forward(self.id, id, message),
            None => Err(CommandError::ClientNotFound(target)),
        };
        let routed = match routed {
            Ok(routed) => routed,
            Err(e) => {
                info!("Forward from client {} rejected: {e}", self.id);
                return self.reply(&e.to_string()).await;
            }
        };

        match routed.connection.send_line(&routed.record).await {
            Ok(()) => {
                info!("Message sent to client {}: {}", routed.target, routed.record);
                self.reply(&forward_ack(routed.target)).await
            }
            Err(e) => {
                warn!(
                    "Delivery from client {} to client {} failed: {e}",
                    self.id, routed.target
                );
                self.reply(&CommandError::DeliveryFailed(routed.target).to_string())
                    .await
            }
        }
    }

    /// Write a header line, the pair's records, then an empty terminator
    /// line, as one block.
    async fn history(&self, target: TargetId) -> Result<(), ConnectionError> {
        let Some(target) = target.client() else {
            info!("History request from client {} names no client: {target}", self.id);
            return self.reply(&CommandError::HistoryNotFound(target).to_string()).await;
        };

        match self.relay.history_for(self.id, target) {
            Ok(records) => {
                debug!(
                    "Sending {} history record(s) with client {} to client {}",
                    records.len(),
                    target,
                    self.id
                );
                let header = history_header(target);
                let block = std::iter::once(header.as_str())
                    .chain(records.iter().map(String::as_str))
                    .chain(std::iter::once(""));
                self.connection.send_lines(block).await
            }
            Err(e) => {
                info!("History request from client {} rejected: {e}", self.id);
                self.reply(&e.to_string()).await
            }
        }
    }

    async fn reply(&self, line: &str) -> Result<(), ConnectionError> {
        self.connection.send_line(line).await
    }

    async fn close(&self) {
        if self.connection.close().await {
            debug!("Closed connection to client {}", self.id);
        }
        self.relay.depart(self.id);
    }
}

fn connection_end(id: ClientId, error: ConnectionError) -> SessionEnd {
    match error {
        ConnectionError::Closed => {
            debug!("Client {id} closed the connection");
            SessionEnd::PeerClosed
        }
        other => {
            warn!("Connection to client {id} lost: {other}");
            SessionEnd::ConnectionLost(other.to_string())
        }
    }
}
