//! Connection handles and line framing.
//!
//! An accepted [`TcpStream`] is split in two:
//!
//! - the read half is wrapped in a [`LineReader`] owned exclusively by the
//!   session worker,
//! - the write half lives behind a [`ConnectionHandle`], a cheap clone that the
//!   registry keeps for lookups and that other sessions use to push forwarded
//!   messages.
//!
//! Writes to one connection are serialized by an async mutex, so a multi-line
//! reply is never interleaved with a concurrent push. Read and write failures
//! come back as [`ConnectionError`] so the session state machine can match on
//! the kind of failure.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::debug;

/// Connection-level failures. Each is fatal to the session that sees it and
/// to nothing else.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Peer closed its side (end of stream), or the handle was already closed.
    #[error("connection closed")]
    Closed,

    /// Peer reset or aborted the connection, or the pipe is broken.
    #[error("connection reset by peer")]
    Reset,

    /// An inbound line exceeded the frame limit.
    #[error("frame exceeds {max} bytes")]
    FrameTooLong { max: usize },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ConnectionError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ConnectionError::Reset,
            io::ErrorKind::UnexpectedEof => ConnectionError::Closed,
            _ => ConnectionError::Io(e),
        }
    }
}

/// Line-framed read half of a client connection.
pub struct LineReader {
    frames: FramedRead<OwnedReadHalf, LinesCodec>,
    max_frame_bytes: usize,
}

impl LineReader {
    /// Read the next line, without its terminator.
    ///
    /// End of stream is reported as [`ConnectionError::Closed`].
    pub async fn next_line(&mut self) -> Result<String, ConnectionError> {
        match self.frames.next().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                Err(ConnectionError::FrameTooLong {
                    max: self.max_frame_bytes,
                })
            }
            Some(Err(LinesCodecError::Io(e))) => Err(e.into()),
            None => Err(ConnectionError::Closed),
        }
    }
}

struct ConnectionInner {
    peer: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
}

/// Shared, non-owning handle to the write side of a client connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionHandle {
    /// Split an accepted stream into its reader and a shareable write handle.
    pub fn split(
        stream: TcpStream,
        max_frame_bytes: usize,
    ) -> io::Result<(LineReader, ConnectionHandle)> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let reader = LineReader {
            frames: FramedRead::new(
                read_half,
                LinesCodec::new_with_max_length(max_frame_bytes),
            ),
            max_frame_bytes,
        };
        let handle = ConnectionHandle {
            inner: Arc::new(ConnectionInner {
                peer,
                writer: Mutex::new(write_half),
                closed: AtomicBool::new(false),
            }),
        };
        Ok((reader, handle))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Write one line, appending the terminator.
    pub async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
        self.send_lines(std::iter::once(line)).await
    }

    /// Write several lines as one block. No other write to this connection
    /// can land between them.
    pub async fn send_lines<I, S>(&self, lines: I) -> Result<(), ConnectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut block = String::new();
        for line in lines {
            block.push_str(line.as_ref());
            block.push('\n');
        }

        let mut writer = self.inner.writer.lock().await;
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        writer.write_all(block.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shut down the write side. Only the first call does anything; it
    /// returns `true`, later calls return `false`.
    pub async fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut writer = self.inner.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of connection to {} failed: {e}", self.inner.peer);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn pair(max: usize) -> (LineReader, ConnectionHandle, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (reader, handle) = ConnectionHandle::split(server, max).unwrap();
        (reader, handle, client)
    }

    #[tokio::test]
    async fn test_next_line_strips_terminators() {
        let (mut reader, _handle, mut client) = pair(1024).await;
        client.write_all(b"list\r\nForward 2 hi\n").await.unwrap();

        assert_eq!(reader.next_line().await.unwrap(), "list");
        assert_eq!(reader.next_line().await.unwrap(), "Forward 2 hi");
    }

    #[tokio::test]
    async fn test_end_of_stream_is_closed() {
        let (mut reader, _handle, client) = pair(1024).await;
        drop(client);
        assert!(matches!(
            reader.next_line().await,
            Err(ConnectionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_is_reported() {
        let (mut reader, _handle, mut client) = pair(8).await;
        client.write_all(b"this line is far too long\n").await.unwrap();
        assert!(matches!(
            reader.next_line().await,
            Err(ConnectionError::FrameTooLong { max: 8 })
        ));
    }

    #[tokio::test]
    async fn test_send_lines_writes_block() {
        let (_reader, handle, client) = pair(1024).await;
        handle.send_lines(["1: a", "2: b", ""]).await.unwrap();

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "1: a");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "2: b");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "");
    }

    #[tokio::test]
    async fn test_close_happens_once() {
        let (_reader, handle, mut client) = pair(1024).await;
        let other = handle.clone();

        assert!(handle.close().await);
        assert!(!other.close().await);
        assert!(other.is_closed());
        assert!(matches!(
            other.send_line("late").await,
            Err(ConnectionError::Closed)
        ));

        // Peer sees end of stream.
        let mut buf = Vec::new();
        let n = client.read_to_end(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_io_error_classification() {
        let reset: ConnectionError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(matches!(reset, ConnectionError::Reset));
        let pipe: ConnectionError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(matches!(pipe, ConnectionError::Reset));
        let eof: ConnectionError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(eof, ConnectionError::Closed));
        let other: ConnectionError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(other, ConnectionError::Io(_)));
    }
}
