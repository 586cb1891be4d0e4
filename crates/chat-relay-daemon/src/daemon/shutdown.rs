//! Shutdown coordination.
//!
//! [`ShutdownCoordinator`] is the process-wide shutdown flag. It wraps a
//! [`CancellationToken`] that the listener and every session worker race
//! against their blocking operations, plus the reason recorded by whichever
//! source set the flag first. Setting it again is a no-op.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{error, info, warn};

/// Why the relay is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT/SIGTERM from the operator.
    OperatorInterrupt,
    /// The last registered client left.
    LastClientLeft,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::OperatorInterrupt => write!(f, "operator interrupt"),
            ShutdownReason::LastClientLeft => write!(f, "last client disconnected"),
        }
    }
}

/// Cooperative, idempotent shutdown flag shared by the listener and all
/// session workers.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that set it.
    pub fn signal(&self, reason: ShutdownReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            info!("Shutdown requested: {reason}");
        }
        self.token.cancel();
        first
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason recorded by the first [`signal`](Self::signal) call.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Resolves once the flag is set.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Summary of [`drain_sessions`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub finished: usize,
    pub failed: usize,
    pub aborted: usize,
}

/// Wait for outstanding session tasks after the flag is set.
///
/// Sessions observe the flag on their own and finish promptly; any still
/// running after `drain_timeout` are aborted and logged.
pub async fn drain_sessions<T: 'static>(
    mut sessions: JoinSet<T>,
    drain_timeout: Duration,
) -> DrainReport {
    info!(
        "Draining {} session task(s) (timeout: {:?})",
        sessions.len(),
        drain_timeout
    );

    let mut report = DrainReport::default();

    let drained = timeout(drain_timeout, async {
        while let Some(result) = sessions.join_next().await {
            match result {
                Ok(_) => report.finished += 1,
                Err(e) => {
                    error!("Session task failed: {e}");
                    report.failed += 1;
                }
            }
        }
    })
    .await;

    if drained.is_err() {
        report.aborted = sessions.len();
        warn!(
            "{} session task(s) still running after {:?}; aborting",
            report.aborted, drain_timeout
        );
        sessions.shutdown().await;
    }

    info!(
        "Session drain complete: {} finished, {} failed, {} aborted",
        report.finished, report.failed, report.aborted
    );
    report
}
