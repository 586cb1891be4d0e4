//! Main relay event loop

use std::time::Duration;

use anyhow::{Context, Result};
use chat_relay_core::config::RelayConfig;
use tokio::task::JoinSet;
use tracing::info;

use super::listener::RelayListener;
use super::relay::Relay;
use super::shutdown::{DrainReport, drain_sessions};

/// Bind the configured address and serve until shutdown.
pub async fn run(config: &RelayConfig, relay: Relay) -> Result<DrainReport> {
    let listener = RelayListener::bind(config)
        .await
        .context("Failed to start relay listener")?;
    Ok(serve(listener, relay, config.drain_timeout()).await)
}

/// Serve on an already bound listener.
///
/// This function:
/// 1. Runs the accept loop, spawning one session task per client
/// 2. Returns from the accept loop once the shutdown flag is set (operator
///    interrupt or last client gone)
/// 3. Waits up to `drain_timeout` for session tasks to observe the flag
pub async fn serve(listener: RelayListener, relay: Relay, drain_timeout: Duration) -> DrainReport {
    let mut sessions = JoinSet::new();

    listener.run(&relay, &mut sessions).await;

    match relay.shutdown().reason() {
        Some(reason) => info!("Accept loop ended ({reason}). Draining sessions..."),
        None => info!("Accept loop ended. Draining sessions..."),
    }

    let report = drain_sessions(sessions, drain_timeout).await;
    info!("Relay event loop shutdown complete");
    report
}
