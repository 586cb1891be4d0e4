//! chat-relayd - multi-client TCP chat relay

use anyhow::{Context, Result};
use chat_relay_core::config::{ConfigOverrides, resolve_config};
use chat_relay_daemon::daemon::{self, Relay};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

/// chat-relayd - multi-client TCP chat relay
#[derive(Parser, Debug)]
#[command(name = "chat-relayd")]
#[command(about = "Relay text messages between TCP clients by identity")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long, value_name = "HOST")]
    host: Option<String>,

    /// Port to bind
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    chat_relay_core::logging::init_with_level(args.verbose.then_some(tracing::Level::DEBUG));

    info!("chat-relayd starting...");

    let current_dir = std::env::current_dir().context("Failed to get current directory")?;

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        host: args.host.clone(),
        port: args.port,
    };

    let config =
        resolve_config(&overrides, &current_dir).context("Failed to resolve configuration")?;

    if let Some(config_path) = args.config {
        info!("Loaded config from: {}", config_path.display());
    } else {
        info!("Using resolved configuration");
    }

    let relay = Relay::new();

    // Operator interrupt: say goodbye to every client, then set the flag.
    let relay_for_signals = relay.clone();
    tokio::spawn(async move {
        let shutdown = relay_for_signals.shutdown().clone();
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = wait_for_signal() => {
                if let Err(e) = received {
                    error!("Signal handler failed: {e}");
                    return;
                }
            }
        }
        relay_for_signals.interrupt().await;
    });

    daemon::run(&config, relay)
        .await
        .context("Relay event loop failed")?;

    info!("Server gracefully shutdown.");
    Ok(())
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        tokio::select! {
            received = tokio::signal::ctrl_c() => {
                received?;
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
