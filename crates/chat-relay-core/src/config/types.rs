//! Configuration types

use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use super::discovery::ConfigError;
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Shutdown configuration
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind (0 picks an ephemeral port)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on a single accept wait before the loop re-checks shutdown
    #[serde(default = "default_accept_poll_ms")]
    pub accept_poll_ms: u64,
    /// Maximum length of one inbound line
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            accept_poll_ms: default_accept_poll_ms(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Shutdown configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// How long to wait for session tasks once the shutdown flag is set
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_accept_poll_ms() -> u64 {
    1000
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn default_drain_timeout_ms() -> u64 {
    5000
}

impl RelayConfig {
    /// Resolve `host:port` into the address the listener binds.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = || ConfigError::InvalidAddress {
            host: self.server.host.clone(),
            port: self.server.port,
        };
        (self.server.host.as_str(), self.server.port)
            .to_socket_addrs()
            .map_err(|_| invalid())?
            .next()
            .ok_or_else(invalid)
    }

    pub fn accept_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server.accept_poll_ms.max(1))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown.drain_timeout_ms)
    }
}
