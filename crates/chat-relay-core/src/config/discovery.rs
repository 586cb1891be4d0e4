//! Configuration discovery and resolution

use super::types::RelayConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// File name looked up in the current directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "chat-relay.toml";

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Host/port do not resolve to a socket address
    #[error("Invalid listen address {host}:{port}")]
    InvalidAddress { host: String, port: u16 },
}

/// Command-line overrides for configuration
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override bind host
    pub host: Option<String>,
    /// Override bind port
    pub port: Option<u16>,
    /// Path to config file override
    pub config_path: Option<PathBuf>,
}

/// Resolve configuration from all sources
///
/// Priority (highest to lowest):
/// 1. Command-line overrides
/// 2. Environment variables (`CHAT_RELAY_HOST`, `CHAT_RELAY_PORT`)
/// 3. Config file: `overrides.config_path`, else `chat-relay.toml` in `current_dir`
/// 4. Defaults
///
/// An explicitly requested config file that cannot be read or parsed is an
/// error. A discovered file that fails to parse is logged and skipped.
pub fn resolve_config(
    overrides: &ConfigOverrides,
    current_dir: &Path,
) -> Result<RelayConfig, ConfigError> {
    let mut config = RelayConfig::default();

    // 3. Config file
    if let Some(ref explicit) = overrides.config_path {
        merge_config(&mut config, load_config_file(explicit)?);
    } else {
        let discovered = current_dir.join(CONFIG_FILE_NAME);
        if discovered.exists() {
            match load_config_file(&discovered) {
                Ok(file_config) => merge_config(&mut config, file_config),
                Err(e) => warn!("Failed to parse config at {discovered:?}: {e}"),
            }
        }
    }

    // 2. Apply environment variables
    apply_env_overrides(&mut config);

    // 1. Apply command-line overrides
    apply_cli_overrides(&mut config, overrides);

    Ok(config)
}

/// Load config from a TOML file
pub fn load_config_file(path: &Path) -> Result<RelayConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: RelayConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Merge file config into base config
fn merge_config(base: &mut RelayConfig, file: RelayConfig) {
    base.server.host = file.server.host;
    base.server.port = file.server.port;
    base.server.accept_poll_ms = file.server.accept_poll_ms;
    base.server.max_frame_bytes = file.server.max_frame_bytes;

    base.shutdown.drain_timeout_ms = file.shutdown.drain_timeout_ms;
}

/// Apply environment variable overrides
fn apply_env_overrides(config: &mut RelayConfig) {
    if let Ok(host) = std::env::var("CHAT_RELAY_HOST") {
        config.server.host = host;
    }

    if let Ok(port) = std::env::var("CHAT_RELAY_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!("Ignoring CHAT_RELAY_PORT={port:?}: {e}"),
        }
    }
}

/// Apply command-line overrides
fn apply_cli_overrides(config: &mut RelayConfig, overrides: &ConfigOverrides) {
    if let Some(ref host) = overrides.host {
        config.server.host = host.clone();
    }

    if let Some(port) = overrides.port {
        config.server.port = port;
    }
}
