//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables
//! 3. Config file (`--config`, or `chat-relay.toml` in the current directory)
//! 4. Defaults

mod discovery;
mod types;

pub use discovery::{
    CONFIG_FILE_NAME, ConfigError, ConfigOverrides, load_config_file, resolve_config,
};
pub use types::{RelayConfig, ServerConfig, ShutdownConfig};
