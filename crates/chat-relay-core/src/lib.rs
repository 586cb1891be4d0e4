//! Core types for chat-relay
//!
//! This crate holds everything about the relay that does not touch a socket:
//! client identities and pair keys, the line-oriented command grammar with its
//! reply strings, configuration resolution, and logging initialization. The
//! daemon crate builds the session manager on top of it.

pub mod config;
pub mod identity;
pub mod logging;
pub mod protocol;

pub use identity::{ClientId, PairKey, TargetId};
pub use protocol::{Command, CommandError};

// Re-export toml for config file access
pub use toml;
