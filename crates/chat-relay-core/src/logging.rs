//! Shared logging initialization for chat-relay binaries.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Environment variable consulted for the log level.
pub const LOG_ENV: &str = "CHAT_RELAY_LOG";

fn parse_level(raw: &str) -> tracing::Level {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

fn env_level() -> tracing::Level {
    parse_level(&std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string()))
}

/// Initialize process-level tracing output from `CHAT_RELAY_LOG`.
///
/// This is safe to call multiple times; only the first call initializes the
/// subscriber. It never returns an error.
pub fn init() {
    init_with_level(None);
}

/// Like [`init`], but `level` (when set) takes precedence over the
/// environment. Used by `--verbose`.
pub fn init_with_level(level: Option<tracing::Level>) {
    if INIT.get().is_some() {
        return;
    }
    let level = level.unwrap_or_else(env_level);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
    let _ = INIT.set(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_known_values() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(parse_level("Warn"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("loud"), tracing::Level::INFO);
        assert_eq!(parse_level(""), tracing::Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init_with_level(Some(tracing::Level::DEBUG));
        assert!(INIT.get().is_some());
    }
}
