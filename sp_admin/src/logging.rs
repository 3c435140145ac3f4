//! Structured logging configuration.
//!
//! Log lines go to stderr so command output on stdout stays plain JSON.
//! Records emitted by the library through `log` are forwarded as well.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Initialize structured logging
///
/// Levels are configurable via the `RUST_LOG` env var.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Structured logging initialized");
}

/// Log the outcome of one admin command
pub fn log_command(command: &str, duration_ms: u64, succeeded: bool) {
    if succeeded {
        tracing::info!(command = command, duration_ms = duration_ms, "Command completed");
    } else {
        tracing::warn!(command = command, duration_ms = duration_ms, "Command failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_log_command() {
        // Just ensure it doesn't panic without a subscriber
        log_command("start", 12, true);
        log_command("advance", 40, false);
    }
}
