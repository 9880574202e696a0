//! Logging for the `idxlint` binary.
//!
//! Diagnostics go to stderr so that reports on stdout stay machine-readable.
//!
//! # Environment Variables
//!
//! - `IDXLINT_DEBUG=true|1|yes` - Enable debug logging
//! - `IDXLINT_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `IDXLINT_LOG_FORMAT=json|pretty|compact` - Set the output format (default: compact)
//!
//! The `--verbose` flag behaves like `IDXLINT_DEBUG=true`.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `IDXLINT_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("IDXLINT_DEBUG")
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Get the configured log level from `IDXLINT_LOG_LEVEL`.
///
/// Defaults to "debug" if debug logging is on, otherwise "warn".
pub fn get_log_level(verbose: bool) -> &'static str {
    resolve_level(
        env::var("IDXLINT_LOG_LEVEL").ok().as_deref(),
        verbose || is_debug_enabled(),
    )
}

fn resolve_level(requested: Option<&str>, debug: bool) -> &'static str {
    match requested.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ if debug => "debug",
        _ => "warn",
    }
}

/// Get the configured log format from `IDXLINT_LOG_FORMAT`.
///
/// Defaults to "compact", one line per event.
pub fn get_log_format() -> &'static str {
    resolve_format(env::var("IDXLINT_LOG_FORMAT").ok().as_deref())
}

fn resolve_format(requested: Option<&str>) -> &'static str {
    match requested.map(str::to_lowercase).as_deref() {
        Some("pretty") => "pretty",
        Some("json") => "json",
        _ => "compact",
    }
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// A stderr subscriber is always installed, so warnings about skipped input
/// (unreadable sources, malformed changelogs) reach the user at the default
/// `warn` level.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let level = get_log_level(verbose);
        let filter = EnvFilter::try_new(format!(
            "idxlint={},idxlint_core={},idxlint_cli={}",
            level, level, level
        ))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

        match get_log_format() {
            "json" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            }
            "compact" => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact().with_writer(std::io::stderr))
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty().with_writer(std::io::stderr))
                    .init();
            }
        }

        tracing::info!(
            level = level,
            format = get_log_format(),
            "idxlint logging initialized"
        );
    });
}
