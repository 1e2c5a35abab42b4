//! Process-level tracing initialization for the harness binary.
//!
//! Logs go to stderr; stdout is reserved for the run report.

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Environment variable selecting the log level.
pub const LOG_ENV: &str = "MCP_HARNESS_LOG";

fn parse_level(raw: Option<&str>) -> tracing::Level {
    match raw.unwrap_or("info").to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Initialize tracing output from `MCP_HARNESS_LOG`.
///
/// This is safe to call multiple times; only the first call initializes the
/// subscriber. It is best-effort and never returns an error.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let level = parse_level(std::env::var(LOG_ENV).ok().as_deref());
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    let _ = INIT.set(());
}
