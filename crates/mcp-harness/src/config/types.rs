//! Configuration types for mcp-harness.
//!
//! [`HarnessConfig`] is deserialized from a TOML file. Every field has a
//! default, so an empty or absent file yields a configuration that targets a
//! locally built `ratchet-mcp` and a Ratchet server on `127.0.0.1:8080`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolved harness configuration.
///
/// # Example `.mcp-harness.toml`
///
/// ```toml
/// server_bin = "./target/debug/ratchet-mcp"
/// server_config = "sample/configs/test-config.yaml"
/// base_url = "http://127.0.0.1:8080"
/// request_timeout_ms = 5000
/// auth_token = "test-claude-client-key-12345"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Path to the MCP server binary
    #[serde(default = "default_server_bin")]
    pub server_bin: String,

    /// Config file passed to the server with `-c`
    #[serde(default = "default_server_config")]
    pub server_config: String,

    /// Transport passed to the server with `--transport`
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Base URL of the Ratchet HTTP service probed before the run
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Health endpoint path appended to `base_url`
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Bound on the readiness probe (default: `2000`)
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,

    /// Pause between spawning the server and the first request (default: `1000`)
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Per-exchange response timeout (default: `5000`)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Wait after SIGTERM before force-killing the server (default: `2000`)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Bearer token used by the authenticated `tools/call` step
    #[serde(default = "default_auth_token")]
    pub auth_token: String,

    /// Fail an exchange after this many skipped non-response lines (default: unlimited)
    #[serde(default)]
    pub max_noise_lines: Option<usize>,

    /// Show the server's stderr instead of discarding it
    #[serde(default)]
    pub inherit_stderr: bool,

    /// Exit non-zero when a required step fails
    #[serde(default)]
    pub strict: bool,
}

fn default_server_bin() -> String {
    "./target/release/ratchet-mcp".to_string()
}

fn default_server_config() -> String {
    "sample/configs/test-config.yaml".to_string()
}

fn default_transport() -> String {
    "stdio".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_health_timeout_ms() -> u64 {
    2000
}

fn default_startup_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_shutdown_grace_ms() -> u64 {
    2000
}

fn default_auth_token() -> String {
    "test-claude-client-key-12345".to_string()
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            server_bin: default_server_bin(),
            server_config: default_server_config(),
            transport: default_transport(),
            base_url: default_base_url(),
            health_path: default_health_path(),
            health_timeout_ms: default_health_timeout_ms(),
            startup_delay_ms: default_startup_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            auth_token: default_auth_token(),
            max_noise_lines: None,
            inherit_stderr: false,
            strict: false,
        }
    }
}

impl HarnessConfig {
    /// Full health-check URL: `base_url` joined with `health_path`.
    pub fn health_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.health_path.starts_with('/') {
            format!("{base}{}", self.health_path)
        } else {
            format!("{base}/{}", self.health_path)
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
