//! Config resolution for mcp-harness.
//!
//! Resolves [`HarnessConfig`] from multiple sources with the following priority
//! (highest to lowest):
//!
//! 1. CLI flags (applied by the caller after [`resolve_config`] returns)
//! 2. Environment variables (`MCP_HARNESS_*`)
//! 3. Explicit `--config` file, else `.mcp-harness.toml` in the working directory
//! 4. Global `~/.config/mcp-harness/config.toml`
//! 5. Compiled-in defaults (via [`HarnessConfig::default`])
//!
//! Only one file is read: the first of 3 and 4 that exists.

use super::types::HarnessConfig;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// File name searched for in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".mcp-harness.toml";

/// Resolve the harness configuration.
///
/// # Errors
///
/// Returns an error if an explicit `config_path` cannot be read, or if the
/// selected file is not valid TOML for [`HarnessConfig`].
pub fn resolve_config(config_path: Option<&Path>) -> anyhow::Result<HarnessConfig> {
    let current_dir = std::env::current_dir()?;
    let global_dir = dirs::config_dir().map(|d| d.join("mcp-harness"));
    let mut cfg = load_config(config_path, &current_dir, global_dir.as_deref())?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the file layer only (no environment overrides).
///
/// # Errors
///
/// See [`resolve_config`].
pub fn load_config(
    explicit: Option<&Path>,
    search_dir: &Path,
    global_dir: Option<&Path>,
) -> anyhow::Result<HarnessConfig> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        return parse(&contents, path);
    }

    let candidates: Vec<PathBuf> = std::iter::once(search_dir.join(LOCAL_CONFIG_FILE))
        .chain(global_dir.map(|d| d.join("config.toml")))
        .collect();

    for path in candidates {
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loaded harness config");
                return parse(&contents, &path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read config file: {e}");
            }
        }
    }

    Ok(HarnessConfig::default())
}

fn parse(contents: &str, path: &Path) -> anyhow::Result<HarnessConfig> {
    toml::from_str(contents).with_context(|| format!("invalid config file {}", path.display()))
}

/// Apply `MCP_HARNESS_*` environment variable overrides to `cfg`.
///
/// Empty string values are treated as "not set"; unparsable numbers are ignored.
fn apply_env_overrides(cfg: &mut HarnessConfig) {
    let string_vars: [(&str, &mut String); 6] = [
        ("MCP_HARNESS_SERVER_BIN", &mut cfg.server_bin),
        ("MCP_HARNESS_SERVER_CONFIG", &mut cfg.server_config),
        ("MCP_HARNESS_TRANSPORT", &mut cfg.transport),
        ("MCP_HARNESS_BASE_URL", &mut cfg.base_url),
        ("MCP_HARNESS_HEALTH_PATH", &mut cfg.health_path),
        ("MCP_HARNESS_AUTH_TOKEN", &mut cfg.auth_token),
    ];
    for (name, slot) in string_vars {
        if let Ok(v) = std::env::var(name) {
            if !v.is_empty() {
                *slot = v;
            }
        }
    }

    let millis_vars: [(&str, &mut u64); 4] = [
        ("MCP_HARNESS_HEALTH_TIMEOUT_MS", &mut cfg.health_timeout_ms),
        ("MCP_HARNESS_STARTUP_DELAY_MS", &mut cfg.startup_delay_ms),
        ("MCP_HARNESS_REQUEST_TIMEOUT_MS", &mut cfg.request_timeout_ms),
        ("MCP_HARNESS_SHUTDOWN_GRACE_MS", &mut cfg.shutdown_grace_ms),
    ];
    for (name, slot) in millis_vars {
        if let Ok(v) = std::env::var(name) {
            if let Ok(ms) = v.parse::<u64>() {
                *slot = ms;
            }
        }
    }

    if let Ok(v) = std::env::var("MCP_HARNESS_MAX_NOISE_LINES") {
        if let Ok(n) = v.parse::<usize>() {
            cfg.max_noise_lines = Some(n);
        }
    }
    if let Ok(v) = std::env::var("MCP_HARNESS_STRICT") {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => cfg.strict = true,
            "0" | "false" | "no" => cfg.strict = false,
            _ => {}
        }
    }
}
