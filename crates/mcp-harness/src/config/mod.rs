//! Configuration resolution for mcp-harness.
//!
//! The entry point is [`resolve_config`], which layers a TOML file, then
//! `MCP_HARNESS_*` environment variables, over [`HarnessConfig::default`].

mod resolve;
mod types;

pub use resolve::{LOCAL_CONFIG_FILE, load_config, resolve_config};
pub use types::HarnessConfig;
