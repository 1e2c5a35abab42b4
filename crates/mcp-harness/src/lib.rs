//! mcp-harness library crate.
//!
//! Drives a JSON-RPC exchange with an MCP server child process over stdio:
//! readiness gate, `initialize` handshake, `tools/list` discovery, and
//! `tools/call` invocations (including an authenticated variant). Exposed as
//! a library for integration testing and reuse by other scenario runners.

pub mod channel;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod framing;
pub mod harness;
pub mod logging;
pub mod message;
pub mod process;
pub mod readiness;
pub mod report;
pub mod scenario;

#[doc(inline)]
pub use channel::Channel;
#[doc(inline)]
pub use error::{ExchangeError, HarnessError};
#[doc(inline)]
pub use message::{Request, Response};
