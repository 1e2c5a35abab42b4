//! Error types for exchanges and whole harness runs.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Failure of a single request/response exchange.
///
/// Every variant is local to one scripted step: the runner records it and
/// moves on to the next step.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The server's stdin refused the request (e.g. broken pipe).
    #[error("failed to write request to server: {0}")]
    WriteFailed(#[source] std::io::Error),

    /// No correlated response arrived before the deadline.
    #[error("no response within {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// The server's output stream reached EOF before a response arrived.
    #[error("server output stream closed before a response arrived")]
    StreamClosed,

    /// A response arrived for an id that is neither the awaited one nor a
    /// previously abandoned one.
    #[error("response id {actual} does not match request id {expected}")]
    ProtocolViolation { expected: Value, actual: Value },

    /// More non-response lines than the configured cap were skipped.
    #[error("skipped {skipped} non-response lines without finding a response")]
    NoisyStream { skipped: usize },

    /// Reading the server's output failed for a reason other than EOF.
    #[error("failed to read server output: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ExchangeError {
    /// Short marker used in step reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::WriteFailed(_) => "write failed",
            Self::Timeout { .. } => "timeout",
            Self::StreamClosed => "stream closed",
            Self::ProtocolViolation { .. } => "protocol violation",
            Self::NoisyStream { .. } => "noisy stream",
            Self::Read(_) => "read failed",
            Self::Serialize(_) => "serialize failed",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failures that end a harness run before or after the scripted steps.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The readiness probe reported the backing service as unavailable.
    #[error("Ratchet server is not ready at {target}. Please start it first.")]
    ReadinessUnavailable { target: String },

    #[error("failed to spawn server process `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to stop server process: {0}")]
    Shutdown(#[source] std::io::Error),
}
