//! Readiness gate checked before the server process is spawned.
//!
//! A [`ReadinessProbe`] answers one question: is the backing Ratchet service
//! up? Probes never return errors; every failure mode (connection refused,
//! non-2xx status, timeout) is simply "not ready".

use std::time::Duration;

use async_trait::async_trait;

use crate::config::HarnessConfig;

#[async_trait]
pub trait ReadinessProbe: Send + Sync + std::fmt::Debug {
    async fn is_ready(&self) -> bool;

    /// Human-readable target, used in diagnostics.
    fn target(&self) -> String;
}

/// HTTP GET probe; any 2xx status means ready.
#[derive(Debug, Clone)]
pub struct HttpReadiness {
    url: String,
    timeout: Duration,
}

impl HttpReadiness {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.health_url(), config.health_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadiness {
    async fn is_ready(&self) -> bool {
        let client = match reqwest::Client::builder().timeout(self.timeout).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("failed to build HTTP client for readiness probe: {e}");
                return false;
            }
        };

        match client.get(&self.url).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(url = %self.url, status = %resp.status(), "service is ready");
                true
            }
            Ok(resp) => {
                tracing::debug!(url = %self.url, status = %resp.status(), "service answered but is not ready");
                false
            }
            Err(e) => {
                tracing::debug!(url = %self.url, "readiness probe failed: {e}");
                false
            }
        }
    }

    fn target(&self) -> String {
        self.url.clone()
    }
}

/// Probe that always succeeds, for `--skip-health-check`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReady;

#[async_trait]
impl ReadinessProbe for AlwaysReady {
    async fn is_ready(&self) -> bool {
        true
    }

    fn target(&self) -> String {
        "(health check skipped)".to_string()
    }
}
