//! Shared application state.
//!
//! Contains the state that is shared across all proxy handlers: the
//! configuration and the HTTP client used to reach the upstream backend.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigV1;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Client for the upstream auth backend. It has no cookie jar: cookies
    /// are forwarded per request, never remembered.
    pub upstream: reqwest::Client,
}

impl AppState {
    pub fn new(config: Arc<ConfigV1>) -> Result<Self, reqwest::Error> {
        let upstream = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.upstream.timeout_in_ms))
            .build()?;
        Ok(Self { config, upstream })
    }

    /// Absolute upstream URL for `path`.
    pub fn upstream_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.upstream.base_url.trim_end_matches('/'),
            path
        )
    }
}
