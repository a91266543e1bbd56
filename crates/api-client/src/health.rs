//! On-demand endpoint health probes.
//!
//! A probe never returns an error for the expected failure classes — every
//! outcome is represented in the returned [`HealthResult`]. Persistence is
//! owned by the status monitor, not by the probe itself, so inline checks
//! from other components don't amplify writes.

use anyhow::{Context, Result};
use reqwest::Client;
use shared::{ApiConfig, Endpoint, HealthStatus};
use std::time::{Duration, Instant};
use tracing::debug;

const EXCERPT_LEN: usize = 200;

/// Outcome of one probe.
#[derive(Debug, Clone)]
pub struct HealthResult {
    pub status: HealthStatus,
    pub response_time_ms: Option<u32>,
    pub error: Option<String>,
    pub body_excerpt: Option<String>,
}

/// Issues bounded-time GETs against endpoint paths and classifies the result.
pub struct HealthChecker {
    http: Client,
}

impl HealthChecker {
    /// Create a checker with the configured timeouts.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http })
    }

    /// Probe one path on one endpoint.
    ///
    /// Classification: `Up` on any 2xx, `Error` on other statuses with a
    /// readable body, `Down` on connection failure, DNS failure, or timeout.
    pub async fn check(&self, endpoint: &Endpoint, path: &str) -> HealthResult {
        let url = format!(
            "{}/{}",
            endpoint.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        debug!(endpoint = %endpoint.name, url = %url, "Probing endpoint");

        let started = Instant::now();
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection failure"
                } else {
                    "request failure"
                };
                return HealthResult {
                    status: HealthStatus::Down,
                    response_time_ms: None,
                    error: Some(format!("{}: {}", kind, e)),
                    body_excerpt: None,
                };
            }
        };

        let status = response.status();
        let body = response.text().await;
        let elapsed_ms = started.elapsed().as_millis() as u32;

        match body {
            Ok(body) if status.is_success() => HealthResult {
                status: HealthStatus::Up,
                response_time_ms: Some(elapsed_ms),
                error: None,
                body_excerpt: Some(excerpt(&body)),
            },
            Ok(body) => HealthResult {
                status: HealthStatus::Error,
                response_time_ms: Some(elapsed_ms),
                error: Some(format!("HTTP {}", status.as_u16())),
                body_excerpt: Some(excerpt(&body)),
            },
            Err(e) => HealthResult {
                status: HealthStatus::Down,
                response_time_ms: None,
                error: Some(format!("connection lost while reading body: {}", e)),
                body_excerpt: None,
            },
        }
    }
}

fn excerpt(text: &str) -> String {
    if text.len() <= EXCERPT_LEN {
        return text.to_string();
    }

    let mut end = EXCERPT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
