//! Periodic status monitor.
//!
//! Probes every active endpoint across the configured resource paths and
//! persists one health record per probe. Scheduling is external — cron or
//! the CLI invoke `run_once`; this module only does one synchronous batch.

use crate::health::HealthChecker;
use anyhow::{Context, Result};
use chrono::Utc;
use shared::{EndpointRegistry, HealthStatus, NewHealthRecord};
use std::sync::Arc;
use tracing::{info, warn};

/// Summary of one monitor run.
#[derive(Debug, Clone, Default)]
pub struct MonitorStats {
    pub endpoints_checked: usize,
    pub probes: usize,
    pub up: usize,
    pub down: usize,
    pub error: usize,
    pub per_endpoint: Vec<EndpointSummary>,
}

/// Per-endpoint status counts from one run.
#[derive(Debug, Clone)]
pub struct EndpointSummary {
    pub endpoint_id: i64,
    pub name: String,
    pub up: usize,
    pub down: usize,
    pub error: usize,
}

/// Batch health prober over the registry's active endpoints.
pub struct StatusMonitor {
    checker: HealthChecker,
    registry: Arc<EndpointRegistry>,
    search_probe_query: String,
}

impl StatusMonitor {
    /// Create a monitor over the given registry.
    pub fn new(
        checker: HealthChecker,
        registry: Arc<EndpointRegistry>,
        search_probe_query: impl Into<String>,
    ) -> Self {
        Self {
            checker,
            registry,
            search_probe_query: search_probe_query.into(),
        }
    }

    /// Probe every active endpoint across the given paths, persisting one
    /// record per probe. Returns the per-status counts.
    pub async fn run_once(&self, paths: &[String]) -> Result<MonitorStats> {
        info!("Starting status monitor run");

        let endpoints = self
            .registry
            .list_active()
            .context("Failed to load active endpoints")?;

        if endpoints.is_empty() {
            warn!("No active endpoints to monitor");
            return Ok(MonitorStats::default());
        }

        let mut stats = MonitorStats {
            endpoints_checked: endpoints.len(),
            ..Default::default()
        };

        for endpoint in &endpoints {
            info!(endpoint = %endpoint.name, url = %endpoint.url, "Checking endpoint");

            let mut summary = EndpointSummary {
                endpoint_id: endpoint.id,
                name: endpoint.name.clone(),
                up: 0,
                down: 0,
                error: 0,
            };

            for path in paths {
                // The search resource rejects empty queries, probe it with one
                let probe_path = if path == "search" {
                    format!("{}?query={}", path, self.search_probe_query)
                } else {
                    path.clone()
                };

                let result = self.checker.check(endpoint, &probe_path).await;
                stats.probes += 1;

                match result.status {
                    HealthStatus::Up => {
                        stats.up += 1;
                        summary.up += 1;
                    }
                    HealthStatus::Down | HealthStatus::Unknown => {
                        stats.down += 1;
                        summary.down += 1;
                        warn!(
                            endpoint = %endpoint.name,
                            path = %path,
                            error = result.error.as_deref().unwrap_or("unknown"),
                            "Endpoint path down"
                        );
                    }
                    HealthStatus::Error => {
                        stats.error += 1;
                        summary.error += 1;
                        warn!(
                            endpoint = %endpoint.name,
                            path = %path,
                            error = result.error.as_deref().unwrap_or("unknown"),
                            "Endpoint path returned an error"
                        );
                    }
                }

                self.registry
                    .record_health(&NewHealthRecord {
                        endpoint_id: endpoint.id,
                        path: path.clone(),
                        status: result.status,
                        response_time_ms: result.response_time_ms,
                        error_message: result.error,
                        response_excerpt: result.body_excerpt,
                        checked_at: Utc::now(),
                    })
                    .with_context(|| {
                        format!("Failed to persist health record for {}/{}", endpoint.name, path)
                    })?;
            }

            stats.per_endpoint.push(summary);
        }

        // Force the next fallback request to re-read endpoint state
        self.registry.invalidate_cache();

        info!(
            endpoints = stats.endpoints_checked,
            probes = stats.probes,
            up = stats.up,
            down = stats.down,
            error = stats.error,
            "Status monitor run complete"
        );

        Ok(stats)
    }
}
