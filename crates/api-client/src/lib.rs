//! Fallback HTTP client for KortekStream's upstream scraping APIs.
//!
//! This library holds the prioritized endpoint chain logic: ordered
//! attempts with per-endpoint failure backoff, normalization of the known
//! upstream envelope shapes, on-demand health probes, and the batch status
//! monitor.

pub mod api;
pub mod health;
pub mod monitor;

pub use api::backoff::FailureBackoff;
pub use api::client::FallbackClient;
pub use api::error::{AttemptError, EndpointFailure, FetchError};
pub use api::normalize::{classify, normalize};
pub use api::types::{resources, Envelope, NormalizedResponse};
pub use health::{HealthChecker, HealthResult};
pub use monitor::{EndpointSummary, MonitorStats, StatusMonitor};
