//! Data models for the upstream API core.
//!
//! This module defines the endpoint registry records and the health probe
//! records shared between the fallback client, the status monitor, and the
//! operator CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One configured upstream API.
///
/// Endpoints are tried in descending priority order; ties are broken by
/// insertion order (ascending id), so the fallback chain is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub name: String,

    /// Absolute base URL of the upstream API, e.g. `https://api.example.com/api/v1`.
    pub url: String,

    /// Website domain the upstream scrapes, used to build user-facing links
    /// back to the original site.
    pub source_domain: String,

    /// Higher priority is tried first.
    pub priority: i64,
    pub is_active: bool,

    /// Number of requests this endpoint has served.
    pub success_count: i64,
    pub last_used: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Endpoint to be inserted into the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEndpoint {
    pub name: String,
    pub url: String,
    pub source_domain: String,
    pub priority: i64,
    pub is_active: bool,
}

/// Partial update of an endpoint. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct EndpointUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub source_domain: Option<String>,
    pub priority: Option<i64>,
    pub is_active: Option<bool>,
}

/// Classification of a health probe outcome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 2xx response within the timeout.
    Up,
    /// Connection failure, DNS failure, or timeout.
    Down,
    /// Non-2xx response with a readable body.
    Error,
    /// Never probed.
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Up => write!(f, "up"),
            HealthStatus::Down => write!(f, "down"),
            HealthStatus::Error => write!(f, "error"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for HealthStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(HealthStatus::Up),
            "down" => Ok(HealthStatus::Down),
            "error" => Ok(HealthStatus::Error),
            "unknown" => Ok(HealthStatus::Unknown),
            _ => Err(anyhow::anyhow!("Invalid health status: {}", s)),
        }
    }
}

/// Result of one health probe, persisted append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: i64,
    pub endpoint_id: i64,

    /// Resource path that was probed, e.g. `home` or `/health`.
    pub path: String,
    pub status: HealthStatus,
    pub response_time_ms: Option<u32>,
    pub error_message: Option<String>,

    /// Truncated body snapshot kept for operator diagnostics.
    pub response_excerpt: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Health probe result to be persisted.
#[derive(Debug, Clone)]
pub struct NewHealthRecord {
    pub endpoint_id: i64,
    pub path: String,
    pub status: HealthStatus,
    pub response_time_ms: Option<u32>,
    pub error_message: Option<String>,
    pub response_excerpt: Option<String>,
    pub checked_at: DateTime<Utc>,
}
