//! Types shared across the fallback client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Resource paths exposed by every upstream scraping API.
pub mod resources {
    pub const HOME: &str = "home";
    pub const ANIME_TERBARU: &str = "anime-terbaru";
    pub const MOVIE: &str = "movie";
    pub const JADWAL_RILIS: &str = "jadwal-rilis";
    pub const ANIME_DETAIL: &str = "anime-detail";
    pub const EPISODE_DETAIL: &str = "episode-detail";
    pub const SEARCH: &str = "search";
}

/// Envelope shape of a raw upstream payload.
///
/// Upstream providers disagree on response structure; classification is a
/// closed decision over the two known wrapper keys so a new shape has to be
/// added here deliberately instead of being guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `{"confidence_score": ..., "data": {...}}` — payload under `data`.
    Wrapped,
    /// `{"confidence_score": ..., <fields...>}` — payload is the object itself.
    Direct,
    /// No `confidence_score` key at all; passed through unchanged.
    Bare,
}

/// Normalized payload returned to page-rendering callers, with the metadata
/// needed to attribute it to a source.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedResponse {
    /// The logical payload, uniform regardless of upstream envelope.
    pub data: Value,

    /// Upstream-supplied completeness score in [0.0, 1.0]; 1.0 when absent.
    /// Surfaced for callers — a low score does not trigger fallback here.
    pub confidence: f64,

    /// Name of the endpoint that served the request.
    pub source_name: String,

    /// Scraped site's domain, for links back to the original pages.
    pub source_domain: String,

    pub fetched_at: DateTime<Utc>,
}
