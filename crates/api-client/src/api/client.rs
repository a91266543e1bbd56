//! Fallback API client with prioritized endpoint failover.
//!
//! Each request walks the active endpoint chain in priority order, skipping
//! endpoints inside a failure backoff window, and returns the first
//! normalized success. A failed attempt is recorded and iteration moves on;
//! only full exhaustion surfaces as an error.

use super::backoff::FailureBackoff;
use super::error::{AttemptError, EndpointFailure, FetchError};
use super::normalize::normalize;
use super::types::{resources, NormalizedResponse};
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use shared::{ApiConfig, Endpoint, EndpointRegistry};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const BODY_EXCERPT_LEN: usize = 200;

/// Client that fails over across the registry's endpoint chain.
///
/// Safe to share between concurrent callers; the backoff map is the only
/// mutable state and sits behind a mutex. `request` itself is idempotent on
/// success apart from counters, so callers may wrap it in their own retry
/// or deadline (`tokio::time::timeout`).
pub struct FallbackClient {
    http: Client,
    registry: Arc<EndpointRegistry>,
    backoff: Mutex<FailureBackoff>,
}

impl FallbackClient {
    /// Create a new fallback client over the given registry.
    pub fn new(registry: Arc<EndpointRegistry>, config: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            registry,
            backoff: Mutex::new(FailureBackoff::new(
                Duration::from_secs(config.backoff.initial_secs),
                Duration::from_secs(config.backoff.max_secs),
            )),
        })
    }

    /// Fetch a resource through the fallback chain.
    ///
    /// Endpoints are attempted strictly in descending priority order; the
    /// first success wins and no further endpoints are tried. A low
    /// confidence score is surfaced, not retried — callers that want
    /// confidence-based fallback re-invoke with their own policy.
    pub async fn request(
        &self,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<NormalizedResponse, FetchError> {
        let endpoints = self.registry.list_active()?;
        let mut attempts = Vec::new();

        for endpoint in &endpoints {
            let suppressed = self
                .backoff
                .lock()
                .expect("backoff lock poisoned")
                .remaining(endpoint.id);

            if let Some(left) = suppressed {
                debug!(
                    endpoint = %endpoint.name,
                    resource,
                    remaining_s = left.as_secs(),
                    "Skipping endpoint in backoff window"
                );
                attempts.push(EndpointFailure {
                    endpoint: endpoint.name.clone(),
                    error: AttemptError::Suppressed(left.as_secs()),
                });
                continue;
            }

            match self.attempt(endpoint, resource, params).await {
                Ok(raw) => {
                    let (data, confidence) = normalize(raw);

                    self.backoff
                        .lock()
                        .expect("backoff lock poisoned")
                        .clear(endpoint.id);

                    if let Err(e) = self.registry.record_success(endpoint.id) {
                        warn!(endpoint = %endpoint.name, error = %e, "Failed to record success");
                    }

                    info!(
                        endpoint = %endpoint.name,
                        resource,
                        confidence,
                        "Request served"
                    );

                    return Ok(NormalizedResponse {
                        data,
                        confidence,
                        source_name: endpoint.name.clone(),
                        source_domain: endpoint.source_domain.clone(),
                        fetched_at: Utc::now(),
                    });
                }
                Err(error) => {
                    let consecutive = self
                        .backoff
                        .lock()
                        .expect("backoff lock poisoned")
                        .record_failure(endpoint.id);

                    warn!(
                        endpoint = %endpoint.name,
                        resource,
                        error = %error,
                        consecutive,
                        "Endpoint attempt failed, falling back"
                    );

                    attempts.push(EndpointFailure {
                        endpoint: endpoint.name.clone(),
                        error,
                    });
                }
            }
        }

        Err(FetchError::AllEndpointsFailed { attempts })
    }

    /// One bounded GET against one endpoint, outcome as a value.
    async fn attempt(
        &self,
        endpoint: &Endpoint,
        resource: &str,
        params: &[(&str, String)],
    ) -> Result<Value, AttemptError> {
        let url = format!(
            "{}/{}",
            endpoint.url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        );

        debug!(url = %url, "Attempting request");

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable body".to_string());
            return Err(AttemptError::Upstream {
                status: status.as_u16(),
                detail: excerpt(&detail),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AttemptError::Body(e.to_string()))
    }

    // ===== Typed resource wrappers =====

    /// Home page aggregate (top 10, new episodes, movies, schedule).
    pub async fn get_home(&self) -> Result<NormalizedResponse, FetchError> {
        self.request(resources::HOME, &[]).await
    }

    /// Latest anime, paginated.
    pub async fn get_anime_terbaru(&self, page: u32) -> Result<NormalizedResponse, FetchError> {
        self.request(resources::ANIME_TERBARU, &[("page", page.to_string())])
            .await
    }

    /// Movie list, paginated.
    pub async fn get_movie_list(&self, page: u32) -> Result<NormalizedResponse, FetchError> {
        self.request(resources::MOVIE, &[("page", page.to_string())])
            .await
    }

    /// Release schedule, optionally filtered to one day.
    pub async fn get_jadwal_rilis(
        &self,
        day: Option<&str>,
    ) -> Result<NormalizedResponse, FetchError> {
        match day {
            Some(day) => {
                let path = format!("{}/{}", resources::JADWAL_RILIS, day.to_lowercase());
                self.request(&path, &[]).await
            }
            None => self.request(resources::JADWAL_RILIS, &[]).await,
        }
    }

    /// Full detail page for one anime.
    pub async fn get_anime_detail(
        &self,
        anime_slug: &str,
    ) -> Result<NormalizedResponse, FetchError> {
        self.request(
            resources::ANIME_DETAIL,
            &[("anime_slug", anime_slug.to_string())],
        )
        .await
    }

    /// Episode detail including stream and download links.
    pub async fn get_episode_detail(
        &self,
        episode_url: &str,
    ) -> Result<NormalizedResponse, FetchError> {
        self.request(
            resources::EPISODE_DETAIL,
            &[("episode_url", episode_url.to_string())],
        )
        .await
    }

    /// Title search.
    pub async fn search_anime(&self, query: &str) -> Result<NormalizedResponse, FetchError> {
        self.request(resources::SEARCH, &[("query", query.to_string())])
            .await
    }
}

/// Truncate upstream error bodies so diagnostics stay log-sized.
fn excerpt(text: &str) -> String {
    if text.len() <= BODY_EXCERPT_LEN {
        return text.to_string();
    }

    let mut end = BODY_EXCERPT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
