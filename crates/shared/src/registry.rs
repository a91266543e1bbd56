//! Endpoint registry backed by SQLite.
//!
//! This module provides the CRUD surface over upstream API endpoints plus
//! the cached read path used by the fallback client on every request. Any
//! mutation invalidates the cache before returning, so a caller never sees
//! a deleted or deactivated endpoint after the write has committed.

use crate::models::*;
use crate::Database;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed endpoint configuration (bad URL, empty name).
    #[error("invalid endpoint configuration: {0}")]
    Validation(String),

    /// Operation referenced an unknown endpoint id.
    #[error("endpoint {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

struct CachedList {
    endpoints: Vec<Endpoint>,
    fetched_at: Instant,
}

/// Registry of upstream API endpoints with a TTL-cached active list.
///
/// One instance owns the database handle; share it behind an `Arc` between
/// the fallback client, the status monitor, and the CLI.
pub struct EndpointRegistry {
    db: Mutex<Database>,
    cache: Mutex<Option<CachedList>>,
    cache_ttl: Duration,
}

impl EndpointRegistry {
    /// Create a registry over an open database
    pub fn new(db: Database, cache_ttl: Duration) -> Self {
        Self {
            db: Mutex::new(db),
            cache: Mutex::new(None),
            cache_ttl,
        }
    }

    /// All active endpoints, priority descending, ties broken by id ascending.
    ///
    /// Served from cache within the TTL; every mutation drops the cache first,
    /// so reads after a write always hit the database.
    pub fn list_active(&self) -> Result<Vec<Endpoint>, RegistryError> {
        {
            let cache = self.cache.lock().expect("registry cache lock poisoned");
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    debug!(count = cached.endpoints.len(), "Endpoint list cache hit");
                    return Ok(cached.endpoints.clone());
                }
            }
        }

        let endpoints = {
            let db = self.db.lock().expect("registry db lock poisoned");
            let mut stmt = db.conn().prepare(
                "SELECT id, name, url, source_domain, priority, is_active,
                        success_count, last_used, created_at, updated_at
                 FROM endpoints
                 WHERE is_active = 1
                 ORDER BY priority DESC, id ASC",
            )?;
            let rows = stmt.query_map([], row_to_endpoint)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        debug!(count = endpoints.len(), "Endpoint list loaded from database");

        *self.cache.lock().expect("registry cache lock poisoned") = Some(CachedList {
            endpoints: endpoints.clone(),
            fetched_at: Instant::now(),
        });

        Ok(endpoints)
    }

    /// All endpoints regardless of active flag, for operator listings.
    pub fn list_all(&self) -> Result<Vec<Endpoint>, RegistryError> {
        let db = self.db.lock().expect("registry db lock poisoned");
        let mut stmt = db.conn().prepare(
            "SELECT id, name, url, source_domain, priority, is_active,
                    success_count, last_used, created_at, updated_at
             FROM endpoints
             ORDER BY priority DESC, id ASC",
        )?;
        let rows = stmt.query_map([], row_to_endpoint)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Fetch one endpoint by id
    pub fn get(&self, id: i64) -> Result<Endpoint, RegistryError> {
        let db = self.db.lock().expect("registry db lock poisoned");
        db.conn()
            .query_row(
                "SELECT id, name, url, source_domain, priority, is_active,
                        success_count, last_used, created_at, updated_at
                 FROM endpoints WHERE id = ?1",
                params![id],
                row_to_endpoint,
            )
            .optional()?
            .ok_or(RegistryError::NotFound(id))
    }

    /// Insert a new endpoint after validating its configuration.
    pub fn add(&self, new: &NewEndpoint) -> Result<Endpoint, RegistryError> {
        validate_endpoint(&new.name, &new.url)?;

        let now = Utc::now();
        let id = {
            let db = self.db.lock().expect("registry db lock poisoned");
            db.conn().execute(
                "INSERT INTO endpoints
                    (name, url, source_domain, priority, is_active,
                     success_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)",
                params![
                    new.name,
                    new.url,
                    new.source_domain,
                    new.priority,
                    new.is_active,
                    now,
                ],
            )?;
            db.conn().last_insert_rowid()
        };

        self.invalidate_cache();
        info!(id, name = %new.name, url = %new.url, "Endpoint added");

        self.get(id)
    }

    /// Apply a partial update to an endpoint.
    pub fn update(&self, id: i64, update: &EndpointUpdate) -> Result<Endpoint, RegistryError> {
        let existing = self.get(id)?;

        let name = update.name.clone().unwrap_or(existing.name);
        let url = update.url.clone().unwrap_or(existing.url);
        let source_domain = update.source_domain.clone().unwrap_or(existing.source_domain);
        let priority = update.priority.unwrap_or(existing.priority);
        let is_active = update.is_active.unwrap_or(existing.is_active);

        validate_endpoint(&name, &url)?;

        {
            let db = self.db.lock().expect("registry db lock poisoned");
            db.conn().execute(
                "UPDATE endpoints
                 SET name = ?1, url = ?2, source_domain = ?3, priority = ?4,
                     is_active = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![name, url, source_domain, priority, is_active, Utc::now(), id],
            )?;
        }

        self.invalidate_cache();
        info!(id, name = %name, "Endpoint updated");

        self.get(id)
    }

    /// Soft removal: keep the row, stop using the endpoint.
    pub fn deactivate(&self, id: i64) -> Result<Endpoint, RegistryError> {
        self.update(
            id,
            &EndpointUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
    }

    /// Hard removal. Cascades to the endpoint's health history.
    pub fn delete(&self, id: i64) -> Result<(), RegistryError> {
        let changed = {
            let db = self.db.lock().expect("registry db lock poisoned");
            db.conn()
                .execute("DELETE FROM endpoints WHERE id = ?1", params![id])?
        };

        if changed == 0 {
            return Err(RegistryError::NotFound(id));
        }

        self.invalidate_cache();
        info!(id, "Endpoint deleted");
        Ok(())
    }

    /// Record a served request: bump the success counter and last-used stamp
    /// in one statement so concurrent successes never lose an increment.
    ///
    /// Does not drop the cache; counters don't affect the fallback chain.
    pub fn record_success(&self, id: i64) -> Result<(), RegistryError> {
        let now = Utc::now();
        let changed = {
            let db = self.db.lock().expect("registry db lock poisoned");
            db.conn().execute(
                "UPDATE endpoints
                 SET success_count = success_count + 1, last_used = ?1, updated_at = ?1
                 WHERE id = ?2",
                params![now, id],
            )?
        };

        if changed == 0 {
            return Err(RegistryError::NotFound(id));
        }
        Ok(())
    }

    /// Drop the cached active list. Mutations call this before returning;
    /// the status monitor calls it after a run so operators see fresh state.
    pub fn invalidate_cache(&self) {
        *self.cache.lock().expect("registry cache lock poisoned") = None;
    }

    // ===== Health records =====

    /// Append one health probe result.
    pub fn record_health(&self, record: &NewHealthRecord) -> Result<i64, RegistryError> {
        let db = self.db.lock().expect("registry db lock poisoned");
        db.conn().execute(
            "INSERT INTO health_checks
                (endpoint_id, path, status, response_time_ms, error_message,
                 response_excerpt, checked_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.endpoint_id,
                record.path,
                record.status.to_string(),
                record.response_time_ms,
                record.error_message,
                record.response_excerpt,
                record.checked_at,
            ],
        )?;
        Ok(db.conn().last_insert_rowid())
    }

    /// Latest record per probed path for one endpoint.
    pub fn latest_health(&self, endpoint_id: i64) -> Result<Vec<HealthRecord>, RegistryError> {
        let db = self.db.lock().expect("registry db lock poisoned");
        let mut stmt = db.conn().prepare(
            "SELECT id, endpoint_id, path, status, response_time_ms,
                    error_message, response_excerpt, checked_at
             FROM health_checks
             WHERE id IN (
                 SELECT MAX(id) FROM health_checks
                 WHERE endpoint_id = ?1 GROUP BY path
             )
             ORDER BY path ASC",
        )?;
        let rows = stmt.query_map(params![endpoint_id], row_to_health_record)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RegistryError::from)
    }

    /// Full probe history for one endpoint, newest first.
    pub fn health_history(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> Result<Vec<HealthRecord>, RegistryError> {
        let db = self.db.lock().expect("registry db lock poisoned");
        let mut stmt = db.conn().prepare(
            "SELECT id, endpoint_id, path, status, response_time_ms,
                    error_message, response_excerpt, checked_at
             FROM health_checks
             WHERE endpoint_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![endpoint_id, limit as i64], row_to_health_record)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RegistryError::from)
    }

    /// Delete probe history older than the cutoff. Returns rows removed.
    pub fn prune_health_before(&self, cutoff: DateTime<Utc>) -> Result<usize, RegistryError> {
        let removed = {
            let db = self.db.lock().expect("registry db lock poisoned");
            db.conn().execute(
                "DELETE FROM health_checks WHERE checked_at < ?1",
                params![cutoff],
            )?
        };

        if removed > 0 {
            info!(removed, "Pruned health check history");
        }
        Ok(removed)
    }
}

fn validate_endpoint(name: &str, url_str: &str) -> Result<(), RegistryError> {
    if name.trim().is_empty() {
        return Err(RegistryError::Validation(
            "endpoint name must not be empty".to_string(),
        ));
    }

    if url_str.trim().is_empty() {
        return Err(RegistryError::Validation(
            "endpoint url must not be empty".to_string(),
        ));
    }

    let parsed = Url::parse(url_str)
        .map_err(|e| RegistryError::Validation(format!("invalid url '{}': {}", url_str, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RegistryError::Validation(format!(
            "endpoint url must be http or https, got '{}'",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(RegistryError::Validation(format!(
            "endpoint url '{}' has no host",
            url_str
        )));
    }

    Ok(())
}

fn row_to_endpoint(row: &Row<'_>) -> rusqlite::Result<Endpoint> {
    Ok(Endpoint {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        source_domain: row.get(3)?,
        priority: row.get(4)?,
        is_active: row.get(5)?,
        success_count: row.get(6)?,
        last_used: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_health_record(row: &Row<'_>) -> rusqlite::Result<HealthRecord> {
    let status_text: String = row.get(3)?;
    let status = HealthStatus::from_str(&status_text).unwrap_or(HealthStatus::Unknown);

    Ok(HealthRecord {
        id: row.get(0)?,
        endpoint_id: row.get(1)?,
        path: row.get(2)?,
        status,
        response_time_ms: row.get(4)?,
        error_message: row.get(5)?,
        response_excerpt: row.get(6)?,
        checked_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn test_registry() -> EndpointRegistry {
        let db = Database::open_in_memory().unwrap();
        EndpointRegistry::new(db, Duration::from_secs(300))
    }

    fn new_endpoint(name: &str, priority: i64) -> NewEndpoint {
        NewEndpoint {
            name: name.to_string(),
            url: format!("https://{}.example.com/api/v1", name),
            source_domain: format!("{}.example.com", name),
            priority,
            is_active: true,
        }
    }

    #[test]
    fn test_add_and_list_ordering() {
        let registry = test_registry();

        registry.add(&new_endpoint("backup", 5)).unwrap();
        registry.add(&new_endpoint("primary", 10)).unwrap();
        registry.add(&new_endpoint("secondary", 7)).unwrap();

        let active = registry.list_active().unwrap();
        let names: Vec<&str> = active.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["primary", "secondary", "backup"]);
    }

    #[test]
    fn test_priority_ties_break_by_id() {
        let registry = test_registry();

        let first = registry.add(&new_endpoint("first", 5)).unwrap();
        let second = registry.add(&new_endpoint("second", 5)).unwrap();

        let active = registry.list_active().unwrap();
        assert_eq!(active[0].id, first.id);
        assert_eq!(active[1].id, second.id);
    }

    #[test]
    fn test_inactive_endpoints_excluded() {
        let registry = test_registry();

        registry.add(&new_endpoint("active", 5)).unwrap();
        let mut inactive = new_endpoint("inactive", 10);
        inactive.is_active = false;
        registry.add(&inactive).unwrap();

        let active = registry.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "active");
    }

    #[test]
    fn test_validation_rejects_bad_urls() {
        let registry = test_registry();

        let mut bad = new_endpoint("bad", 1);
        bad.url = "not a url".to_string();
        assert!(matches!(
            registry.add(&bad),
            Err(RegistryError::Validation(_))
        ));

        bad.url = "ftp://example.com".to_string();
        assert!(matches!(
            registry.add(&bad),
            Err(RegistryError::Validation(_))
        ));

        bad.url = String::new();
        assert!(matches!(
            registry.add(&bad),
            Err(RegistryError::Validation(_))
        ));

        let mut unnamed = new_endpoint("x", 1);
        unnamed.name = "  ".to_string();
        assert!(matches!(
            registry.add(&unnamed),
            Err(RegistryError::Validation(_))
        ));
    }

    #[test]
    fn test_update_unknown_id() {
        let registry = test_registry();
        let result = registry.update(99, &EndpointUpdate::default());
        assert!(matches!(result, Err(RegistryError::NotFound(99))));
    }

    #[test]
    fn test_cache_coherence_after_add() {
        let registry = test_registry();

        registry.add(&new_endpoint("backup", 5)).unwrap();
        // Prime the cache
        assert_eq!(registry.list_active().unwrap().len(), 1);

        // A mutation must be visible to the very next read
        registry.add(&new_endpoint("primary", 10)).unwrap();
        let active = registry.list_active().unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].name, "primary");
    }

    #[test]
    fn test_cache_coherence_after_deactivate_and_delete() {
        let registry = test_registry();

        let a = registry.add(&new_endpoint("a", 10)).unwrap();
        let b = registry.add(&new_endpoint("b", 5)).unwrap();
        registry.list_active().unwrap();

        registry.deactivate(a.id).unwrap();
        let active = registry.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);

        registry.delete(b.id).unwrap();
        assert!(registry.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_delete_unknown_id() {
        let registry = test_registry();
        assert!(matches!(
            registry.delete(1),
            Err(RegistryError::NotFound(1))
        ));
    }

    #[test]
    fn test_record_success() {
        let registry = test_registry();
        let endpoint = registry.add(&new_endpoint("a", 1)).unwrap();
        assert_eq!(endpoint.success_count, 0);
        assert!(endpoint.last_used.is_none());

        registry.record_success(endpoint.id).unwrap();
        registry.record_success(endpoint.id).unwrap();

        let reloaded = registry.get(endpoint.id).unwrap();
        assert_eq!(reloaded.success_count, 2);
        assert!(reloaded.last_used.is_some());
    }

    #[test]
    fn test_health_records_latest_per_path() {
        let registry = test_registry();
        let endpoint = registry.add(&new_endpoint("a", 1)).unwrap();

        let mut record = NewHealthRecord {
            endpoint_id: endpoint.id,
            path: "home".to_string(),
            status: HealthStatus::Down,
            response_time_ms: None,
            error_message: Some("connection refused".to_string()),
            response_excerpt: None,
            checked_at: Utc::now(),
        };
        registry.record_health(&record).unwrap();

        record.status = HealthStatus::Up;
        record.response_time_ms = Some(42);
        record.error_message = None;
        registry.record_health(&record).unwrap();

        record.path = "movie".to_string();
        registry.record_health(&record).unwrap();

        let latest = registry.latest_health(endpoint.id).unwrap();
        assert_eq!(latest.len(), 2);
        let home = latest.iter().find(|r| r.path == "home").unwrap();
        assert_eq!(home.status, HealthStatus::Up);
        assert_eq!(home.response_time_ms, Some(42));

        let history = registry.health_history(endpoint.id, 10).unwrap();
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_prune_health() {
        let registry = test_registry();
        let endpoint = registry.add(&new_endpoint("a", 1)).unwrap();

        let old = NewHealthRecord {
            endpoint_id: endpoint.id,
            path: "home".to_string(),
            status: HealthStatus::Up,
            response_time_ms: Some(10),
            error_message: None,
            response_excerpt: None,
            checked_at: Utc::now() - ChronoDuration::days(30),
        };
        registry.record_health(&old).unwrap();

        let recent = NewHealthRecord {
            checked_at: Utc::now(),
            ..old.clone()
        };
        registry.record_health(&recent).unwrap();

        let removed = registry
            .prune_health_before(Utc::now() - ChronoDuration::days(7))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(registry.health_history(endpoint.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_cascades_health_history() {
        let registry = test_registry();
        let endpoint = registry.add(&new_endpoint("a", 1)).unwrap();

        registry
            .record_health(&NewHealthRecord {
                endpoint_id: endpoint.id,
                path: "home".to_string(),
                status: HealthStatus::Up,
                response_time_ms: Some(5),
                error_message: None,
                response_excerpt: None,
                checked_at: Utc::now(),
            })
            .unwrap();

        registry.delete(endpoint.id).unwrap();
        assert!(registry.latest_health(endpoint.id).unwrap().is_empty());
    }
}
