//! Integration tests for the fallback chain against mock upstreams.

use api_client::{AttemptError, FallbackClient, FetchError};
use serde_json::json;
use shared::{ApiConfig, BackoffConfig, Database, EndpointRegistry, NewEndpoint};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> ApiConfig {
    ApiConfig {
        connect_timeout_secs: 2,
        read_timeout_secs: 5,
        backoff: BackoffConfig {
            initial_secs: 30,
            max_secs: 900,
        },
        ..Default::default()
    }
}

fn test_registry() -> Arc<EndpointRegistry> {
    let db = Database::open_in_memory().expect("in-memory database");
    Arc::new(EndpointRegistry::new(db, Duration::from_secs(300)))
}

fn add_endpoint(
    registry: &EndpointRegistry,
    name: &str,
    url: &str,
    priority: i64,
    active: bool,
) -> i64 {
    registry
        .add(&NewEndpoint {
            name: name.to_string(),
            url: url.to_string(),
            source_domain: format!("{}.example.com", name.to_lowercase()),
            priority,
            is_active: active,
        })
        .expect("add endpoint")
        .id
}

#[tokio::test]
async fn first_success_wins_and_normalizes_wrapped_shape() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/anime-terbaru"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "confidence_score": 1.0,
            "data": [{"judul": "One Piece", "episode": "1071"}]
        })))
        .expect(1)
        .mount(&primary)
        .await;

    // The backup must never be contacted once the primary succeeds
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&backup)
        .await;

    let registry = test_registry();
    let primary_id = add_endpoint(&registry, "Primary", &primary.uri(), 10, true);
    let backup_id = add_endpoint(&registry, "Backup", &backup.uri(), 5, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let response = client.get_anime_terbaru(1).await.unwrap();

    assert_eq!(response.source_name, "Primary");
    assert_eq!(response.source_domain, "primary.example.com");
    assert_eq!(response.confidence, 1.0);
    assert_eq!(
        response.data,
        json!([{"judul": "One Piece", "episode": "1071"}])
    );

    // Success bookkeeping lands on the winning endpoint
    let winner = registry.get(primary_id).unwrap();
    assert_eq!(winner.success_count, 1);
    assert!(winner.last_used.is_some());
    assert_eq!(registry.get(backup_id).unwrap().success_count, 0);
}

#[tokio::test]
async fn falls_back_in_priority_order() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(500).set_body_string("worker crashed"))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "confidence_score": 0.8,
            "top10": [{"judul": "Frieren"}]
        })))
        .expect(1)
        .mount(&backup)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Primary", &primary.uri(), 10, true);
    add_endpoint(&registry, "Backup", &backup.uri(), 5, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let response = client.get_home().await.unwrap();

    // Direct shape: confidence key stripped, payload is the rest
    assert_eq!(response.source_name, "Backup");
    assert_eq!(response.confidence, 0.8);
    assert_eq!(response.data, json!({"top10": [{"judul": "Frieren"}]}));
}

#[tokio::test]
async fn backoff_suppresses_failed_endpoint_without_network_call() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;

    // Exactly one hit: the first request's failed attempt. The second
    // request must skip the primary while its backoff window is open.
    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"top10": []})))
        .expect(2)
        .mount(&backup)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Primary", &primary.uri(), 10, true);
    add_endpoint(&registry, "Backup", &backup.uri(), 5, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();

    let first = client.get_home().await.unwrap();
    assert_eq!(first.source_name, "Backup");

    let second = client.get_home().await.unwrap();
    assert_eq!(second.source_name, "Backup");
}

#[tokio::test]
async fn success_clears_backoff_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"top10": []})))
        .mount(&server)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Only", &server.uri(), 10, true);

    // Short backoff so the window opened by the induced failure expires
    let config = ApiConfig {
        backoff: BackoffConfig {
            initial_secs: 1,
            max_secs: 2,
        },
        ..test_config()
    };
    let client = FallbackClient::new(Arc::clone(&registry), &config).unwrap();

    // Induce a failure on a path the mock doesn't serve (404)
    assert!(client.request("nonexistent", &[]).await.is_err());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // A success after the window must reset the failure state entirely
    let response = client.get_home().await.unwrap();
    assert_eq!(response.source_name, "Only");
    let again = client.get_home().await.unwrap();
    assert_eq!(again.source_name, "Only");
}

#[tokio::test]
async fn exhaustion_reports_every_attempted_endpoint() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;

    for server in [&primary, &backup] {
        Mock::given(method("GET"))
            .and(path("/movie"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(server)
            .await;
    }

    let registry = test_registry();
    add_endpoint(&registry, "Primary", &primary.uri(), 10, true);
    add_endpoint(&registry, "Backup", &backup.uri(), 5, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let error = client.get_movie_list(1).await.unwrap_err();

    match error {
        FetchError::AllEndpointsFailed { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].endpoint, "Primary");
            assert_eq!(attempts[1].endpoint, "Backup");
            for attempt in &attempts {
                assert!(matches!(
                    attempt.error,
                    AttemptError::Upstream { status: 503, .. }
                ));
            }
        }
        other => panic!("expected AllEndpointsFailed, got: {}", other),
    }
}

#[tokio::test]
async fn inactive_endpoint_is_never_attempted() {
    let inactive = MockServer::start().await;
    let active = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&inactive)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"top10": []})))
        .expect(1)
        .mount(&active)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Retired", &inactive.uri(), 100, false);
    add_endpoint(&registry, "Active", &active.uri(), 1, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let response = client.get_home().await.unwrap();
    assert_eq!(response.source_name, "Active");
}

#[tokio::test]
async fn bare_payload_passes_through_unchanged() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "frieren"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"judul": "Frieren", "anime_slug": "frieren"}])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Legacy", &server.uri(), 1, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let response = client.search_anime("frieren").await.unwrap();

    assert_eq!(response.confidence, 1.0);
    assert_eq!(
        response.data,
        json!([{"judul": "Frieren", "anime_slug": "frieren"}])
    );
}

#[tokio::test]
async fn unparseable_body_falls_through_to_next_endpoint() {
    let primary = MockServer::start().await;
    let backup = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"top10": []})))
        .expect(1)
        .mount(&backup)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Primary", &primary.uri(), 10, true);
    add_endpoint(&registry, "Backup", &backup.uri(), 5, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let response = client.get_home().await.unwrap();
    assert_eq!(response.source_name, "Backup");
}

#[tokio::test]
async fn unreachable_endpoint_counts_as_transport_failure() {
    // Nothing listens on this port; connection is refused immediately
    let registry = test_registry();
    add_endpoint(&registry, "Dead", "http://127.0.0.1:1", 10, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    let error = client.get_home().await.unwrap_err();

    match error {
        FetchError::AllEndpointsFailed { attempts } => {
            assert_eq!(attempts.len(), 1);
            assert!(matches!(attempts[0].error, AttemptError::Transport(_)));
        }
        other => panic!("expected AllEndpointsFailed, got: {}", other),
    }
}

#[tokio::test]
async fn newly_added_endpoint_is_used_on_the_next_request() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"top10": ["old"]})))
        .mount(&old)
        .await;

    Mock::given(method("GET"))
        .and(path("/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"top10": ["new"]})))
        .mount(&new)
        .await;

    let registry = test_registry();
    add_endpoint(&registry, "Old", &old.uri(), 5, true);

    let client = FallbackClient::new(Arc::clone(&registry), &test_config()).unwrap();
    assert_eq!(client.get_home().await.unwrap().source_name, "Old");

    // Registering a higher-priority endpoint must take effect immediately,
    // even though the cache TTL has not expired
    add_endpoint(&registry, "New", &new.uri(), 50, true);
    assert_eq!(client.get_home().await.unwrap().source_name, "New");
}
