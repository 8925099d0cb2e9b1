//! Transport, retry, and pager contract tests against a mock cost API.

mod common;

use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{cost_row, empty_page, page};
use costsync::client::{Config, HttpClient, Pager, Query};
use costsync::config::{Granularity, GroupBy, Metric};
use costsync::error::SyncError;

const TOKEN: &str = "tok_secret_123";

fn client_for(uri: &str, max_retries: u32) -> HttpClient {
    HttpClient::new(Config {
        base_url: uri.to_string(),
        token: TOKEN.to_string(),
        timeout: Duration::from_secs(5),
        max_retries,
    })
    .expect("client build")
}

fn sample_query() -> Query {
    Query {
        workspace_token: String::new(),
        cost_report_token: "rpt_demo".to_string(),
        start_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end_at: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
        granularity: Granularity::Day,
        group_bys: vec![GroupBy::Service, GroupBy::Region],
        metrics: vec![Metric::Cost, Metric::Usage],
        page_size: 100,
        cursor: String::new(),
    }
}

// =============================================================================
// Request Encoding
// =============================================================================

#[tokio::test]
async fn costs_request_carries_auth_and_query_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(header("Accept", "application/json"))
        .and(query_param("cost_report_token", "rpt_demo"))
        .and(query_param("start_at", "2024-01-01T00:00:00Z"))
        .and(query_param("end_at", "2024-01-03T00:00:00Z"))
        .and(query_param("granularity", "day"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let page = client.costs(&sample_query()).await.expect("costs fetch");
    assert!(page.data.is_empty());

    // Repeated array parameters are sent once per value.
    let requests = server.received_requests().await.unwrap();
    let raw_query = requests[0].url.query().unwrap_or_default().to_string();
    assert!(raw_query.contains("group_bys%5B%5D=service"));
    assert!(raw_query.contains("group_bys%5B%5D=region"));
    assert!(raw_query.contains("metrics%5B%5D=cost"));
    assert!(raw_query.contains("metrics%5B%5D=usage"));
}

#[tokio::test]
async fn forecast_request_targets_the_report_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cost_reports/rpt_demo/forecast"))
        .and(header("Authorization", format!("Bearer {TOKEN}").as_str()))
        .and(query_param("start_at", "2024-01-01T00:00:00Z"))
        .and(query_param("end_at", "2024-01-03T00:00:00Z"))
        .and(query_param("granularity", "month"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "bucket_start": "2024-01-01T00:00:00Z",
                "bucket_end": "2024-02-01T00:00:00Z",
                "cost": 120.5,
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let forecast = client
        .forecast(
            "rpt_demo",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            Granularity::Month,
        )
        .await
        .expect("forecast fetch");

    assert_eq!(forecast.data.len(), 1);
    assert_eq!(forecast.data[0].cost, 120.5);
}

// =============================================================================
// Outcome Classification
// =============================================================================

#[tokio::test]
async fn not_found_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 5);
    let err = client.costs(&sample_query()).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound));
}

#[tokio::test]
async fn unprocessable_4xx_is_permanent_with_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown group_by"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 5);
    let err = client.costs(&sample_query()).await.unwrap_err();
    match err {
        SyncError::Api { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "unknown group_by");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_error_not_a_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 5);
    let err = client.costs(&sample_query()).await.unwrap_err();
    assert!(matches!(err, SyncError::Decode(_)));
}

#[tokio::test]
async fn absent_optional_fields_decode_as_zero() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![serde_json::json!({
                "provider": "gcp",
                "bucket_start": "2024-01-01T00:00:00Z",
                "bucket_end": "2024-01-02T00:00:00Z",
            })],
            "",
            false,
        )))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let page = client.costs(&sample_query()).await.expect("costs fetch");
    assert_eq!(page.data[0].cost, 0.0);
    assert_eq!(page.data[0].credit, 0.0);
    assert!(page.data[0].currency.is_empty());
}

// =============================================================================
// Retry Budget
// =============================================================================

#[tokio::test]
async fn retry_budget_bounds_transport_invocations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 2);
    let started = Instant::now();
    let err = client.costs(&sample_query()).await.unwrap_err();

    match err {
        SyncError::RetriesExhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*source, SyncError::Transient { status: 503 }));
        }
        other => panic!("expected RetriesExhausted, got: {other:?}"),
    }

    // Two backoff sleeps happened (roughly 1s + 2s, with jitter).
    assert!(started.elapsed() >= Duration::from_secs(2));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn zero_retries_means_exactly_one_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let err = client.costs(&sample_query()).await.unwrap_err();
    assert!(matches!(err, SyncError::RetriesExhausted { attempts: 1, .. }));
}

#[tokio::test]
async fn retry_after_fallback_header_is_honored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 2);
    let started = Instant::now();
    client.costs(&sample_query()).await.expect("costs fetch");
    assert!(started.elapsed() >= Duration::from_secs(1));
}

// =============================================================================
// Pager Contract
// =============================================================================

#[tokio::test]
async fn pager_permits_first_fetch_then_terminates_on_empty_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_page()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let mut pager = Pager::new(&client, sample_query());

    assert!(!pager.has_more());

    let page = pager.next_page().await.expect("first fetch is permitted");
    assert!(page.data.is_empty());
    assert!(!pager.has_more());

    let err = pager.next_page().await.unwrap_err();
    assert!(matches!(err, SyncError::Api { .. }));
}

#[tokio::test]
async fn pager_emits_each_row_exactly_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![cost_row("S3", 2.0, "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")],
            "",
            false,
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![cost_row("EC2", 1.0, "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")],
            "c1",
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let mut pager = Pager::new(&client, sample_query());

    let first = pager.next_page().await.expect("first page");
    assert!(pager.has_more());
    let second = pager.next_page().await.expect("second page");
    assert!(!pager.has_more());

    let services: Vec<&str> = first
        .data
        .iter()
        .chain(second.data.iter())
        .map(|row| row.service.as_str())
        .collect();
    assert_eq!(services, vec!["EC2", "S3"]);
}

#[tokio::test]
async fn all_pages_drains_to_a_flat_row_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![cost_row("S3", 2.0, "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")],
            "",
            false,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/costs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![cost_row("EC2", 1.0, "2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")],
            "c1",
            true,
        )))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let mut pager = Pager::new(&client, sample_query());

    let rows = pager.all_pages().await.expect("drain");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].service, "EC2");
    assert_eq!(rows[1].service, "S3");
}
