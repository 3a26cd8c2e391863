#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crowdly_api::{AnalyticsQuery, ApiClient, EntryExitQuery, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn query() -> AnalyticsQuery {
    AnalyticsQuery {
        site_id: "site-1".into(),
        from_utc: 1_767_225_600_000,
        to_utc: 1_767_311_999_999,
    }
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({
            "email": "ops@example.com",
            "password": "hunter2"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-123" })))
        .mount(&server)
        .await;

    let resp = client.login("ops@example.com", "hunter2").await.unwrap();
    assert_eq!(resp.token, "tok-123");

    // Login alone must not install the token
    assert!(!client.has_token());
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.login("ops@example.com", "wrong").await;

    assert!(
        matches!(result, Err(Error::InvalidCredentials)),
        "expected InvalidCredentials, got: {result:?}"
    );
}

#[tokio::test]
async fn test_bearer_token_attached_to_authenticated_calls() {
    let (server, client) = setup().await;
    client.set_token(Some(SecretString::from("tok-456".to_owned())));

    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .and(header("Authorization", "Bearer tok-456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let sites = client.get_all_sites().await.unwrap();
    assert!(sites.is_empty());
}

#[tokio::test]
async fn test_401_on_authenticated_call_is_session_expired() {
    let (server, client) = setup().await;
    client.set_token(Some(SecretString::from("stale".to_owned())));

    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.get_all_sites().await;

    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
}

// ── Sites ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_all_sites() {
    let (server, client) = setup().await;

    let body = json!([
        { "siteId": "site-1", "name": "Harbor Mall" },
        { "siteId": "site-2", "name": "Airport East" },
    ]);

    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let sites = client.get_all_sites().await.unwrap();

    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0].site_id, "site-1");
    assert_eq!(sites[0].name, "Harbor Mall");
    assert_eq!(sites[1].site_id, "site-2");
}

// ── Analytics ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_occupancy() {
    let (server, client) = setup().await;

    let body = json!({
        "buckets": [
            { "local": "2026-01-01 09:00:00", "utc": 1_767_258_000_000_i64, "avg": 12.4 },
            { "local": "2026-01-01 10:00:00", "utc": 1_767_261_600_000_i64, "avg": 31.9 },
        ]
    });

    Mock::given(method("POST"))
        .and(path("/api/analytics/occupancy"))
        .and(body_json(json!({
            "siteId": "site-1",
            "fromUtc": 1_767_225_600_000_i64,
            "toUtc": 1_767_311_999_999_i64
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let resp = client.get_occupancy(&query()).await.unwrap();

    assert_eq!(resp.buckets.len(), 2);
    assert_eq!(resp.buckets[1].local, "2026-01-01 10:00:00");
    assert!((resp.buckets[1].avg - 31.9).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_get_occupancy_empty_buckets() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/occupancy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "buckets": [] })))
        .mount(&server)
        .await;

    let resp = client.get_occupancy(&query()).await.unwrap();
    assert!(resp.buckets.is_empty());
}

#[tokio::test]
async fn test_get_footfall_and_dwell() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/footfall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "footfall": 1532 })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/dwell"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "avgDwellMinutes": 23.7 })),
        )
        .mount(&server)
        .await;

    let footfall = client.get_footfall(&query()).await.unwrap();
    assert_eq!(footfall.footfall, 1532);

    let dwell = client.get_dwell_time(&query()).await.unwrap();
    assert!((dwell.avg_dwell_minutes - 23.7).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_get_demographics() {
    let (server, client) = setup().await;

    let body = json!({
        "buckets": [
            { "local": "2026-01-01 09:00:00", "male": 40, "female": 55 },
            { "local": "2026-01-01 10:00:00", "male": 62, "female": 48 },
        ]
    });

    Mock::given(method("POST"))
        .and(path("/api/analytics/demographics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let resp = client.get_demographics(&query()).await.unwrap();

    assert_eq!(resp.buckets.len(), 2);
    assert_eq!(resp.buckets[0].male, 40);
    assert_eq!(resp.buckets[1].female, 48);
}

// ── Entry/exit ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_entry_exit_page() {
    let (server, client) = setup().await;

    let body = json!({
        "records": [
            {
                "personName": "Ada Okafor",
                "gender": "female",
                "entryLocal": "2026-01-01 09:12:44",
                "exitLocal": "2026-01-01 09:58:01",
                "dwellMinutes": 45.3
            },
            {
                "personName": "Unknown",
                "entryLocal": "2026-01-01 09:40:12",
                "exitLocal": null
            }
        ],
        "pageNumber": 2,
        "totalPages": 8,
        "totalRecords": 187
    });

    Mock::given(method("POST"))
        .and(path("/api/analytics/entry-exit"))
        .and(body_json(json!({
            "siteId": "site-1",
            "fromUtc": 1_767_225_600_000_i64,
            "toUtc": 1_767_311_999_999_i64,
            "pageSize": 25,
            "pageNumber": 2
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let page = client
        .get_entry_exit(&EntryExitQuery {
            query: query(),
            page_size: 25,
            page_number: 2,
        })
        .await
        .unwrap();

    assert_eq!(page.page_number, 2);
    assert_eq!(page.total_pages, 8);
    assert_eq!(page.total_records, 187);
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].exit_local.as_deref(), Some("2026-01-01 09:58:01"));

    // Still-inside visitor: exit and dwell absent, not an error
    assert!(page.records[1].exit_local.is_none());
    assert!(page.records[1].dwell_minutes.is_none());
    assert!(page.records[1].gender.is_none());
}

// ── Error handling ──────────────────────────────────────────────────

#[tokio::test]
async fn test_error_message_from_backend() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/analytics/occupancy"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid date range" })),
        )
        .mount(&server)
        .await;

    let result = client.get_occupancy(&query()).await;

    match result {
        Err(Error::Api {
            status,
            ref message,
        }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid date range");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_500_without_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.get_all_sites().await;

    match result {
        Err(Error::Api { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/sites"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.get_all_sites().await;

    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}
