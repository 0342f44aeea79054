//! Integration tests for the kvbucket HTTP API

use axum::body::{to_bytes, Body};
use axum::http::{header::AUTHORIZATION, Method, Request, StatusCode};
use axum::Router;
use kvbucket::server::handlers::LANDING_PAGE;
use kvbucket::server::middleware::REQUEST_ID_HEADER;
use kvbucket::server::{build_router, AppState, ServerConfig};
use kvbucket::storage::{MockStorage, RedbStorage};
use kvbucket::Storage;
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "abc123";

fn app_with(storage: Storage, config: ServerConfig) -> Router {
    build_router(AppState::new(Arc::new(storage), config))
}

fn app() -> Router {
    let storage = Storage::new(Box::new(
        RedbStorage::in_memory().expect("Failed to create storage"),
    ));
    app_with(storage, ServerConfig::default())
}

fn request(method: Method, uri: &str, token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, token);
    }
    builder.body(body.into()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn create_bucket(app: &Router, token: &str) -> String {
    let (status, body) = send(app, request(Method::POST, "/", Some(token), Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    String::from_utf8(body).unwrap()
}

#[tokio::test]
async fn test_landing_page_needs_no_token() {
    let app = app();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/", None, Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], LANDING_PAGE.as_bytes());
}

#[tokio::test]
async fn test_bucket_roundtrip_scenario() {
    let app = app();

    let bucket = create_bucket(&app, TOKEN).await;
    assert_eq!(bucket.len(), 40);
    assert!(bucket.chars().all(|c| c.is_ascii_hexdigit()));

    let uri = format!("/{}/file1", bucket);
    let (status, _) = send(&app, request(Method::POST, &uri, Some(TOKEN), "hello")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request(Method::GET, &uri, Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"hello");

    let (status, body) = send(
        &app,
        request(Method::GET, &format!("/{}", bucket), Some(TOKEN), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"file1\n");
}

#[tokio::test]
async fn test_binary_values_are_stored_verbatim() {
    let app = app();
    let bucket = create_bucket(&app, TOKEN).await;
    let payload: Vec<u8> = (0..=255).collect();

    let uri = format!("/{}/blob", bucket);
    let (status, _) = send(&app, request(Method::POST, &uri, Some(TOKEN), payload.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, request(Method::GET, &uri, Some(TOKEN), Body::empty())).await;
    assert_eq!(body, payload);
}

#[tokio::test]
async fn test_missing_key_is_404() {
    let app = app();
    let bucket = create_bucket(&app, TOKEN).await;

    let (status, _) = send(
        &app,
        request(Method::GET, &format!("/{}/nope", bucket), Some(TOKEN), Body::empty()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_is_sorted_and_reflects_overwrites() {
    let app = app();
    let bucket = create_bucket(&app, TOKEN).await;

    for (key, value) in [("c", "3"), ("a", "1"), ("b", "2"), ("a", "one")] {
        let uri = format!("/{}/{}", bucket, key);
        let (status, _) = send(&app, request(Method::POST, &uri, Some(TOKEN), value)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(
        &app,
        request(Method::GET, &format!("/{}", bucket), Some(TOKEN), Body::empty()),
    )
    .await;
    assert_eq!(body, b"a\nb\nc\n");

    let (_, body) = send(
        &app,
        request(Method::GET, &format!("/{}/a", bucket), Some(TOKEN), Body::empty()),
    )
    .await;
    assert_eq!(body, b"one");
}

#[tokio::test]
async fn test_bad_token_is_401_without_mutation() {
    let mock = MockStorage::new();
    let app = app_with(Storage::new(Box::new(mock.clone())), ServerConfig::default());
    let bucket = "ab".repeat(20);

    for token in [None, Some("short"), Some("toolong1"), Some("ab/cde")] {
        for (method, uri) in [
            (Method::POST, "/".to_string()),
            (Method::POST, format!("/{}/key", bucket)),
            (Method::GET, format!("/{}/key", bucket)),
            (Method::GET, format!("/{}", bucket)),
            (Method::GET, "/_buckets".to_string()),
        ] {
            let (status, body) = send(&app, request(method, &uri, token, "payload")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{:?} {}", token, uri);
            assert_eq!(body, b"Unknown user");
        }
    }

    assert!(mock.is_empty());
}

#[tokio::test]
async fn test_tokens_do_not_see_each_other() {
    let app = app();
    let bucket = create_bucket(&app, "abcabc").await;

    let uri = format!("/{}/secret", bucket);
    send(&app, request(Method::POST, &uri, Some("abcabc"), "mine")).await;

    let (status, _) = send(&app, request(Method::GET, &uri, Some("abcabd"), Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        request(Method::GET, &format!("/{}", bucket), Some("abcabd"), Body::empty()),
    )
    .await;
    assert!(body.is_empty());

    let (_, body) = send(&app, request(Method::GET, "/_buckets", Some("abcabd"), Body::empty())).await;
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_list_buckets() {
    let app = app();
    let first = create_bucket(&app, TOKEN).await;
    let second = create_bucket(&app, TOKEN).await;

    send(
        &app,
        request(Method::POST, &format!("/{}/item", first), Some(TOKEN), "x"),
    )
    .await;

    let (status, body) = send(&app, request(Method::GET, "/_buckets", Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::OK);

    let mut expected = vec![first, second];
    expected.sort();
    let listed: Vec<String> = String::from_utf8(body)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn test_invalid_components_are_400() {
    let app = app();
    let bucket = create_bucket(&app, TOKEN).await;

    let (status, _) = send(&app, request(Method::GET, "/not-a-bucket", Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A percent-encoded separator must not leak into the composite key
    let uri = format!("/{}/a%2Fb", bucket);
    let (status, _) = send(&app, request(Method::POST, &uri, Some(TOKEN), "x")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_500_and_service_recovers() {
    let mock = MockStorage::new();
    let app = app_with(Storage::new(Box::new(mock.clone())), ServerConfig::default());
    let bucket = create_bucket(&app, TOKEN).await;
    let uri = format!("/{}/k", bucket);

    mock.set_failing(true);
    let (status, body) = send(&app, request(Method::GET, &uri, Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body).unwrap().contains("Storage error"));

    let (status, _) = send(&app, request(Method::POST, "/", Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    mock.set_failing(false);
    let (status, _) = send(&app, request(Method::POST, &uri, Some(TOKEN), "back")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, request(Method::GET, &uri, Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"back");
}

#[tokio::test]
async fn test_oversized_body_is_a_body_read_failure() {
    let storage = Storage::new(Box::new(RedbStorage::in_memory().unwrap()));
    let config = ServerConfig {
        max_body_size: 16,
        ..ServerConfig::default()
    };
    let app = app_with(storage, config);
    let bucket = create_bucket(&app, TOKEN).await;
    let uri = format!("/{}/big", bucket);

    let (status, body) = send(&app, request(Method::POST, &uri, Some(TOKEN), vec![b'x'; 64])).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body).unwrap().starts_with("error reading body"));

    let (status, _) = send(&app, request(Method::GET, &uri, Some(TOKEN), Body::empty())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app();

    let (status, body) = send(&app, request(Method::GET, "/_health", None, Body::empty())).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], kvbucket::VERSION);
}
