//! Backoff Executor behavior against a local stub server.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use radar_core::{BackoffExecutor, ExecutorConfig, ExecutorError, OutboundRequest};

use common::{spawn_stub, test_executor};

const TIMEOUT: Duration = Duration::from_secs(2);

type Hits = Arc<AtomicU32>;

async fn throttled_then_ok(State(hits): State<Hits>) -> Response {
    match hits.fetch_add(1, Ordering::SeqCst) {
        0 => (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")], "slow down").into_response(),
        1 => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (StatusCode::OK, r#"{"ok":true}"#).into_response(),
    }
}

async fn always_unavailable(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::SERVICE_UNAVAILABLE, "down").into_response()
}

async fn not_found(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "no such record").into_response()
}

async fn slow(State(hits): State<Hits>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(500)).await;
    (StatusCode::OK, "late").into_response()
}

async fn long_retry_after(State(hits): State<Hits>) -> Response {
    match hits.fetch_add(1, Ordering::SeqCst) {
        0 => (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "3600")], "").into_response(),
        _ => (StatusCode::OK, "{}").into_response(),
    }
}

async fn stub() -> (String, Hits) {
    let hits: Hits = Arc::new(AtomicU32::new(0));
    let router = Router::new()
        .route("/throttled", get(throttled_then_ok))
        .route("/unavailable", get(always_unavailable))
        .route("/missing", get(not_found))
        .route("/slow", get(slow))
        .route("/retry-after", get(long_retry_after))
        .with_state(hits.clone());
    (spawn_stub(router).await, hits)
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let (base, hits) = stub().await;
    let response = test_executor()
        .execute(&OutboundRequest::get(format!("{base}/throttled")), 3, TIMEOUT)
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.status, 200);
    assert_eq!(response.json_value().unwrap()["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_budget_is_respected() {
    let (base, hits) = stub().await;
    let err = test_executor()
        .execute(&OutboundRequest::get(format!("{base}/unavailable")), 2, TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (base, hits) = stub().await;
    let err = test_executor()
        .execute(&OutboundRequest::get(format!("{base}/missing")), 3, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::Status { status: 404, .. }));
    assert!(!err.is_transient());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_each_attempt_has_its_own_deadline() {
    let (base, hits) = stub().await;
    let err = test_executor()
        .execute(
            &OutboundRequest::get(format!("{base}/slow")),
            1,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

    assert_eq!(err, ExecutorError::Timeout(Duration::from_millis(50)));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retry_after_is_capped() {
    let (base, hits) = stub().await;
    let start = Instant::now();
    test_executor()
        .execute(&OutboundRequest::get(format!("{base}/retry-after")), 1, TIMEOUT)
        .await
        .expect("second attempt succeeds");

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_plain_http_rejected_when_https_only() {
    let (base, hits) = stub().await;
    let executor = BackoffExecutor::new(ExecutorConfig::default()).unwrap();
    let err = executor
        .execute(&OutboundRequest::get(format!("{base}/throttled")), 3, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutorError::InvalidRequest(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}
