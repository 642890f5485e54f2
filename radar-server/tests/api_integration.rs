//! API integration tests for radar-server.
//!
//! Each test builds the router over in-memory storage and a queued demo
//! provider, then drives it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use radar_core::{
    DemoProvider, DispatchConfig, Ledger, MemoryStore, Orchestrator, ProviderRegistry,
    WebhookDispatcher,
};
use radar_server::{create_router, sweep_once, AppState, USER_HEADER};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn create_test_state(latency_polls: u32) -> AppState {
    let store = Arc::new(MemoryStore::new());
    let registry = ProviderRegistry::new().register(Arc::new(DemoProvider::new(latency_polls)));
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        Ledger::new(store.clone()),
        registry,
        false,
    ));
    let dispatcher = WebhookDispatcher::new(store, DispatchConfig::default()).unwrap();
    AppState::new(orchestrator, dispatcher)
}

fn create_test_app() -> Router {
    create_router(create_test_state(1))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn plate_body(plate: &str) -> Value {
    json!({"search_type": "plate", "plate": plate})
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_reports_providers() {
    let app = create_test_app();
    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["providers"], json!(["demo"]));
    assert_eq!(json["storage"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_health_degraded_without_providers() {
    let state = create_test_state(0);
    state.orchestrator.replace_providers(ProviderRegistry::new());
    let app = create_router(state);

    let (status, json) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
}

#[tokio::test]
async fn test_ready_without_database() {
    let app = create_test_app();
    let (status, json) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
}

// ============================================================================
// Consultation Tests
// ============================================================================

#[tokio::test]
async fn test_consultation_lifecycle() {
    let app = create_test_app();
    let user = Uuid::new_v4();

    let (status, receipt) = send(
        &app,
        "POST",
        "/api/v1/consultations",
        Some(user),
        Some(plate_body("abc-1d23")),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(receipt["status"], "running");
    assert_eq!(receipt["provider"], "demo");
    let id = receipt["request_id"].as_str().unwrap().to_string();

    // The provider has not finished yet
    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/v1/consultations/{id}/finalize"),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "NOT_READY");

    let (_, report) = send(&app, "GET", &format!("/api/v1/consultations/{id}"), Some(user), None).await;
    assert_eq!(report["status"], "running");
    let (_, report) = send(&app, "GET", &format!("/api/v1/consultations/{id}"), Some(user), None).await;
    assert_eq!(report["status"], "completed");
    assert_eq!(report["finalized"], false);

    let (status, result) = send(
        &app,
        "POST",
        &format!("/api/v1/consultations/{id}/finalize"),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["synthetic"], true);
    assert_eq!(result["normalized_payload"]["plate"], "ABC1D23");

    // Finalize is idempotent
    let (status, again) = send(
        &app,
        "POST",
        &format!("/api/v1/consultations/{id}/finalize"),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again, result);

    let (status, history) = send(&app, "GET", "/api/v1/history", Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 1);
    assert_eq!(history["entries"][0]["search_query"], "ABC1D23");
    assert_eq!(history["entries"][0]["result_snapshot"]["success"], true);
}

#[tokio::test]
async fn test_synchronous_provider_returns_ok() {
    let app = create_router(create_test_state(0));
    let (status, receipt) = send(
        &app,
        "POST",
        "/api/v1/consultations",
        Some(Uuid::new_v4()),
        Some(json!({"search_type": "driver_cpf", "cpf": "529.982.247-25"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["status"], "completed");
}

#[tokio::test]
async fn test_submit_requires_acting_user() {
    let app = create_test_app();

    let (status, json) = send(&app, "POST", "/api/v1/consultations", None, Some(plate_body("ABC1234"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/consultations")
        .header(USER_HEADER, "not-a-uuid")
        .header("content-type", "application/json")
        .body(Body::from(plate_body("ABC1234").to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_submit_rejects_invalid_input() {
    let app = create_test_app();
    let user = Some(Uuid::new_v4());

    let (status, json) = send(&app, "POST", "/api/v1/consultations", user, Some(plate_body("12"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/consultations",
        user,
        Some(json!({"search_type": "passport", "number": "X1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/consultations",
        user,
        Some(json!({"search_type": "cnh", "cnh_number": "02650306461", "birth_date": "31/02/1990"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_consultations_are_private_to_their_owner() {
    let app = create_test_app();
    let owner = Uuid::new_v4();

    let (_, receipt) = send(&app, "POST", "/api/v1/consultations", Some(owner), Some(plate_body("ABC1234"))).await;
    let id = receipt["request_id"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        "GET",
        &format!("/api/v1/consultations/{id}"),
        Some(Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/v1/consultations/{}", Uuid::new_v4()),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expiry_sweep_times_out_running_consultation() {
    let state = create_test_state(5);
    let app = create_router(state.clone());
    let user = Uuid::new_v4();

    let (_, receipt) = send(&app, "POST", "/api/v1/consultations", Some(user), Some(plate_body("ABC1234"))).await;
    let id = receipt["request_id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(sweep_once(&state.orchestrator, Duration::from_millis(1)).await, 1);

    let (_, report) = send(&app, "GET", &format!("/api/v1/consultations/{id}"), Some(user), None).await;
    assert_eq!(report["status"], "timed_out");
    assert_eq!(report["finalized"], true);

    let (status, json) = send(
        &app,
        "POST",
        &format!("/api/v1/consultations/{id}/finalize"),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["code"], "LOOKUP_TIMEOUT");
}

// ============================================================================
// History Tests
// ============================================================================

#[tokio::test]
async fn test_history_filters_and_links() {
    let app = create_router(create_test_state(0));
    let user = Uuid::new_v4();

    for plate in ["ABC1234", "XYZ9876", "ABC1234"] {
        let (status, _) = send(&app, "POST", "/api/v1/consultations", Some(user), Some(plate_body(plate))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, page) = send(&app, "GET", "/api/v1/history?query=ABC1234&limit=1", Some(user), None).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 1);
    assert_eq!(page["has_more"], true);

    let entry_id = page["entries"][0]["id"].as_str().unwrap().to_string();
    let client_id = Uuid::new_v4();
    let (status, entry) = send(
        &app,
        "PATCH",
        &format!("/api/v1/history/{entry_id}/links"),
        Some(user),
        Some(json!({"client_id": client_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["related_client_id"], client_id.to_string());

    let (_, linked) = send(
        &app,
        "GET",
        &format!("/api/v1/history?client_id={client_id}"),
        Some(user),
        None,
    )
    .await;
    assert_eq!(linked["total"], 1);

    // Other users see nothing
    let (_, other) = send(&app, "GET", "/api/v1/history", Some(Uuid::new_v4()), None).await;
    assert_eq!(other["total"], 0);

    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/api/v1/history/{entry_id}/links"),
        Some(user),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Webhook Tests
// ============================================================================

#[tokio::test]
async fn test_webhook_crud() {
    let app = create_test_app();

    let (status, created) = send(
        &app,
        "POST",
        "/api/v1/webhooks",
        None,
        Some(json!({
            "name": "Billing",
            "url": "https://hooks.example.com/radar",
            "events": ["fine.created"],
            "headers": {"x-tenant": "acme"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["enabled"], true);
    assert_eq!(created["fail_count"], 0);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, list) = send(&app, "GET", "/api/v1/webhooks", None, None).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/v1/webhooks/{id}"),
        None,
        Some(json!({"enabled": false, "events": ["fine.created", "fine.paid"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["enabled"], false);
    assert_eq!(updated["events"], json!(["fine.created", "fine.paid"]));
    assert_eq!(updated["name"], "Billing");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/webhooks/{id}"),
        None,
        Some(json!({"url": "ftp://hooks.example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", &format!("/api/v1/webhooks/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/v1/webhooks/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_validation_on_create() {
    let app = create_test_app();
    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/webhooks",
        None,
        Some(json!({"name": "", "url": "https://hooks.example.com", "events": ["fine.created"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/webhooks",
        None,
        Some(json!({"name": "Plain", "url": "http://hooks.example.com", "events": ["fine.created"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_webhook_test_reports_failure_in_body() {
    let app = create_test_app();
    let (_, created) = send(
        &app,
        "POST",
        "/api/v1/webhooks",
        None,
        Some(json!({"name": "Dead", "url": "https://127.0.0.1:9/hook", "events": ["fine.created"]})),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, outcome) = send(&app, "POST", &format!("/api/v1/webhooks/{id}/test"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["success"], false);
    assert!(outcome["error"].is_string());

    let (_, webhook) = send(&app, "GET", &format!("/api/v1/webhooks/{id}"), None, None).await;
    assert_eq!(webhook["fail_count"], 0);
}

#[tokio::test]
async fn test_trigger_event() {
    let app = create_test_app();

    let (status, report) = send(
        &app,
        "POST",
        "/api/v1/events",
        None,
        Some(json!({"event": "fine.created", "data": {"fine_id": 42}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["event"], "fine.created");
    assert_eq!(report["deliveries"], json!([]));

    let (status, _) = send(&app, "POST", "/api/v1/events", None, Some(json!({"event": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/v1/events", None, Some(json!({"data": {}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
