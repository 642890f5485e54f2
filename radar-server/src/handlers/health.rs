//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Registered providers, in priority order
    pub providers: Vec<&'static str>,
    /// Whether failed lookups are replaced by synthetic demo data
    pub demo_mode: bool,
    /// "postgres" or "memory"
    pub storage: &'static str,
    /// Service name
    pub service: &'static str,
}

/// GET /health - Health check endpoint
///
/// Degraded means no provider is registered, so every lookup would fail with
/// `NO_PROVIDER`.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers: Vec<&'static str> = state
        .orchestrator
        .providers()
        .sources()
        .into_iter()
        .map(|source| source.as_str())
        .collect();

    let status = if providers.is_empty() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        providers,
        demo_mode: state.orchestrator.demo_mode(),
        storage: if state.database.is_some() {
            "postgres"
        } else {
            "memory"
        },
        service: "radar-server",
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Returns 503 while the database (when configured) cannot be reached.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    if let Some(database) = &state.database {
        if let Err(e) = database.ping().await {
            tracing::warn!(error = %e, "Readiness check failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    ready: false,
                    message: Some("database unavailable"),
                }),
            );
        }
    }

    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            message: None,
        }),
    )
}
