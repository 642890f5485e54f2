//! Webhook administration handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use radar_core::{DeliveryOutcome, NewWebhook, Webhook, WebhookUpdate};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/v1/webhooks
pub async fn list_webhooks_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Webhook>>, ApiError> {
    Ok(Json(state.dispatcher.list().await?))
}

/// POST /api/v1/webhooks
pub async fn create_webhook_handler(
    State(state): State<AppState>,
    body: Result<Json<NewWebhook>, JsonRejection>,
) -> Result<(StatusCode, Json<Webhook>), ApiError> {
    let Json(new) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let webhook = state.dispatcher.create(new).await?;
    Ok((StatusCode::CREATED, Json(webhook)))
}

/// GET /api/v1/webhooks/{id}
pub async fn get_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Webhook>, ApiError> {
    Ok(Json(state.dispatcher.get(id).await?))
}

/// PUT /api/v1/webhooks/{id}
///
/// Partial update; `fail_count` and `last_triggered_at` are not editable.
pub async fn update_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<WebhookUpdate>, JsonRejection>,
) -> Result<Json<Webhook>, ApiError> {
    let Json(update) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(state.dispatcher.update(id, update).await?))
}

/// DELETE /api/v1/webhooks/{id}
pub async fn delete_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.dispatcher.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/webhooks/{id}/test
///
/// A failed test delivery is still a 200: the outcome is in the body.
pub async fn test_webhook_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryOutcome>, ApiError> {
    let webhook = state.dispatcher.get(id).await?;
    Ok(Json(state.dispatcher.test(&webhook).await))
}
