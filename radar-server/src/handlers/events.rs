//! Domain event intake

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use radar_core::DispatchReport;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    /// Event type, e.g. `fine.created`
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// POST /api/v1/events
///
/// Fans the event out to every enabled subscriber. Individual delivery
/// failures are reported in the body, never as an error status.
pub async fn trigger_handler(
    State(state): State<AppState>,
    body: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<DispatchReport>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let report = state.dispatcher.trigger(&request.event, request.data).await?;
    Ok(Json(report))
}
