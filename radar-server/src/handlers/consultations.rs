//! Consultation handlers
//!
//! Submit a lookup, read its status, and finalize it once the provider is done.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use radar_core::{CanonicalRequest, ConsultationResult, StatusReport, SubmitReceipt};
use uuid::Uuid;

use crate::auth::ActingUser;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/v1/consultations
///
/// Body is a canonical request, e.g. `{"search_type": "plate", "plate": "ABC1D23"}`.
/// Answers 202 while the provider works, 200 when the job already reached a
/// terminal state (synchronous providers, or a failure recorded on the request).
pub async fn submit_handler(
    State(state): State<AppState>,
    ActingUser(auth): ActingUser,
    body: Result<Json<CanonicalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitReceipt>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let receipt = state.orchestrator.submit(&auth, request).await?;
    let status = if receipt.status.is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(receipt)))
}

/// GET /api/v1/consultations/{id}
pub async fn status_handler(
    State(state): State<AppState>,
    ActingUser(auth): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusReport>, ApiError> {
    let report = state.orchestrator.get_status(&auth, id).await?;
    Ok(Json(report))
}

/// POST /api/v1/consultations/{id}/finalize
///
/// Idempotent: once completed, repeated calls return the stored result.
pub async fn finalize_handler(
    State(state): State<AppState>,
    ActingUser(auth): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationResult>, ApiError> {
    let result = state.orchestrator.finalize(&auth, id).await?;
    Ok(Json(result))
}
