//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use radar_core::{LookupError, StoreError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Lookup error - raised by the orchestration core
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Lookup(ref e) => match e {
                LookupError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                LookupError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                LookupError::NotFound(_) => StatusCode::NOT_FOUND,

                // Asked to finalize before the provider is done, or an illegal state move
                LookupError::NotReady(_) | LookupError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }

                LookupError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,

                // Provider failures: transient → 503, terminal (not found, bad credentials) → 422
                LookupError::Provider(p) if p.transient => StatusCode::SERVICE_UNAVAILABLE,
                LookupError::Provider(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LookupError::NoProvider(_) => StatusCode::SERVICE_UNAVAILABLE,

                LookupError::Storage(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
                LookupError::Storage(StoreError::Conflict(_)) => StatusCode::CONFLICT,
                LookupError::Storage(StoreError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
                LookupError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Lookup(ref e) => match e {
                LookupError::InvalidInput(_) => "INVALID_INPUT",
                LookupError::Unauthorized(_) => "UNAUTHORIZED",
                LookupError::NotFound(_) => "NOT_FOUND",
                LookupError::NotReady(_) => "NOT_READY",
                LookupError::InvalidTransition { .. } => "INVALID_TRANSITION",
                LookupError::Timeout { .. } => "LOOKUP_TIMEOUT",
                LookupError::Provider(p) if p.transient => "PROVIDER_UNAVAILABLE",
                LookupError::Provider(_) => "PROVIDER_ERROR",
                LookupError::NoProvider(_) => "NO_PROVIDER",
                LookupError::Storage(StoreError::NotFound(_)) => "NOT_FOUND",
                LookupError::Storage(StoreError::Conflict(_)) => "CONFLICT",
                LookupError::Storage(_) => "STORAGE_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Lookup(ref e) => match e {
                LookupError::Provider(p) if p.transient => {
                    "Lookup provider temporarily unavailable".to_string()
                }
                // Terminal provider errors are meaningful to the caller (e.g. record not found)
                LookupError::Provider(p) => p.message.clone(),
                LookupError::Storage(StoreError::NotFound(what)) => format!("{what} not found"),
                LookupError::Storage(_) => "Storage error".to_string(),
                other => other.to_string(),
            },
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Lookup(_) => "lookup",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Authentication error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_core::{ConsultationStatus, ProviderError, SearchType};
    use uuid::Uuid;

    #[test]
    fn test_lookup_error_status_codes() {
        let id = Uuid::new_v4();
        let cases = [
            (LookupError::invalid_input("bad plate"), StatusCode::BAD_REQUEST),
            (LookupError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (LookupError::NotFound(id), StatusCode::NOT_FOUND),
            (LookupError::NotReady(id), StatusCode::CONFLICT),
            (
                LookupError::InvalidTransition {
                    id,
                    from: ConsultationStatus::Completed,
                    to: ConsultationStatus::Running,
                },
                StatusCode::CONFLICT,
            ),
            (
                LookupError::Provider(ProviderError::transient("http_503", "down")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                LookupError::Provider(ProviderError::terminal("not_found", "no record")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LookupError::NoProvider(SearchType::Cnh), StatusCode::SERVICE_UNAVAILABLE),
            (
                LookupError::Storage(StoreError::Query("syntax".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(ApiError::from(error).status_code(), expected);
        }
    }

    #[test]
    fn test_internal_details_are_not_exposed() {
        let err = ApiError::from(LookupError::Storage(StoreError::Query(
            "relation \"webhooks\" does not exist".into(),
        )));
        assert_eq!(err.client_message(), "Storage error");
        assert_eq!(err.error_code(), "STORAGE_ERROR");

        let terminal = ApiError::from(LookupError::Provider(ProviderError::terminal(
            "not_found",
            "Vehicle not found",
        )));
        assert_eq!(terminal.client_message(), "Vehicle not found");
    }
}
