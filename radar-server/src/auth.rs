//! Acting-user extraction
//!
//! The acting user arrives in the `x-user-id` header, set by the gateway in
//! front of this service. The header is not validated here: a missing or
//! malformed value becomes an anonymous [`AuthContext`], which the core
//! rejects as `Unauthorized` on every user-scoped operation.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use radar_core::AuthContext;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-user-id";

/// Extractor yielding the caller's [`AuthContext`]. Never rejects.
#[derive(Debug, Clone)]
pub struct ActingUser(pub AuthContext);

impl FromRequestParts<AppState> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok());

        let auth = match user_id {
            Some(id) => AuthContext::user(id),
            None => {
                tracing::debug!("No valid {} header, treating caller as anonymous", USER_HEADER);
                AuthContext::anonymous()
            }
        };
        Ok(ActingUser(auth))
    }
}
