//! Search history handlers

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use radar_core::{HistoryFilter, HistoryLinks, HistoryPage, Page, SearchHistoryEntry, SearchType};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::ActingUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for listing history entries
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Page number (1-indexed)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub limit: Option<u32>,
    pub search_type: Option<SearchType>,
    /// Exact query string, e.g. a plate
    pub query: Option<String>,
    pub success: Option<bool>,
    pub client_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
}

impl HistoryQuery {
    fn into_parts(self) -> (HistoryFilter, Page) {
        let page = Page::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(radar_core::store::DEFAULT_PAGE_LIMIT),
        );
        let filter = HistoryFilter {
            user_id: None,
            search_type: self.search_type,
            search_query: self.query,
            success: self.success,
            related_client_id: self.client_id,
            related_vehicle_id: self.vehicle_id,
            consultation_id: self.consultation_id,
        };
        (filter, page)
    }
}

/// GET /api/v1/history
///
/// Newest first, always scoped to the acting user.
pub async fn list_history_handler(
    State(state): State<AppState>,
    ActingUser(auth): ActingUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let (filter, page) = query.into_parts();
    let page = state.orchestrator.ledger().query(&auth, filter, page).await?;
    Ok(Json(page))
}

/// PATCH /api/v1/history/{id}/links
pub async fn attach_links_handler(
    State(state): State<AppState>,
    ActingUser(auth): ActingUser,
    Path(id): Path<Uuid>,
    body: Result<Json<HistoryLinks>, JsonRejection>,
) -> Result<Json<SearchHistoryEntry>, ApiError> {
    let Json(links) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let entry = state.orchestrator.ledger().attach(&auth, id, links).await?;
    Ok(Json(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults_and_clamping() {
        let (filter, page) = HistoryQuery {
            limit: Some(500),
            page: Some(0),
            query: Some("ABC1D23".into()),
            ..Default::default()
        }
        .into_parts();

        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), 100);
        assert_eq!(filter.search_query.as_deref(), Some("ABC1D23"));
        assert!(filter.user_id.is_none());
    }
}
