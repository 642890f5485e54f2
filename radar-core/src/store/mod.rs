//! Persistence interfaces consumed by the lookup core.
//!
//! The core needs single-row create/read/update by id, equality-filtered
//! range queries ordered by creation time, and insert-only appends for the
//! ledger. No multi-entity transactions are assumed.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    ConsultationRequest, ConsultationResult, HistoryLinks, SearchHistoryEntry, SearchType, Webhook,
};

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// A write-once row already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Requests and their (at most one) results.
#[async_trait]
pub trait ConsultationStore: Send + Sync {
    async fn insert_request(&self, request: &ConsultationRequest) -> StoreResult<()>;

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<ConsultationRequest>>;

    /// Overwrite the stored row. Fails with `NotFound` for unknown ids.
    async fn update_request(&self, request: &ConsultationRequest) -> StoreResult<()>;

    /// Write a result. Fails with `Conflict` if the request already has one.
    async fn insert_result(&self, result: &ConsultationResult) -> StoreResult<()>;

    async fn get_result(&self, request_id: Uuid) -> StoreResult<Option<ConsultationResult>>;

    /// `running` requests created before `before`, oldest first.
    async fn list_stale_running(&self, before: DateTime<Utc>) -> StoreResult<Vec<ConsultationRequest>>;
}

/// Append-only audit log.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: &SearchHistoryEntry) -> StoreResult<()>;

    async fn get_entry(&self, id: Uuid) -> StoreResult<Option<SearchHistoryEntry>>;

    /// Matching entries, newest first.
    async fn query(&self, filter: &HistoryFilter, page: Page) -> StoreResult<HistoryPage>;

    /// Set back-links. Fields left `None` in `links` keep their stored value.
    async fn attach(&self, entry_id: Uuid, links: HistoryLinks) -> StoreResult<SearchHistoryEntry>;
}

/// Webhook configuration plus delivery counters.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn create(&self, webhook: &Webhook) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Webhook>>;

    async fn list(&self) -> StoreResult<Vec<Webhook>>;

    async fn update(&self, webhook: &Webhook) -> StoreResult<()>;

    /// Returns whether a row was deleted.
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;

    /// Enabled webhooks subscribed to `event_type`.
    async fn find_subscribers(&self, event_type: &str) -> StoreResult<Vec<Webhook>>;

    /// Stamp `last_triggered_at`; reset `fail_count` on success, increment it otherwise.
    async fn record_delivery(&self, id: Uuid, success: bool, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Equality filters for ledger queries. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub user_id: Option<Uuid>,
    pub search_type: Option<SearchType>,
    pub search_query: Option<String>,
    pub success: Option<bool>,
    pub related_client_id: Option<Uuid>,
    pub related_vehicle_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
}

impl HistoryFilter {
    pub fn matches(&self, entry: &SearchHistoryEntry) -> bool {
        self.user_id.map_or(true, |id| entry.user_id == id)
            && self.search_type.map_or(true, |t| entry.search_type == t)
            && self
                .search_query
                .as_deref()
                .map_or(true, |q| entry.search_query == q)
            && self
                .success
                .map_or(true, |s| entry.result_snapshot.success == s)
            && self
                .related_client_id
                .map_or(true, |id| entry.related_client_id == Some(id))
            && self
                .related_vehicle_id
                .map_or(true, |id| entry.related_vehicle_id == Some(id))
            && self
                .consultation_id
                .map_or(true, |id| entry.consultation_id == Some(id))
    }
}

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    /// Clamps `page` to at least 1 and `limit` to `1..=100`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<SearchHistoryEntry>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

impl HistoryPage {
    pub fn new(entries: Vec<SearchHistoryEntry>, page: Page, total: u64) -> Self {
        let has_more = page.offset() + (entries.len() as u64) < total;
        Self {
            entries,
            page: page.page(),
            limit: page.limit(),
            total,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamping() {
        let page = Page::new(0, 500);
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), MAX_PAGE_LIMIT);
        assert_eq!(Page::new(3, 10).offset(), 20);
        assert_eq!(Page::new(1, 0).limit(), 1);
    }

    #[test]
    fn test_has_more() {
        let page = HistoryPage::new(Vec::new(), Page::new(1, 10), 0);
        assert!(!page.has_more);
        assert_eq!(page.total, 0);
    }
}
