//! In-memory store for tests and local runs.
//!
//! Thread-safe via `DashMap`; contents live for the process lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{
    ConsultationStore, HistoryFilter, HistoryPage, HistoryStore, Page, StoreError, StoreResult,
    WebhookStore,
};
use crate::model::{
    ConsultationRequest, ConsultationResult, ConsultationStatus, HistoryLinks, SearchHistoryEntry,
    Webhook,
};

#[derive(Default)]
pub struct MemoryStore {
    requests: DashMap<Uuid, ConsultationRequest>,
    results: DashMap<Uuid, ConsultationResult>,
    /// entry id -> (append sequence, entry)
    history: DashMap<Uuid, (u64, SearchHistoryEntry)>,
    history_seq: AtomicU64,
    webhooks: DashMap<Uuid, Webhook>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[async_trait]
impl ConsultationStore for MemoryStore {
    async fn insert_request(&self, request: &ConsultationRequest) -> StoreResult<()> {
        match self.requests.entry(request.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "Consultation {} already exists",
                request.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<ConsultationRequest>> {
        Ok(self.requests.get(&id).map(|r| r.value().clone()))
    }

    async fn update_request(&self, request: &ConsultationRequest) -> StoreResult<()> {
        match self.requests.get_mut(&request.id) {
            Some(mut stored) => {
                *stored = request.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Consultation {}", request.id))),
        }
    }

    async fn insert_result(&self, result: &ConsultationResult) -> StoreResult<()> {
        match self.results.entry(result.request_id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "Consultation {} already has a result",
                result.request_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(result.clone());
                Ok(())
            }
        }
    }

    async fn get_result(&self, request_id: Uuid) -> StoreResult<Option<ConsultationResult>> {
        Ok(self.results.get(&request_id).map(|r| r.value().clone()))
    }

    async fn list_stale_running(&self, before: DateTime<Utc>) -> StoreResult<Vec<ConsultationRequest>> {
        let mut stale: Vec<ConsultationRequest> = self
            .requests
            .iter()
            .filter(|r| r.status == ConsultationStatus::Running && r.created_at < before)
            .map(|r| r.value().clone())
            .collect();
        stale.sort_by_key(|r| r.created_at);
        Ok(stale)
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, entry: &SearchHistoryEntry) -> StoreResult<()> {
        let seq = self.history_seq.fetch_add(1, Ordering::SeqCst);
        match self.history.entry(entry.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "History entry {} already exists",
                entry.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert((seq, entry.clone()));
                Ok(())
            }
        }
    }

    async fn get_entry(&self, id: Uuid) -> StoreResult<Option<SearchHistoryEntry>> {
        Ok(self.history.get(&id).map(|e| e.value().1.clone()))
    }

    async fn query(&self, filter: &HistoryFilter, page: Page) -> StoreResult<HistoryPage> {
        let mut matching: Vec<(u64, SearchHistoryEntry)> = self
            .history
            .iter()
            .filter(|e| filter.matches(&e.value().1))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });

        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|(_, entry)| entry)
            .collect();
        Ok(HistoryPage::new(entries, page, total))
    }

    async fn attach(&self, entry_id: Uuid, links: HistoryLinks) -> StoreResult<SearchHistoryEntry> {
        let mut stored = self
            .history
            .get_mut(&entry_id)
            .ok_or_else(|| StoreError::NotFound(format!("History entry {entry_id}")))?;
        let entry = &mut stored.1;
        if let Some(client_id) = links.client_id {
            entry.related_client_id = Some(client_id);
        }
        if let Some(vehicle_id) = links.vehicle_id {
            entry.related_vehicle_id = Some(vehicle_id);
        }
        Ok(entry.clone())
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn create(&self, webhook: &Webhook) -> StoreResult<()> {
        match self.webhooks.entry(webhook.id) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "Webhook {} already exists",
                webhook.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(webhook.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Webhook>> {
        Ok(self.webhooks.get(&id).map(|w| w.value().clone()))
    }

    async fn list(&self) -> StoreResult<Vec<Webhook>> {
        let mut all: Vec<Webhook> = self.webhooks.iter().map(|w| w.value().clone()).collect();
        all.sort_by_key(|w| w.created_at);
        Ok(all)
    }

    async fn update(&self, webhook: &Webhook) -> StoreResult<()> {
        match self.webhooks.get_mut(&webhook.id) {
            Some(mut stored) => {
                *stored = webhook.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Webhook {}", webhook.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.webhooks.remove(&id).is_some())
    }

    async fn find_subscribers(&self, event_type: &str) -> StoreResult<Vec<Webhook>> {
        Ok(self
            .webhooks
            .iter()
            .filter(|w| w.subscribes_to(event_type))
            .map(|w| w.value().clone())
            .collect())
    }

    async fn record_delivery(&self, id: Uuid, success: bool, at: DateTime<Utc>) -> StoreResult<()> {
        let mut webhook = self
            .webhooks
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Webhook {id}")))?;
        webhook.last_triggered_at = Some(at);
        webhook.fail_count = if success {
            0
        } else {
            webhook.fail_count.saturating_add(1)
        };
        Ok(())
    }
}
