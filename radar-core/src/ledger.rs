//! Search History Ledger: append-only audit trail of every lookup attempt.

use std::sync::Arc;

use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::error::{LookupError, Result};
use crate::model::{AuthContext, HistoryLinks, SearchHistoryEntry};
use crate::store::{HistoryFilter, HistoryPage, HistoryStore, Page};

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn HistoryStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Append `entry`. Failures are logged and swallowed so they never change
    /// the outcome of the lookup being recorded. Returns whether it was written.
    #[instrument(
        level = "debug",
        skip(self, entry),
        fields(entry_id = %entry.id, consultation_id = ?entry.consultation_id, success = entry.result_snapshot.success)
    )]
    pub async fn record(&self, entry: &SearchHistoryEntry) -> bool {
        match self.store.append(entry).await {
            Ok(()) => {
                debug!("History entry recorded");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to record history entry");
                false
            }
        }
    }

    /// Entries of the acting user matching `filter`, newest first.
    ///
    /// `filter.user_id` is always overridden with the acting user.
    pub async fn query(
        &self,
        auth: &AuthContext,
        filter: HistoryFilter,
        page: Page,
    ) -> Result<HistoryPage> {
        let user_id = auth.require_user()?;
        let filter = HistoryFilter {
            user_id: Some(user_id),
            ..filter
        };
        Ok(self.store.query(&filter, page).await?)
    }

    /// Set the client/vehicle back-links on one of the acting user's entries.
    #[instrument(level = "info", skip(self, auth))]
    pub async fn attach(
        &self,
        auth: &AuthContext,
        entry_id: Uuid,
        links: HistoryLinks,
    ) -> Result<SearchHistoryEntry> {
        let user_id = auth.require_user()?;
        if links.is_empty() {
            return Err(LookupError::invalid_input(
                "At least one of client_id or vehicle_id is required",
            ));
        }

        match self.store.get_entry(entry_id).await? {
            Some(entry) if entry.user_id == user_id => {}
            _ => return Err(LookupError::NotFound(entry_id)),
        }
        Ok(self.store.attach(entry_id, links).await?)
    }
}
