//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use radar_core::{Orchestrator, WebhookDispatcher};

use crate::db::PgStore;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Consultation state machine (also owns the search history ledger)
    pub orchestrator: Arc<Orchestrator>,
    /// Webhook administration and event fan-out
    pub dispatcher: WebhookDispatcher,
    /// PostgreSQL store, `None` when running on in-memory storage
    pub database: Option<PgStore>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, dispatcher: WebhookDispatcher) -> Self {
        Self {
            orchestrator,
            dispatcher,
            database: None,
        }
    }

    pub fn with_database(mut self, database: PgStore) -> Self {
        self.database = Some(database);
        self
    }
}
