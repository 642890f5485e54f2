//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod consultations;
pub mod events;
pub mod health;
pub mod history;
pub mod webhooks;

pub use crate::state::AppState;
pub use consultations::{finalize_handler, status_handler, submit_handler};
pub use events::{trigger_handler, TriggerRequest};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use history::{attach_links_handler, list_history_handler, HistoryQuery};
pub use webhooks::{
    create_webhook_handler, delete_webhook_handler, get_webhook_handler, list_webhooks_handler,
    test_webhook_handler, update_webhook_handler,
};
