//! Radar Core - record-lookup orchestration for traffic-infraction cases
//!
//! This crate submits identity and vehicle lookups to third-party data
//! providers, follows their asynchronous completion, normalizes the answers
//! into one canonical shape, keeps an audit trail of every attempt, and
//! dispatches domain events to subscriber webhooks.
//!
//! # Components
//!
//! - [`http::BackoffExecutor`] - retrying HTTP caller shared by every outbound call
//! - [`provider`] - gateway, direct and demo provider adapters
//! - [`Orchestrator`] - per-request state machine
//! - [`PollingCoordinator`] - client-side watch loops
//! - [`Ledger`] - append-only search history
//! - [`WebhookDispatcher`] - event fan-out with per-delivery outcomes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use radar_core::{
//!     AuthContext, CanonicalRequest, Ledger, LookupConfig, MemoryStore, Orchestrator,
//!     OrchestratorSession, PollingCoordinator, ProviderRegistry,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LookupConfig::from_env();
//! let store = Arc::new(MemoryStore::new());
//! let orchestrator = Arc::new(Orchestrator::new(
//!     store.clone(),
//!     Ledger::new(store),
//!     ProviderRegistry::from_config(&config)?,
//!     config.demo_mode,
//! ));
//!
//! let session = OrchestratorSession::new(orchestrator, AuthContext::user(uuid::Uuid::new_v4()));
//! let coordinator = PollingCoordinator::new(Arc::new(session), config.polling);
//! let (_receipt, outcome) = coordinator
//!     .lookup(CanonicalRequest::Plate { plate: "ABC1234".into() })
//!     .await?;
//! let result = outcome.into_result()?;
//! println!("{}", serde_json::to_string_pretty(&result.normalized_payload)?);
//! # Ok(())
//! # }
//! ```

pub mod canonical;
pub mod config;
pub mod error;
pub mod http;
pub mod ledger;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod polling;
pub mod provider;
pub mod store;
pub mod validation;
pub mod webhook;

// Re-export main types for convenience
pub use canonical::{CanonicalResult, CnhRecord, DriverRecord, FineItem, FinesRecord, VehicleRecord};
pub use config::{DirectConfig, DispatchConfig, GatewayConfig, LookupConfig, PollingConfig};
pub use error::{DeliveryFailure, LookupError, ProviderError, Result};
pub use http::{BackoffExecutor, ExecutorConfig, ExecutorError, OutboundRequest};
pub use ledger::Ledger;
pub use model::{
    AuthContext, CanonicalRequest, ConsultationRequest, ConsultationResult, ConsultationStatus,
    HistoryLinks, NewWebhook, ResultSnapshot, SearchHistoryEntry, SearchType, Webhook,
    WebhookUpdate,
};
pub use orchestrator::{Orchestrator, StatusReport, SubmitReceipt};
pub use polling::{ConsultationApi, OrchestratorSession, PollHandle, PollOutcome, PollingCoordinator};
pub use provider::{
    DemoProvider, DirectProvider, GatewayProvider, LookupProvider, ProviderRegistry, ProviderSource,
};
pub use store::{
    ConsultationStore, HistoryFilter, HistoryPage, HistoryStore, MemoryStore, Page, StoreError,
    WebhookStore,
};
pub use webhook::{DeliveryOutcome, DispatchReport, WebhookDispatcher};
