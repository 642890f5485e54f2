use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ConsultationStatus, SearchType};
use crate::store::StoreError;

/// Typed failure reported by a lookup provider.
///
/// `transient` separates failures worth retrying later (network, timeout,
/// rate limit, 5xx) from terminal ones (not found, invalid credentials).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub transient: bool,
}

impl ProviderError {
    pub fn terminal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            transient: false,
        }
    }

    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            transient: true,
        }
    }
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Lookup {request_id} still processing after {elapsed:?}")]
    Timeout { request_id: Uuid, elapsed: Duration },

    #[error("Consultation {0} not found")]
    NotFound(Uuid),

    #[error("Consultation {0} has not finished at the provider yet")]
    NotReady(Uuid),

    #[error("Consultation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("No provider configured for {0}")]
    NoProvider(SearchType),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LookupError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(e) => e.transient,
            Self::Timeout { .. } | Self::NotReady(_) => true,
            Self::Storage(e) => matches!(e, StoreError::Connection(_)),
            _ => false,
        }
    }
}

impl From<ProviderError> for LookupError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

/// A webhook delivery that failed after its retry budget.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Delivery to webhook {webhook_id} failed: {message}")]
pub struct DeliveryFailure {
    pub webhook_id: Uuid,
    pub status: Option<u16>,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, LookupError>;
