//! Lookup data model: requests, results, audit entries and webhook subscriptions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canonical::CanonicalResult;
use crate::error::{LookupError, ProviderError, Result};
use crate::provider::ProviderSource;

/// Kind of record being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Plate,
    Renavam,
    Cnh,
    DriverCpf,
    VehicleFines,
}

impl SearchType {
    pub const ALL: [SearchType; 5] = [
        Self::Plate,
        Self::Renavam,
        Self::Cnh,
        Self::DriverCpf,
        Self::VehicleFines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plate => "plate",
            Self::Renavam => "renavam",
            Self::Cnh => "cnh",
            Self::DriverCpf => "driver_cpf",
            Self::VehicleFines => "vehicle_fines",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plate" | "placa" => Ok(Self::Plate),
            "renavam" => Ok(Self::Renavam),
            "cnh" => Ok(Self::Cnh),
            "driver_cpf" | "cpf" => Ok(Self::DriverCpf),
            "vehicle_fines" | "fines" | "multas" => Ok(Self::VehicleFines),
            other => Err(LookupError::invalid_input(format!(
                "Unknown search type '{other}'"
            ))),
        }
    }
}

/// Provider-agnostic lookup input. Each variant carries only the fields
/// its search type needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "search_type", rename_all = "snake_case")]
pub enum CanonicalRequest {
    Plate {
        plate: String,
    },
    Renavam {
        renavam: String,
    },
    Cnh {
        cnh_number: String,
        birth_date: String,
    },
    DriverCpf {
        cpf: String,
    },
    VehicleFines {
        plate: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        renavam: Option<String>,
    },
}

impl CanonicalRequest {
    pub fn search_type(&self) -> SearchType {
        match self {
            Self::Plate { .. } => SearchType::Plate,
            Self::Renavam { .. } => SearchType::Renavam,
            Self::Cnh { .. } => SearchType::Cnh,
            Self::DriverCpf { .. } => SearchType::DriverCpf,
            Self::VehicleFines { .. } => SearchType::VehicleFines,
        }
    }

    /// The raw query string recorded for audit (plate, document number...).
    pub fn search_query(&self) -> &str {
        match self {
            Self::Plate { plate } | Self::VehicleFines { plate, .. } => plate,
            Self::Renavam { renavam } => renavam,
            Self::Cnh { cnh_number, .. } => cnh_number,
            Self::DriverCpf { cpf } => cpf,
        }
    }

    /// Build a request from a search type and a single query string.
    ///
    /// `birth_date` is only consulted for CNH lookups.
    pub fn from_query(
        search_type: SearchType,
        query: impl Into<String>,
        birth_date: Option<String>,
    ) -> Result<Self> {
        let query = query.into();
        let request = match search_type {
            SearchType::Plate => Self::Plate { plate: query },
            SearchType::Renavam => Self::Renavam { renavam: query },
            SearchType::Cnh => Self::Cnh {
                cnh_number: query,
                birth_date: birth_date.ok_or_else(|| {
                    LookupError::invalid_input("CNH lookups require a birth date")
                })?,
            },
            SearchType::DriverCpf => Self::DriverCpf { cpf: query },
            SearchType::VehicleFines => Self::VehicleFines {
                plate: query,
                renavam: None,
            },
        };
        Ok(request)
    }
}

/// Acting user supplied by the caller's auth layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Option<Uuid>,
}

impl AuthContext {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// The acting user, or `Unauthorized` when the context carries none.
    pub fn require_user(&self) -> Result<Uuid> {
        self.user_id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| LookupError::Unauthorized("Missing acting user".into()))
    }
}

/// Lifecycle of a consultation.
///
/// `pending → running → completed | failed | timed_out`; a synchronous provider
/// answer may jump from `pending` straight to `completed` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl ConsultationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    pub fn can_transition_to(&self, next: ConsultationStatus) -> bool {
        use ConsultationStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            other => Err(LookupError::invalid_input(format!(
                "Unknown consultation status '{other}'"
            ))),
        }
    }
}

/// One lookup attempt, owned and mutated by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub search_type: SearchType,
    pub search_query: String,
    pub params: CanonicalRequest,
    pub provider_source: Option<ProviderSource>,
    pub provider_protocol: Option<String>,
    pub status: ConsultationStatus,
    pub error: Option<ProviderError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConsultationRequest {
    pub fn new(owner_id: Uuid, params: CanonicalRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            search_type: params.search_type(),
            search_query: params.search_query().to_string(),
            params,
            provider_source: None,
            provider_protocol: None,
            status: ConsultationStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the provider job id. Set at most once.
    pub fn assign_protocol(&mut self, protocol: impl Into<String>) -> Result<()> {
        let protocol = protocol.into();
        match &self.provider_protocol {
            None => {
                self.provider_protocol = Some(protocol);
                self.updated_at = Utc::now();
                Ok(())
            }
            Some(existing) if *existing == protocol => Ok(()),
            Some(existing) => Err(LookupError::invalid_input(format!(
                "Consultation {} already has protocol {existing}",
                self.id
            ))),
        }
    }

    pub fn transition(&mut self, next: ConsultationStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LookupError::InvalidTransition {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn fail(&mut self, error: ProviderError) -> Result<()> {
        self.transition(ConsultationStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }
}

/// Final, immutable result of a successful consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationResult {
    pub request_id: Uuid,
    pub normalized_payload: CanonicalResult,
    pub raw_provider_payload: serde_json::Value,
    pub provider_source: ProviderSource,
    /// Produced by the demo provider rather than a real data source.
    #[serde(default)]
    pub synthetic: bool,
    pub created_at: DateTime<Utc>,
}

/// Outcome captured in the audit ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CanonicalResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
    #[serde(default)]
    pub synthetic: bool,
}

impl ResultSnapshot {
    pub fn success(data: CanonicalResult, synthetic: bool) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            synthetic,
        }
    }

    pub fn failure(error: ProviderError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            synthetic: false,
        }
    }
}

/// Durable audit copy of one lookup attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub search_type: SearchType,
    pub search_query: String,
    pub provider_source: String,
    pub result_snapshot: ResultSnapshot,
    pub related_client_id: Option<Uuid>,
    pub related_vehicle_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl SearchHistoryEntry {
    pub fn for_consultation(request: &ConsultationRequest, snapshot: ResultSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.owner_id,
            consultation_id: Some(request.id),
            search_type: request.search_type,
            search_query: request.search_query.clone(),
            provider_source: request
                .provider_source
                .map(|s| s.as_str().to_string())
                .unwrap_or_else(|| crate::canonical::UNKNOWN.to_string()),
            result_snapshot: snapshot,
            related_client_id: None,
            related_vehicle_id: None,
            created_at: Utc::now(),
        }
    }
}

/// The only mutation allowed on a history entry after it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLinks {
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub vehicle_id: Option<Uuid>,
}

impl HistoryLinks {
    pub fn is_empty(&self) -> bool {
        self.client_id.is_none() && self.vehicle_id.is_none()
    }
}

/// Subscriber endpoint for domain events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub events: BTreeSet<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub enabled: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    /// Consecutive delivery failures since the last success.
    pub fail_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.enabled && self.events.contains(event_type)
    }
}

/// Fields for creating a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWebhook {
    pub name: String,
    pub url: String,
    pub events: BTreeSet<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NewWebhook {
    pub fn into_webhook(self) -> Webhook {
        let now = Utc::now();
        Webhook {
            id: Uuid::new_v4(),
            name: self.name,
            url: self.url,
            events: self.events,
            headers: self.headers,
            enabled: self.enabled,
            last_triggered_at: None,
            fail_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable webhook fields. Delivery counters are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub events: Option<BTreeSet<String>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub enabled: Option<bool>,
}

impl WebhookUpdate {
    pub fn apply(self, webhook: &mut Webhook) {
        if let Some(name) = self.name {
            webhook.name = name;
        }
        if let Some(url) = self.url {
            webhook.url = url;
        }
        if let Some(events) = self.events {
            webhook.events = events;
        }
        if let Some(headers) = self.headers {
            webhook.headers = headers;
        }
        if let Some(enabled) = self.enabled {
            webhook.enabled = enabled;
        }
        webhook.updated_at = Utc::now();
    }
}
