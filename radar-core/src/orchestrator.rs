//! Consultation Orchestrator: owns the request state machine.
//!
//! `pending → running → completed | failed | timed_out`, with synchronous
//! provider answers going from `pending` straight to a terminal state. Every
//! terminal transition writes exactly one ledger entry.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::canonical::CanonicalResult;
use crate::error::{LookupError, ProviderError, Result};
use crate::ledger::Ledger;
use crate::model::{
    AuthContext, CanonicalRequest, ConsultationRequest, ConsultationResult, ConsultationStatus,
    ResultSnapshot, SearchHistoryEntry,
};
use crate::provider::{
    DemoProvider, LookupProvider, ProviderRegistry, ProviderSource, RemoteJobState, Submission,
};
use crate::store::{ConsultationStore, StoreError};
use crate::validation::validate_request;

/// What `submit` tells the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub request_id: Uuid,
    pub status: ConsultationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

/// What `get_status` observed.
///
/// For running jobs `status` reflects the provider's answer; `finalized`
/// says whether the stored request has reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub request_id: Uuid,
    pub status: ConsultationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
    pub finalized: bool,
}

impl StatusReport {
    fn stored(request: &ConsultationRequest) -> Self {
        Self {
            request_id: request.id,
            status: request.status,
            protocol: request.provider_protocol.clone(),
            provider: request.provider_source,
            error: request.error.clone(),
            finalized: request.status.is_terminal(),
        }
    }
}

pub struct Orchestrator {
    consultations: Arc<dyn ConsultationStore>,
    ledger: Ledger,
    providers: RwLock<Arc<ProviderRegistry>>,
    demo_mode: bool,
    finalize_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl Orchestrator {
    pub fn new(
        consultations: Arc<dyn ConsultationStore>,
        ledger: Ledger,
        providers: ProviderRegistry,
        demo_mode: bool,
    ) -> Self {
        Self {
            consultations,
            ledger,
            providers: RwLock::new(Arc::new(providers)),
            demo_mode,
            finalize_locks: DashMap::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn demo_mode(&self) -> bool {
        self.demo_mode
    }

    pub fn providers(&self) -> Arc<ProviderRegistry> {
        self.providers.read().clone()
    }

    /// Swap the provider set. In-flight calls keep the registry they started with.
    pub fn replace_providers(&self, providers: ProviderRegistry) {
        info!(providers = ?providers, "Replacing lookup providers");
        *self.providers.write() = Arc::new(providers);
    }

    /// Create a request, call the providers, and move it to `running` or a
    /// terminal state.
    ///
    /// Only input, auth and configuration problems are errors; a provider
    /// failure is recorded and reported in the receipt.
    #[instrument(level = "info", skip(self, auth, request), fields(search_type = %request.search_type()))]
    pub async fn submit(&self, auth: &AuthContext, request: CanonicalRequest) -> Result<SubmitReceipt> {
        let owner_id = auth.require_user()?;
        let params = validate_request(request)?;
        let search_type = params.search_type();

        let candidates = self.providers().candidates(search_type);
        if candidates.is_empty() {
            return Err(LookupError::NoProvider(search_type));
        }

        let mut consultation = ConsultationRequest::new(owner_id, params);
        self.consultations.insert_request(&consultation).await?;
        info!(request_id = %consultation.id, "Consultation created");

        let mut last_error = None;
        for (index, provider) in candidates.iter().enumerate() {
            let source = provider.source_id();
            match provider.lookup(&consultation.params).await {
                Ok(Submission::Accepted { protocol }) => {
                    consultation.provider_source = Some(source);
                    consultation.assign_protocol(protocol)?;
                    consultation.transition(ConsultationStatus::Running)?;
                    self.consultations.update_request(&consultation).await?;
                    info!(
                        request_id = %consultation.id,
                        provider = %source,
                        protocol = ?consultation.provider_protocol,
                        "Consultation running"
                    );
                    return Ok(receipt(&consultation));
                }
                Ok(Submission::Completed { raw }) => {
                    consultation.provider_source = Some(source);
                    let normalized = provider.normalize(search_type, &raw);
                    self.complete(&mut consultation, raw, normalized, source)
                        .await?;
                    return Ok(receipt(&consultation));
                }
                Err(e) if e.transient && index + 1 < candidates.len() => {
                    warn!(
                        request_id = %consultation.id,
                        provider = %source,
                        error = %e,
                        "Transient provider failure, falling back to next provider"
                    );
                    last_error = Some((source, e));
                }
                Err(e) => {
                    last_error = Some((source, e));
                    break;
                }
            }
        }

        let (source, error) = last_error.unwrap_or_else(|| {
            (
                candidates[0].source_id(),
                ProviderError::terminal("no_answer", "No provider answered"),
            )
        });
        consultation.provider_source = Some(source);
        self.resolve_failure(&mut consultation, error).await?;
        Ok(receipt(&consultation))
    }

    /// Current status. Never writes: for running jobs the provider is asked
    /// and its answer reported, while the stored request only changes in
    /// `finalize`.
    #[instrument(level = "debug", skip(self, auth))]
    pub async fn get_status(&self, auth: &AuthContext, request_id: Uuid) -> Result<StatusReport> {
        let request = self.load_owned(auth, request_id).await?;
        let mut report = StatusReport::stored(&request);

        if request.status != ConsultationStatus::Running {
            return Ok(report);
        }
        let (Some(source), Some(protocol)) = (request.provider_source, &request.provider_protocol)
        else {
            return Ok(report);
        };

        let provider = self.provider_for(source, &request)?;
        match provider.job_status(protocol).await? {
            RemoteJobState::Processing => {}
            RemoteJobState::Ready => report.status = ConsultationStatus::Completed,
            RemoteJobState::Failed(e) => {
                report.status = ConsultationStatus::Failed;
                report.error = Some(e);
            }
        }
        Ok(report)
    }

    /// Fetch and store the final result of a running job.
    ///
    /// Idempotent: on a terminal request it returns the stored outcome without
    /// touching the provider, the result table or the ledger.
    #[instrument(level = "info", skip(self, auth))]
    pub async fn finalize(&self, auth: &AuthContext, request_id: Uuid) -> Result<ConsultationResult> {
        let request = self.load_owned(auth, request_id).await?;
        if request.status != ConsultationStatus::Running {
            return self.settled(&request).await;
        }

        let lock = self.request_lock(request_id);
        let outcome = {
            let _guard = lock.lock().await;
            self.finalize_locked(request_id).await
        };
        drop(lock);
        self.release_lock(request_id);
        outcome
    }

    async fn finalize_locked(&self, request_id: Uuid) -> Result<ConsultationResult> {
        // Another finalize or the expiry sweep may have won the race for the lock
        let mut request = self
            .consultations
            .get_request(request_id)
            .await?
            .ok_or(LookupError::NotFound(request_id))?;
        if request.status != ConsultationStatus::Running {
            return self.settled(&request).await;
        }

        let (Some(source), Some(protocol)) =
            (request.provider_source, request.provider_protocol.clone())
        else {
            return Err(LookupError::NotReady(request_id));
        };
        let provider = self.provider_for(source, &request)?;

        match provider.fetch_result(&protocol).await {
            Ok(None) => Err(LookupError::NotReady(request_id)),
            Ok(Some(raw)) => {
                let normalized = provider.normalize(request.search_type, &raw);
                self.complete(&mut request, raw, normalized, source).await
            }
            Err(e) if e.transient => {
                warn!(request_id = %request_id, error = %e, "Transient failure fetching result");
                Err(LookupError::Provider(e))
            }
            Err(e) => {
                self.resolve_failure(&mut request, e.clone()).await?;
                match request.status {
                    ConsultationStatus::Completed => self.stored_result(request_id).await,
                    _ => Err(LookupError::Provider(e)),
                }
            }
        }
    }

    /// Outcome of a request that is not `running`. Never writes.
    async fn settled(&self, request: &ConsultationRequest) -> Result<ConsultationResult> {
        match request.status {
            ConsultationStatus::Completed => self.stored_result(request.id).await,
            ConsultationStatus::Failed => Err(LookupError::Provider(
                request
                    .error
                    .clone()
                    .unwrap_or_else(|| ProviderError::terminal("failed", "Consultation failed")),
            )),
            ConsultationStatus::TimedOut => Err(LookupError::Timeout {
                request_id: request.id,
                elapsed: (request.updated_at - request.created_at)
                    .to_std()
                    .unwrap_or_default(),
            }),
            ConsultationStatus::Pending | ConsultationStatus::Running => {
                Err(LookupError::NotReady(request.id))
            }
        }
    }

    fn request_lock(&self, request_id: Uuid) -> Arc<Mutex<()>> {
        self.finalize_locks.entry(request_id).or_default().clone()
    }

    /// Drop the lock entry once nobody else holds or waits on it.
    /// Call after the caller's own clone is dropped.
    fn release_lock(&self, request_id: Uuid) {
        self.finalize_locks
            .remove_if(&request_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Move `running` requests older than `max_age` to `timed_out`.
    ///
    /// Returns the ids that were expired.
    #[instrument(level = "info", skip(self))]
    pub async fn expire_stale(&self, max_age: Duration) -> Result<Vec<Uuid>> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| LookupError::invalid_input(format!("Invalid expiry horizon: {e}")))?;
        let cutoff = Utc::now() - max_age;

        let mut expired = Vec::new();
        for stale in self.consultations.list_stale_running(cutoff).await? {
            let lock = self.request_lock(stale.id);
            let outcome = {
                let _guard = lock.lock().await;
                self.expire_locked(stale.id, max_age).await
            };
            drop(lock);
            self.release_lock(stale.id);

            if outcome? {
                expired.push(stale.id);
            }
        }
        Ok(expired)
    }

    async fn expire_locked(&self, request_id: Uuid, max_age: chrono::Duration) -> Result<bool> {
        let Some(mut request) = self.consultations.get_request(request_id).await? else {
            return Ok(false);
        };
        if request.status != ConsultationStatus::Running {
            return Ok(false);
        }

        let error = ProviderError::transient(
            "timed_out",
            format!("Provider did not finish within {}s", max_age.num_seconds()),
        );
        request.transition(ConsultationStatus::TimedOut)?;
        request.error = Some(error.clone());
        self.consultations.update_request(&request).await?;
        self.ledger
            .record(&SearchHistoryEntry::for_consultation(
                &request,
                ResultSnapshot::failure(error),
            ))
            .await;

        warn!(request_id = %request.id, "Consultation timed out");
        Ok(true)
    }

    async fn load_owned(&self, auth: &AuthContext, request_id: Uuid) -> Result<ConsultationRequest> {
        let user_id = auth.require_user()?;
        match self.consultations.get_request(request_id).await? {
            Some(request) if request.owner_id == user_id => Ok(request),
            _ => Err(LookupError::NotFound(request_id)),
        }
    }

    async fn stored_result(&self, request_id: Uuid) -> Result<ConsultationResult> {
        self.consultations
            .get_result(request_id)
            .await?
            .ok_or_else(|| {
                LookupError::Storage(StoreError::NotFound(format!(
                    "Result of completed consultation {request_id}"
                )))
            })
    }

    fn provider_for(
        &self,
        source: ProviderSource,
        request: &ConsultationRequest,
    ) -> Result<Arc<dyn LookupProvider>> {
        self.providers().get(source).ok_or_else(|| {
            warn!(request_id = %request.id, provider = %source, "Provider no longer registered");
            LookupError::NoProvider(request.search_type)
        })
    }

    /// Write the result, move to `completed`, record the ledger entry.
    async fn complete(
        &self,
        request: &mut ConsultationRequest,
        raw: Value,
        normalized: CanonicalResult,
        source: ProviderSource,
    ) -> Result<ConsultationResult> {
        let result = ConsultationResult {
            request_id: request.id,
            normalized_payload: normalized,
            raw_provider_payload: raw,
            provider_source: source,
            synthetic: source == ProviderSource::Demo,
            created_at: Utc::now(),
        };

        let result = match self.consultations.insert_result(&result).await {
            Ok(()) => result,
            Err(StoreError::Conflict(_)) => self.stored_result(request.id).await?,
            Err(e) => return Err(e.into()),
        };

        request.provider_source = Some(result.provider_source);
        request.transition(ConsultationStatus::Completed)?;
        self.consultations.update_request(request).await?;
        self.ledger
            .record(&SearchHistoryEntry::for_consultation(
                request,
                ResultSnapshot::success(result.normalized_payload.clone(), result.synthetic),
            ))
            .await;

        info!(
            request_id = %request.id,
            provider = %result.provider_source,
            synthetic = result.synthetic,
            "Consultation completed"
        );
        Ok(result)
    }

    /// Record a provider failure, or substitute a synthetic result in demo mode.
    async fn resolve_failure(&self, request: &mut ConsultationRequest, error: ProviderError) -> Result<()> {
        if self.demo_mode {
            warn!(
                request_id = %request.id,
                error = %error,
                "Demo mode: substituting synthetic result for provider failure"
            );
            let raw = DemoProvider::synthesize(&request.params);
            let normalized = DemoProvider::new(0).normalize(request.search_type, &raw);
            self.complete(request, raw, normalized, ProviderSource::Demo)
                .await?;
            return Ok(());
        }

        request.fail(error.clone())?;
        self.consultations.update_request(request).await?;
        self.ledger
            .record(&SearchHistoryEntry::for_consultation(
                request,
                ResultSnapshot::failure(error.clone()),
            ))
            .await;
        warn!(request_id = %request.id, error = %error, "Consultation failed");
        Ok(())
    }
}

fn receipt(request: &ConsultationRequest) -> SubmitReceipt {
    SubmitReceipt {
        request_id: request.id,
        status: request.status,
        protocol: request.provider_protocol.clone(),
        provider: request.provider_source,
        error: request.error.clone(),
    }
}
