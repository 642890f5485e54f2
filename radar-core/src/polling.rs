//! Polling Coordinator: one supervised task per running consultation.
//!
//! Each watch loop sleeps for the configured interval, asks for the status,
//! and calls `finalize` exactly once when a terminal status is observed. The
//! loop is bounded by `max_duration`; hitting the bound reports
//! [`PollOutcome::TimedOut`] without calling `finalize`. Status errors are
//! logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::PollingConfig;
use crate::error::{LookupError, ProviderError, Result};
use crate::model::{AuthContext, CanonicalRequest, ConsultationResult, ConsultationStatus};
use crate::orchestrator::{Orchestrator, StatusReport, SubmitReceipt};

/// The consultation operations a client session can call.
#[async_trait]
pub trait ConsultationApi: Send + Sync {
    async fn submit(&self, request: CanonicalRequest) -> Result<SubmitReceipt>;

    async fn get_status(&self, request_id: Uuid) -> Result<StatusReport>;

    async fn finalize(&self, request_id: Uuid) -> Result<ConsultationResult>;
}

/// An orchestrator bound to one acting user.
#[derive(Clone)]
pub struct OrchestratorSession {
    orchestrator: Arc<Orchestrator>,
    auth: AuthContext,
}

impl OrchestratorSession {
    pub fn new(orchestrator: Arc<Orchestrator>, auth: AuthContext) -> Self {
        Self { orchestrator, auth }
    }
}

#[async_trait]
impl ConsultationApi for OrchestratorSession {
    async fn submit(&self, request: CanonicalRequest) -> Result<SubmitReceipt> {
        self.orchestrator.submit(&self.auth, request).await
    }

    async fn get_status(&self, request_id: Uuid) -> Result<StatusReport> {
        self.orchestrator.get_status(&self.auth, request_id).await
    }

    async fn finalize(&self, request_id: Uuid) -> Result<ConsultationResult> {
        self.orchestrator.finalize(&self.auth, request_id).await
    }
}

/// How a watch loop ended.
#[derive(Debug)]
pub enum PollOutcome {
    Completed(ConsultationResult),
    Failed(LookupError),
    /// The local bound was reached; the job may still finish remotely.
    TimedOut {
        request_id: Uuid,
        elapsed: Duration,
        polls: u32,
    },
    Cancelled,
}

impl PollOutcome {
    pub fn into_result(self) -> Result<ConsultationResult> {
        match self {
            Self::Completed(result) => Ok(result),
            Self::Failed(err) => Err(err),
            Self::TimedOut {
                request_id,
                elapsed,
                ..
            } => Err(LookupError::Timeout {
                request_id,
                elapsed,
            }),
            Self::Cancelled => Err(LookupError::Provider(ProviderError::terminal(
                "cancelled",
                "Polling was cancelled",
            ))),
        }
    }
}

/// Handle to a spawned watch loop.
///
/// Dropping the handle detaches the loop; call [`PollHandle::cancel`] to stop it.
pub struct PollHandle {
    request_id: Uuid,
    cancel: Arc<Notify>,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Stop the loop at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn outcome(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(request_id = %self.request_id, error = %e, "Watch task aborted");
                PollOutcome::Cancelled
            }
        }
    }
}

#[derive(Clone)]
pub struct PollingCoordinator {
    api: Arc<dyn ConsultationApi>,
    config: PollingConfig,
}

impl PollingCoordinator {
    pub fn new(api: Arc<dyn ConsultationApi>, config: PollingConfig) -> Self {
        Self { api, config }
    }

    pub fn config(&self) -> PollingConfig {
        self.config
    }

    /// Submit `request` and follow it to an outcome.
    pub async fn lookup(&self, request: CanonicalRequest) -> Result<(SubmitReceipt, PollOutcome)> {
        let receipt = self.api.submit(request).await?;
        let outcome = match receipt.status {
            ConsultationStatus::Completed => match self.api.finalize(receipt.request_id).await {
                Ok(result) => PollOutcome::Completed(result),
                Err(e) => PollOutcome::Failed(e),
            },
            ConsultationStatus::Failed => PollOutcome::Failed(LookupError::Provider(
                receipt.error.clone().unwrap_or_else(|| {
                    ProviderError::terminal("failed", "Consultation failed")
                }),
            )),
            ConsultationStatus::TimedOut => PollOutcome::TimedOut {
                request_id: receipt.request_id,
                elapsed: Duration::ZERO,
                polls: 0,
            },
            ConsultationStatus::Pending | ConsultationStatus::Running => {
                self.watch(receipt.request_id).outcome().await
            }
        };
        Ok((receipt, outcome))
    }

    /// Spawn a watch loop for `request_id`.
    pub fn watch(&self, request_id: Uuid) -> PollHandle {
        let cancel = Arc::new(Notify::new());
        let coordinator = self.clone();
        let signal = cancel.clone();
        let task = tokio::spawn(async move { coordinator.run(request_id, signal).await });
        PollHandle {
            request_id,
            cancel,
            task,
        }
    }

    #[instrument(level = "info", skip(self, cancel), fields(interval_ms = self.config.interval.as_millis() as u64))]
    async fn run(&self, request_id: Uuid, cancel: Arc<Notify>) -> PollOutcome {
        let started = Instant::now();
        let deadline = started + self.config.max_duration;
        let mut polls = 0u32;

        loop {
            let wake = (Instant::now() + self.config.interval).min(deadline);
            tokio::select! {
                _ = cancel.notified() => {
                    info!(polls, "Polling cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = sleep_until(wake) => {}
            }

            if Instant::now() >= deadline {
                warn!(polls, "Polling exceeded its time bound");
                return PollOutcome::TimedOut {
                    request_id,
                    elapsed: started.elapsed(),
                    polls,
                };
            }

            polls += 1;
            let report = match self.api.get_status(request_id).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(polls, error = %e, "Status poll failed, retrying next tick");
                    continue;
                }
            };

            if !report.status.is_terminal() {
                debug!(polls, status = %report.status, "Still running");
                continue;
            }

            info!(polls, status = %report.status, "Terminal status observed, finalizing");
            return match self.api.finalize(request_id).await {
                Ok(result) => PollOutcome::Completed(result),
                Err(LookupError::Timeout { elapsed, .. }) => PollOutcome::TimedOut {
                    request_id,
                    elapsed,
                    polls,
                },
                // The request is still running server-side; try again on the next tick
                Err(e) if e.is_transient() => {
                    warn!(polls, error = %e, "Finalize failed, retrying next tick");
                    continue;
                }
                Err(e) => PollOutcome::Failed(e),
            };
        }
    }
}
