//! Provider adapters for external record lookups.
//!
//! ## Supported Providers
//!
//! - `GatewayProvider` - asynchronous job API (submit, poll status, fetch result)
//! - `DirectProvider` - synchronous API answering in the same call
//! - `DemoProvider` - deterministic synthetic data (demo mode only)
//!
//! Providers are registered in priority order; the orchestrator falls through
//! to the next one that supports a search type when a lookup fails transiently.

pub mod demo;
pub mod direct;
pub mod gateway;

pub use demo::DemoProvider;
pub use direct::DirectProvider;
pub use gateway::GatewayProvider;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::CanonicalResult;
use crate::config::LookupConfig;
use crate::error::{LookupError, ProviderError};
use crate::http::{BackoffExecutor, ExecutorError};
use crate::model::{CanonicalRequest, SearchType};

/// Identifies which provider served a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderSource {
    Gateway,
    Direct,
    Demo,
}

impl ProviderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Direct => "direct",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderSource {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "direct" => Ok(Self::Direct),
            "demo" => Ok(Self::Demo),
            other => Err(LookupError::invalid_input(format!(
                "Unknown provider '{other}'"
            ))),
        }
    }
}

/// How a provider answered a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Queued remotely; poll with `protocol`.
    Accepted { protocol: String },
    /// Answered in the same call.
    Completed { raw: Value },
}

/// Remote job state as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteJobState {
    Processing,
    Ready,
    Failed(ProviderError),
}

/// A lookup provider adapter.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    fn source_id(&self) -> ProviderSource;

    fn supports(&self, search_type: SearchType) -> bool;

    /// Issue the lookup. Exactly one outbound call through the executor.
    async fn lookup(&self, request: &CanonicalRequest) -> Result<Submission, ProviderError>;

    async fn job_status(&self, protocol: &str) -> Result<RemoteJobState, ProviderError> {
        Err(unsupported_jobs(self.source_id(), protocol))
    }

    /// Final payload for a queued job, `None` while it is still processing.
    async fn fetch_result(&self, protocol: &str) -> Result<Option<Value>, ProviderError> {
        Err(unsupported_jobs(self.source_id(), protocol))
    }

    /// Map a raw payload to the canonical shape. Total: never fails.
    fn normalize(&self, search_type: SearchType, raw: &Value) -> CanonicalResult;
}

fn unsupported_jobs(source: ProviderSource, protocol: &str) -> ProviderError {
    ProviderError::terminal(
        "unsupported",
        format!("Provider {source} has no job API (protocol {protocol})"),
    )
}

impl From<ExecutorError> for ProviderError {
    fn from(err: ExecutorError) -> Self {
        let transient = err.is_transient();
        let code = match &err {
            ExecutorError::Timeout(_) => "timeout",
            ExecutorError::Network { .. } => "network_error",
            ExecutorError::Status { status: 429, .. } => "rate_limited",
            ExecutorError::Status { status: 401 | 403, .. } => "invalid_credentials",
            ExecutorError::Status { status: 404, .. } => "not_found",
            ExecutorError::Status { status, .. } if *status >= 500 => "provider_unavailable",
            ExecutorError::Status { .. } => "provider_rejected",
            ExecutorError::InvalidRequest(_) => "invalid_request",
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
            transient,
        }
    }
}

/// Registered providers in priority order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn LookupProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.source_id()))
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Registering the same source twice replaces it in place.
    pub fn register(mut self, provider: Arc<dyn LookupProvider>) -> Self {
        let source = provider.source_id();
        match self.providers.iter().position(|p| p.source_id() == source) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
        self
    }

    /// Providers that serve `search_type`, in fallback order.
    pub fn candidates(&self, search_type: SearchType) -> Vec<Arc<dyn LookupProvider>> {
        self.providers
            .iter()
            .filter(|p| p.supports(search_type))
            .cloned()
            .collect()
    }

    pub fn get(&self, source: ProviderSource) -> Option<Arc<dyn LookupProvider>> {
        self.providers
            .iter()
            .find(|p| p.source_id() == source)
            .cloned()
    }

    pub fn sources(&self) -> Vec<ProviderSource> {
        self.providers.iter().map(|p| p.source_id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Build the registry described by `config`.
    ///
    /// Real providers follow `provider_order`; the demo provider is appended
    /// last when demo mode is on.
    pub fn from_config(config: &LookupConfig) -> Result<Self, ExecutorError> {
        let executor = BackoffExecutor::new(config.executor.clone())?;
        let mut registry = Self::new();

        for source in &config.provider_order {
            match source {
                ProviderSource::Gateway => {
                    if let Some(gateway) = &config.gateway {
                        tracing::info!(base_url = %gateway.base_url, "Registered gateway provider");
                        registry = registry.register(Arc::new(GatewayProvider::new(
                            gateway.clone(),
                            executor.clone(),
                            config.max_retries,
                            config.request_timeout,
                        )));
                    }
                }
                ProviderSource::Direct => {
                    if let Some(direct) = &config.direct {
                        tracing::info!(base_url = %direct.base_url, "Registered direct provider");
                        registry = registry.register(Arc::new(DirectProvider::new(
                            direct.clone(),
                            executor.clone(),
                            config.max_retries,
                            config.request_timeout,
                        )));
                    }
                }
                ProviderSource::Demo => {}
            }
        }

        if config.demo_mode {
            tracing::warn!("Demo mode enabled: synthetic results may be returned");
            registry = registry.register(Arc::new(DemoProvider::new(config.demo_latency_polls)));
        }

        if registry.is_empty() {
            tracing::warn!("No lookup provider configured");
        }

        Ok(registry)
    }
}
