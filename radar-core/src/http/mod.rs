//! Backoff Executor: the retrying HTTP caller shared by provider lookups and
//! webhook delivery.
//!
//! Each attempt runs under its own deadline. Transient failures (429, 5xx,
//! network errors, timeouts) are retried up to `max_retries` times with capped
//! exponential backoff, honouring `Retry-After` on 429. Anything else is
//! returned immediately.

pub mod policy;

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use backoff::future::retry_notify;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use policy::{is_transient_error, is_transient_status, CappedExponential};

/// Recommended retry budget for provider lookups.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {message}")]
    Network { message: String, transient: bool },

    #[error("HTTP {status}: {body}")]
    Status {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ExecutorError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Network { transient, .. } => *transient,
            Self::Status { status, .. } => StatusCode::from_u16(*status)
                .map(is_transient_status)
                .unwrap_or(false),
            Self::InvalidRequest(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Configuration for a [`BackoffExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// First retry delay.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including `Retry-After` hints.
    pub max_delay: Duration,
    /// Reject plain-http URLs.
    pub https_only: bool,
    pub user_agent: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            https_only: true,
            user_agent: format!("radar/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// One outbound HTTP call, replayable across retries.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, url).json(body)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A successful (2xx) response with its body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Body as JSON, `null` when empty.
    pub fn json_value(&self) -> serde_json::Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Retrying HTTP caller. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackoffExecutor {
    client: Client,
    config: ExecutorConfig,
}

impl BackoffExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .https_only(config.https_only)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ExecutorError::InvalidRequest(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Perform `request`, retrying transient failures up to `max_retries` times.
    ///
    /// `timeout` bounds each attempt, body included. After the budget is spent
    /// the last error is returned.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn execute(
        &self,
        request: &OutboundRequest,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<HttpResponse, ExecutorError> {
        self.validate(request)?;

        let attempts = AtomicU32::new(0);
        let backoff = CappedExponential::new(self.config.base_delay, self.config.max_delay);

        retry_notify(
            backoff,
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    self.attempt_once(request, timeout, attempt)
                        .await
                        .map_err(|err| classify(err, attempt >= max_retries))
                }
            },
            |err: ExecutorError, delay: Duration| {
                warn!(
                    error = %err,
                    attempt = attempts.load(Ordering::SeqCst),
                    retry_after_ms = delay.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    fn validate(&self, request: &OutboundRequest) -> Result<(), ExecutorError> {
        let url = url::Url::parse(&request.url)
            .map_err(|e| ExecutorError::InvalidRequest(format!("Invalid URL '{}': {e}", request.url)))?;
        match url.scheme() {
            "https" => Ok(()),
            "http" if !self.config.https_only => Ok(()),
            scheme => Err(ExecutorError::InvalidRequest(format!(
                "URL scheme '{scheme}' not allowed"
            ))),
        }
    }

    async fn attempt_once(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
        attempt: u32,
    ) -> Result<HttpResponse, ExecutorError> {
        let start = Instant::now();

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let exchange = async {
            let response = builder.send().await.map_err(network_error)?;
            let status = response.status();
            let retry_after = policy::retry_after(response.headers(), self.config.max_delay);
            let body = response.bytes().await.map_err(network_error)?;
            Ok::<_, ExecutorError>((status, retry_after, body))
        };

        let (status, retry_after, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ExecutorError::Timeout(timeout))??;

        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(status = %status, attempt, latency_ms, "Received HTTP response");

        if status.is_success() {
            return Ok(HttpResponse {
                status: status.as_u16(),
                body: body.to_vec(),
            });
        }

        Err(ExecutorError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).chars().take(512).collect(),
            retry_after: (status == StatusCode::TOO_MANY_REQUESTS)
                .then_some(retry_after)
                .flatten(),
        })
    }
}

fn network_error(err: reqwest::Error) -> ExecutorError {
    ExecutorError::Network {
        transient: is_transient_error(&err),
        message: err.to_string(),
    }
}

fn classify(err: ExecutorError, budget_spent: bool) -> backoff::Error<ExecutorError> {
    if !err.is_transient() {
        warn!(error = %err, "Permanent error, aborting");
        return backoff::Error::permanent(err);
    }
    if budget_spent {
        warn!(error = %err, "Retry budget exhausted");
        return backoff::Error::permanent(err);
    }
    match &err {
        ExecutorError::Status {
            retry_after: Some(delay),
            ..
        } => {
            let delay = *delay;
            backoff::Error::retry_after(err, delay)
        }
        _ => backoff::Error::transient(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_classification() {
        let rate_limited = ExecutorError::Status {
            status: 429,
            body: String::new(),
            retry_after: None,
        };
        let not_found = ExecutorError::Status {
            status: 404,
            body: String::new(),
            retry_after: None,
        };
        assert!(rate_limited.is_transient());
        assert!(!not_found.is_transient());
        assert!(ExecutorError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!ExecutorError::InvalidRequest("bad".into()).is_transient());
    }

    #[test]
    fn test_rejects_plain_http_when_https_only() {
        let executor = BackoffExecutor::new(ExecutorConfig::default()).unwrap();
        let err = executor
            .validate(&OutboundRequest::get("http://provider.example/x"))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidRequest(_)));
        assert!(executor
            .validate(&OutboundRequest::get("https://provider.example/x"))
            .is_ok());
        assert!(executor.validate(&OutboundRequest::get("not a url")).is_err());
    }

    #[test]
    fn test_budget_spent_makes_transient_permanent() {
        let err = ExecutorError::Timeout(Duration::from_secs(1));
        assert!(matches!(
            classify(err.clone(), false),
            backoff::Error::Transient { .. }
        ));
        assert!(matches!(classify(err, true), backoff::Error::Permanent(_)));
    }

    #[test]
    fn test_empty_body_is_null_json() {
        let response = HttpResponse {
            status: 204,
            body: Vec::new(),
        };
        assert_eq!(response.json_value().unwrap(), Value::Null);
    }
}
