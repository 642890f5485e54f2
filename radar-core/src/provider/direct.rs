//! Direct provider: synchronous API that answers every lookup in the same call.
//!
//! Responses use an envelope `{success, result}` or `{success: false, error:
//! {code, message}}`. Driver lookups by CPF are not offered by this vendor.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use super::{LookupProvider, ProviderSource, Submission};
use crate::canonical::CanonicalResult;
use crate::config::DirectConfig;
use crate::error::ProviderError;
use crate::http::{BackoffExecutor, OutboundRequest};
use crate::model::{CanonicalRequest, SearchType};
use crate::normalize;

pub struct DirectProvider {
    config: DirectConfig,
    executor: BackoffExecutor,
    max_retries: u32,
    timeout: Duration,
}

impl DirectProvider {
    pub fn new(
        config: DirectConfig,
        executor: BackoffExecutor,
        max_retries: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            config,
            executor,
            max_retries,
            timeout,
        }
    }

    fn endpoint(&self, search_type: SearchType) -> String {
        let path = match search_type {
            SearchType::Plate => "vehicles/by-plate",
            SearchType::Renavam => "vehicles/by-renavam",
            SearchType::Cnh => "licenses",
            SearchType::DriverCpf => "drivers",
            SearchType::VehicleFines => "fines",
        };
        format!("{}/v1/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(request: &CanonicalRequest) -> Value {
        match request {
            CanonicalRequest::Plate { plate } => json!({"licensePlate": plate}),
            CanonicalRequest::Renavam { renavam } => json!({"renavam": renavam}),
            CanonicalRequest::Cnh {
                cnh_number,
                birth_date,
            } => json!({"registration": cnh_number, "birthDate": birth_date}),
            CanonicalRequest::DriverCpf { cpf } => json!({"cpf": cpf}),
            CanonicalRequest::VehicleFines { plate, renavam } => {
                json!({"licensePlate": plate, "renavam": renavam})
            }
        }
    }
}

/// Typed error from a `{success: false}` envelope.
fn envelope_error(body: &Value) -> ProviderError {
    let code = normalize::text(body, &["error.code", "code"]).to_lowercase();
    let message = normalize::text(body, &["error.message", "message"]);
    match code.as_str() {
        "not_found" | "record_not_found" => ProviderError::terminal("not_found", message),
        "unauthorized" | "forbidden" | "invalid_api_key" => {
            ProviderError::terminal("invalid_credentials", message)
        }
        "upstream_unavailable" | "rate_limited" | "timeout" => {
            ProviderError::transient(code, message)
        }
        _ => ProviderError::terminal(code, message),
    }
}

#[async_trait]
impl LookupProvider for DirectProvider {
    fn source_id(&self) -> ProviderSource {
        ProviderSource::Direct
    }

    fn supports(&self, search_type: SearchType) -> bool {
        search_type != SearchType::DriverCpf
    }

    #[instrument(
        level = "info",
        skip(self, request),
        fields(provider = "direct", search_type = %request.search_type())
    )]
    async fn lookup(&self, request: &CanonicalRequest) -> Result<Submission, ProviderError> {
        let start = Instant::now();
        let outbound = OutboundRequest::post_json(
            self.endpoint(request.search_type()),
            Self::request_body(request),
        )
        .header("x-api-key", self.config.api_key.as_str());

        let response = self
            .executor
            .execute(&outbound, self.max_retries, self.timeout)
            .await?;
        let body = response.json_value().map_err(|e| {
            ProviderError::terminal("invalid_response", format!("Direct provider returned invalid JSON: {e}"))
        })?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let err = envelope_error(&body);
            warn!(error = %err, latency_ms, "Direct provider rejected lookup");
            return Err(err);
        }

        info!(latency_ms, "Direct provider answered");
        let raw = match body {
            Value::Object(mut obj) if obj.contains_key("result") => {
                obj.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(Submission::Completed { raw })
    }

    fn normalize(&self, search_type: SearchType, raw: &Value) -> CanonicalResult {
        normalize::direct::normalize(search_type, raw)
    }
}
