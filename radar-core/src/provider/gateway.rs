//! Gateway provider: asynchronous job API in front of the state traffic agencies.
//!
//! `POST /consultas` either answers with data (`status: "concluido"`) or queues
//! the lookup and returns a `protocolo`. Queued jobs are polled with
//! `GET /consultas/{protocolo}` and collected with
//! `GET /consultas/{protocolo}/resultado`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::{LookupProvider, ProviderSource, RemoteJobState, Submission};
use crate::canonical::CanonicalResult;
use crate::config::GatewayConfig;
use crate::error::ProviderError;
use crate::http::{BackoffExecutor, HttpResponse, OutboundRequest};
use crate::model::{CanonicalRequest, SearchType};
use crate::normalize;

pub struct GatewayProvider {
    config: GatewayConfig,
    executor: BackoffExecutor,
    max_retries: u32,
    timeout: Duration,
}

/// Job state words used by the gateway.
#[derive(Debug, PartialEq, Eq)]
enum GatewayStatus {
    Processing,
    Done,
    Error,
}

impl GatewayStatus {
    fn parse(body: &Value) -> Option<Self> {
        let status = body.get("status")?.as_str()?.to_lowercase();
        match status.as_str() {
            "processando" | "pendente" | "em_andamento" | "processing" | "queued" => {
                Some(Self::Processing)
            }
            "concluido" | "concluida" | "finalizado" | "completed" | "done" => Some(Self::Done),
            "erro" | "falha" | "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }
}

impl GatewayProvider {
    pub fn new(
        config: GatewayConfig,
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

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn call(&self, request: OutboundRequest) -> Result<Value, ProviderError> {
        let response: HttpResponse = self
            .executor
            .execute(&request.bearer(&self.config.token), self.max_retries, self.timeout)
            .await?;
        response.json_value().map_err(|e| {
            ProviderError::terminal("invalid_response", format!("Gateway returned invalid JSON: {e}"))
        })
    }

    fn request_body(request: &CanonicalRequest) -> Value {
        match request {
            CanonicalRequest::Plate { plate } => json!({"tipo": "placa", "placa": plate}),
            CanonicalRequest::Renavam { renavam } => json!({"tipo": "renavam", "renavam": renavam}),
            CanonicalRequest::Cnh {
                cnh_number,
                birth_date,
            } => json!({"tipo": "cnh", "cnh": cnh_number, "data_nascimento": birth_date}),
            CanonicalRequest::DriverCpf { cpf } => json!({"tipo": "cpf", "cpf": cpf}),
            CanonicalRequest::VehicleFines { plate, renavam } => {
                json!({"tipo": "multas", "placa": plate, "renavam": renavam})
            }
        }
    }
}

/// Data block of a finished job. Some gateway deployments return it bare.
fn payload_of(body: Value) -> Value {
    match body {
        Value::Object(mut obj) => match obj.remove("dados").or_else(|| obj.remove("data")) {
            Some(data) => data,
            None => Value::Object(obj),
        },
        other => other,
    }
}

/// Typed error from a gateway `status: "erro"` body.
fn error_of(body: &Value) -> ProviderError {
    let error = body.get("erro").or_else(|| body.get("error")).unwrap_or(body);
    let code = normalize::text(error, &["codigo", "code"]);
    let message = normalize::text(error, &["mensagem", "message", "descricao"]);

    match code.as_str() {
        "nao_encontrado" | "not_found" | "404" => ProviderError::terminal("not_found", message),
        "credenciais_invalidas" | "nao_autorizado" | "unauthorized" => {
            ProviderError::terminal("invalid_credentials", message)
        }
        "indisponivel" | "sobrecarga" | "timeout" => {
            ProviderError::transient("provider_unavailable", message)
        }
        _ => ProviderError::terminal(code, message),
    }
}

#[async_trait]
impl LookupProvider for GatewayProvider {
    fn source_id(&self) -> ProviderSource {
        ProviderSource::Gateway
    }

    fn supports(&self, _search_type: SearchType) -> bool {
        true
    }

    #[instrument(
        level = "info",
        skip(self, request),
        fields(provider = "gateway", search_type = %request.search_type())
    )]
    async fn lookup(&self, request: &CanonicalRequest) -> Result<Submission, ProviderError> {
        let start = Instant::now();
        let body = self
            .call(OutboundRequest::post_json(
                self.url("/consultas"),
                Self::request_body(request),
            ))
            .await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        match GatewayStatus::parse(&body) {
            Some(GatewayStatus::Done) => {
                info!(latency_ms, "Gateway answered synchronously");
                Ok(Submission::Completed {
                    raw: payload_of(body),
                })
            }
            Some(GatewayStatus::Error) => {
                let err = error_of(&body);
                warn!(error = %err, latency_ms, "Gateway rejected lookup");
                Err(err)
            }
            Some(GatewayStatus::Processing) | None => {
                let protocol = normalize::pick(&body, &["protocolo", "protocol", "id"])
                    .and_then(|v| match v {
                        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        ProviderError::terminal(
                            "invalid_response",
                            "Gateway accepted the lookup without a protocol",
                        )
                    })?;
                info!(protocol = %protocol, latency_ms, "Gateway queued lookup");
                Ok(Submission::Accepted { protocol })
            }
        }
    }

    #[instrument(level = "debug", skip(self), fields(provider = "gateway"))]
    async fn job_status(&self, protocol: &str) -> Result<RemoteJobState, ProviderError> {
        let body = self
            .call(OutboundRequest::get(self.url(&format!("/consultas/{protocol}"))))
            .await?;

        let state = match GatewayStatus::parse(&body) {
            Some(GatewayStatus::Done) => RemoteJobState::Ready,
            Some(GatewayStatus::Error) => RemoteJobState::Failed(error_of(&body)),
            Some(GatewayStatus::Processing) | None => RemoteJobState::Processing,
        };
        debug!(state = ?state, "Gateway job status");
        Ok(state)
    }

    #[instrument(level = "info", skip(self), fields(provider = "gateway"))]
    async fn fetch_result(&self, protocol: &str) -> Result<Option<Value>, ProviderError> {
        let body = self
            .call(OutboundRequest::get(
                self.url(&format!("/consultas/{protocol}/resultado")),
            ))
            .await?;

        match GatewayStatus::parse(&body) {
            Some(GatewayStatus::Processing) => Ok(None),
            Some(GatewayStatus::Error) => Err(error_of(&body)),
            Some(GatewayStatus::Done) | None => Ok(Some(payload_of(body))),
        }
    }

    fn normalize(&self, search_type: SearchType, raw: &Value) -> CanonicalResult {
        normalize::gateway::normalize(search_type, raw)
    }
}
