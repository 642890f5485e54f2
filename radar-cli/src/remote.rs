//! HTTP client for a running radar-server.
//!
//! [`RemoteApi`] implements [`ConsultationApi`] so the same
//! [`radar_core::PollingCoordinator`] drives local and remote lookups. Server
//! error bodies (`{error, code}`) are mapped back onto [`LookupError`].

use std::time::Duration;

use async_trait::async_trait;
use radar_core::{
    CanonicalRequest, ConsultationApi, ConsultationResult, HistoryPage, LookupError,
    ProviderError, Result, StatusReport, SubmitReceipt,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

/// History listing parameters forwarded as query string.
#[derive(Debug, Default)]
pub struct HistoryParams {
    pub search_type: Option<String>,
    pub query: Option<String>,
    pub success: Option<bool>,
    pub page: u32,
    pub limit: u32,
}

pub struct RemoteApi {
    client: Client,
    base_url: String,
    user_id: Uuid,
}

impl RemoteApi {
    pub fn new(base_url: &str, user_id: Uuid, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("radar-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(USER_HEADER, self.user_id.to_string())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        request_id: Option<Uuid>,
    ) -> Result<T> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| ProviderError::transient("network", format!("Server unreachable: {e}")))?;
        decode(response, request_id).await
    }

    pub async fn history(&self, params: &HistoryParams) -> Result<HistoryPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", params.page.to_string()),
            ("limit", params.limit.to_string()),
        ];
        if let Some(search_type) = &params.search_type {
            query.push(("search_type", search_type.clone()));
        }
        if let Some(q) = &params.query {
            query.push(("query", q.clone()));
        }
        if let Some(success) = params.success {
            query.push(("success", success.to_string()));
        }

        self.send(self.client.get(self.url("/history")).query(&query), None)
            .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, request_id: Option<Uuid>) -> Result<T> {
    let status = response.status();
    debug!(%status, "Server answered");

    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            LookupError::Provider(ProviderError::terminal(
                "invalid_response",
                format!("Unexpected server response: {e}"),
            ))
        });
    }

    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or(ErrorBody {
        error: body,
        code: String::new(),
    });
    Err(error_from_server(status, parsed, request_id))
}

fn error_from_server(status: StatusCode, body: ErrorBody, request_id: Option<Uuid>) -> LookupError {
    let id = request_id.unwrap_or_default();
    match body.code.as_str() {
        "INVALID_INPUT" => LookupError::InvalidInput(body.error),
        "UNAUTHORIZED" => LookupError::Unauthorized(body.error),
        "NOT_FOUND" => LookupError::NotFound(id),
        "NOT_READY" => LookupError::NotReady(id),
        "LOOKUP_TIMEOUT" => LookupError::Timeout {
            request_id: id,
            elapsed: Duration::ZERO,
        },
        "PROVIDER_ERROR" => LookupError::Provider(ProviderError::terminal("provider_error", body.error)),
        "PROVIDER_UNAVAILABLE" | "NO_PROVIDER" => LookupError::Provider(ProviderError::transient(
            body.code.to_lowercase(),
            body.error,
        )),
        _ => {
            let code = format!("http_{}", status.as_u16());
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                LookupError::Provider(ProviderError::transient(code, body.error))
            } else {
                LookupError::Provider(ProviderError::terminal(code, body.error))
            }
        }
    }
}

#[async_trait]
impl ConsultationApi for RemoteApi {
    async fn submit(&self, request: CanonicalRequest) -> Result<SubmitReceipt> {
        self.send(self.client.post(self.url("/consultations")).json(&request), None)
            .await
    }

    async fn get_status(&self, request_id: Uuid) -> Result<StatusReport> {
        self.send(
            self.client.get(self.url(&format!("/consultations/{request_id}"))),
            Some(request_id),
        )
        .await
    }

    async fn finalize(&self, request_id: Uuid) -> Result<ConsultationResult> {
        self.send(
            self.client
                .post(self.url(&format!("/consultations/{request_id}/finalize"))),
            Some(request_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str, error: &str) -> ErrorBody {
        ErrorBody {
            error: error.into(),
            code: code.into(),
        }
    }

    #[test]
    fn test_server_codes_map_back_to_lookup_errors() {
        let id = Uuid::new_v4();
        assert!(matches!(
            error_from_server(StatusCode::BAD_REQUEST, body("INVALID_INPUT", "bad plate"), None),
            LookupError::InvalidInput(m) if m == "bad plate"
        ));
        assert!(matches!(
            error_from_server(StatusCode::CONFLICT, body("NOT_READY", ""), Some(id)),
            LookupError::NotReady(got) if got == id
        ));
        assert!(matches!(
            error_from_server(StatusCode::UNPROCESSABLE_ENTITY, body("PROVIDER_ERROR", "no record"), Some(id)),
            LookupError::Provider(ProviderError { transient: false, .. })
        ));
        assert!(error_from_server(
            StatusCode::SERVICE_UNAVAILABLE,
            body("NO_PROVIDER", "none"),
            None
        )
        .is_transient());
    }

    #[test]
    fn test_unknown_bodies_use_http_status() {
        let err = error_from_server(StatusCode::BAD_GATEWAY, body("", "upstream"), None);
        assert!(matches!(err, LookupError::Provider(ProviderError { ref code, transient: true, .. }) if code == "http_502"));

        let err = error_from_server(StatusCode::METHOD_NOT_ALLOWED, body("", ""), None);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let api = RemoteApi::new("http://localhost:3000/", Uuid::new_v4(), Duration::from_secs(5)).unwrap();
        assert_eq!(api.url("/history"), "http://localhost:3000/api/v1/history");
    }
}
