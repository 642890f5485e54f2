//! Webhook Dispatch Engine.
//!
//! Delivers domain events to every enabled subscriber concurrently. Each
//! delivery goes through the [`BackoffExecutor`] with its own small retry
//! budget, and its outcome is reported back explicitly in a [`DispatchReport`].
//! A failed delivery bumps that webhook's `fail_count` and nothing else.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::{DeliveryFailure, LookupError, Result};
use crate::http::{BackoffExecutor, ExecutorError, OutboundRequest};
use crate::model::{NewWebhook, Webhook, WebhookUpdate};
use crate::store::WebhookStore;

/// Event name used by [`WebhookDispatcher::test`].
pub const TEST_EVENT: &str = "webhook.test";

/// Header carrying the event name on every delivery.
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Result of one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub webhook_id: Uuid,
    pub success: bool,
    pub status: Option<u16>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn into_result(self) -> std::result::Result<(), DeliveryFailure> {
        if self.success {
            return Ok(());
        }
        Err(DeliveryFailure {
            webhook_id: self.webhook_id,
            status: self.status,
            message: self.error.unwrap_or_default(),
        })
    }
}

/// Every delivery made for one triggered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub event: String,
    pub deliveries: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.success).count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }

    pub fn failures(&self) -> Vec<DeliveryFailure> {
        self.deliveries
            .iter()
            .cloned()
            .filter_map(|d| d.into_result().err())
            .collect()
    }
}

/// Check the administrator-editable fields of a webhook.
pub fn validate_webhook(webhook: &Webhook) -> Result<()> {
    if webhook.name.trim().is_empty() {
        return Err(LookupError::invalid_input("Webhook name is required"));
    }

    let url = url::Url::parse(&webhook.url)
        .map_err(|e| LookupError::invalid_input(format!("Invalid webhook URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LookupError::invalid_input(
            "Webhook URL must be an absolute http(s) URL",
        ));
    }

    if webhook.events.is_empty() || webhook.events.iter().any(|e| e.trim().is_empty()) {
        return Err(LookupError::invalid_input(
            "Webhook must subscribe to at least one non-empty event",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    store: Arc<dyn WebhookStore>,
    executor: BackoffExecutor,
    config: DispatchConfig,
}

impl WebhookDispatcher {
    pub fn new(store: Arc<dyn WebhookStore>, config: DispatchConfig) -> std::result::Result<Self, ExecutorError> {
        let executor = BackoffExecutor::new(config.executor.clone())?;
        Ok(Self {
            store,
            executor,
            config,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub async fn create(&self, new: NewWebhook) -> Result<Webhook> {
        let webhook = new.into_webhook();
        self.validate(&webhook)?;
        self.store.create(&webhook).await?;
        info!(webhook_id = %webhook.id, name = %webhook.name, "Webhook created");
        Ok(webhook)
    }

    pub async fn get(&self, id: Uuid) -> Result<Webhook> {
        self.store.get(id).await?.ok_or(LookupError::NotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<Webhook>> {
        Ok(self.store.list().await?)
    }

    pub async fn update(&self, id: Uuid, update: WebhookUpdate) -> Result<Webhook> {
        let mut webhook = self.get(id).await?;
        update.apply(&mut webhook);
        self.validate(&webhook)?;
        self.store.update(&webhook).await?;
        Ok(webhook)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(LookupError::NotFound(id));
        }
        info!(webhook_id = %id, "Webhook deleted");
        Ok(())
    }

    /// [`validate_webhook`], plus the executor's https requirement.
    fn validate(&self, webhook: &Webhook) -> Result<()> {
        validate_webhook(webhook)?;
        let secure = url::Url::parse(&webhook.url).is_ok_and(|url| url.scheme() == "https");
        if self.config.executor.https_only && !secure {
            return Err(LookupError::invalid_input("Webhook URL must use https"));
        }
        Ok(())
    }

    /// Deliver `data` to every enabled webhook subscribed to `event_type`.
    ///
    /// Only a failure to list subscribers is an error; delivery failures are
    /// reported per webhook in the returned report.
    #[instrument(skip(self, data))]
    pub async fn trigger(&self, event_type: &str, data: Value) -> Result<DispatchReport> {
        if event_type.trim().is_empty() {
            return Err(LookupError::invalid_input("Event type is required"));
        }

        let subscribers = self.store.find_subscribers(event_type).await?;
        let envelope = envelope(event_type, data);

        let deliveries = join_all(subscribers.iter().map(|webhook| async {
            let outcome = self
                .deliver(webhook, event_type, &envelope, self.config.max_retries)
                .await;
            if let Err(e) = self
                .store
                .record_delivery(webhook.id, outcome.success, Utc::now())
                .await
            {
                error!(webhook_id = %webhook.id, error = %e, "Failed to record delivery");
            }
            outcome
        }))
        .await;

        let report = DispatchReport {
            event: event_type.to_string(),
            deliveries,
        };
        info!(
            subscribers = report.deliveries.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Event dispatched"
        );
        Ok(report)
    }

    /// Single delivery of a synthetic payload. Counters are left untouched.
    #[instrument(skip(self, webhook), fields(webhook_id = %webhook.id))]
    pub async fn test(&self, webhook: &Webhook) -> DeliveryOutcome {
        let envelope = envelope(
            TEST_EVENT,
            json!({
                "message": "Test delivery",
                "webhook_id": webhook.id,
                "webhook_name": webhook.name,
            }),
        );
        self.deliver(webhook, TEST_EVENT, &envelope, 0).await
    }

    async fn deliver(
        &self,
        webhook: &Webhook,
        event_type: &str,
        envelope: &Value,
        max_retries: u32,
    ) -> DeliveryOutcome {
        let mut request =
            OutboundRequest::post_json(&webhook.url, envelope.clone()).header(EVENT_HEADER, event_type);
        for (name, value) in &webhook.headers {
            request = request.header(name, value);
        }

        let start = Instant::now();
        let result = self
            .executor
            .execute(&request, max_retries, self.config.timeout)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) => DeliveryOutcome {
                webhook_id: webhook.id,
                success: true,
                status: Some(response.status),
                latency_ms,
                error: None,
            },
            Err(e) => {
                warn!(webhook_id = %webhook.id, error = %e, latency_ms, "Webhook delivery failed");
                DeliveryOutcome {
                    webhook_id: webhook.id,
                    success: false,
                    status: e.status(),
                    latency_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn envelope(event_type: &str, data: Value) -> Value {
    json!({
        "event": event_type,
        "timestamp": Utc::now().to_rfc3339(),
        "data": data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::BTreeSet;

    fn new_webhook(url: &str, events: &[&str]) -> NewWebhook {
        NewWebhook {
            name: "Billing".into(),
            url: url.into(),
            events: events.iter().map(|e| e.to_string()).collect::<BTreeSet<_>>(),
            headers: Default::default(),
            enabled: true,
        }
    }

    fn dispatcher() -> WebhookDispatcher {
        WebhookDispatcher::new(Arc::new(MemoryStore::new()), DispatchConfig::default()).unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(validate_webhook(&new_webhook("https://hooks.example/a", &["fine.created"]).into_webhook()).is_ok());
        assert!(validate_webhook(&new_webhook("http://10.0.0.5:8080/hook", &["fine.created"]).into_webhook()).is_ok());

        let mut unnamed = new_webhook("https://hooks.example/a", &["fine.created"]);
        unnamed.name = "  ".into();
        assert!(validate_webhook(&unnamed.into_webhook()).is_err());

        assert!(validate_webhook(&new_webhook("ftp://hooks.example/a", &["fine.created"]).into_webhook()).is_err());
        assert!(validate_webhook(&new_webhook("/relative/path", &["fine.created"]).into_webhook()).is_err());
        assert!(validate_webhook(&new_webhook("https://hooks.example/a", &[]).into_webhook()).is_err());
    }

    #[tokio::test]
    async fn test_crud() {
        let dispatcher = dispatcher();
        let created = dispatcher
            .create(new_webhook("https://hooks.example/a", &["fine.created"]))
            .await
            .unwrap();

        let updated = dispatcher
            .update(
                created.id,
                WebhookUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.enabled);

        let invalid = dispatcher
            .update(
                created.id,
                WebhookUpdate {
                    url: Some("not a url".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(invalid, Err(LookupError::InvalidInput(_))));
        assert_eq!(dispatcher.get(created.id).await.unwrap().url, "https://hooks.example/a");

        dispatcher.delete(created.id).await.unwrap();
        assert!(matches!(
            dispatcher.delete(created.id).await,
            Err(LookupError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_plain_http_rejected_when_https_only() {
        let dispatcher = dispatcher();
        let created = dispatcher
            .create(new_webhook("http://10.0.0.5:8080/hook", &["fine.created"]))
            .await;
        assert!(matches!(created, Err(LookupError::InvalidInput(_))));
        assert!(dispatcher.list().await.unwrap().is_empty());

        let secure = dispatcher
            .create(new_webhook("https://hooks.example/a", &["fine.created"]))
            .await
            .unwrap();
        let downgraded = dispatcher
            .update(
                secure.id,
                WebhookUpdate {
                    url: Some("http://hooks.example/a".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(downgraded, Err(LookupError::InvalidInput(_))));

        let mut config = DispatchConfig::default();
        config.executor.https_only = false;
        let permissive = WebhookDispatcher::new(Arc::new(MemoryStore::new()), config).unwrap();
        assert!(permissive
            .create(new_webhook("http://10.0.0.5:8080/hook", &["fine.created"]))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers() {
        let report = dispatcher()
            .trigger("fine.created", json!({"id": 1}))
            .await
            .unwrap();
        assert!(report.deliveries.is_empty());
        assert_eq!(report.delivered(), 0);
    }

    #[tokio::test]
    async fn test_insecure_url_fails_without_touching_network() {
        let dispatcher = dispatcher();
        let webhook = new_webhook("http://127.0.0.1:9/hook", &["fine.created"]).into_webhook();
        let outcome = dispatcher.test(&webhook).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status, None);
        assert!(outcome.clone().into_result().is_err());
    }
}
