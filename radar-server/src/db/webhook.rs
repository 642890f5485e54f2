//! Webhook configuration and delivery counters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radar_core::store::{StoreError, StoreResult, WebhookStore};
use radar_core::Webhook;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{map_sqlx, PgStore};

const WEBHOOK_COLUMNS: &str =
    "id, name, url, events, headers, enabled, last_triggered_at, fail_count, created_at, updated_at";

#[derive(FromRow)]
struct WebhookRow {
    id: Uuid,
    name: String,
    url: String,
    events: Vec<String>,
    headers: Json<BTreeMap<String, String>>,
    enabled: bool,
    last_triggered_at: Option<DateTime<Utc>>,
    fail_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WebhookRow> for Webhook {
    fn from(row: WebhookRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            events: row.events.into_iter().collect(),
            headers: row.headers.0,
            enabled: row.enabled,
            last_triggered_at: row.last_triggered_at,
            fail_count: u32::try_from(row.fail_count).unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn events_of(webhook: &Webhook) -> Vec<String> {
    webhook.events.iter().cloned().collect()
}

#[async_trait]
impl WebhookStore for PgStore {
    async fn create(&self, webhook: &Webhook) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO webhooks
                (id, name, url, events, headers, enabled, last_triggered_at, fail_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(webhook.id)
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(events_of(webhook))
        .bind(Json(&webhook.headers))
        .bind(webhook.enabled)
        .bind(webhook.last_triggered_at)
        .bind(i32::try_from(webhook.fail_count).unwrap_or(i32::MAX))
        .bind(webhook.created_at)
        .bind(webhook.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Webhook>> {
        let row: Option<WebhookRow> =
            sqlx::query_as(&format!("SELECT {WEBHOOK_COLUMNS} FROM webhooks WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> StoreResult<Vec<Webhook>> {
        let rows: Vec<WebhookRow> = sqlx::query_as(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Configuration columns only; delivery counters belong to `record_delivery`.
    async fn update(&self, webhook: &Webhook) -> StoreResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE webhooks
            SET name = $2, url = $3, events = $4, headers = $5, enabled = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(webhook.id)
        .bind(&webhook.name)
        .bind(&webhook.url)
        .bind(events_of(webhook))
        .bind(Json(&webhook.headers))
        .bind(webhook.enabled)
        .bind(webhook.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Webhook {}", webhook.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn find_subscribers(&self, event_type: &str) -> StoreResult<Vec<Webhook>> {
        let rows: Vec<WebhookRow> = sqlx::query_as(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE enabled AND $1 = ANY(events) ORDER BY created_at ASC"
        ))
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_delivery(&self, id: Uuid, success: bool, at: DateTime<Utc>) -> StoreResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE webhooks
            SET last_triggered_at = $2,
                fail_count = CASE WHEN $3 THEN 0 ELSE fail_count + 1 END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .bind(success)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Webhook {id}")));
        }
        Ok(())
    }
}
