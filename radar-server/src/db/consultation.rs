//! Consultation requests and results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radar_core::store::{ConsultationStore, StoreError, StoreResult};
use radar_core::{
    CanonicalRequest, CanonicalResult, ConsultationRequest, ConsultationResult, ProviderError,
};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{map_sqlx, parse_column, PgStore};

const REQUEST_COLUMNS: &str = "id, owner_id, search_type, search_query, params, status, \
     provider_source, provider_protocol, error, created_at, updated_at";

#[derive(FromRow)]
struct RequestRow {
    id: Uuid,
    owner_id: Uuid,
    search_type: String,
    search_query: String,
    params: Json<CanonicalRequest>,
    status: String,
    provider_source: Option<String>,
    provider_protocol: Option<String>,
    error: Option<Json<ProviderError>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for ConsultationRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            search_type: parse_column("search_type", &row.search_type)?,
            search_query: row.search_query,
            params: row.params.0,
            provider_source: row
                .provider_source
                .as_deref()
                .map(|s| parse_column("provider_source", s))
                .transpose()?,
            provider_protocol: row.provider_protocol,
            status: parse_column("status", &row.status)?,
            error: row.error.map(|e| e.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ResultRow {
    request_id: Uuid,
    normalized_payload: Json<CanonicalResult>,
    raw_provider_payload: Json<serde_json::Value>,
    provider_source: String,
    synthetic: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for ConsultationResult {
    type Error = StoreError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(Self {
            request_id: row.request_id,
            normalized_payload: row.normalized_payload.0,
            raw_provider_payload: row.raw_provider_payload.0,
            provider_source: parse_column("provider_source", &row.provider_source)?,
            synthetic: row.synthetic,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl ConsultationStore for PgStore {
    async fn insert_request(&self, request: &ConsultationRequest) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO consultation_requests
                (id, owner_id, search_type, search_query, params, status,
                 provider_source, provider_protocol, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(request.id)
        .bind(request.owner_id)
        .bind(request.search_type.as_str())
        .bind(&request.search_query)
        .bind(Json(&request.params))
        .bind(request.status.as_str())
        .bind(request.provider_source.map(|s| s.as_str()))
        .bind(&request.provider_protocol)
        .bind(request.error.as_ref().map(Json))
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> StoreResult<Option<ConsultationRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM consultation_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(ConsultationRequest::try_from).transpose()
    }

    async fn update_request(&self, request: &ConsultationRequest) -> StoreResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE consultation_requests
            SET status = $2, provider_source = $3, provider_protocol = $4,
                error = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.provider_source.map(|s| s.as_str()))
        .bind(&request.provider_protocol)
        .bind(request.error.as_ref().map(Json))
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Consultation {}", request.id)));
        }
        Ok(())
    }

    async fn insert_result(&self, result: &ConsultationResult) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO consultation_results
                (request_id, normalized_payload, raw_provider_payload, provider_source, synthetic, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(result.request_id)
        .bind(Json(&result.normalized_payload))
        .bind(Json(&result.raw_provider_payload))
        .bind(result.provider_source.as_str())
        .bind(result.synthetic)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_result(&self, request_id: Uuid) -> StoreResult<Option<ConsultationResult>> {
        let row: Option<ResultRow> = sqlx::query_as(
            r#"
            SELECT request_id, normalized_payload, raw_provider_payload, provider_source, synthetic, created_at
            FROM consultation_results
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(ConsultationResult::try_from).transpose()
    }

    async fn list_stale_running(&self, before: DateTime<Utc>) -> StoreResult<Vec<ConsultationRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM consultation_requests \
             WHERE status = 'running' AND created_at < $1 ORDER BY created_at ASC"
        ))
        .bind(before)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(ConsultationRequest::try_from).collect()
    }
}
