//! Search history ledger rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use radar_core::store::{HistoryFilter, HistoryPage, HistoryStore, Page, StoreError, StoreResult};
use radar_core::{HistoryLinks, ResultSnapshot, SearchHistoryEntry};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{map_sqlx, parse_column, PgStore};

const HISTORY_COLUMNS: &str = "id, user_id, consultation_id, search_type, search_query, \
     provider_source, result_snapshot, related_client_id, related_vehicle_id, created_at";

#[derive(FromRow)]
struct HistoryRow {
    id: Uuid,
    user_id: Uuid,
    consultation_id: Option<Uuid>,
    search_type: String,
    search_query: String,
    provider_source: String,
    result_snapshot: Json<ResultSnapshot>,
    related_client_id: Option<Uuid>,
    related_vehicle_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for SearchHistoryEntry {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            consultation_id: row.consultation_id,
            search_type: parse_column("search_type", &row.search_type)?,
            search_query: row.search_query,
            provider_source: row.provider_source,
            result_snapshot: row.result_snapshot.0,
            related_client_id: row.related_client_id,
            related_vehicle_id: row.related_vehicle_id,
            created_at: row.created_at,
        })
    }
}

/// Append ` WHERE ...` for every set field of `filter`.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &HistoryFilter) {
    builder.push(" WHERE TRUE");
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(search_type) = filter.search_type {
        builder.push(" AND search_type = ").push_bind(search_type.as_str());
    }
    if let Some(query) = &filter.search_query {
        builder.push(" AND search_query = ").push_bind(query.clone());
    }
    if let Some(success) = filter.success {
        builder.push(" AND success = ").push_bind(success);
    }
    if let Some(client_id) = filter.related_client_id {
        builder.push(" AND related_client_id = ").push_bind(client_id);
    }
    if let Some(vehicle_id) = filter.related_vehicle_id {
        builder.push(" AND related_vehicle_id = ").push_bind(vehicle_id);
    }
    if let Some(consultation_id) = filter.consultation_id {
        builder.push(" AND consultation_id = ").push_bind(consultation_id);
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn append(&self, entry: &SearchHistoryEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO search_history
                (id, user_id, consultation_id, search_type, search_query, provider_source,
                 result_snapshot, success, related_client_id, related_vehicle_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.consultation_id)
        .bind(entry.search_type.as_str())
        .bind(&entry.search_query)
        .bind(&entry.provider_source)
        .bind(Json(&entry.result_snapshot))
        .bind(entry.result_snapshot.success)
        .bind(entry.related_client_id)
        .bind(entry.related_vehicle_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn get_entry(&self, id: Uuid) -> StoreResult<Option<SearchHistoryEntry>> {
        let row: Option<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {HISTORY_COLUMNS} FROM search_history WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(SearchHistoryEntry::try_from).transpose()
    }

    async fn query(&self, filter: &HistoryFilter, page: Page) -> StoreResult<HistoryPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM search_history");
        push_filters(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {HISTORY_COLUMNS} FROM search_history"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.limit()))
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows: Vec<HistoryRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let entries = rows
            .into_iter()
            .map(SearchHistoryEntry::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(HistoryPage::new(entries, page, total.max(0) as u64))
    }

    async fn attach(&self, entry_id: Uuid, links: HistoryLinks) -> StoreResult<SearchHistoryEntry> {
        let row: Option<HistoryRow> = sqlx::query_as(&format!(
            "UPDATE search_history \
             SET related_client_id = COALESCE($2, related_client_id), \
                 related_vehicle_id = COALESCE($3, related_vehicle_id) \
             WHERE id = $1 \
             RETURNING {HISTORY_COLUMNS}"
        ))
        .bind(entry_id)
        .bind(links.client_id)
        .bind(links.vehicle_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(SearchHistoryEntry::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("History entry {entry_id}")))
    }
}
