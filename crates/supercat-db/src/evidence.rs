//! Database operations for the append-only `evidence_records` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use supercat_core::{EvidenceRecord, EvidenceSink, StoreError};

use crate::{enum_to_text, text_to_enum, DbError};

/// A row from the `evidence_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EvidenceRow {
    pub id: i64,
    pub module: String,
    pub store: String,
    pub event_type: String,
    pub level: String,
    pub message: String,
    pub details: serde_json::Value,
    pub screenshot_path: Option<String>,
    pub html_snapshot_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EvidenceRow> for EvidenceRecord {
    type Error = DbError;

    fn try_from(row: EvidenceRow) -> Result<Self, Self::Error> {
        Ok(EvidenceRecord {
            level: text_to_enum("level", &row.level)?,
            module: row.module,
            store: row.store,
            event_type: row.event_type,
            message: row.message,
            details: row.details,
            screenshot_path: row.screenshot_path,
            html_snapshot_path: row.html_snapshot_path,
            created_at: row.created_at,
        })
    }
}

/// Appends one record. Returns the new row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_evidence(pool: &PgPool, record: &EvidenceRecord) -> Result<i64, DbError> {
    let level = enum_to_text("level", &record.level)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO evidence_records \
             (module, store, event_type, level, message, details, screenshot_path, \
              html_snapshot_path, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING id",
    )
    .bind(&record.module)
    .bind(&record.store)
    .bind(&record.event_type)
    .bind(level)
    .bind(&record.message)
    .bind(&record.details)
    .bind(&record.screenshot_path)
    .bind(&record.html_snapshot_path)
    .bind(record.created_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Newest records first, optionally for one store.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_evidence(
    pool: &PgPool,
    store: Option<&str>,
    limit: i64,
) -> Result<Vec<EvidenceRow>, DbError> {
    let rows = sqlx::query_as::<_, EvidenceRow>(
        "SELECT id, module, store, event_type, level, message, details, screenshot_path, \
                html_snapshot_path, created_at \
         FROM evidence_records \
         WHERE ($1::text IS NULL OR store = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(store)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// [`EvidenceSink`] writing to Postgres.
#[derive(Debug, Clone)]
pub struct PgEvidenceSink {
    pool: PgPool,
}

impl PgEvidenceSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceSink for PgEvidenceSink {
    async fn record(&self, record: &EvidenceRecord) -> Result<(), StoreError> {
        insert_evidence(&self.pool, record).await?;
        Ok(())
    }
}
