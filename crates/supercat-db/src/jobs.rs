//! Database operations for the `scrape_jobs` queue.
//!
//! Delivery is at-least-once: a job is claimed with `FOR UPDATE SKIP LOCKED`,
//! and a worker that dies mid-job leaves it `running` until
//! [`requeue_stale_jobs`] puts it back. Job processing is idempotent, so a
//! replay is harmless.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use supercat_core::{JobResult, ScrapeJob};
use uuid::Uuid;

use crate::{text_to_enum, DbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DbError::InvalidColumn {
                column: "status",
                reason: format!("unknown job status '{other}'"),
            }),
        }
    }
}

/// A row from the `scrape_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScrapeJobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub store: String,
    /// `DISCOVER_CATEGORIES`, `CRAWL_CATEGORY` or `SCRAPE_PRODUCTS`.
    pub action: String,
    pub category_url: Option<String>,
    pub parent_path: Vec<String>,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_error: Option<String>,
    pub result: Option<Json<JobResult>>,
    pub run_after: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScrapeJobRow {
    /// The queue payload this row carries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if `action` is not a known action.
    pub fn to_job(&self) -> Result<ScrapeJob, DbError> {
        Ok(ScrapeJob {
            store: self.store.clone(),
            action: text_to_enum("action", &self.action)?,
            category_url: self.category_url.clone(),
            parent_path: self.parent_path.clone(),
        })
    }

    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if `status` is not a known status.
    pub fn job_status(&self) -> Result<JobStatus, DbError> {
        self.status.parse()
    }
}

const JOB_COLUMNS: &str = "id, public_id, store, action, category_url, parent_path, status, \
                           attempts, max_attempts, last_error, result, run_after, started_at, \
                           completed_at, created_at, updated_at";

/// Adds a job to the queue in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn enqueue_job(
    pool: &PgPool,
    job: &ScrapeJob,
    max_attempts: i32,
) -> Result<ScrapeJobRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeJobRow>(&format!(
        "INSERT INTO scrape_jobs (public_id, store, action, category_url, parent_path, max_attempts) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {JOB_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&job.store)
    .bind(job.action.as_str())
    .bind(&job.category_url)
    .bind(&job.parent_path)
    .bind(max_attempts.max(1))
    .fetch_one(pool)
    .await?;

    tracing::debug!(job_id = row.id, store = %job.store, action = %job.action, "job enqueued");
    Ok(row)
}

/// Claims the oldest runnable job, marking it `running` and counting the attempt.
///
/// Concurrent workers never claim the same row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_next_job(pool: &PgPool) -> Result<Option<ScrapeJobRow>, DbError> {
    let row = sqlx::query_as::<_, ScrapeJobRow>(&format!(
        "UPDATE scrape_jobs \
         SET status = 'running', attempts = attempts + 1, started_at = NOW(), updated_at = NOW() \
         WHERE id = ( \
             SELECT id FROM scrape_jobs \
             WHERE status = 'queued' AND run_after <= NOW() \
             ORDER BY run_after, id \
             FOR UPDATE SKIP LOCKED \
             LIMIT 1) \
         RETURNING {JOB_COLUMNS}"
    ))
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Marks a running job `succeeded` and stores its result.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_job(pool: &PgPool, id: i64, result: &JobResult) -> Result<(), DbError> {
    let outcome = sqlx::query(
        "UPDATE scrape_jobs \
         SET status = 'succeeded', result = $1, last_error = NULL, \
             completed_at = NOW(), updated_at = NOW() \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(Json(result))
    .bind(id)
    .execute(pool)
    .await?;

    if outcome.rows_affected() == 0 {
        return Err(DbError::InvalidJobTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Records a failed attempt. With a retry delay the job is requeued that
/// many seconds from now while attempts remain; without one, or once
/// attempts are exhausted, it is marked `failed`.
///
/// Returns the status the job ended up in.
///
/// # Errors
///
/// Returns [`DbError::InvalidJobTransition`] if the job is not running, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_job(
    pool: &PgPool,
    id: i64,
    error_message: &str,
    retry_delay_secs: Option<u64>,
) -> Result<JobStatus, DbError> {
    let delay = retry_delay_secs.map(|secs| f64::from(i32::try_from(secs).unwrap_or(i32::MAX)));

    let status: Option<String> = sqlx::query_scalar(
        "UPDATE scrape_jobs \
         SET status = CASE WHEN $1::float8 IS NOT NULL AND attempts < max_attempts \
                           THEN 'queued' ELSE 'failed' END, \
             run_after = CASE WHEN $1::float8 IS NOT NULL AND attempts < max_attempts \
                              THEN NOW() + make_interval(secs => $1::float8) ELSE run_after END, \
             completed_at = CASE WHEN $1::float8 IS NOT NULL AND attempts < max_attempts \
                                 THEN NULL ELSE NOW() END, \
             last_error = $2, \
             updated_at = NOW() \
         WHERE id = $3 AND status = 'running' \
         RETURNING status",
    )
    .bind(delay)
    .bind(error_message)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match status {
        Some(status) => status.parse(),
        None => Err(DbError::InvalidJobTransition {
            id,
            expected_status: "running",
        }),
    }
}

/// Puts jobs stuck in `running` for longer than `older_than_secs` back in the
/// queue. Returns how many were requeued.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn requeue_stale_jobs(pool: &PgPool, older_than_secs: u64) -> Result<u64, DbError> {
    let age = i32::try_from(older_than_secs).unwrap_or(i32::MAX);

    let outcome = sqlx::query(
        "UPDATE scrape_jobs \
         SET status = 'queued', run_after = NOW(), updated_at = NOW(), \
             last_error = COALESCE(last_error, 'worker lost') \
         WHERE status = 'running' \
           AND started_at < NOW() - make_interval(secs => $1::float8)",
    )
    .bind(f64::from(age))
    .execute(pool)
    .await?;

    if outcome.rows_affected() > 0 {
        tracing::warn!(requeued = outcome.rows_affected(), "requeued stale scrape jobs");
    }
    Ok(outcome.rows_affected())
}

/// Fetches a single job by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_job(pool: &PgPool, id: i64) -> Result<ScrapeJobRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM scrape_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` jobs, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_jobs(
    pool: &PgPool,
    status: Option<JobStatus>,
    limit: i64,
) -> Result<Vec<ScrapeJobRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeJobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM scrape_jobs \
         WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(status.map(JobStatus::as_str))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use supercat_core::JobAction;

    use super::*;

    fn row(action: &str, status: &str) -> ScrapeJobRow {
        let now = Utc::now();
        ScrapeJobRow {
            id: 7,
            public_id: Uuid::new_v4(),
            store: "coto".to_string(),
            action: action.to_string(),
            category_url: Some("https://www.cotodigital3.com.ar/sitios/cdigi/browse/catalogo-almacen".to_string()),
            parent_path: vec!["Almacén".to_string()],
            status: status.to_string(),
            attempts: 1,
            max_attempts: 3,
            last_error: None,
            result: None,
            run_after: now,
            started_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_back_to_queue_payload() {
        let job = row("SCRAPE_PRODUCTS", "running").to_job().unwrap();
        assert_eq!(job.action, JobAction::ScrapeProducts);
        assert_eq!(job.store, "coto");
        assert_eq!(job.parent_path, ["Almacén"]);
    }

    #[test]
    fn unknown_action_is_a_column_error() {
        let err = row("EXPLODE", "queued").to_job().unwrap_err();
        assert!(matches!(err, DbError::InvalidColumn { column: "action", .. }));
    }

    #[test]
    fn status_parses_and_displays() {
        assert_eq!(row("CRAWL_CATEGORY", "failed").job_status().unwrap(), JobStatus::Failed);
        assert_eq!(JobStatus::Queued.to_string(), "queued");
        assert!("done".parse::<JobStatus>().is_err());
    }
}
