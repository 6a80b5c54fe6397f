use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};
use supercat_core::{AppConfig, StoreError};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/supercat-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_connections: read_u32("SUPERCAT_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            min_connections: read_u32("SUPERCAT_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: read_u64(
                "SUPERCAT_DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    /// A uniqueness key is owned by another record.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("scrape job {id} is not in the expected '{expected_status}' status")]
    InvalidJobTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("invalid value in column {column}: {reason}")]
    InvalidColumn { column: &'static str, reason: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Whether the error is a unique-key violation.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::Sqlx(sqlx::Error::Database(db)) if db.is_unique_violation())
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_unique_violation() {
            return StoreError::Conflict(err.to_string());
        }
        match err {
            DbError::NotFound => StoreError::NotFound(err.to_string()),
            DbError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` and pool settings from env.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is unset, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    let config = PoolConfig::from_env();
    connect_pool(&database_url, config)
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; count it as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

fn read_u32(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

/// Writes a serde enum as its string form (`"in_stock"`, `"high"`, ...).
pub(crate) fn enum_to_text<T: serde::Serialize>(
    column: &'static str,
    value: &T,
) -> Result<String, DbError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Err(DbError::InvalidColumn {
            column,
            reason: format!("expected a string variant, got {other}"),
        }),
        Err(e) => Err(DbError::InvalidColumn {
            column,
            reason: e.to_string(),
        }),
    }
}

pub(crate) fn text_to_enum<T: serde::de::DeserializeOwned>(
    column: &'static str,
    text: &str,
) -> Result<T, DbError> {
    serde_json::from_value(serde_json::Value::String(text.to_string())).map_err(|e| {
        DbError::InvalidColumn {
            column,
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use supercat_core::{AvailabilityStatus, DataQuality, MappingMethod};

    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn enums_round_trip_through_text_columns() {
        let text = enum_to_text("availability_status", &AvailabilityStatus::OutOfStock).unwrap();
        assert_eq!(text, "out_of_stock");
        let back: AvailabilityStatus = text_to_enum("availability_status", &text).unwrap();
        assert_eq!(back, AvailabilityStatus::OutOfStock);

        assert_eq!(enum_to_text("data_quality", &DataQuality::High).unwrap(), "high");
        assert_eq!(enum_to_text("mapping_method", &MappingMethod::Pending).unwrap(), "pending");
    }

    #[test]
    fn unknown_enum_text_is_a_column_error() {
        let err = text_to_enum::<DataQuality>("data_quality", "excellent").unwrap_err();
        assert!(matches!(
            err,
            DbError::InvalidColumn {
                column: "data_quality",
                ..
            }
        ));
    }

    #[test]
    fn not_found_maps_to_store_not_found() {
        assert!(matches!(
            StoreError::from(DbError::NotFound),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from(DbError::Conflict("ean 779".into())),
            StoreError::Conflict(msg) if msg == "ean 779"
        ));
        assert!(matches!(
            StoreError::from(DbError::MissingDatabaseUrl),
            StoreError::Backend(_)
        ));
    }
}

pub mod brands;
pub mod categories;
pub mod evidence;
pub mod jobs;
pub mod products;
pub mod seed;
pub mod store;

pub use brands::{find_brand_by_slug, list_brands, upsert_brand, BrandRow};
pub use categories::{
    find_master_category_by_slug, list_master_categories, list_pending_categories,
    list_store_categories, upsert_master_category, upsert_store_category, MasterCategoryRow,
    StoreCategoryRow,
};
pub use evidence::{insert_evidence, list_recent_evidence, EvidenceRow, PgEvidenceSink};
pub use jobs::{
    claim_next_job, complete_job, enqueue_job, fail_job, get_job, list_jobs, requeue_stale_jobs,
    JobStatus, ScrapeJobRow,
};
pub use products::{
    find_product, find_product_by_ean, find_product_by_slug, find_product_by_store_id,
    merge_products, upsert_product, ProductRow, SourceRow, VariantRow,
};
pub use seed::seed_master_categories;
pub use store::PgCatalogStore;
