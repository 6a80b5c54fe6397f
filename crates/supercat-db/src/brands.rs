//! Database operations for the `brands` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use supercat_core::{Brand, BrandUpsert};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub aliases: Vec<String>,
    pub acronyms: Vec<String>,
    /// Retailer keys, in the order they were first seen.
    pub stores: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<BrandRow> for Brand {
    fn from(row: BrandRow) -> Self {
        Brand {
            id: row.id,
            name: row.name,
            slug: row.slug,
            aliases: row.aliases,
            acronyms: row.acronyms,
            stores: row.stores,
            active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const BRAND_COLUMNS: &str =
    "id, name, slug, aliases, acronyms, stores, is_active, created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Returns all active brands, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_brands(pool: &PgPool) -> Result<Vec<BrandRow>, DbError> {
    let rows = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands WHERE is_active = true ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns a single brand by slug, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_brand_by_slug(pool: &PgPool, slug: &str) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM brands WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a brand or merges into the existing one with the same slug.
///
/// The store is appended to `stores` if absent and new aliases are appended
/// case-insensitively. The whole merge is a single statement, so concurrent
/// jobs upserting the same name end up with one row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_brand(pool: &PgPool, upsert: &BrandUpsert) -> Result<BrandRow, DbError> {
    let stores: Vec<String> = upsert.store.iter().cloned().collect();

    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "INSERT INTO brands (id, name, slug, aliases, stores, is_active) \
         VALUES ($1, $2, $3, $4, $5, true) \
         ON CONFLICT (slug) DO UPDATE SET \
             stores = brands.stores || ARRAY( \
                 SELECT s FROM unnest(EXCLUDED.stores) AS s \
                 WHERE NOT (s = ANY(brands.stores))), \
             aliases = brands.aliases || ARRAY( \
                 SELECT a FROM unnest(EXCLUDED.aliases) AS a \
                 WHERE lower(a) <> lower(brands.name) \
                   AND NOT (lower(a) = ANY(SELECT lower(x) FROM unnest(brands.aliases) AS x))), \
             updated_at = NOW() \
         RETURNING {BRAND_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&upsert.name)
    .bind(upsert.slug())
    .bind(&upsert.aliases)
    .bind(&stores)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
