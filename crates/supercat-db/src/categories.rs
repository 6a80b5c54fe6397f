//! Database operations for `master_categories` and `store_categories`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use supercat_core::{LocalizedName, MasterCategory, PendingProvenance, StoreCategory};
use uuid::Uuid;

use crate::{enum_to_text, text_to_enum, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `master_categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MasterCategoryRow {
    pub id: Uuid,
    /// Locale code to display name, e.g. `{"es": "Lácteos"}`.
    pub name: Json<LocalizedName>,
    pub slug: String,
    pub level: i32,
    pub parent_id: Option<Uuid>,
    pub keywords: Vec<String>,
    pub synonyms: Vec<String>,
    pub is_master: bool,
    pub is_pending: bool,
    /// Only set on pending categories.
    pub provenance: Option<Json<PendingProvenance>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MasterCategoryRow> for MasterCategory {
    fn from(row: MasterCategoryRow) -> Self {
        MasterCategory {
            id: row.id,
            name: row.name.0,
            slug: row.slug,
            level: row.level,
            parent_id: row.parent_id,
            keywords: row.keywords,
            synonyms: row.synonyms,
            is_master: row.is_master,
            is_pending: row.is_pending,
            provenance: row.provenance.map(|p| p.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row from the `store_categories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreCategoryRow {
    pub id: Uuid,
    pub store: String,
    pub name: String,
    pub slug: String,
    pub level: i32,
    pub url: Option<String>,
    pub parent_path: Vec<String>,
    pub master_category_id: Option<Uuid>,
    pub mapping_confidence: f64,
    /// One of `manual`, `exact`, `fuzzy`, `pending`.
    pub mapping_method: String,
    pub last_seen_at: DateTime<Utc>,
}

impl TryFrom<StoreCategoryRow> for StoreCategory {
    type Error = DbError;

    fn try_from(row: StoreCategoryRow) -> Result<Self, Self::Error> {
        Ok(StoreCategory {
            id: row.id,
            mapping_method: text_to_enum("mapping_method", &row.mapping_method)?,
            store: row.store,
            name: row.name,
            slug: row.slug,
            level: row.level,
            url: row.url,
            parent_path: row.parent_path,
            master_category_id: row.master_category_id,
            mapping_confidence: row.mapping_confidence,
            last_seen_at: row.last_seen_at,
        })
    }
}

const MASTER_COLUMNS: &str = "id, name, slug, level, parent_id, keywords, synonyms, \
                              is_master, is_pending, provenance, created_at, updated_at";

const STORE_COLUMNS: &str = "id, store, name, slug, level, url, parent_path, master_category_id, \
                             mapping_confidence, mapping_method, last_seen_at";

// ---------------------------------------------------------------------------
// master_categories operations
// ---------------------------------------------------------------------------

/// Returns every master category, pending ones included, by level then slug.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_master_categories(pool: &PgPool) -> Result<Vec<MasterCategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, MasterCategoryRow>(&format!(
        "SELECT {MASTER_COLUMNS} FROM master_categories ORDER BY level, slug"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the categories awaiting review, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_categories(pool: &PgPool) -> Result<Vec<MasterCategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, MasterCategoryRow>(&format!(
        "SELECT {MASTER_COLUMNS} FROM master_categories WHERE is_pending ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_master_category_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<MasterCategoryRow>, DbError> {
    let row = sqlx::query_as::<_, MasterCategoryRow>(&format!(
        "SELECT {MASTER_COLUMNS} FROM master_categories WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Inserts a master category keyed by slug. An existing row with the same
/// slug is returned unchanged.
///
/// The no-op `DO UPDATE` makes `RETURNING` yield the existing row, so two
/// jobs racing on the same pending label both get the single stored record.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_master_category(
    pool: &PgPool,
    category: &MasterCategory,
) -> Result<MasterCategoryRow, DbError> {
    let row = sqlx::query_as::<_, MasterCategoryRow>(&format!(
        "INSERT INTO master_categories \
             (id, name, slug, level, parent_id, keywords, synonyms, is_master, is_pending, \
              provenance, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (slug) DO UPDATE SET slug = master_categories.slug \
         RETURNING {MASTER_COLUMNS}"
    ))
    .bind(category.id)
    .bind(Json(&category.name))
    .bind(&category.slug)
    .bind(category.level)
    .bind(category.parent_id)
    .bind(&category.keywords)
    .bind(&category.synonyms)
    .bind(category.is_master)
    .bind(category.is_pending)
    .bind(category.provenance.as_ref().map(Json))
    .bind(category.created_at)
    .bind(category.updated_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

// ---------------------------------------------------------------------------
// store_categories operations
// ---------------------------------------------------------------------------

/// Inserts or refreshes a store category keyed by `{store, name, level}`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn upsert_store_category(
    pool: &PgPool,
    category: &StoreCategory,
) -> Result<StoreCategoryRow, DbError> {
    let method = enum_to_text("mapping_method", &category.mapping_method)?;

    let row = sqlx::query_as::<_, StoreCategoryRow>(&format!(
        "INSERT INTO store_categories \
             (id, store, name, slug, level, url, parent_path, master_category_id, \
              mapping_confidence, mapping_method, last_seen_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (store, name, level) DO UPDATE SET \
             slug = EXCLUDED.slug, \
             url = COALESCE(EXCLUDED.url, store_categories.url), \
             parent_path = EXCLUDED.parent_path, \
             master_category_id = EXCLUDED.master_category_id, \
             mapping_confidence = EXCLUDED.mapping_confidence, \
             mapping_method = EXCLUDED.mapping_method, \
             last_seen_at = EXCLUDED.last_seen_at \
         RETURNING {STORE_COLUMNS}"
    ))
    .bind(category.id)
    .bind(&category.store)
    .bind(&category.name)
    .bind(&category.slug)
    .bind(category.level)
    .bind(&category.url)
    .bind(&category.parent_path)
    .bind(category.master_category_id)
    .bind(category.mapping_confidence)
    .bind(method)
    .bind(category.last_seen_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns a store's categories, shallowest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_store_categories(
    pool: &PgPool,
    store: &str,
) -> Result<Vec<StoreCategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, StoreCategoryRow>(&format!(
        "SELECT {STORE_COLUMNS} FROM store_categories WHERE store = $1 ORDER BY level, name"
    ))
    .bind(store)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
