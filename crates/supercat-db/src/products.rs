//! Database operations for `products`, `product_variants`, and `product_sources`.
//!
//! A [`Product`] is stored as one `products` row plus its variant and source
//! rows. Writes replace the child rows wholesale inside one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use supercat_core::{Product, ProductSource, ProductVariant, ScrapingMetadata};
use uuid::Uuid;

use crate::{enum_to_text, text_to_enum, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub brand_id: Option<Uuid>,
    pub brand_name: Option<String>,
    pub master_category_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub currency: String,
    pub is_available: bool,
    pub image: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub update_count: i64,
    pub confidence_score: f64,
    /// One of `high`, `medium`, `low`.
    pub data_quality: String,
    pub validation_errors: Json<Vec<String>>,
}

/// A row from the `product_variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantRow {
    pub product_id: Uuid,
    /// Preserves the variant order of the product.
    pub position: i32,
    pub ean: String,
    pub sku: Option<String>,
    pub attributes: Json<BTreeMap<String, String>>,
    pub price: Option<Decimal>,
    pub list_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_available: bool,
    pub images: Json<Vec<String>>,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        ProductVariant {
            ean: row.ean,
            sku: row.sku,
            attributes: row.attributes.0,
            price: row.price,
            list_price: row.list_price,
            stock: row.stock,
            available: row.is_available,
            images: row.images.0,
        }
    }
}

/// A row from the `product_sources` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceRow {
    pub product_id: Uuid,
    pub store: String,
    pub store_product_id: Option<String>,
    pub price: Option<Decimal>,
    pub category_path: Vec<String>,
    pub original_url: Option<String>,
    pub last_scraped: DateTime<Utc>,
    /// One of `in_stock`, `out_of_stock`, `unknown`.
    pub availability_status: String,
}

impl TryFrom<SourceRow> for ProductSource {
    type Error = DbError;

    fn try_from(row: SourceRow) -> Result<Self, Self::Error> {
        Ok(ProductSource {
            availability_status: text_to_enum("availability_status", &row.availability_status)?,
            store: row.store,
            store_product_id: row.store_product_id,
            price: row.price,
            category_path: row.category_path,
            original_url: row.original_url,
            last_scraped: row.last_scraped,
        })
    }
}

impl ProductRow {
    /// Assembles the domain product from this row and its children.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] if an enum column holds an unknown value.
    pub fn into_product(
        self,
        variants: Vec<VariantRow>,
        sources: Vec<SourceRow>,
    ) -> Result<Product, DbError> {
        let sources = sources
            .into_iter()
            .map(ProductSource::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Product {
            id: self.id,
            name: self.name,
            slug: self.slug,
            brand_id: self.brand_id,
            brand_name: self.brand_name,
            master_category_id: self.master_category_id,
            price: self.price,
            currency: self.currency,
            available: self.is_available,
            image: self.image,
            variants: variants.into_iter().map(ProductVariant::from).collect(),
            sources,
            scraping_metadata: ScrapingMetadata {
                first_seen_at: self.first_seen_at,
                last_updated_at: self.last_updated_at,
                update_count: self.update_count,
                confidence_score: self.confidence_score,
                data_quality: text_to_enum("data_quality", &self.data_quality)?,
                validation_errors: self.validation_errors.0,
            },
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, slug, brand_id, brand_name, master_category_id, price, \
                               currency, is_available, image, first_seen_at, last_updated_at, \
                               update_count, confidence_score, data_quality, validation_errors";

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Loads a full product by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails, or [`DbError::InvalidColumn`]
/// if a stored enum value is unknown.
pub async fn find_product(pool: &PgPool, id: Uuid) -> Result<Option<Product>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => assemble(pool, row).await.map(Some),
        None => Ok(None),
    }
}

/// Finds the product owning a variant with this EAN.
///
/// # Errors
///
/// See [`find_product`].
pub async fn find_product_by_ean(pool: &PgPool, ean: &str) -> Result<Option<Product>, DbError> {
    let id: Option<Uuid> =
        sqlx::query_scalar("SELECT product_id FROM product_variants WHERE ean = $1")
            .bind(ean)
            .fetch_optional(pool)
            .await?;

    match id {
        Some(id) => find_product(pool, id).await,
        None => Ok(None),
    }
}

/// Finds the product a retailer lists under `store_product_id`.
///
/// # Errors
///
/// See [`find_product`].
pub async fn find_product_by_store_id(
    pool: &PgPool,
    store: &str,
    store_product_id: &str,
) -> Result<Option<Product>, DbError> {
    let id: Option<Uuid> = sqlx::query_scalar(
        "SELECT product_id FROM product_sources WHERE store = $1 AND store_product_id = $2",
    )
    .bind(store)
    .bind(store_product_id)
    .fetch_optional(pool)
    .await?;

    match id {
        Some(id) => find_product(pool, id).await,
        None => Ok(None),
    }
}

/// Finds a product by slug. Slugs are not unique; the oldest product wins.
///
/// # Errors
///
/// See [`find_product`].
pub async fn find_product_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Product>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 \
         ORDER BY first_seen_at, id LIMIT 1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => assemble(pool, row).await.map(Some),
        None => Ok(None),
    }
}

async fn assemble(pool: &PgPool, row: ProductRow) -> Result<Product, DbError> {
    let variants = sqlx::query_as::<_, VariantRow>(
        "SELECT product_id, position, ean, sku, attributes, price, list_price, stock, \
                is_available, images \
         FROM product_variants WHERE product_id = $1 ORDER BY position",
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    let sources = sqlx::query_as::<_, SourceRow>(
        "SELECT product_id, store, store_product_id, price, category_path, original_url, \
                last_scraped, availability_status \
         FROM product_sources WHERE product_id = $1 ORDER BY store",
    )
    .bind(row.id)
    .fetch_all(pool)
    .await?;

    row.into_product(variants, sources)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Writes the full product keyed by id, replacing its variants and sources.
///
/// Runs in a single transaction. An EAN already owned by another product
/// aborts the write with [`DbError::Conflict`]; a concurrent writer that
/// slips past the check trips the `product_variants.ean` unique index
/// instead, which callers see as a unique violation.
///
/// # Errors
///
/// Returns [`DbError::Conflict`] on an EAN owned elsewhere,
/// [`DbError::InvalidColumn`] if an enum cannot be encoded, or
/// [`DbError::Sqlx`] if any statement fails.
pub async fn upsert_product(pool: &PgPool, product: &Product) -> Result<Product, DbError> {
    let mut tx = pool.begin().await?;
    write_product(&mut tx, product).await?;
    tx.commit().await?;

    tracing::debug!(
        product_id = %product.id,
        variants = product.variants.len(),
        sources = product.sources.len(),
        "product written"
    );
    Ok(product.clone())
}

/// Writes `survivor` and deletes the `absorbed` product in one transaction.
///
/// The caller has already folded the absorbed product's variants and
/// sources into `survivor`; deleting first frees their EANs and store keys
/// for the survivor's rows.
///
/// # Errors
///
/// Same as [`upsert_product`].
pub async fn merge_products(
    pool: &PgPool,
    survivor: &Product,
    absorbed: Uuid,
) -> Result<Product, DbError> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM products WHERE id = $1 AND id <> $2")
        .bind(absorbed)
        .bind(survivor.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    write_product(&mut tx, survivor).await?;
    tx.commit().await?;

    tracing::info!(
        product_id = %survivor.id,
        absorbed = %absorbed,
        deleted,
        "duplicate product merged"
    );
    Ok(survivor.clone())
}

async fn write_product(
    tx: &mut Transaction<'_, Postgres>,
    product: &Product,
) -> Result<(), DbError> {
    let eans: Vec<&str> = product.eans().collect();

    let taken: Option<String> = sqlx::query_scalar(
        "SELECT ean FROM product_variants \
         WHERE ean = ANY($1) AND product_id <> $2 \
         LIMIT 1",
    )
    .bind(&eans)
    .bind(product.id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(ean) = taken {
        return Err(DbError::Conflict(format!(
            "ean {ean} belongs to another product"
        )));
    }

    write_product_row(tx, product).await?;

    sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
        .bind(product.id)
        .execute(&mut **tx)
        .await?;
    for (position, variant) in (0_i32..).zip(&product.variants) {
        sqlx::query(
            "INSERT INTO product_variants \
                 (product_id, position, ean, sku, attributes, price, list_price, stock, \
                  is_available, images) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(product.id)
        .bind(position)
        .bind(&variant.ean)
        .bind(&variant.sku)
        .bind(Json(&variant.attributes))
        .bind(variant.price)
        .bind(variant.list_price)
        .bind(variant.stock)
        .bind(variant.available)
        .bind(Json(&variant.images))
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query("DELETE FROM product_sources WHERE product_id = $1")
        .bind(product.id)
        .execute(&mut **tx)
        .await?;
    for source in &product.sources {
        let status = enum_to_text("availability_status", &source.availability_status)?;
        sqlx::query(
            "INSERT INTO product_sources \
                 (product_id, store, store_product_id, price, category_path, original_url, \
                  last_scraped, availability_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(product.id)
        .bind(&source.store)
        .bind(&source.store_product_id)
        .bind(source.price)
        .bind(&source.category_path)
        .bind(&source.original_url)
        .bind(source.last_scraped)
        .bind(status)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

async fn write_product_row(
    tx: &mut Transaction<'_, Postgres>,
    product: &Product,
) -> Result<(), DbError> {
    let meta = &product.scraping_metadata;
    let quality = enum_to_text("data_quality", &meta.data_quality)?;

    sqlx::query(
        "INSERT INTO products \
             (id, name, slug, brand_id, brand_name, master_category_id, price, currency, \
              is_available, image, first_seen_at, last_updated_at, update_count, \
              confidence_score, data_quality, validation_errors) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, \
             slug = EXCLUDED.slug, \
             brand_id = EXCLUDED.brand_id, \
             brand_name = EXCLUDED.brand_name, \
             master_category_id = EXCLUDED.master_category_id, \
             price = EXCLUDED.price, \
             currency = EXCLUDED.currency, \
             is_available = EXCLUDED.is_available, \
             image = COALESCE(products.image, EXCLUDED.image), \
             last_updated_at = EXCLUDED.last_updated_at, \
             update_count = EXCLUDED.update_count, \
             confidence_score = EXCLUDED.confidence_score, \
             data_quality = EXCLUDED.data_quality, \
             validation_errors = EXCLUDED.validation_errors",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.slug)
    .bind(product.brand_id)
    .bind(&product.brand_name)
    .bind(product.master_category_id)
    .bind(product.price)
    .bind(&product.currency)
    .bind(product.available)
    .bind(&product.image)
    .bind(meta.first_seen_at)
    .bind(meta.last_updated_at)
    .bind(meta.update_count)
    .bind(meta.confidence_score)
    .bind(quality)
    .bind(Json(&meta.validation_errors))
    .execute(&mut **tx)
    .await?;

    Ok(())
}
