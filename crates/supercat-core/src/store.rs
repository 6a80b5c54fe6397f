//! Persistence interface the matching and scraping layers depend on.
//!
//! Implementations must make every upsert atomic on its uniqueness key
//! (brand slug, master category slug, `{store, name, level}` for store
//! categories, variant EAN and `{store, store_product_id}` for products), so
//! concurrent jobs never create duplicates.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::brands::{Brand, BrandUpsert};
use crate::categories::{MasterCategory, StoreCategory};
use crate::jobs::EvidenceRecord;
use crate::products::Product;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness key is owned by another record (for example an EAN that
    /// belongs to a different product).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_brands(&self) -> Result<Vec<Brand>, StoreError>;

    /// Case and diacritic-insensitive lookup by name.
    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError>;

    /// Inserts or merges a brand keyed by its slug, accumulating stores.
    async fn upsert_brand(&self, upsert: &BrandUpsert) -> Result<Brand, StoreError>;

    /// All master categories, pending ones included.
    async fn find_master_categories(&self) -> Result<Vec<MasterCategory>, StoreError>;

    /// Inserts a master category keyed by slug. An existing record with the
    /// same slug is returned unchanged.
    async fn upsert_master_category(
        &self,
        category: &MasterCategory,
    ) -> Result<MasterCategory, StoreError>;

    /// Inserts or updates a store category keyed by `{store, name, level}`.
    async fn upsert_store_category(
        &self,
        category: &StoreCategory,
    ) -> Result<StoreCategory, StoreError>;

    async fn find_product_by_ean(&self, ean: &str) -> Result<Option<Product>, StoreError>;

    async fn find_product_by_store_id(
        &self,
        store: &str,
        store_product_id: &str,
    ) -> Result<Option<Product>, StoreError>;

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError>;

    /// Writes the full product keyed by id.
    ///
    /// Returns [`StoreError::Conflict`] if any variant EAN, or any source's
    /// `{store, store_product_id}`, is owned by a different product.
    async fn upsert_product(&self, product: &Product) -> Result<Product, StoreError>;

    /// Writes `survivor` and removes the product `absorbed` in one atomic
    /// step, for two records that turned out to be the same item. The
    /// caller folds the absorbed variants and sources into `survivor` first.
    ///
    /// Returns [`StoreError::Conflict`] under the same rules as
    /// [`CatalogStore::upsert_product`].
    async fn merge_products(
        &self,
        survivor: &Product,
        absorbed: Uuid,
    ) -> Result<Product, StoreError>;

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
}

/// Destination for evidence records emitted while scraping.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    async fn record(&self, record: &EvidenceRecord) -> Result<(), StoreError>;
}
