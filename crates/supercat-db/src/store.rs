//! Postgres-backed [`CatalogStore`].

use async_trait::async_trait;
use sqlx::PgPool;
use supercat_core::text::slugify;
use supercat_core::{
    Brand, BrandUpsert, CatalogStore, MasterCategory, Product, StoreCategory, StoreError,
};
use uuid::Uuid;

use crate::{brands, categories, products, DbError};

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn list_brands(&self) -> Result<Vec<Brand>, StoreError> {
        let rows = brands::list_brands(&self.pool).await?;
        Ok(rows.into_iter().map(Brand::from).collect())
    }

    // Slugs fold case and diacritics, so the slug is the lookup key.
    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Ok(None);
        }
        let row = brands::find_brand_by_slug(&self.pool, &slug).await?;
        Ok(row.map(Brand::from))
    }

    async fn upsert_brand(&self, upsert: &BrandUpsert) -> Result<Brand, StoreError> {
        if upsert.slug().is_empty() {
            return Err(StoreError::Conflict(format!(
                "brand name '{}' has no usable slug",
                upsert.name
            )));
        }
        let row = brands::upsert_brand(&self.pool, upsert).await?;
        Ok(row.into())
    }

    async fn find_master_categories(&self) -> Result<Vec<MasterCategory>, StoreError> {
        let rows = categories::list_master_categories(&self.pool).await?;
        Ok(rows.into_iter().map(MasterCategory::from).collect())
    }

    async fn upsert_master_category(
        &self,
        category: &MasterCategory,
    ) -> Result<MasterCategory, StoreError> {
        let row = categories::upsert_master_category(&self.pool, category).await?;
        Ok(row.into())
    }

    async fn upsert_store_category(
        &self,
        category: &StoreCategory,
    ) -> Result<StoreCategory, StoreError> {
        let row = categories::upsert_store_category(&self.pool, category).await?;
        Ok(StoreCategory::try_from(row)?)
    }

    async fn find_product_by_ean(&self, ean: &str) -> Result<Option<Product>, StoreError> {
        Ok(products::find_product_by_ean(&self.pool, ean).await?)
    }

    async fn find_product_by_store_id(
        &self,
        store: &str,
        store_product_id: &str,
    ) -> Result<Option<Product>, StoreError> {
        Ok(products::find_product_by_store_id(&self.pool, store, store_product_id).await?)
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError> {
        Ok(products::find_product_by_slug(&self.pool, slug).await?)
    }

    async fn upsert_product(&self, product: &Product) -> Result<Product, StoreError> {
        products::upsert_product(&self.pool, product)
            .await
            .map_err(|e: DbError| {
                tracing::warn!(product_id = %product.id, error = %e, "product write rejected");
                StoreError::from(e)
            })
    }

    async fn merge_products(
        &self,
        survivor: &Product,
        absorbed: Uuid,
    ) -> Result<Product, StoreError> {
        products::merge_products(&self.pool, survivor, absorbed)
            .await
            .map_err(|e: DbError| {
                tracing::warn!(
                    product_id = %survivor.id,
                    absorbed = %absorbed,
                    error = %e,
                    "product merge rejected"
                );
                StoreError::from(e)
            })
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(products::find_product(&self.pool, id).await?)
    }
}
