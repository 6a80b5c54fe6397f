//! In-process [`CatalogStore`] used by tests and dry runs.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::brands::{Brand, BrandUpsert};
use crate::categories::{MasterCategory, StoreCategory};
use crate::products::Product;
use crate::store::{CatalogStore, StoreError};
use crate::text::{normalize, slugify};

#[derive(Debug, Default)]
struct Inner {
    brands: Vec<Brand>,
    masters: Vec<MasterCategory>,
    store_categories: Vec<StoreCategory>,
    products: HashMap<Uuid, Product>,
}

/// Thread-safe in-memory catalog enforcing the same uniqueness rules as the
/// database: brand slug, master slug, `{store, name, level}`, variant EAN
/// and `{store, store_product_id}`.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: RwLock<Inner>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds brands and master categories.
    #[must_use]
    pub fn with_reference_data(brands: Vec<Brand>, masters: Vec<MasterCategory>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                brands,
                masters,
                ..Inner::default()
            }),
        }
    }

    #[must_use]
    pub fn store_categories(&self) -> Vec<StoreCategory> {
        self.read(|inner| inner.store_categories.clone())
    }

    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.read(|inner| inner.products.values().cloned().collect())
    }

    #[must_use]
    pub fn masters(&self) -> Vec<MasterCategory> {
        self.read(|inner| inner.masters.clone())
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn list_brands(&self) -> Result<Vec<Brand>, StoreError> {
        Ok(self.read(|inner| inner.brands.clone()))
    }

    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StoreError> {
        let key = normalize(name);
        Ok(self.read(|inner| {
            inner
                .brands
                .iter()
                .find(|b| normalize(&b.name) == key)
                .cloned()
        }))
    }

    async fn upsert_brand(&self, upsert: &BrandUpsert) -> Result<Brand, StoreError> {
        let slug = upsert.slug();
        if slug.is_empty() {
            return Err(StoreError::Conflict(format!(
                "brand name '{}' has no usable slug",
                upsert.name
            )));
        }
        Ok(self.write(|inner| {
            if let Some(existing) = inner.brands.iter_mut().find(|b| b.slug == slug) {
                existing.absorb(upsert);
                existing.clone()
            } else {
                let brand = upsert.clone().into_brand();
                inner.brands.push(brand.clone());
                brand
            }
        }))
    }

    async fn find_master_categories(&self) -> Result<Vec<MasterCategory>, StoreError> {
        Ok(self.masters())
    }

    async fn upsert_master_category(
        &self,
        category: &MasterCategory,
    ) -> Result<MasterCategory, StoreError> {
        Ok(self.write(|inner| {
            if let Some(existing) = inner.masters.iter().find(|c| c.slug == category.slug) {
                existing.clone()
            } else {
                inner.masters.push(category.clone());
                category.clone()
            }
        }))
    }

    async fn upsert_store_category(
        &self,
        category: &StoreCategory,
    ) -> Result<StoreCategory, StoreError> {
        Ok(self.write(|inner| {
            let existing = inner.store_categories.iter_mut().find(|c| {
                c.store == category.store && c.name == category.name && c.level == category.level
            });
            match existing {
                Some(existing) => {
                    let id = existing.id;
                    *existing = StoreCategory {
                        id,
                        last_seen_at: Utc::now(),
                        ..category.clone()
                    };
                    existing.clone()
                }
                None => {
                    inner.store_categories.push(category.clone());
                    category.clone()
                }
            }
        }))
    }

    async fn find_product_by_ean(&self, ean: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.read(|inner| {
            inner
                .products
                .values()
                .find(|p| p.eans().any(|e| e == ean))
                .cloned()
        }))
    }

    async fn find_product_by_store_id(
        &self,
        store: &str,
        store_product_id: &str,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self.read(|inner| {
            inner
                .products
                .values()
                .find(|p| {
                    p.sources.iter().any(|s| {
                        s.store == store && s.store_product_id.as_deref() == Some(store_product_id)
                    })
                })
                .cloned()
        }))
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>, StoreError> {
        let slug = slugify(slug);
        Ok(self.read(|inner| inner.products.values().find(|p| p.slug == slug).cloned()))
    }

    async fn upsert_product(&self, product: &Product) -> Result<Product, StoreError> {
        self.write(|inner| {
            check_keys(inner, product, None)?;
            inner.products.insert(product.id, product.clone());
            Ok(product.clone())
        })
    }

    async fn merge_products(
        &self,
        survivor: &Product,
        absorbed: Uuid,
    ) -> Result<Product, StoreError> {
        self.write(|inner| {
            let ignore = (absorbed != survivor.id).then_some(absorbed);
            check_keys(inner, survivor, ignore)?;
            if let Some(id) = ignore {
                inner.products.remove(&id);
            }
            inner.products.insert(survivor.id, survivor.clone());
            Ok(survivor.clone())
        })
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.read(|inner| inner.products.get(&id).cloned()))
    }
}

/// Rejects `product` if another stored product (other than `ignore`) owns
/// one of its EANs or `{store, store_product_id}` keys.
fn check_keys(inner: &Inner, product: &Product, ignore: Option<Uuid>) -> Result<(), StoreError> {
    for ean in product.eans() {
        let owner = others(inner, product, ignore).find(|p| p.eans().any(|e| e == ean));
        if let Some(owner) = owner {
            return Err(StoreError::Conflict(format!(
                "ean {ean} already belongs to product {}",
                owner.id
            )));
        }
    }
    for source in &product.sources {
        let Some(id) = source.store_product_id.as_deref() else {
            continue;
        };
        let owner = others(inner, product, ignore).find(|p| {
            p.sources
                .iter()
                .any(|s| s.store == source.store && s.store_product_id.as_deref() == Some(id))
        });
        if let Some(owner) = owner {
            return Err(StoreError::Conflict(format!(
                "{}/{id} already belongs to product {}",
                source.store, owner.id
            )));
        }
    }
    Ok(())
}

fn others<'a>(
    inner: &'a Inner,
    product: &'a Product,
    ignore: Option<Uuid>,
) -> impl Iterator<Item = &'a Product> + 'a {
    inner
        .products
        .values()
        .filter(move |p| p.id != product.id && Some(p.id) != ignore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::{
        AvailabilityStatus, DataQuality, ProductSource, ProductVariant, ScrapingMetadata,
    };

    fn product_with_ean(ean: &str) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            name: "Leche Entera".to_string(),
            slug: "leche-entera".to_string(),
            brand_id: None,
            brand_name: None,
            master_category_id: None,
            price: None,
            currency: "ARS".to_string(),
            available: true,
            image: None,
            variants: vec![ProductVariant {
                ean: ean.to_string(),
                sku: None,
                attributes: std::collections::BTreeMap::new(),
                price: None,
                list_price: None,
                stock: None,
                available: true,
                images: vec![],
            }],
            sources: vec![],
            scraping_metadata: ScrapingMetadata {
                first_seen_at: now,
                last_updated_at: now,
                update_count: 0,
                confidence_score: 0.0,
                data_quality: DataQuality::Low,
                validation_errors: vec![],
            },
        }
    }

    fn source(store: &str, id: &str) -> ProductSource {
        ProductSource {
            store: store.to_string(),
            store_product_id: Some(id.to_string()),
            price: None,
            category_path: vec![],
            original_url: None,
            last_scraped: Utc::now(),
            availability_status: AvailabilityStatus::Unknown,
        }
    }

    #[tokio::test]
    async fn upsert_brand_accumulates_stores() {
        let catalog = MemoryCatalog::new();
        catalog
            .upsert_brand(&BrandUpsert::new("Arcor", Some("carrefour")))
            .await
            .unwrap();
        let brand = catalog
            .upsert_brand(&BrandUpsert::new("ARCOR", Some("coto")))
            .await
            .unwrap();
        assert_eq!(brand.stores, vec!["carrefour", "coto"]);
        assert_eq!(catalog.list_brands().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn find_brand_by_name_ignores_accents() {
        let catalog =
            MemoryCatalog::with_reference_data(vec![Brand::new("La Serenísima")], vec![]);
        let found = catalog.find_brand_by_name("la serenisima").await.unwrap();
        assert_eq!(found.map(|b| b.slug).as_deref(), Some("la-serenisima"));
    }

    #[tokio::test]
    async fn upsert_master_category_is_idempotent_by_slug() {
        let catalog = MemoryCatalog::new();
        let first = MasterCategory::pending("Snacks", "jumbo", &[], None);
        let second = MasterCategory::pending("Snacks", "coto", &[], None);
        let a = catalog.upsert_master_category(&first).await.unwrap();
        let b = catalog.upsert_master_category(&second).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(catalog.masters().len(), 1);
    }

    #[tokio::test]
    async fn upsert_product_rejects_ean_owned_elsewhere() {
        let catalog = MemoryCatalog::new();
        catalog
            .upsert_product(&product_with_ean("7790895000997"))
            .await
            .unwrap();
        let err = catalog
            .upsert_product(&product_with_ean("7790895000997"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn upsert_product_rejects_store_key_owned_elsewhere() {
        let catalog = MemoryCatalog::new();
        let mut first = product_with_ean("7790895000997");
        first.sources.push(source("jumbo", "101"));
        catalog.upsert_product(&first).await.unwrap();

        let mut second = product_with_ean("96385074");
        second.sources.push(source("jumbo", "101"));
        let err = catalog.upsert_product(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn merge_products_replaces_absorbed_record() {
        let catalog = MemoryCatalog::new();
        let mut stale = product_with_ean("TMP-0000000000000001");
        stale.sources.push(source("jumbo", "101"));
        catalog.upsert_product(&stale).await.unwrap();
        let mut survivor = product_with_ean("7790895000997");
        catalog.upsert_product(&survivor).await.unwrap();

        survivor.sources.push(source("jumbo", "101"));
        catalog.merge_products(&survivor, stale.id).await.unwrap();

        assert_eq!(catalog.products().len(), 1);
        let found = catalog
            .find_product_by_store_id("jumbo", "101")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, survivor.id);
    }

    #[tokio::test]
    async fn product_lookups() {
        let catalog = MemoryCatalog::new();
        let product = product_with_ean("96385074");
        catalog.upsert_product(&product).await.unwrap();
        assert!(catalog.find_product_by_ean("96385074").await.unwrap().is_some());
        assert!(catalog.find_product_by_slug("Leche Entera").await.unwrap().is_some());
        assert!(catalog
            .find_product_by_store_id("dia", "1")
            .await
            .unwrap()
            .is_none());
        assert!(catalog.find_product(product.id).await.unwrap().is_some());
    }
}
