//! Reconciles scraped products with the catalog.
//!
//! Lookup order is EAN (real or the deterministic placeholder), then the
//! retailer's own product id, then the name slug. The first hit is merged
//! with [`merge_scraped`]; no hit creates a new product.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use supercat_core::ean::placeholder_ean;
use supercat_core::text::slugify;
use supercat_core::{
    AvailabilityStatus, CatalogStore, Product, ProductSource, ProductVariant, ScrapingMetadata,
    StoreError,
};
use uuid::Uuid;

use crate::error::MatchingError;
use crate::quality::{assess_quality, QualityInputs};

/// A validated product as scraped from one retailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedProduct {
    pub store: String,
    pub store_product_id: Option<String>,
    pub name: String,
    pub url: Option<String>,
    /// A checksum-valid barcode. Missing or rejected barcodes are `None`.
    pub ean: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub list_price: Option<Decimal>,
    pub currency: String,
    pub available: bool,
    pub images: Vec<String>,
    pub category_path: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    /// Brand text as printed by the retailer, if any.
    pub brand_text: Option<String>,
    pub validation_errors: Vec<String>,
}

impl ScrapedProduct {
    /// The placeholder this product gets when no barcode is known. Keyed on
    /// the retailer id when present, the name otherwise.
    #[must_use]
    pub fn placeholder(&self) -> String {
        let key = self.store_product_id.as_deref().unwrap_or(&self.name);
        placeholder_ean(&self.store, key)
    }

    /// Placeholders this retailer listing may have been stored under before
    /// a barcode was known: keyed on the retailer id and on the name, since
    /// an earlier scrape may have lacked the id.
    #[must_use]
    pub fn prior_placeholders(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if let Some(id) = &self.store_product_id {
            keys.push(placeholder_ean(&self.store, id));
        }
        keys.push(placeholder_ean(&self.store, &self.name));
        keys
    }

    /// The EAN the variant is stored under.
    #[must_use]
    pub fn variant_ean(&self) -> String {
        self.ean.clone().unwrap_or_else(|| self.placeholder())
    }

    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    fn has_positive_price(&self) -> bool {
        self.price.is_some_and(|p| p > Decimal::ZERO)
    }
}

/// Reliable brand attached to a scraped product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandLink {
    pub id: Uuid,
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMatch {
    Ean,
    StoreId,
    Slug,
    New,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub product: Product,
    pub matched_by: IdentityMatch,
    pub created: bool,
    /// EAN of the variant this scrape was written to.
    pub variant_ean: String,
    /// A second product holding this listing that was folded into `product`.
    pub absorbed: Option<Uuid>,
}

fn quality_of(
    scraped: &ScrapedProduct,
    brand: Option<&BrandLink>,
    master_category_id: Option<Uuid>,
) -> (f64, supercat_core::DataQuality) {
    assess_quality(&QualityInputs {
        has_real_ean: scraped.ean.is_some(),
        brand_confidence: brand.map(|b| b.confidence),
        category_mapped: master_category_id.is_some(),
        has_image: !scraped.images.is_empty(),
        has_positive_price: scraped.has_positive_price(),
    })
}

fn source_of(scraped: &ScrapedProduct, now: DateTime<Utc>) -> ProductSource {
    ProductSource {
        store: scraped.store.clone(),
        store_product_id: scraped.store_product_id.clone(),
        price: scraped.price,
        category_path: scraped.category_path.clone(),
        original_url: scraped.url.clone(),
        last_scraped: now,
        availability_status: AvailabilityStatus::from_available(scraped.available),
    }
}

fn variant_of(scraped: &ScrapedProduct, ean: String) -> ProductVariant {
    ProductVariant {
        ean,
        sku: scraped.sku.clone(),
        attributes: scraped.attributes.clone(),
        price: scraped.price,
        list_price: scraped.list_price,
        stock: None,
        available: scraped.available,
        images: scraped.images.clone(),
    }
}

fn refresh_variant(variant: &mut ProductVariant, scraped: &ScrapedProduct) {
    variant.price = scraped.price.or(variant.price);
    variant.list_price = scraped.list_price.or(variant.list_price);
    variant.available = scraped.available;
    if scraped.sku.is_some() {
        variant.sku.clone_from(&scraped.sku);
    }
    variant
        .attributes
        .extend(scraped.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    for image in &scraped.images {
        if !variant.images.contains(image) {
            variant.images.push(image.clone());
        }
    }
}

/// Builds a new catalog product from a scrape. `update_count` starts at zero.
#[must_use]
pub fn new_product(
    scraped: &ScrapedProduct,
    brand: Option<&BrandLink>,
    master_category_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> Product {
    let (confidence_score, data_quality) = quality_of(scraped, brand, master_category_id);
    Product {
        id: Uuid::new_v4(),
        name: scraped.name.trim().to_string(),
        slug: scraped.slug(),
        brand_id: brand.map(|b| b.id),
        brand_name: brand.map(|b| b.name.clone()),
        master_category_id,
        price: scraped.price,
        currency: scraped.currency.clone(),
        available: scraped.available,
        image: scraped.images.first().cloned(),
        variants: vec![variant_of(scraped, scraped.variant_ean())],
        sources: vec![source_of(scraped, now)],
        scraping_metadata: ScrapingMetadata {
            first_seen_at: now,
            last_updated_at: now,
            update_count: 0,
            confidence_score,
            data_quality,
            validation_errors: scraped.validation_errors.clone(),
        },
    }
}

/// Merges a scrape into an existing product and returns the EAN of the
/// variant it was written to.
///
/// Variant selection, first match wins:
/// - the variant with the same EAN;
/// - with a real scraped EAN, a placeholder variant this same listing
///   produced earlier (id- or name-keyed), whose EAN is replaced in place;
/// - without a scraped EAN, the variant with the same SKU, or the only
///   variant;
/// - otherwise a new variant is appended.
///
/// With a real EAN, any other placeholder variant from this listing is
/// folded into the chosen one. Images are unioned, the cover image is only
/// set when absent, the per-store source is replaced rather than duplicated
/// and `update_count` is incremented.
pub fn merge_scraped(
    product: &mut Product,
    scraped: &ScrapedProduct,
    brand: Option<&BrandLink>,
    master_category_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> String {
    let ean = scraped.variant_ean();
    let prior = if scraped.ean.is_some() {
        scraped.prior_placeholders()
    } else {
        Vec::new()
    };
    let position = product
        .variants
        .iter()
        .position(|v| v.ean == ean)
        .or_else(|| product.variants.iter().position(|v| prior.contains(&v.ean)))
        .or_else(|| {
            if scraped.ean.is_some() {
                return None;
            }
            let by_sku = scraped.sku.as_ref().and_then(|sku| {
                product
                    .variants
                    .iter()
                    .position(|v| v.sku.as_ref() == Some(sku))
            });
            by_sku.or((product.variants.len() == 1).then_some(0))
        });

    let written = match position {
        Some(i) => {
            let variant = &mut product.variants[i];
            if scraped.ean.is_some() && variant.ean != ean {
                tracing::info!(
                    product_id = %product.id,
                    placeholder = %variant.ean,
                    ean = %ean,
                    "replacing placeholder EAN with scraped barcode"
                );
                variant.ean.clone_from(&ean);
            }
            refresh_variant(variant, scraped);
            variant.ean.clone()
        }
        None => {
            product.variants.push(variant_of(scraped, ean.clone()));
            ean
        }
    };

    if !prior.is_empty() {
        let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut product.variants)
            .into_iter()
            .partition(|v| prior.contains(&v.ean));
        product.variants = kept;
        if let Some(target) = product.variants.iter_mut().find(|v| v.ean == written) {
            for image in stale.into_iter().flat_map(|v| v.images) {
                if !target.images.contains(&image) {
                    target.images.push(image);
                }
            }
        }
    }

    if product.image.is_none() {
        product.image = scraped.images.first().cloned();
    }
    if let Some(link) = brand {
        product.brand_id = Some(link.id);
        product.brand_name = Some(link.name.clone());
    }
    if master_category_id.is_some() {
        product.master_category_id = master_category_id;
    }
    product.price = scraped.price.or(product.price);
    product.available = product.variants.iter().any(|v| v.available);

    let mut source = source_of(scraped, now);
    match product.sources.iter_mut().find(|s| s.store == scraped.store) {
        Some(existing) => {
            if source.store_product_id.is_none() {
                source.store_product_id = existing.store_product_id.take();
            }
            *existing = source;
        }
        None => product.sources.push(source),
    }

    let (confidence_score, data_quality) = quality_of(scraped, brand, master_category_id);
    let meta = &mut product.scraping_metadata;
    meta.update_count += 1;
    meta.last_updated_at = now;
    meta.confidence_score = confidence_score;
    meta.data_quality = data_quality;
    meta.validation_errors.clone_from(&scraped.validation_errors);
    written
}

/// Moves a duplicate product's variants and sources into `product`.
///
/// Variants whose EAN `product` already carries and sources for stores it
/// already lists are dropped; the scrape being merged decides those.
fn fold_duplicate(product: &mut Product, duplicate: &Product) {
    for variant in &duplicate.variants {
        if !product.variants.iter().any(|v| v.ean == variant.ean) {
            product.variants.push(variant.clone());
        }
    }
    for source in &duplicate.sources {
        if !product.sources.iter().any(|s| s.store == source.store) {
            product.sources.push(source.clone());
        }
    }
    if product.image.is_none() {
        product.image.clone_from(&duplicate.image);
    }
    product.scraping_metadata.first_seen_at = product
        .scraping_metadata
        .first_seen_at
        .min(duplicate.scraping_metadata.first_seen_at);
}

/// What the catalog already holds for a scrape.
struct Existing {
    product: Option<Product>,
    matched_by: IdentityMatch,
    /// Another product still holding this listing (its store id or an
    /// earlier placeholder) after the barcode resolved elsewhere.
    duplicate: Option<Product>,
}

async fn find_existing(
    store: &dyn CatalogStore,
    scraped: &ScrapedProduct,
) -> Result<Existing, StoreError> {
    let mut listing = Vec::new();
    if scraped.ean.is_some() {
        for placeholder in scraped.prior_placeholders() {
            if let Some(product) = store.find_product_by_ean(&placeholder).await? {
                listing.push(product);
            }
        }
    }
    if let Some(id) = &scraped.store_product_id {
        if let Some(product) = store.find_product_by_store_id(&scraped.store, id).await? {
            listing.push(product);
        }
    }

    if let Some(product) = store.find_product_by_ean(&scraped.variant_ean()).await? {
        let duplicate = listing.into_iter().find(|p| p.id != product.id);
        return Ok(Existing {
            product: Some(product),
            matched_by: IdentityMatch::Ean,
            duplicate,
        });
    }

    let mut listing = listing.into_iter();
    if let Some(product) = listing.next() {
        let matched_by = if scraped.store_product_id.is_some()
            && product.source_for(&scraped.store).is_some_and(|s| {
                s.store_product_id.as_deref() == scraped.store_product_id.as_deref()
            }) {
            IdentityMatch::StoreId
        } else {
            IdentityMatch::Ean
        };
        let duplicate = listing.find(|p| p.id != product.id);
        return Ok(Existing {
            product: Some(product),
            matched_by,
            duplicate,
        });
    }

    let slug = scraped.slug();
    if !slug.is_empty() {
        if let Some(product) = store.find_product_by_slug(&slug).await? {
            return Ok(Existing {
                product: Some(product),
                matched_by: IdentityMatch::Slug,
                duplicate: None,
            });
        }
    }
    Ok(Existing {
        product: None,
        matched_by: IdentityMatch::New,
        duplicate: None,
    })
}

fn build(
    existing: &Existing,
    scraped: &ScrapedProduct,
    brand: Option<&BrandLink>,
    master_category_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> (Product, String) {
    match &existing.product {
        Some(product) => {
            let mut merged = product.clone();
            if let Some(duplicate) = &existing.duplicate {
                fold_duplicate(&mut merged, duplicate);
            }
            let ean = merge_scraped(&mut merged, scraped, brand, master_category_id, now);
            (merged, ean)
        }
        None => (
            new_product(scraped, brand, master_category_id, now),
            scraped.variant_ean(),
        ),
    }
}

async fn write(
    store: &dyn CatalogStore,
    candidate: &Product,
    existing: &Existing,
) -> Result<Product, StoreError> {
    match &existing.duplicate {
        Some(duplicate) => {
            tracing::info!(
                product_id = %candidate.id,
                duplicate = %duplicate.id,
                "folding duplicate product for the same listing"
            );
            store.merge_products(candidate, duplicate.id).await
        }
        None => store.upsert_product(candidate).await,
    }
}

/// Finds, merges and persists a scraped product.
///
/// A barcode and a retailer listing that resolve to two different products
/// are the same item: the listing's product is folded into the barcode
/// owner. A write rejected with [`StoreError::Conflict`] means another job
/// stored the key first, so the catalog is read again and the scrape is
/// merged into the winner. Only if that write is rejected too is the
/// barcode dropped, recorded in `validation_errors`, and the product
/// written under its placeholder.
///
/// # Errors
///
/// Returns [`MatchingError::Store`] if a lookup or the final write fails.
pub async fn resolve_product(
    store: &dyn CatalogStore,
    scraped: &ScrapedProduct,
    brand: Option<&BrandLink>,
    master_category_id: Option<Uuid>,
) -> Result<ResolveOutcome, MatchingError> {
    let now = Utc::now();
    let mut existing = find_existing(store, scraped).await?;
    let (mut candidate, mut variant_ean) =
        build(&existing, scraped, brand, master_category_id, now);

    let product = match write(store, &candidate, &existing).await {
        Ok(product) => product,
        Err(StoreError::Conflict(reason)) => {
            tracing::debug!(
                store = %scraped.store,
                product = %scraped.name,
                reason = %reason,
                "product write lost a race, re-reading catalog"
            );
            existing = find_existing(store, scraped).await?;
            (candidate, variant_ean) = build(&existing, scraped, brand, master_category_id, now);
            match write(store, &candidate, &existing).await {
                Ok(product) => product,
                Err(StoreError::Conflict(reason)) if scraped.ean.is_some() => {
                    let ean = scraped.ean.as_deref().unwrap_or_default();
                    tracing::warn!(
                        store = %scraped.store,
                        ean,
                        reason = %reason,
                        "scraped EAN owned by another product, falling back to placeholder"
                    );
                    let mut downgraded = scraped.clone();
                    downgraded.ean = None;
                    downgraded
                        .validation_errors
                        .push(format!("ean {ean} dropped: {reason}"));
                    existing.duplicate = None;
                    (candidate, variant_ean) =
                        build(&existing, &downgraded, brand, master_category_id, now);
                    store.upsert_product(&candidate).await?
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ResolveOutcome {
        created: existing.product.is_none(),
        product,
        matched_by: existing.matched_by,
        variant_ean,
        absorbed: existing.duplicate.map(|d| d.id),
    })
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
