use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ean::is_placeholder_ean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl AvailabilityStatus {
    #[must_use]
    pub fn from_available(available: bool) -> Self {
        if available {
            Self::InStock
        } else {
            Self::OutOfStock
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    High,
    Medium,
    Low,
}

impl DataQuality {
    /// Buckets a `[0, 1]` confidence score: high from 0.8, medium from 0.5.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for DataQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQuality::High => write!(f, "high"),
            DataQuality::Medium => write!(f, "medium"),
            DataQuality::Low => write!(f, "low"),
        }
    }
}

/// One purchasable presentation of a product, identified by its EAN.
///
/// The EAN is globally unique across every product's variants. Variants
/// without a scraped barcode carry a placeholder (see [`crate::ean`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub ean: String,
    pub sku: Option<String>,
    /// Free-form attributes such as `package_value` / `package_unit`.
    pub attributes: BTreeMap<String, String>,
    pub price: Option<Decimal>,
    pub list_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub available: bool,
    pub images: Vec<String>,
}

impl ProductVariant {
    #[must_use]
    pub fn has_placeholder_ean(&self) -> bool {
        is_placeholder_ean(&self.ean)
    }
}

/// A retailer carrying the product. At most one entry per store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSource {
    pub store: String,
    pub store_product_id: Option<String>,
    pub price: Option<Decimal>,
    pub category_path: Vec<String>,
    pub original_url: Option<String>,
    pub last_scraped: DateTime<Utc>,
    pub availability_status: AvailabilityStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingMetadata {
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Zero on creation, incremented by every later write.
    pub update_count: i64,
    pub confidence_score: f64,
    pub data_quality: DataQuality,
    pub validation_errors: Vec<String>,
}

/// A canonical catalog product, merged from every retailer that lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub brand_id: Option<Uuid>,
    pub brand_name: Option<String>,
    pub master_category_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub currency: String,
    pub available: bool,
    /// Cover image. Set once, never replaced by later scrapes.
    pub image: Option<String>,
    pub variants: Vec<ProductVariant>,
    pub sources: Vec<ProductSource>,
    pub scraping_metadata: ScrapingMetadata,
}

impl Product {
    #[must_use]
    pub fn source_for(&self, store: &str) -> Option<&ProductSource> {
        self.sources.iter().find(|s| s.store == store)
    }

    pub fn eans(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.ean.as_str())
    }
}

/// Lowest price among available variants, falling back to the product price.
#[must_use]
pub fn effective_price(product: &Product) -> Option<Decimal> {
    product
        .variants
        .iter()
        .filter(|v| v.available)
        .filter_map(|v| v.price)
        .min()
        .or(product.price)
}

/// The available variant with the lowest price; real barcodes win ties and
/// priced variants win over unpriced ones.
#[must_use]
pub fn best_variant(product: &Product) -> Option<&ProductVariant> {
    product.variants.iter().filter(|v| v.available).min_by(|a, b| {
        let price_order = match (a.price, b.price) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        price_order.then_with(|| a.has_placeholder_ean().cmp(&b.has_placeholder_ean()))
    })
}

#[must_use]
pub fn is_available(product: &Product) -> bool {
    product.available || product.variants.iter().any(|v| v.available)
}

#[must_use]
pub fn has_placeholder_ean(product: &Product) -> bool {
    product.variants.iter().any(ProductVariant::has_placeholder_ean)
}
