//! Validation of raw product records before they reach the catalog.
//!
//! A record is rejected, with every reason listed, when the name is missing or
//! too short, the price is missing or negative, or the URL is not http(s). A
//! bad barcode is not fatal: it is dropped, the identity resolver assigns a
//! placeholder, and the problem is kept in `validation_errors`.

use std::collections::BTreeMap;

use supercat_core::ean::{clean_ean, is_valid_ean};
use supercat_core::fields;
use supercat_matching::ScrapedProduct;

use crate::error::ScraperError;
use crate::page::ExtractedRecord;
use crate::parse::{parse_available, parse_package_size, parse_price};

const MIN_NAME_CHARS: usize = 3;

/// A product card (optionally enriched with its detail page) as extracted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawProduct {
    pub fields: ExtractedRecord,
    /// Absolute product URL.
    pub url: Option<String>,
    pub store_product_id: Option<String>,
    pub category_path: Vec<String>,
    /// Absolute image URLs.
    pub images: Vec<String>,
}

fn has_web_scheme(url: &str) -> bool {
    reqwest::Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Validates and converts one raw record.
///
/// # Errors
///
/// Returns [`ScraperError::Validation`] listing every rule the record breaks.
pub fn validate_product(
    raw: &RawProduct,
    store: &str,
    currency: &str,
) -> Result<ScrapedProduct, ScraperError> {
    let name = raw
        .fields
        .get(fields::NAME)
        .map(|n| n.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let mut reasons = Vec::new();

    if name.chars().count() < MIN_NAME_CHARS {
        reasons.push("name missing or too short".to_string());
    }

    let price = match raw.fields.get(fields::PRICE) {
        None => {
            reasons.push("price missing".to_string());
            None
        }
        Some(text) => match parse_price(text) {
            None => {
                reasons.push(format!("price '{text}' is not a number"));
                None
            }
            Some(p) if p.is_sign_negative() => {
                reasons.push(format!("negative price {p}"));
                None
            }
            Some(p) => Some(p),
        },
    };

    if let Some(url) = &raw.url {
        if !has_web_scheme(url) {
            reasons.push(format!("unsupported URL '{url}'"));
        }
    }

    if !reasons.is_empty() {
        return Err(ScraperError::Validation { name, reasons });
    }

    let mut validation_errors = Vec::new();
    let ean = match raw.fields.get(fields::EAN).and_then(clean_ean) {
        Some(code) if is_valid_ean(&code) => Some(code),
        Some(code) => {
            validation_errors.push(format!("invalid EAN '{code}' replaced by placeholder"));
            None
        }
        None => None,
    };

    let mut attributes = BTreeMap::new();
    if let Some(size) = parse_package_size(&name) {
        attributes.insert("package_value".to_string(), size.value.to_string());
        attributes.insert("package_unit".to_string(), size.unit.to_string());
    }

    let available = raw
        .fields
        .get(fields::AVAILABLE)
        .and_then(parse_available)
        .unwrap_or(true);

    Ok(ScrapedProduct {
        store: store.to_string(),
        store_product_id: raw.store_product_id.clone(),
        name,
        url: raw.url.clone(),
        ean,
        sku: raw.fields.get(fields::SKU).map(str::to_string),
        price,
        list_price: raw.fields.get(fields::LIST_PRICE).and_then(parse_price),
        currency: currency.to_string(),
        available,
        images: raw.images.clone(),
        category_path: raw.category_path.clone(),
        attributes,
        brand_text: raw.fields.get(fields::BRAND).map(str::to_string),
        validation_errors,
    })
}
