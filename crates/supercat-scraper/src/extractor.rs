//! Turns raw DOM records into candidate brands and store categories.
//!
//! Each candidate carries the confidence of the place it was found: a brand
//! facet in the sidebar is far more trustworthy than the brand line printed on
//! a single product card.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use supercat_core::fields;
use supercat_core::text::normalize;

use crate::page::ExtractedRecord;
use crate::parse::{parse_count, split_facet_count};

/// Labels that show up in brand facets and menus but are never a brand or a
/// category.
const BLACKLIST: &[&str] = &[
    "ver todo",
    "ver todos",
    "ver mas",
    "ver menos",
    "todas",
    "todos",
    "todas las marcas",
    "otras marcas",
    "otros",
    "varios",
    "generico",
    "sin marca",
    "marca",
    "marcas",
    "inicio",
    "home",
    "ofertas",
    "promociones",
    "mostrar mas",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandSource {
    Sidebar,
    Filter,
    Breadcrumb,
    Product,
}

impl BrandSource {
    #[must_use]
    pub fn base_confidence(self) -> f64 {
        match self {
            BrandSource::Sidebar => 0.9,
            BrandSource::Filter => 0.85,
            BrandSource::Breadcrumb => 0.6,
            BrandSource::Product => 0.5,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BrandSource::Sidebar => "sidebar",
            BrandSource::Filter => "filter",
            BrandSource::Breadcrumb => "breadcrumb",
            BrandSource::Product => "product",
        }
    }

    /// Retailer facet lists name brands explicitly.
    #[must_use]
    pub fn is_facet(self) -> bool {
        matches!(self, BrandSource::Sidebar | BrandSource::Filter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateBrand {
    pub name: String,
    pub url: Option<String>,
    pub product_count: Option<u32>,
    pub logo: Option<String>,
    pub confidence: f64,
    pub source: BrandSource,
}

/// A retailer category node found in a menu or a subcategory list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCategory {
    pub name: String,
    pub url: Option<String>,
    pub level: i32,
    /// Ancestors, root first, excluding this category.
    pub parent_path: Vec<String>,
}

fn is_blacklisted(name: &str) -> bool {
    let key = normalize(name);
    key.chars().count() < 2
        || key.chars().all(|c| c.is_ascii_digit() || c == ' ')
        || BLACKLIST.contains(&key.as_str())
}

/// Case, diacritic and space-insensitive identity of a name.
#[must_use]
pub fn dedupe_key(name: &str) -> String {
    normalize(name).replace(' ', "")
}

/// Builds candidates from facet or product records.
///
/// The `name` field may carry a trailing `(23)` count; an explicit `count`
/// field wins over it. URLs are resolved with `resolve`.
pub fn candidates_from_records(
    source: BrandSource,
    records: &[ExtractedRecord],
    resolve: impl Fn(&str) -> Option<String>,
) -> Vec<CandidateBrand> {
    records
        .iter()
        .filter_map(|record| {
            let field = if source == BrandSource::Product {
                fields::BRAND
            } else {
                fields::NAME
            };
            let (name, inline_count) = split_facet_count(record.get(field)?);
            if is_blacklisted(&name) {
                return None;
            }
            Some(CandidateBrand {
                name,
                url: record.get(fields::URL).and_then(&resolve),
                product_count: record.get(fields::COUNT).and_then(parse_count).or(inline_count),
                logo: record.get(fields::LOGO).and_then(&resolve),
                confidence: source.base_confidence(),
                source,
            })
        })
        .collect()
}

/// Breadcrumb entries that are neither the home link nor one of the known
/// category names.
#[must_use]
pub fn candidates_from_breadcrumb(crumbs: &[String], category_path: &[String]) -> Vec<CandidateBrand> {
    let known: Vec<String> = category_path.iter().map(|c| dedupe_key(c)).collect();
    crumbs
        .iter()
        .map(|c| c.trim())
        .filter(|c| !is_blacklisted(c) && !known.contains(&dedupe_key(c)))
        .map(|name| CandidateBrand {
            name: name.to_string(),
            url: None,
            product_count: None,
            logo: None,
            confidence: BrandSource::Breadcrumb.base_confidence(),
            source: BrandSource::Breadcrumb,
        })
        .collect()
}

/// Keeps the highest-confidence candidate per normalized name, in order of
/// first appearance. Missing url, count and logo are filled from the
/// duplicates.
#[must_use]
pub fn dedupe_candidates(candidates: Vec<CandidateBrand>) -> Vec<CandidateBrand> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<CandidateBrand> = Vec::new();
    for candidate in candidates {
        let key = dedupe_key(&candidate.name);
        match index.get(&key) {
            Some(&i) => {
                let kept = &mut out[i];
                let (mut winner, loser) = if candidate.confidence > kept.confidence {
                    (candidate, kept.clone())
                } else {
                    (kept.clone(), candidate)
                };
                winner.url = winner.url.or(loser.url);
                winner.product_count = winner.product_count.or(loser.product_count);
                winner.logo = winner.logo.or(loser.logo);
                *kept = winner;
            }
            None => {
                index.insert(key, out.len());
                out.push(candidate);
            }
        }
    }
    out
}

/// Category nodes from menu records, minus navigation noise and duplicates.
pub fn categories_from_records(
    records: &[ExtractedRecord],
    level: i32,
    parent_path: &[String],
    resolve: impl Fn(&str) -> Option<String>,
) -> Vec<RawCategory> {
    let mut seen = Vec::new();
    records
        .iter()
        .filter_map(|record| {
            let (name, _) = split_facet_count(record.get(fields::NAME)?);
            if is_blacklisted(&name) {
                return None;
            }
            let key = dedupe_key(&name);
            if seen.contains(&key) {
                return None;
            }
            seen.push(key);
            Some(RawCategory {
                name,
                url: record.get(fields::URL).and_then(&resolve),
                level,
                parent_path: parent_path.to_vec(),
            })
        })
        .collect()
}
