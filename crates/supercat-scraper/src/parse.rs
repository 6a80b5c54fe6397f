//! Parsing of retailer text: prices, package sizes, facet counts.
//!
//! Argentine storefronts print `$ 1.234,56`, but some VTEX themes emit
//! `$1234.5`; both are accepted.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)?)\s*(kgs?|kilos?|grs?|gramos|g|ml|cc|litros?|lts?|l)\b",
    )
    .expect("package size regex is valid")
});

static UNITS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bx\s*(\d+)\s*(?:unidades|uni|un|u)?\b").expect("unit count regex is valid")
});

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*(\d+)\s*\)\s*$").expect("facet count regex is valid"));

/// A package size parsed from a product title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSize {
    pub value: Decimal,
    /// One of `g`, `kg`, `ml`, `l`, `un`.
    pub unit: &'static str,
}

/// Parses a displayed price into a decimal.
///
/// Returns `None` when the text holds no digits. A leading minus is kept so
/// validation can reject negative prices.
#[must_use]
pub fn parse_price(text: &str) -> Option<Decimal> {
    let negative = text.trim_start().starts_with('-');
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && (1..=2).contains(&decimals) {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(dot)) => {
            let decimals = cleaned.len() - dot - 1;
            if cleaned.matches('.').count() > 1 || decimals == 3 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    let value = Decimal::from_str(normalized.trim_matches('.')).ok()?;
    Some(if negative { -value } else { value })
}

/// Parses the package size from a product title: `1L`, `2.25 L`, `500 g`,
/// `1,5 kg`, `900cc`, `x 6 un`.
#[must_use]
pub fn parse_package_size(title: &str) -> Option<PackageSize> {
    if let Some(caps) = PACKAGE_RE.captures(title) {
        let value = Decimal::from_str(&caps[1].replace(',', ".")).ok()?;
        let unit = match caps[2].to_lowercase().as_str() {
            "kg" | "kgs" | "kilo" | "kilos" => "kg",
            "g" | "gr" | "grs" | "gramos" => "g",
            "ml" | "cc" => "ml",
            _ => "l",
        };
        return Some(PackageSize {
            value: value.normalize(),
            unit,
        });
    }
    UNITS_RE.captures(title).and_then(|caps| {
        Some(PackageSize {
            value: Decimal::from_str(&caps[1]).ok()?,
            unit: "un",
        })
    })
}

/// Splits a facet label like `"Arcor (23)"` into name and product count.
#[must_use]
pub fn split_facet_count(label: &str) -> (String, Option<u32>) {
    match COUNT_RE.captures(label) {
        Some(caps) => {
            let name = label[..caps.get(0).map_or(label.len(), |m| m.start())].trim();
            (name.to_string(), caps[1].parse().ok())
        }
        None => (label.trim().to_string(), None),
    }
}

/// Parses a standalone count such as `"23"` or `"(23)"`.
#[must_use]
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Interprets availability flags emitted by storefront markup.
#[must_use]
pub fn parse_available(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "instock" | "in_stock" | "disponible" => Some(true),
        "false" | "0" | "no" | "outofstock" | "out_of_stock" | "sin stock" | "agotado" => {
            Some(false)
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
