//! Supermarket pattern registry: per-retailer private labels, product-title
//! formats that expose the brand, and the confidence weights applied when a
//! match is made in that retailer's context.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// Product-title layouts that carry the brand in a recognizable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleFormat {
    /// `[Marolio] Aceite de Girasol 900ml`
    Bracketed,
    /// `Arcor - Bon o Bon x 16`
    DashSeparated,
    /// `Coca-Cola® Gaseosa 2.25L`
    Trademark,
    /// `Dulce de leche de La Serenísima 400g`
    DeBrand,
}

impl TitleFormat {
    /// Regex source for this format. Every pattern names its capture `brand`.
    #[must_use]
    pub fn default_pattern(self) -> &'static str {
        match self {
            TitleFormat::Bracketed => r"\[(?P<brand>[^\]]{2,40})\]",
            TitleFormat::DashSeparated => r"^\s*(?P<brand>[^\-–]{2,40}?)\s+[\-–]\s+\S",
            TitleFormat::Trademark => r"(?P<brand>[\p{L}\p{N}][\p{L}\p{N}'&.\- ]{0,40}?)\s*[®™]",
            TitleFormat::DeBrand => {
                r"\b(?:de|by)\s+(?P<brand>\p{Lu}[\p{L}\p{N}'&.\-]*(?:\s+\p{Lu}[\p{L}\p{N}'&.\-]*){0,3})"
            }
        }
    }
}

/// A compiled title regex.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    pub format: TitleFormat,
    pub regex: Regex,
}

impl TitlePattern {
    /// Compiles a pattern from its regex source.
    ///
    /// # Errors
    ///
    /// Returns the regex error for invalid sources.
    pub fn new(format: TitleFormat, source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            format,
            regex: Regex::new(source)?,
        })
    }

    /// Compiles the built-in regex for `format`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the built-in source fails to compile.
    pub fn builtin(format: TitleFormat) -> Result<Self, regex::Error> {
        Self::new(format, format.default_pattern())
    }

    /// All brand captures this pattern finds in `title`, trimmed, in order.
    #[must_use]
    pub fn captures(&self, title: &str) -> Vec<String> {
        self.regex
            .captures_iter(title)
            .filter_map(|caps| caps.name("brand"))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Where a retailer usually places the brand in product titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrandPosition {
    /// `Marolio Aceite de Girasol`
    Leading,
    /// `Gaseosa Coca-Cola Sabor Original` (after the product noun)
    AfterDescriptor,
    Trailing,
}

impl BrandPosition {
    /// Expected word index of the brand in a title of `word_count` words.
    #[must_use]
    pub fn expected_word(self, word_count: usize) -> usize {
        match self {
            BrandPosition::Leading => 0,
            BrandPosition::AfterDescriptor => 1.min(word_count.saturating_sub(1)),
            BrandPosition::Trailing => word_count.saturating_sub(1),
        }
    }
}

/// Score adjustments applied when matching in a retailer's context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    /// Added when the matched brand is one of the retailer's private labels.
    pub private_label_bonus: f64,
    /// Added to every fuzzy match made for this retailer.
    pub retailer_bonus: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            private_label_bonus: 0.1,
            retailer_bonus: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupermarketPattern {
    pub private_labels: Vec<String>,
    pub title_patterns: Vec<TitlePattern>,
    pub brand_position: BrandPosition,
    pub weights: ConfidenceWeights,
}

impl SupermarketPattern {
    #[must_use]
    pub fn is_private_label(&self, brand_name: &str) -> bool {
        let key = normalize(brand_name);
        self.private_labels.iter().any(|l| normalize(l) == key)
    }

    /// Every `(format, captured brand text)` pair the title patterns find, in
    /// pattern order.
    #[must_use]
    pub fn detect(&self, title: &str) -> Vec<(TitleFormat, String)> {
        self.title_patterns
            .iter()
            .flat_map(|p| p.captures(title).into_iter().map(move |c| (p.format, c)))
            .collect()
    }

    /// Bonus for a fuzzy match of `brand_name` in this retailer, capped so the
    /// boosted score never exceeds `1.0` when added to a similarity.
    #[must_use]
    pub fn bonus_for(&self, brand_name: &str) -> f64 {
        let mut bonus = self.weights.retailer_bonus;
        if self.is_private_label(brand_name) {
            bonus += self.weights.private_label_bonus;
        }
        bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_formats() -> SupermarketPattern {
        SupermarketPattern {
            private_labels: vec!["Carrefour".to_string(), "Carrefour Classic".to_string()],
            title_patterns: [
                TitleFormat::Bracketed,
                TitleFormat::DashSeparated,
                TitleFormat::Trademark,
                TitleFormat::DeBrand,
            ]
            .into_iter()
            .map(|f| TitlePattern::builtin(f).expect("built-in pattern compiles"))
            .collect(),
            brand_position: BrandPosition::AfterDescriptor,
            weights: ConfidenceWeights::default(),
        }
    }

    #[test]
    fn bracketed_title_captures_brand() {
        let hits = all_formats().detect("[Marolio] Aceite de Girasol 900ml");
        assert!(hits.contains(&(TitleFormat::Bracketed, "Marolio".to_string())));
    }

    #[test]
    fn dash_separated_title_captures_brand() {
        let hits = all_formats().detect("Arcor - Bon o Bon x 16");
        assert!(hits.contains(&(TitleFormat::DashSeparated, "Arcor".to_string())));
    }

    #[test]
    fn hyphenated_brand_is_not_dash_separated() {
        let hits = all_formats().detect("Coca-Cola® Gaseosa 2.25L");
        assert!(hits.iter().all(|(f, _)| *f != TitleFormat::DashSeparated));
        assert!(hits.contains(&(TitleFormat::Trademark, "Coca-Cola".to_string())));
    }

    #[test]
    fn de_brand_captures_capitalized_run() {
        let hits = all_formats().detect("Dulce de leche de La Serenísima 400g");
        assert!(hits.contains(&(TitleFormat::DeBrand, "La Serenísima".to_string())));
    }

    #[test]
    fn plain_title_detects_nothing() {
        assert!(all_formats().detect("gaseosa sabor cola 2 litros").is_empty());
    }

    #[test]
    fn private_label_lookup_is_normalized() {
        let pattern = all_formats();
        assert!(pattern.is_private_label("CARREFOUR classic"));
        assert!(!pattern.is_private_label("Arcor"));
    }

    #[test]
    fn bonus_stacks_private_label_and_retailer() {
        let pattern = all_formats();
        assert!((pattern.bonus_for("Carrefour") - 0.15).abs() < 1e-9);
        assert!((pattern.bonus_for("Arcor") - 0.05).abs() < 1e-9);
    }

    #[test]
    fn expected_word_positions() {
        assert_eq!(BrandPosition::Leading.expected_word(4), 0);
        assert_eq!(BrandPosition::AfterDescriptor.expected_word(4), 1);
        assert_eq!(BrandPosition::AfterDescriptor.expected_word(1), 0);
        assert_eq!(BrandPosition::Trailing.expected_word(4), 3);
        assert_eq!(BrandPosition::Trailing.expected_word(0), 0);
    }
}
