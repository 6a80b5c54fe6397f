//! Static retailer table: selectors, URL layout and title patterns per store.
//!
//! Behavior never branches on retailer identity. Everything retailer-specific
//! lives in the [`RetailerConfig`] looked up by [`RetailerKey`]; the scraper
//! picks its extraction strategy from [`Platform`] and [`PaginationStrategy`].

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::patterns::{
    BrandPosition, ConfidenceWeights, SupermarketPattern, TitleFormat, TitlePattern,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetailerKey {
    Carrefour,
    Jumbo,
    Disco,
    Vea,
    Dia,
    Coto,
}

impl RetailerKey {
    pub const ALL: [RetailerKey; 6] = [
        RetailerKey::Carrefour,
        RetailerKey::Jumbo,
        RetailerKey::Disco,
        RetailerKey::Vea,
        RetailerKey::Dia,
        RetailerKey::Coto,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RetailerKey::Carrefour => "carrefour",
            RetailerKey::Jumbo => "jumbo",
            RetailerKey::Disco => "disco",
            RetailerKey::Vea => "vea",
            RetailerKey::Dia => "dia",
            RetailerKey::Coto => "coto",
        }
    }
}

impl std::fmt::Display for RetailerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RetailerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        RetailerKey::ALL
            .into_iter()
            .find(|k| k.as_str() == key)
            .ok_or_else(|| format!("unknown retailer: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// VTEX storefronts share one extraction strategy.
    Vtex,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// `?{param}=N`, 1-based.
    QueryPage { param: String },
    /// `?{param}=offset` in steps of `page_size`, 0-based.
    Offset { param: String, page_size: usize },
}

/// Selector for one field inside a record container.
///
/// An empty `selector` addresses the container element itself. With an
/// `attribute` the attribute value is read, otherwise the element's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub selector: String,
    pub attribute: Option<String>,
}

impl FieldSelector {
    #[must_use]
    pub fn text(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: None,
        }
    }

    #[must_use]
    pub fn attr(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_string(),
            attribute: Some(attribute.to_string()),
        }
    }
}

/// A repeated DOM structure: every element matching `container` yields one
/// record with the named fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSelectors {
    pub container: String,
    pub fields: BTreeMap<String, FieldSelector>,
}

impl RecordSelectors {
    #[must_use]
    pub fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: &str, selector: FieldSelector) -> Self {
        self.fields.insert(name.to_string(), selector);
        self
    }
}

/// Field names used in [`RecordSelectors`] across the retailer table.
pub mod fields {
    pub const NAME: &str = "name";
    pub const URL: &str = "url";
    pub const COUNT: &str = "count";
    pub const LOGO: &str = "logo";
    pub const PRICE: &str = "price";
    pub const LIST_PRICE: &str = "list_price";
    pub const IMAGE: &str = "image";
    pub const BRAND: &str = "brand";
    pub const PRODUCT_ID: &str = "product_id";
    pub const EAN: &str = "ean";
    pub const SKU: &str = "sku";
    pub const AVAILABLE: &str = "available";
}

/// Selector sets for one retailer. Every list is tried in order until one
/// yields records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerSelectors {
    /// Selector that signals the page finished rendering.
    pub ready: String,
    pub category_menu: Vec<RecordSelectors>,
    pub subcategories: Vec<RecordSelectors>,
    pub brand_sidebar: Vec<RecordSelectors>,
    pub brand_filter: Vec<RecordSelectors>,
    pub breadcrumb: Vec<RecordSelectors>,
    pub product_grid: Vec<RecordSelectors>,
    pub product_detail: Vec<RecordSelectors>,
}

#[derive(Debug, Clone)]
pub struct RetailerConfig {
    pub key: RetailerKey,
    pub display_name: String,
    pub base_url: String,
    pub platform: Platform,
    pub currency: String,
    pub selectors: RetailerSelectors,
    pub pagination: PaginationStrategy,
    /// Lowercase fragments whose presence in a page means a bot wall.
    pub bot_markers: Vec<String>,
    pub pattern: SupermarketPattern,
}

impl RetailerConfig {
    /// Whether `html` looks like a bot-detection or challenge page.
    #[must_use]
    pub fn looks_blocked(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        self.bot_markers.iter().any(|m| lower.contains(m.as_str()))
    }
}

#[derive(Debug)]
pub struct RetailerRegistry {
    configs: HashMap<RetailerKey, RetailerConfig>,
}

impl RetailerRegistry {
    #[must_use]
    pub fn from_configs(configs: Vec<RetailerConfig>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.key, c)).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, key: RetailerKey) -> Option<&RetailerConfig> {
        self.configs.get(&key)
    }

    /// Looks up a retailer by its string key (`"carrefour"`, `"coto"`, ...).
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&RetailerConfig> {
        key.parse::<RetailerKey>().ok().and_then(|k| self.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetailerConfig> {
        let mut configs: Vec<&RetailerConfig> = self.configs.values().collect();
        configs.sort_by_key(|c| c.key);
        configs.into_iter()
    }
}

static REGISTRY: LazyLock<RetailerRegistry> = LazyLock::new(|| {
    RetailerRegistry::from_configs(vec![
        vtex_retailer(
            RetailerKey::Carrefour,
            "Carrefour",
            "https://www.carrefour.com.ar",
            &["Carrefour", "Carrefour Classic", "Carrefour Extra", "Carrefour Bio"],
            BrandPosition::AfterDescriptor,
            ConfidenceWeights {
                private_label_bonus: 0.1,
                retailer_bonus: 0.05,
            },
        ),
        vtex_retailer(
            RetailerKey::Jumbo,
            "Jumbo",
            "https://www.jumbo.com.ar",
            &["Jumbo", "Cuisine & Co", "Krea"],
            BrandPosition::AfterDescriptor,
            ConfidenceWeights::default(),
        ),
        vtex_retailer(
            RetailerKey::Disco,
            "Disco",
            "https://www.disco.com.ar",
            &["Disco", "Cuisine & Co"],
            BrandPosition::AfterDescriptor,
            ConfidenceWeights::default(),
        ),
        vtex_retailer(
            RetailerKey::Vea,
            "Vea",
            "https://www.vea.com.ar",
            &["Vea", "Cuisine & Co"],
            BrandPosition::AfterDescriptor,
            ConfidenceWeights::default(),
        ),
        vtex_retailer(
            RetailerKey::Dia,
            "Día",
            "https://diaonline.supermercadosdia.com.ar",
            &["Dia", "Día", "Dia %"],
            BrandPosition::AfterDescriptor,
            ConfidenceWeights {
                private_label_bonus: 0.15,
                retailer_bonus: 0.05,
            },
        ),
        coto(),
    ])
});

/// The process-wide retailer table.
#[must_use]
pub fn registry() -> &'static RetailerRegistry {
    &REGISTRY
}

fn title_patterns(formats: &[TitleFormat]) -> Vec<TitlePattern> {
    formats
        .iter()
        .filter_map(|f| match TitlePattern::builtin(*f) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::error!(format = ?f, error = %e, "built-in title pattern failed to compile");
                None
            }
        })
        .collect()
}

fn default_bot_markers() -> Vec<String> {
    [
        "captcha",
        "cf-challenge",
        "access denied",
        "pardon our interruption",
        "are you a robot",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn vtex_selectors() -> RetailerSelectors {
    use fields::{
        AVAILABLE, BRAND, COUNT, EAN, IMAGE, LIST_PRICE, NAME, PRICE, PRODUCT_ID, SKU, URL,
    };

    let menu_link = |container: &str| {
        RecordSelectors::new(container)
            .field(NAME, FieldSelector::text(""))
            .field(URL, FieldSelector::attr("", "href"))
    };

    RetailerSelectors {
        ready: "div[class*=\"vtex-store-components\"], div.render-container, main".to_string(),
        category_menu: vec![
            menu_link("a[class*=\"vtex-menu-2-x-styledLink--menu-item-level-1\"]"),
            menu_link("nav[class*=\"vtex-menu\"] > ul > li > a"),
            menu_link("ul.menu-departamento > li > a"),
        ],
        subcategories: vec![
            menu_link("div[class*=\"filter__container--category-2\"] a"),
            menu_link("a[class*=\"vtex-search-result-3-x-categoryLink\"]"),
        ],
        brand_sidebar: vec![RecordSelectors::new(
            "div[class*=\"vtex-search-result-3-x-filter__container--brand\"] div[class*=\"filterItem\"]",
        )
        .field(NAME, FieldSelector::text("label"))
        .field(COUNT, FieldSelector::text("span[class*=\"productCount\"]"))],
        brand_filter: vec![RecordSelectors::new("a[href*=\"map=brand\"], a[href*=\"/marca/\"]")
            .field(NAME, FieldSelector::text(""))
            .field(URL, FieldSelector::attr("", "href"))],
        breadcrumb: vec![
            RecordSelectors::new("a[class*=\"vtex-breadcrumb-1-x-link\"]")
                .field(NAME, FieldSelector::text("")),
            RecordSelectors::new("ul.breadcrumb li").field(NAME, FieldSelector::text("")),
        ],
        product_grid: vec![
            RecordSelectors::new("section[class*=\"vtex-product-summary-2-x-container\"]")
                .field(NAME, FieldSelector::text("h3, span[class*=\"productName\"]"))
                .field(BRAND, FieldSelector::text("span[class*=\"productBrandName\"]"))
                .field(URL, FieldSelector::attr("a", "href"))
                .field(PRICE, FieldSelector::text("span[class*=\"sellingPriceValue\"], span[class*=\"currencyContainer\"]"))
                .field(LIST_PRICE, FieldSelector::text("span[class*=\"listPriceValue\"]"))
                .field(IMAGE, FieldSelector::attr("img", "src"))
                .field(PRODUCT_ID, FieldSelector::attr("", "data-product-id"))
                .field(EAN, FieldSelector::attr("", "data-ean"))
                .field(AVAILABLE, FieldSelector::attr("", "data-available")),
            RecordSelectors::new("div[class*=\"galleryItem\"]")
                .field(NAME, FieldSelector::text("h3, span[class*=\"productName\"]"))
                .field(BRAND, FieldSelector::text("span[class*=\"productBrandName\"]"))
                .field(URL, FieldSelector::attr("a", "href"))
                .field(PRICE, FieldSelector::text("span[class*=\"sellingPrice\"]"))
                .field(IMAGE, FieldSelector::attr("img", "src")),
        ],
        product_detail: vec![RecordSelectors::new("body")
            .field(EAN, FieldSelector::text("span[class*=\"product-identifier__value\"], td[data-specification=\"EAN\"]"))
            .field(SKU, FieldSelector::text("span[class*=\"skuReference\"]"))
            .field(IMAGE, FieldSelector::attr("img[class*=\"vtex-store-components-3-x-productImageTag\"]", "src"))],
    }
}

fn vtex_retailer(
    key: RetailerKey,
    display_name: &str,
    base_url: &str,
    private_labels: &[&str],
    brand_position: BrandPosition,
    weights: ConfidenceWeights,
) -> RetailerConfig {
    RetailerConfig {
        key,
        display_name: display_name.to_string(),
        base_url: base_url.to_string(),
        platform: Platform::Vtex,
        currency: "ARS".to_string(),
        selectors: vtex_selectors(),
        pagination: PaginationStrategy::QueryPage {
            param: "page".to_string(),
        },
        bot_markers: default_bot_markers(),
        pattern: SupermarketPattern {
            private_labels: private_labels.iter().map(|s| (*s).to_string()).collect(),
            title_patterns: title_patterns(&[
                TitleFormat::Bracketed,
                TitleFormat::DashSeparated,
                TitleFormat::Trademark,
                TitleFormat::DeBrand,
            ]),
            brand_position,
            weights,
        },
    }
}

fn coto() -> RetailerConfig {
    use fields::{BRAND, COUNT, EAN, IMAGE, NAME, PRICE, PRODUCT_ID, SKU, URL};

    RetailerConfig {
        key: RetailerKey::Coto,
        display_name: "Coto".to_string(),
        base_url: "https://www.cotodigital3.com.ar".to_string(),
        platform: Platform::Custom,
        currency: "ARS".to_string(),
        selectors: RetailerSelectors {
            ready: "#atg_store_content, body".to_string(),
            category_menu: vec![RecordSelectors::new("#atg_store_catNav > li > a, ul.atg_store_facetsGroup_options a")
                .field(NAME, FieldSelector::text(""))
                .field(URL, FieldSelector::attr("", "href"))],
            subcategories: vec![RecordSelectors::new("#atg_store_dimensionRefinement a")
                .field(NAME, FieldSelector::text("div.atg_store_refinementName, span"))
                .field(URL, FieldSelector::attr("", "href"))],
            brand_sidebar: vec![RecordSelectors::new("#atg_store_refinementMarca li")
                .field(NAME, FieldSelector::text("a"))
                .field(URL, FieldSelector::attr("a", "href"))
                .field(COUNT, FieldSelector::text("span.productCount"))],
            brand_filter: vec![],
            breadcrumb: vec![RecordSelectors::new("#atg_store_breadcrumbs a, #atg_store_breadcrumbs span")
                .field(NAME, FieldSelector::text(""))],
            product_grid: vec![RecordSelectors::new("li[id^=\"li_prod\"]")
                .field(NAME, FieldSelector::text("div.descrip_full, span.span_productName"))
                .field(URL, FieldSelector::attr("a", "href"))
                .field(PRICE, FieldSelector::text("span.atg_store_newPrice"))
                .field(IMAGE, FieldSelector::attr("img", "src"))
                .field(PRODUCT_ID, FieldSelector::attr("", "id"))
                .field(BRAND, FieldSelector::text("span.product_brand"))],
            product_detail: vec![RecordSelectors::new("body")
                .field(EAN, FieldSelector::text("span.span_codigoplu, #ean"))
                .field(SKU, FieldSelector::text("span.span_codigoSKU"))
                .field(IMAGE, FieldSelector::attr("img.zoomImage1", "src"))],
        },
        pagination: PaginationStrategy::Offset {
            param: "No".to_string(),
            page_size: 24,
        },
        bot_markers: default_bot_markers(),
        pattern: SupermarketPattern {
            private_labels: vec!["Coto".to_string()],
            title_patterns: title_patterns(&[TitleFormat::Bracketed, TitleFormat::Trademark]),
            brand_position: BrandPosition::Trailing,
            weights: ConfidenceWeights {
                private_label_bonus: 0.1,
                retailer_bonus: 0.0,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_is_registered() {
        for key in RetailerKey::ALL {
            let config = registry().get(key).expect("retailer registered");
            assert_eq!(config.key, key);
            assert!(config.base_url.starts_with("https://"));
            assert!(!config.selectors.product_grid.is_empty());
        }
    }

    #[test]
    fn lookup_by_string_is_case_insensitive() {
        assert_eq!(registry().lookup("Carrefour").map(|c| c.key), Some(RetailerKey::Carrefour));
        assert!(registry().lookup("walmart").is_none());
    }

    #[test]
    fn vtex_retailers_share_platform_and_pagination() {
        for key in [
            RetailerKey::Carrefour,
            RetailerKey::Jumbo,
            RetailerKey::Disco,
            RetailerKey::Vea,
            RetailerKey::Dia,
        ] {
            let config = registry().get(key).unwrap();
            assert_eq!(config.platform, Platform::Vtex);
            assert!(matches!(config.pagination, PaginationStrategy::QueryPage { .. }));
        }
        let coto = registry().get(RetailerKey::Coto).unwrap();
        assert_eq!(coto.platform, Platform::Custom);
        assert!(matches!(
            coto.pagination,
            PaginationStrategy::Offset { page_size: 24, .. }
        ));
    }

    #[test]
    fn all_title_patterns_compile() {
        let carrefour = registry().get(RetailerKey::Carrefour).unwrap();
        assert_eq!(carrefour.pattern.title_patterns.len(), 4);
    }

    #[test]
    fn bot_markers_are_case_insensitive() {
        let config = registry().get(RetailerKey::Jumbo).unwrap();
        assert!(config.looks_blocked("<title>Access Denied</title>"));
        assert!(!config.looks_blocked("<html><body>Leche</body></html>"));
    }

    #[test]
    fn retailer_key_display_roundtrips() {
        for key in RetailerKey::ALL {
            assert_eq!(key.to_string().parse::<RetailerKey>(), Ok(key));
        }
    }
}
