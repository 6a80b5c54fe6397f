//! Retailer adapter: drives a [`Page`] through one retailer's layout.
//!
//! Everything retailer-specific comes from the [`RetailerConfig`]; the only
//! behavior that differs is the small [`ExtractionStrategy`] picked by
//! platform, shared by every VTEX storefront.

use std::time::Duration;

use reqwest::Url;
use supercat_core::{fields, registry, PaginationStrategy, Platform, RecordSelectors, RetailerConfig};

use crate::error::ScraperError;
use crate::extractor::{
    candidates_from_breadcrumb, candidates_from_records, categories_from_records,
    dedupe_candidates, BrandSource, CandidateBrand, RawCategory,
};
use crate::page::{ExtractedRecord, Page};
use crate::validation::RawProduct;

#[derive(Debug, Clone, Copy)]
pub struct CrawlOptions {
    pub max_pages: usize,
    /// Upper bound on a single navigation.
    pub page_timeout: Duration,
    pub inter_request_delay: Duration,
    /// How long to wait for the ready selector after navigating.
    pub wait_timeout: Duration,
    pub fetch_product_details: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 20,
            page_timeout: Duration::from_secs(60),
            inter_request_delay: Duration::from_millis(500),
            wait_timeout: Duration::from_secs(15),
            fetch_product_details: false,
        }
    }
}

/// What a category page yields besides its products.
#[derive(Debug, Clone, Default)]
pub struct CategoryListing {
    pub subcategories: Vec<RawCategory>,
    pub brands: Vec<CandidateBrand>,
    pub breadcrumb: Vec<String>,
}

/// Products from a paginated category plus the pages or details that failed
/// after the first page loaded.
#[derive(Debug, Clone, Default)]
pub struct ProductListing {
    pub products: Vec<RawProduct>,
    pub pages_visited: usize,
    pub errors: Vec<String>,
}

trait ExtractionStrategy: Send + Sync {
    fn product_id(&self, record: &ExtractedRecord, url: Option<&str>) -> Option<String>;

    fn canonical_product_url(&self, url: Url) -> Url;
}

fn last_path_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();
    segments.last().map(|s| (*s).to_string())
}

/// VTEX: product ids come from `data-product-id`, otherwise from the
/// `/{slug}/p` URL. Product URLs carry tracking and SKU queries that are
/// dropped.
struct VtexStrategy;

impl ExtractionStrategy for VtexStrategy {
    fn product_id(&self, record: &ExtractedRecord, url: Option<&str>) -> Option<String> {
        if let Some(id) = record.get(fields::PRODUCT_ID) {
            return Some(id.to_string());
        }
        let parsed = Url::parse(url?).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [.., slug, "p"] => Some((*slug).to_string()),
            [.., slug] => Some((*slug).to_string()),
            [] => None,
        }
    }

    fn canonical_product_url(&self, mut url: Url) -> Url {
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

/// Custom storefronts: element ids like `li_prod00012345`, query-driven URLs
/// that must be kept.
struct CustomStrategy;

impl ExtractionStrategy for CustomStrategy {
    fn product_id(&self, record: &ExtractedRecord, url: Option<&str>) -> Option<String> {
        let from_attr = record
            .get(fields::PRODUCT_ID)
            .map(|id| id.trim_start_matches(|c: char| !c.is_ascii_digit()).to_string())
            .filter(|id| !id.is_empty());
        from_attr.or_else(|| last_path_segment(url?))
    }

    fn canonical_product_url(&self, mut url: Url) -> Url {
        url.set_fragment(None);
        url
    }
}

pub struct RetailerAdapter {
    config: &'static RetailerConfig,
    strategy: Box<dyn ExtractionStrategy>,
}

impl RetailerAdapter {
    #[must_use]
    pub fn new(config: &'static RetailerConfig) -> Self {
        let strategy: Box<dyn ExtractionStrategy> = match config.platform {
            Platform::Vtex => Box::new(VtexStrategy),
            Platform::Custom => Box::new(CustomStrategy),
        };
        Self { config, strategy }
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] for a key not in the table.
    pub fn for_store(store: &str) -> Result<Self, ScraperError> {
        registry()
            .lookup(store)
            .map(Self::new)
            .ok_or_else(|| ScraperError::UnknownRetailer(store.to_string()))
    }

    #[must_use]
    pub fn config(&self) -> &'static RetailerConfig {
        self.config
    }

    #[must_use]
    pub fn store(&self) -> &'static str {
        self.config.key.as_str()
    }

    /// Resolves `href` against the retailer's base URL.
    #[must_use]
    pub fn resolve_url(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
            return None;
        }
        Url::parse(&self.config.base_url)
            .ok()?
            .join(href)
            .ok()
            .map(String::from)
    }

    fn resolve_product_url(&self, href: &str) -> Option<String> {
        let url = Url::parse(&self.resolve_url(href)?).ok()?;
        Some(self.strategy.canonical_product_url(url).to_string())
    }

    /// URL of the `index`-th (0-based) listing page of a category.
    #[must_use]
    pub fn page_url(&self, category_url: &str, index: usize) -> Option<String> {
        if index == 0 {
            return Some(category_url.to_string());
        }
        let (param, value) = match &self.config.pagination {
            PaginationStrategy::QueryPage { param } => (param, index + 1),
            PaginationStrategy::Offset { param, page_size } => (param, index * page_size),
        };
        let mut url = Url::parse(category_url).ok()?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != param.as_str())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(param, &value.to_string());
        Some(url.to_string())
    }

    async fn open(
        &self,
        page: &mut dyn Page,
        url: &str,
        opts: &CrawlOptions,
    ) -> Result<(), ScraperError> {
        tokio::time::timeout(opts.page_timeout, page.goto(url))
            .await
            .map_err(|_| ScraperError::Timeout {
                what: format!("navigation to {url}"),
                secs: opts.page_timeout.as_secs(),
            })??;
        let ready = &self.config.selectors.ready;
        if !page.wait_for_selector(ready, opts.wait_timeout).await? {
            tracing::warn!(
                store = self.store(),
                url,
                selector = %ready,
                "ready selector not found, extracting anyway"
            );
        }
        Ok(())
    }

    /// Tries each selector set in order and returns the first non-empty
    /// result. A miss on every set is logged and yields no records.
    async fn extract_first(
        &self,
        page: &mut dyn Page,
        specs: &[RecordSelectors],
        what: &str,
    ) -> Result<Vec<ExtractedRecord>, ScraperError> {
        for spec in specs {
            match page.extract(spec).await {
                Ok(records) if !records.is_empty() => return Ok(records),
                Ok(_) => {
                    tracing::debug!(store = self.store(), what, selector = %spec.container, "selector matched nothing");
                }
                Err(e @ ScraperError::InvalidSelector { .. }) => {
                    tracing::warn!(store = self.store(), what, error = %e, "skipping invalid selector");
                }
                Err(e) => return Err(e),
            }
        }
        if !specs.is_empty() {
            let failure = ScraperError::SelectorFailure {
                what: what.to_string(),
                url: page.current_url().unwrap_or_default().to_string(),
            };
            tracing::warn!(store = self.store(), error = %failure, "no selector in fallback list matched");
        }
        Ok(Vec::new())
    }

    /// Top-level categories from the home page menu.
    ///
    /// # Errors
    ///
    /// Propagates navigation failures.
    pub async fn discover_categories(
        &self,
        page: &mut dyn Page,
        opts: &CrawlOptions,
    ) -> Result<Vec<RawCategory>, ScraperError> {
        self.open(page, &self.config.base_url, opts).await?;
        let records = self
            .extract_first(page, &self.config.selectors.category_menu, "category menu")
            .await?;
        Ok(categories_from_records(&records, 1, &[], |href| self.resolve_url(href)))
    }

    /// Subcategories, candidate brands and breadcrumb of a category page.
    ///
    /// `parent_path` names the crawled category's ancestors including itself,
    /// so subcategories sit one level below it.
    ///
    /// # Errors
    ///
    /// Propagates navigation failures.
    pub async fn crawl_category(
        &self,
        page: &mut dyn Page,
        url: &str,
        parent_path: &[String],
        opts: &CrawlOptions,
    ) -> Result<CategoryListing, ScraperError> {
        self.open(page, url, opts).await?;
        let selectors = &self.config.selectors;
        let resolve = |href: &str| self.resolve_url(href);

        let level = i32::try_from(parent_path.len()).unwrap_or(i32::MAX).saturating_add(1);
        let sub_records = self
            .extract_first(page, &selectors.subcategories, "subcategories")
            .await?;
        let subcategories = categories_from_records(&sub_records, level, parent_path, resolve);

        let sidebar = self
            .extract_first(page, &selectors.brand_sidebar, "brand sidebar")
            .await?;
        let filter = self
            .extract_first(page, &selectors.brand_filter, "brand filter")
            .await?;
        let breadcrumb: Vec<String> = self
            .extract_first(page, &selectors.breadcrumb, "breadcrumb")
            .await?
            .iter()
            .filter_map(|r| r.get(fields::NAME).map(str::to_string))
            .collect();
        let grid = self
            .extract_first(page, &selectors.product_grid, "product grid")
            .await?;

        let mut brands = candidates_from_records(BrandSource::Sidebar, &sidebar, resolve);
        brands.extend(candidates_from_records(BrandSource::Filter, &filter, resolve));
        brands.extend(candidates_from_breadcrumb(&breadcrumb, parent_path));
        brands.extend(candidates_from_records(BrandSource::Product, &grid, resolve));

        Ok(CategoryListing {
            subcategories,
            brands: dedupe_candidates(brands),
            breadcrumb,
        })
    }

    fn raw_product(&self, record: ExtractedRecord, category_path: &[String]) -> RawProduct {
        let url = record
            .get(fields::URL)
            .and_then(|href| self.resolve_product_url(href));
        let images = record
            .get(fields::IMAGE)
            .and_then(|src| self.resolve_url(src))
            .into_iter()
            .collect();
        RawProduct {
            store_product_id: self.strategy.product_id(&record, url.as_deref()),
            url,
            category_path: category_path.to_vec(),
            images,
            fields: record,
        }
    }

    /// Walks the category's listing pages until one is empty, repeats the
    /// previous page, or `max_pages` is reached.
    ///
    /// # Errors
    ///
    /// Propagates a navigation failure on the first page. Later page and
    /// detail failures are collected in [`ProductListing::errors`].
    pub async fn scrape_products(
        &self,
        page: &mut dyn Page,
        category_url: &str,
        category_path: &[String],
        opts: &CrawlOptions,
    ) -> Result<ProductListing, ScraperError> {
        let mut listing = ProductListing::default();
        let mut previous_first: Option<String> = None;

        for index in 0..opts.max_pages.max(1) {
            let Some(url) = self.page_url(category_url, index) else {
                break;
            };
            if index > 0 && !opts.inter_request_delay.is_zero() {
                tokio::time::sleep(opts.inter_request_delay).await;
            }
            if let Err(e) = self.open(page, &url, opts).await {
                if index == 0 {
                    return Err(e);
                }
                tracing::warn!(store = self.store(), url = %url, error = %e, "listing page failed, stopping pagination");
                listing.errors.push(format!("{url}: {e}"));
                break;
            }
            listing.pages_visited += 1;

            let records = self
                .extract_first(page, &self.config.selectors.product_grid, "product grid")
                .await?;
            let products: Vec<RawProduct> = records
                .into_iter()
                .map(|r| self.raw_product(r, category_path))
                .collect();
            let Some(first) = products.first() else {
                break;
            };
            let first_key = first
                .store_product_id
                .clone()
                .or_else(|| first.url.clone());
            if index > 0 && first_key.is_some() && first_key == previous_first {
                tracing::debug!(store = self.store(), url = %url, "listing page repeats the previous one");
                break;
            }
            previous_first = first_key;
            listing.products.extend(products);
        }

        if opts.fetch_product_details {
            self.enrich_with_details(page, &mut listing, opts).await;
        }
        Ok(listing)
    }

    /// Fills EAN, SKU and images from each product's detail page.
    async fn enrich_with_details(
        &self,
        page: &mut dyn Page,
        listing: &mut ProductListing,
        opts: &CrawlOptions,
    ) {
        for product in &mut listing.products {
            let Some(url) = product.url.clone() else {
                continue;
            };
            if !opts.inter_request_delay.is_zero() {
                tokio::time::sleep(opts.inter_request_delay).await;
            }
            let detail = match self.open(page, &url, opts).await {
                Ok(()) => {
                    self.extract_first(page, &self.config.selectors.product_detail, "product detail")
                        .await
                }
                Err(e) => Err(e),
            };
            match detail {
                Ok(records) => {
                    let Some(record) = records.into_iter().next() else {
                        continue;
                    };
                    for field in [fields::EAN, fields::SKU] {
                        if product.fields.get(field).is_none() {
                            if let Some(value) = record.get(field) {
                                product.fields.insert(field, value);
                            }
                        }
                    }
                    if let Some(image) = record.get(fields::IMAGE).and_then(|s| self.resolve_url(s)) {
                        if !product.images.contains(&image) {
                            product.images.push(image);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(store = self.store(), url = %url, error = %e, "product detail failed");
                    listing.errors.push(format!("{url}: {e}"));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod tests;
