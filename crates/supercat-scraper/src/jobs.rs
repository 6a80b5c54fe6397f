//! Scrape job processing.
//!
//! One job runs sequentially against one page context, which is released on
//! every exit path. Per-item failures (a category that cannot be mapped, a
//! brand upsert, an invalid product) land in [`JobResult::errors`]; only
//! failures that stop navigation propagate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use supercat_core::text::slugify;
use supercat_core::{
    AppConfig, BrandThresholds, BrandUpsert, CatalogStore, CategoryMapperSettings,
    CategoryTables, EvidenceLevel, JobAction, JobResult, MasterCategory, ScrapeJob,
    ScrapedBrandSummary, ScrapedCategorySummary, ScrapedProductSummary, StoreCategory,
};
use supercat_matching::{
    map_category, resolve_product, BrandLink, BrandMatcher, CategoryRequest, ScrapedProduct,
};
use uuid::Uuid;

use crate::adapter::{CrawlOptions, RetailerAdapter};
use crate::error::ScraperError;
use crate::evidence::{Evidence, EvidenceLogger};
use crate::extractor::{CandidateBrand, RawCategory};
use crate::page::Page;
use crate::validation::{validate_product, RawProduct};

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub crawl: CrawlOptions,
    pub brand_thresholds: BrandThresholds,
    pub category: CategoryMapperSettings,
}

impl JobSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            crawl: CrawlOptions {
                max_pages: config.scraper_max_pages,
                page_timeout: Duration::from_secs(config.scraper_request_timeout_secs.max(1) * 2),
                inter_request_delay: Duration::from_millis(config.scraper_inter_request_delay_ms),
                wait_timeout: Duration::from_secs(config.scraper_request_timeout_secs.max(1)),
                fetch_product_details: config.scraper_fetch_product_details,
            },
            brand_thresholds: config.brand_thresholds,
            category: config.category_settings,
        }
    }
}

pub struct JobProcessor {
    catalog: Arc<dyn CatalogStore>,
    pages: Arc<dyn crate::page::PageProvider>,
    tables: Arc<CategoryTables>,
    evidence: EvidenceLogger,
    settings: JobSettings,
}

impl JobProcessor {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        pages: Arc<dyn crate::page::PageProvider>,
        tables: Arc<CategoryTables>,
        settings: JobSettings,
    ) -> Self {
        Self {
            catalog,
            pages,
            tables,
            evidence: EvidenceLogger::new("scraper"),
            settings,
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: EvidenceLogger) -> Self {
        self.evidence = evidence;
        self
    }

    /// Runs one job to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] or [`ScraperError::InvalidJob`]
    /// before any page is acquired, and navigation, bot-detection, rate-limit
    /// or reference-data failures that stop the job. Everything else is
    /// reported in the returned [`JobResult`].
    pub async fn process(&self, job: &ScrapeJob) -> Result<JobResult, ScraperError> {
        let adapter = RetailerAdapter::for_store(&job.store)?;
        if job.action != JobAction::DiscoverCategories && job.category_url.is_none() {
            return Err(ScraperError::InvalidJob(format!(
                "{} requires a category URL",
                job.action
            )));
        }

        let started = Instant::now();
        let store = adapter.store();
        tracing::info!(store, action = %job.action, url = job.category_url.as_deref(), "job started");

        let mut page = self.pages.acquire(adapter.config().key).await?;
        let outcome = self.dispatch(&adapter, page.as_mut(), job).await;
        if let Err(e) = &outcome {
            self.record_failure(page.as_mut(), store, job, e).await;
        }
        self.pages.release(page).await;

        let result = outcome?;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            store,
            action = %job.action,
            categories = result.categories.len(),
            brands = result.brands.len(),
            products = result.products.len(),
            updated_products = result.updated_products.len(),
            errors = result.errors.len(),
            elapsed_ms,
            "job finished"
        );
        let level = if result.is_clean() {
            EvidenceLevel::Info
        } else {
            EvidenceLevel::Warn
        };
        self.evidence
            .log(
                Evidence::new(store, "job_completed", level, format!("{} finished", job.action)).details(json!({
                    "action": job.action.as_str(),
                    "categoryUrl": job.category_url,
                    "categories": result.categories.len(),
                    "brands": result.brands.len(),
                    "products": result.products.len(),
                    "updatedProducts": result.updated_products.len(),
                    "errors": result.errors,
                    "elapsedMs": elapsed_ms,
                })),
            )
            .await;
        Ok(result)
    }

    async fn dispatch(
        &self,
        adapter: &RetailerAdapter,
        page: &mut dyn Page,
        job: &ScrapeJob,
    ) -> Result<JobResult, ScraperError> {
        let opts = &self.settings.crawl;
        let url = job.category_url.as_deref().unwrap_or_default();
        let mut result = JobResult::default();
        match job.action {
            JobAction::DiscoverCategories => {
                let categories = adapter.discover_categories(page, opts).await?;
                self.persist_categories(adapter, &categories, &mut result).await?;
            }
            JobAction::CrawlCategory => {
                let listing = adapter
                    .crawl_category(page, url, &job.parent_path, opts)
                    .await?;
                self.persist_categories(adapter, &listing.subcategories, &mut result)
                    .await?;
                self.persist_brands(adapter, &listing.brands, &mut result).await?;
            }
            JobAction::ScrapeProducts => {
                let listing = adapter
                    .scrape_products(page, url, &job.parent_path, opts)
                    .await?;
                result.errors.extend(listing.errors);
                self.persist_products(adapter, job, &listing.products, &mut result)
                    .await?;
            }
        }
        Ok(result)
    }

    async fn record_failure(
        &self,
        page: &mut dyn Page,
        store: &str,
        job: &ScrapeJob,
        error: &ScraperError,
    ) {
        let details = json!({
            "action": job.action.as_str(),
            "categoryUrl": job.category_url,
            "url": page.current_url(),
            "error": error.to_string(),
        });
        if error.is_blocking() {
            let event = match error {
                ScraperError::RateLimited { .. } => "rate_limited",
                _ => "bot_detected",
            };
            tracing::warn!(store, action = %job.action, error = %error, "job blocked by retailer");
            self.evidence
                .capture(
                    page,
                    Evidence::new(store, event, EvidenceLevel::Warn, error.to_string()).details(details),
                )
                .await;
        } else {
            tracing::error!(store, action = %job.action, error = %error, "job failed");
            self.evidence
                .log(Evidence::new(store, "job_failed", EvidenceLevel::Error, error.to_string()).details(details))
                .await;
        }
    }

    async fn persist_categories(
        &self,
        adapter: &RetailerAdapter,
        categories: &[RawCategory],
        result: &mut JobResult,
    ) -> Result<(), ScraperError> {
        if categories.is_empty() {
            return Ok(());
        }
        let store = adapter.store();
        let masters = self.catalog.find_master_categories().await?;
        for raw in categories {
            match self.persist_category(store, &masters, raw).await {
                Ok(summary) => result.categories.push(summary),
                Err(e) => {
                    tracing::warn!(store, category = %raw.name, url = raw.url.as_deref(), error = %e, "failed to persist category");
                    result.errors.push(format!("category '{}': {e}", raw.name));
                }
            }
        }
        Ok(())
    }

    async fn persist_category(
        &self,
        store: &str,
        masters: &[MasterCategory],
        raw: &RawCategory,
    ) -> Result<ScrapedCategorySummary, ScraperError> {
        let request = CategoryRequest {
            store,
            parent_path: &raw.parent_path,
            category_name: &raw.name,
            context: raw.url.as_deref(),
        };
        let mapping = map_category(
            self.catalog.as_ref(),
            masters,
            &self.tables,
            &self.settings.category,
            &request,
        )
        .await?;

        let stored = self
            .catalog
            .upsert_store_category(&StoreCategory {
                id: Uuid::new_v4(),
                store: store.to_string(),
                name: raw.name.clone(),
                slug: slugify(&raw.name),
                level: raw.level,
                url: raw.url.clone(),
                parent_path: raw.parent_path.clone(),
                master_category_id: mapping.master_category_id,
                mapping_confidence: mapping.confidence,
                mapping_method: mapping.method,
                last_seen_at: Utc::now(),
            })
            .await?;

        Ok(ScrapedCategorySummary {
            name: stored.name,
            url: stored.url,
            level: stored.level,
            master_category_id: mapping.master_category_id,
            master_slug: mapping.master_slug,
            method: mapping.method,
            confidence: mapping.confidence,
        })
    }

    /// Facet brands are stored as listed. Breadcrumb and product-card brands
    /// are only stored under the canonical name of a reliable catalog match.
    async fn persist_brands(
        &self,
        adapter: &RetailerAdapter,
        candidates: &[CandidateBrand],
        result: &mut JobResult,
    ) -> Result<(), ScraperError> {
        if candidates.is_empty() {
            return Ok(());
        }
        let store = adapter.store();
        let matcher =
            BrandMatcher::load(self.catalog.as_ref(), self.settings.brand_thresholds).await?;
        let pattern = &adapter.config().pattern;

        for candidate in candidates {
            let (name, confidence) = if candidate.source.is_facet() {
                (candidate.name.clone(), candidate.confidence)
            } else {
                match matcher
                    .extract_brand_from_title(&candidate.name, Some(pattern))
                    .filter(|m| matcher.is_reliable_match(m))
                {
                    Some(m) => (m.brand_name, candidate.confidence.min(m.confidence)),
                    None => {
                        tracing::debug!(store, brand = %candidate.name, source = candidate.source.as_str(), "unconfirmed brand candidate skipped");
                        continue;
                    }
                }
            };

            match self
                .catalog
                .upsert_brand(&BrandUpsert::new(&name, Some(store)))
                .await
            {
                Ok(brand) => result.brands.push(ScrapedBrandSummary {
                    name: brand.name,
                    brand_id: Some(brand.id),
                    source: candidate.source.as_str().to_string(),
                    confidence,
                    product_count: candidate.product_count,
                }),
                Err(e) => {
                    tracing::warn!(store, brand = %name, error = %e, "failed to persist brand");
                    result.errors.push(format!("brand '{name}': {e}"));
                }
            }
        }
        Ok(())
    }

    /// Maps the job's own category (last entry of its path) once for every
    /// product in the listing.
    async fn listing_category(
        &self,
        store: &str,
        parent_path: &[String],
        result: &mut JobResult,
    ) -> Result<Option<Uuid>, ScraperError> {
        let Some((name, ancestors)) = parent_path.split_last() else {
            return Ok(None);
        };
        let masters = self.catalog.find_master_categories().await?;
        let request = CategoryRequest {
            store,
            parent_path: ancestors,
            category_name: name,
            context: None,
        };
        match map_category(
            self.catalog.as_ref(),
            &masters,
            &self.tables,
            &self.settings.category,
            &request,
        )
        .await
        {
            Ok(mapping) => Ok(mapping.master_category_id),
            Err(e) => {
                tracing::warn!(store, category = %name, error = %e, "listing category could not be mapped");
                result.errors.push(format!("category '{name}': {e}"));
                Ok(None)
            }
        }
    }

    fn link_brand(
        matcher: &BrandMatcher,
        adapter: &RetailerAdapter,
        scraped: &ScrapedProduct,
    ) -> Option<BrandLink> {
        let pattern = Some(&adapter.config().pattern);
        let from_title = matcher.extract_brand_from_title(&scraped.name, pattern);
        let found = from_title
            .filter(|m| matcher.is_reliable_match(m))
            .or_else(|| {
                scraped
                    .brand_text
                    .as_deref()
                    .and_then(|text| matcher.extract_brand_from_title(text, pattern))
                    .filter(|m| matcher.is_reliable_match(m))
            })?;
        Some(BrandLink {
            id: found.brand_id,
            name: found.brand_name,
            confidence: found.confidence,
        })
    }

    async fn persist_products(
        &self,
        adapter: &RetailerAdapter,
        job: &ScrapeJob,
        products: &[RawProduct],
        result: &mut JobResult,
    ) -> Result<(), ScraperError> {
        if products.is_empty() {
            return Ok(());
        }
        let store = adapter.store();
        let config = adapter.config();
        let matcher =
            BrandMatcher::load(self.catalog.as_ref(), self.settings.brand_thresholds).await?;
        let master_category_id = self.listing_category(store, &job.parent_path, result).await?;

        for raw in products {
            let scraped = match validate_product(raw, store, &config.currency) {
                Ok(scraped) => scraped,
                Err(e) => {
                    tracing::warn!(store, url = raw.url.as_deref(), error = %e, "product rejected");
                    self.evidence
                        .log(
                            Evidence::new(store, "validation_failed", EvidenceLevel::Warn, e.to_string())
                                .details(json!({"url": raw.url, "fields": raw.fields})),
                        )
                        .await;
                    result.errors.push(e.to_string());
                    continue;
                }
            };

            let brand = Self::link_brand(&matcher, adapter, &scraped);
            match resolve_product(self.catalog.as_ref(), &scraped, brand.as_ref(), master_category_id).await {
                Ok(outcome) => {
                    let summary = ScrapedProductSummary {
                        product_id: outcome.product.id,
                        name: outcome.product.name.clone(),
                        ean: outcome.variant_ean.clone(),
                        brand: outcome.product.brand_name.clone(),
                    };
                    tracing::debug!(
                        store,
                        product_id = %summary.product_id,
                        matched_by = ?outcome.matched_by,
                        created = outcome.created,
                        "product resolved"
                    );
                    if outcome.created {
                        result.products.push(summary);
                    } else {
                        result.updated_products.push(summary);
                    }
                }
                Err(e) => {
                    tracing::warn!(store, product = %scraped.name, url = scraped.url.as_deref(), error = %e, "failed to persist product");
                    result.errors.push(format!("product '{}': {e}", scraped.name));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "jobs_test.rs"]
mod tests;
