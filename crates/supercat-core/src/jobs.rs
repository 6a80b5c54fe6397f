use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories::MappingMethod;

/// The routine a scrape job runs. Jobs of different actions are independent;
/// chaining them is up to whoever enqueues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAction {
    DiscoverCategories,
    CrawlCategory,
    ScrapeProducts,
}

impl JobAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            JobAction::DiscoverCategories => "DISCOVER_CATEGORIES",
            JobAction::CrawlCategory => "CRAWL_CATEGORY",
            JobAction::ScrapeProducts => "SCRAPE_PRODUCTS",
        }
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobAction {
    type Err = String;

    /// Accepts `DISCOVER_CATEGORIES` as well as `discover-categories`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "DISCOVER_CATEGORIES" => Ok(JobAction::DiscoverCategories),
            "CRAWL_CATEGORY" => Ok(JobAction::CrawlCategory),
            "SCRAPE_PRODUCTS" => Ok(JobAction::ScrapeProducts),
            _ => Err(format!("unknown job action: {s}")),
        }
    }
}

/// A unit of work consumed from the job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeJob {
    pub store: String,
    pub action: JobAction,
    #[serde(default)]
    pub category_url: Option<String>,
    /// Names of the ancestors of the category at `category_url`, root first,
    /// including that category itself.
    #[serde(default)]
    pub parent_path: Vec<String>,
}

impl ScrapeJob {
    #[must_use]
    pub fn discover(store: &str) -> Self {
        Self {
            store: store.to_string(),
            action: JobAction::DiscoverCategories,
            category_url: None,
            parent_path: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_category(store: &str, action: JobAction, url: &str, parent_path: Vec<String>) -> Self {
        Self {
            store: store.to_string(),
            action,
            category_url: Some(url.to_string()),
            parent_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedCategorySummary {
    pub name: String,
    pub url: Option<String>,
    pub level: i32,
    pub master_category_id: Option<Uuid>,
    pub master_slug: Option<String>,
    pub method: MappingMethod,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedBrandSummary {
    pub name: String,
    pub brand_id: Option<Uuid>,
    pub source: String,
    pub confidence: f64,
    pub product_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedProductSummary {
    pub product_id: Uuid,
    pub name: String,
    pub ean: String,
    pub brand: Option<String>,
}

/// What a job did. Partial success is normal: `errors` lists every item that
/// failed while the rest were processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub categories: Vec<ScrapedCategorySummary>,
    pub brands: Vec<ScrapedBrandSummary>,
    pub products: Vec<ScrapedProductSummary>,
    pub updated_products: Vec<ScrapedProductSummary>,
    pub errors: Vec<String>,
}

impl JobResult {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for EvidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceLevel::Debug => write!(f, "debug"),
            EvidenceLevel::Info => write!(f, "info"),
            EvidenceLevel::Warn => write!(f, "warn"),
            EvidenceLevel::Error => write!(f, "error"),
        }
    }
}

/// Append-only diagnostic record emitted while scraping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    pub module: String,
    pub store: String,
    pub event_type: String,
    pub level: EvidenceLevel,
    pub message: String,
    pub details: serde_json::Value,
    pub screenshot_path: Option<String>,
    pub html_snapshot_path: Option<String>,
    pub created_at: DateTime<Utc>,
}
