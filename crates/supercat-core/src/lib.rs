//! Shared domain model, configuration, and text primitives for the supercat
//! catalog-normalization pipeline.

pub mod app_config;
pub mod brands;
pub mod categories;
pub mod config;
pub mod ean;
pub mod jobs;
pub mod memory;
pub mod patterns;
pub mod products;
pub mod retailers;
pub mod store;
pub mod text;
pub mod thresholds;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use brands::{Brand, BrandUpsert};
pub use categories::{
    load_category_tables, pending_slug, CategoryTables, LocalizedName, MappingMethod,
    MasterCategory, MasterSeed, PendingProvenance, StoreCategory, SynonymGroup,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use jobs::{
    EvidenceLevel, EvidenceRecord, JobAction, JobResult, ScrapeJob, ScrapedBrandSummary,
    ScrapedCategorySummary, ScrapedProductSummary,
};
pub use memory::MemoryCatalog;
pub use patterns::{
    BrandPosition, ConfidenceWeights, SupermarketPattern, TitleFormat, TitlePattern,
};
pub use products::{
    AvailabilityStatus, DataQuality, Product, ProductSource, ProductVariant, ScrapingMetadata,
};
pub use retailers::{
    fields, registry, FieldSelector, PaginationStrategy, Platform, RecordSelectors, RetailerConfig,
    RetailerKey, RetailerRegistry, RetailerSelectors,
};
pub use store::{CatalogStore, EvidenceSink, StoreError};
pub use thresholds::{BrandThresholds, CategoryMapperSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read category tables at {path}: {source}")]
    CategoryTablesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse category tables: {0}")]
    CategoryTablesParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}
