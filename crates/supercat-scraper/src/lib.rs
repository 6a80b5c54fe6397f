//! Retailer scraping: page capabilities, per-retailer extraction, product
//! validation, evidence logging and the job orchestrator.

pub mod adapter;
pub mod dom;
pub mod error;
pub mod evidence;
pub mod extractor;
pub mod fixture;
pub mod http_page;
pub mod jobs;
pub mod page;
pub mod parse;
pub(crate) mod retry;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_pages;

pub use adapter::{CategoryListing, CrawlOptions, ProductListing, RetailerAdapter};
pub use error::ScraperError;
pub use evidence::{Evidence, EvidenceLogger, EvidenceSink, MemoryEvidenceSink};
pub use extractor::{BrandSource, CandidateBrand, RawCategory};
pub use fixture::{FixturePage, FixtureProvider};
pub use http_page::{HttpPage, HttpPageProvider, HttpPageSettings};
pub use jobs::{JobProcessor, JobSettings};
pub use page::{ExtractedRecord, Page, PageProvider};
pub use parse::{parse_package_size, parse_price, PackageSize};
pub use validation::{validate_product, RawProduct};
