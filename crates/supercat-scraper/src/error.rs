use std::path::PathBuf;

use supercat_core::StoreError;
use supercat_matching::MatchingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    /// No selector in a fallback list produced anything.
    #[error("no selector matched for {what} on {url}")]
    SelectorFailure { what: String, url: String },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("bot detection triggered at {url} (HTTP {status})")]
    BotDetected { url: String, status: u16 },

    #[error("rate limited at {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("timed out after {secs}s: {what}")]
    Timeout { what: String, secs: u64 },

    #[error("invalid product \"{name}\": {}", reasons.join("; "))]
    Validation { name: String, reasons: Vec<String> },

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("matching error: {0}")]
    Matching(#[from] MatchingError),

    #[error("unknown retailer: {0}")]
    UnknownRetailer(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("page capability not supported: {0}")]
    Unsupported(String),
}

impl ScraperError {
    /// Bot walls and rate limits; callers decide on backoff.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            ScraperError::BotDetected { .. } | ScraperError::RateLimited { .. }
        )
    }

    /// Errors that rerunning the same job cannot fix.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ScraperError::UnknownRetailer(_)
                | ScraperError::InvalidJob(_)
                | ScraperError::InvalidSelector { .. }
                | ScraperError::Validation { .. }
        )
    }
}
