//! Browser-automation capability set the scraper depends on.
//!
//! Rendering is a collaborator concern: a headless browser, a static HTTP
//! fetch ([`crate::HttpPage`]) and canned fixtures ([`crate::FixturePage`])
//! all implement the same [`Page`] trait.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use supercat_core::{RecordSelectors, RetailerKey};

use crate::error::ScraperError;

/// Plain field values pulled out of one record container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(pub BTreeMap<String, String>);

impl ExtractedRecord {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for ExtractedRecord {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

#[async_trait]
pub trait Page: Send {
    /// Navigates to `url` and returns the HTTP status of the final response.
    async fn goto(&mut self, url: &str) -> Result<u16, ScraperError>;

    /// Waits until `selector` matches. `Ok(false)` means it never appeared
    /// within `timeout`.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, ScraperError>;

    /// Extracts one record per element matching `spec.container`.
    async fn extract(&mut self, spec: &RecordSelectors)
        -> Result<Vec<ExtractedRecord>, ScraperError>;

    async fn screenshot(&mut self, path: &Path) -> Result<(), ScraperError>;

    /// Current document HTML.
    async fn content(&mut self) -> Result<String, ScraperError>;

    /// URL of the current document, after redirects.
    fn current_url(&self) -> Option<&str>;
}

/// Hands out one page context per job.
#[async_trait]
pub trait PageProvider: Send + Sync {
    async fn acquire(&self, store: RetailerKey) -> Result<Box<dyn Page>, ScraperError>;

    /// Returns the context. Called exactly once per successful `acquire`,
    /// whatever the outcome of the job.
    async fn release(&self, page: Box<dyn Page>);
}
