//! Canned pages keyed by URL, for offline runs and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use supercat_core::{RecordSelectors, RetailerKey};

use crate::dom;
use crate::error::ScraperError;
use crate::page::{ExtractedRecord, Page, PageProvider};

#[derive(Debug, Clone)]
struct Fixture {
    status: u16,
    html: String,
}

fn key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Serves fixed HTML per URL and counts acquired and released pages.
#[derive(Debug, Default)]
pub struct FixtureProvider {
    pages: Arc<HashMap<String, Fixture>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl FixtureProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.with_status(url, 200, html)
    }

    #[must_use]
    pub fn with_status(mut self, url: &str, status: u16, html: &str) -> Self {
        Arc::make_mut(&mut self.pages).insert(
            key(url),
            Fixture {
                status,
                html: html.to_string(),
            },
        );
        self
    }

    /// Loads every `*.html` file under `dir`. The file stem, with `__` read as
    /// `/`, is appended to `base_url`: `lacteos__leches.html` serves
    /// `{base_url}/lacteos/leches`, and `index.html` serves `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Io`] if the directory or a file cannot be read.
    pub fn from_dir(base_url: &str, dir: &Path) -> Result<Self, ScraperError> {
        let io = |path: &Path, source| ScraperError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut provider = Self::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| io(dir, e))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
            .collect();
        entries.sort();
        for path in entries {
            let html = std::fs::read_to_string(&path).map_err(|e| io(&path, e))?;
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .replace("__", "/");
            let url = if stem == "index" {
                base_url.to_string()
            } else {
                format!("{}/{stem}", base_url.trim_end_matches('/'))
            };
            provider = provider.with_page(&url, &html);
        }
        Ok(provider)
    }

    #[must_use]
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageProvider for FixtureProvider {
    async fn acquire(&self, _store: RetailerKey) -> Result<Box<dyn Page>, ScraperError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FixturePage {
            pages: Arc::clone(&self.pages),
            url: None,
            html: None,
        }))
    }

    async fn release(&self, _page: Box<dyn Page>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FixturePage {
    pages: Arc<HashMap<String, Fixture>>,
    url: Option<String>,
    html: Option<String>,
}

#[async_trait]
impl Page for FixturePage {
    async fn goto(&mut self, url: &str) -> Result<u16, ScraperError> {
        let fixture = self
            .pages
            .get(&key(url))
            .ok_or_else(|| ScraperError::Navigation {
                url: url.to_owned(),
                reason: "no fixture for URL".to_string(),
            })?;
        match fixture.status {
            403 => {
                return Err(ScraperError::BotDetected {
                    url: url.to_owned(),
                    status: 403,
                })
            }
            429 => {
                return Err(ScraperError::RateLimited {
                    url: url.to_owned(),
                    retry_after_secs: 0,
                })
            }
            status if !(200..300).contains(&status) => {
                return Err(ScraperError::UnexpectedStatus {
                    status,
                    url: url.to_owned(),
                })
            }
            _ => {}
        }
        self.url = Some(url.to_owned());
        self.html = Some(fixture.html.clone());
        Ok(fixture.status)
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, ScraperError> {
        match &self.html {
            Some(html) => dom::has_match(html, selector),
            None => Ok(false),
        }
    }

    async fn extract(
        &mut self,
        spec: &RecordSelectors,
    ) -> Result<Vec<ExtractedRecord>, ScraperError> {
        match &self.html {
            Some(html) => dom::extract_records(html, spec),
            None => Ok(Vec::new()),
        }
    }

    /// Writes the current document in place of an image.
    async fn screenshot(&mut self, path: &Path) -> Result<(), ScraperError> {
        let html = self.html.clone().unwrap_or_default();
        tokio::fs::write(path, html)
            .await
            .map_err(|source| ScraperError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        Ok(self.html.clone().unwrap_or_default())
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}
