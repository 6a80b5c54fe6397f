//! Static-HTML [`Page`] backed by `reqwest` and parsed with `scraper`.
//!
//! No JavaScript runs, so `wait_for_selector` only inspects the fetched
//! document and screenshots are unsupported. Good enough for storefronts that
//! server-render their grids, and for tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use supercat_core::{registry, AppConfig, RecordSelectors, RetailerKey};

use crate::dom;
use crate::error::ScraperError;
use crate::page::{ExtractedRecord, Page, PageProvider};
use crate::retry::retry_with_backoff;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct HttpPageSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl HttpPageSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.scraper_request_timeout_secs,
            user_agent: config.scraper_user_agent.clone(),
            max_retries: config.scraper_max_retries,
            backoff_base_ms: config.scraper_retry_backoff_base_ms,
        }
    }
}

struct Fetched {
    status: u16,
    url: String,
    body: String,
}

pub struct HttpPage {
    client: Client,
    bot_markers: Vec<String>,
    max_retries: u32,
    backoff_base_ms: u64,
    url: Option<String>,
    html: Option<String>,
}

impl HttpPage {
    fn looks_blocked(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        self.bot_markers.iter().any(|m| lower.contains(m.as_str()))
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "es-AR,es;q=0.9")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ScraperError::RateLimited {
                url: url.to_owned(),
                retry_after_secs,
            });
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ScraperError::BotDetected {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let body = response.text().await?;
        if self.looks_blocked(&body) {
            return Err(ScraperError::BotDetected {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(Fetched {
            status: status.as_u16(),
            url: final_url,
            body,
        })
    }
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<u16, ScraperError> {
        let fetched = retry_with_backoff(self.max_retries, self.backoff_base_ms, || self.fetch(url))
            .await
            .map_err(|e| match e {
                ScraperError::Http(err) => ScraperError::Navigation {
                    url: url.to_owned(),
                    reason: err.to_string(),
                },
                other => other,
            })?;
        tracing::debug!(url, status = fetched.status, bytes = fetched.body.len(), "page loaded");
        self.url = Some(fetched.url);
        self.html = Some(fetched.body);
        Ok(fetched.status)
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

    async fn screenshot(&mut self, _path: &Path) -> Result<(), ScraperError> {
        Err(ScraperError::Unsupported(
            "screenshots need a rendering browser".to_string(),
        ))
    }

    async fn content(&mut self) -> Result<String, ScraperError> {
        Ok(self.html.clone().unwrap_or_default())
    }

    fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// Hands out [`HttpPage`]s sharing one connection pool.
pub struct HttpPageProvider {
    client: Client,
    settings: HttpPageSettings,
}

impl HttpPageProvider {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(settings: HttpPageSettings) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&settings.user_agent)
            .build()?;
        Ok(Self { client, settings })
    }

    /// A page for `markers`, bypassing the retailer table. Used by tests that
    /// point at a local server.
    #[must_use]
    pub fn page_with_markers(&self, markers: Vec<String>) -> HttpPage {
        HttpPage {
            client: self.client.clone(),
            bot_markers: markers,
            max_retries: self.settings.max_retries,
            backoff_base_ms: self.settings.backoff_base_ms,
            url: None,
            html: None,
        }
    }
}

#[async_trait]
impl PageProvider for HttpPageProvider {
    async fn acquire(&self, store: RetailerKey) -> Result<Box<dyn Page>, ScraperError> {
        let config = registry()
            .get(store)
            .ok_or_else(|| ScraperError::UnknownRetailer(store.to_string()))?;
        Ok(Box::new(self.page_with_markers(config.bot_markers.clone())))
    }

    async fn release(&self, _page: Box<dyn Page>) {}
}
