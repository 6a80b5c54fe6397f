//! Evidence / activity logging.
//!
//! Every record is emitted as a `tracing` event under the
//! `supercat::evidence` target and forwarded to an optional [`EvidenceSink`].
//! Snapshots (HTML and, where the page supports it, a screenshot) are
//! best-effort: a failed write is logged and the record is still emitted.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use supercat_core::{EvidenceLevel, EvidenceRecord, StoreError};
pub use supercat_core::EvidenceSink;

use crate::error::ScraperError;
use crate::page::Page;

/// Keeps records in memory. Used by tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryEvidenceSink {
    records: Mutex<Vec<EvidenceRecord>>,
}

impl MemoryEvidenceSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<EvidenceRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EvidenceSink for MemoryEvidenceSink {
    async fn record(&self, record: &EvidenceRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

/// One evidence event before it is stamped and stored.
#[derive(Debug, Clone)]
pub struct Evidence<'a> {
    pub store: &'a str,
    pub event_type: &'a str,
    pub level: EvidenceLevel,
    pub message: String,
    pub details: Value,
}

impl<'a> Evidence<'a> {
    #[must_use]
    pub fn new(store: &'a str, event_type: &'a str, level: EvidenceLevel, message: impl Into<String>) -> Self {
        Self {
            store,
            event_type,
            level,
            message: message.into(),
            details: Value::Null,
        }
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Clone)]
pub struct EvidenceLogger {
    module: String,
    sink: Option<Arc<dyn EvidenceSink>>,
    snapshot_dir: Option<PathBuf>,
}

impl std::fmt::Debug for EvidenceLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceLogger")
            .field("module", &self.module)
            .field("sink", &self.sink.is_some())
            .field("snapshot_dir", &self.snapshot_dir)
            .finish()
    }
}

impl EvidenceLogger {
    /// A logger that only traces.
    #[must_use]
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            sink: None,
            snapshot_dir: None,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EvidenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Emits a record without snapshots.
    pub async fn log(&self, evidence: Evidence<'_>) -> EvidenceRecord {
        self.emit(evidence, None, None).await
    }

    /// Snapshots the page, then emits the record with the snapshot paths.
    pub async fn capture(&self, page: &mut dyn Page, evidence: Evidence<'_>) -> EvidenceRecord {
        let (screenshot, html) = match &self.snapshot_dir {
            Some(dir) => self.snapshot(page, dir, evidence.store, evidence.event_type).await,
            None => (None, None),
        };
        self.emit(evidence, screenshot, html).await
    }

    async fn snapshot(
        &self,
        page: &mut dyn Page,
        dir: &Path,
        store: &str,
        event_type: &str,
    ) -> (Option<String>, Option<String>) {
        let store_dir = dir.join(store);
        if let Err(e) = tokio::fs::create_dir_all(&store_dir).await {
            tracing::warn!(dir = %store_dir.display(), error = %e, "cannot create evidence directory");
            return (None, None);
        }
        let stem = format!("{}-{event_type}", Utc::now().format("%Y%m%dT%H%M%S%3fZ"));

        let png = store_dir.join(format!("{stem}.png"));
        let screenshot = match page.screenshot(&png).await {
            Ok(()) => Some(png.display().to_string()),
            Err(ScraperError::Unsupported(_)) => None,
            Err(e) => {
                tracing::warn!(path = %png.display(), error = %e, "screenshot failed");
                None
            }
        };

        let html_path = store_dir.join(format!("{stem}.html"));
        let html = match page.content().await {
            Ok(body) if !body.is_empty() => match tokio::fs::write(&html_path, body).await {
                Ok(()) => Some(html_path.display().to_string()),
                Err(e) => {
                    tracing::warn!(path = %html_path.display(), error = %e, "html snapshot failed");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "page content unavailable for snapshot");
                None
            }
        };
        (screenshot, html)
    }

    async fn emit(
        &self,
        evidence: Evidence<'_>,
        screenshot_path: Option<String>,
        html_snapshot_path: Option<String>,
    ) -> EvidenceRecord {
        let record = EvidenceRecord {
            module: self.module.clone(),
            store: evidence.store.to_string(),
            event_type: evidence.event_type.to_string(),
            level: evidence.level,
            message: evidence.message,
            details: evidence.details,
            screenshot_path,
            html_snapshot_path,
            created_at: Utc::now(),
        };
        trace_record(&record);
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&record).await {
                tracing::warn!(
                    store = %record.store,
                    event = %record.event_type,
                    error = %e,
                    "failed to persist evidence record"
                );
            }
        }
        record
    }
}

fn trace_record(record: &EvidenceRecord) {
    macro_rules! event {
        ($macro:ident) => {
            tracing::$macro!(
                target: "supercat::evidence",
                module = %record.module,
                store = %record.store,
                event = %record.event_type,
                details = %record.details,
                screenshot = record.screenshot_path.as_deref(),
                html = record.html_snapshot_path.as_deref(),
                "{}",
                record.message
            )
        };
    }
    match record.level {
        EvidenceLevel::Debug => event!(debug),
        EvidenceLevel::Info => event!(info),
        EvidenceLevel::Warn => event!(warn),
        EvidenceLevel::Error => event!(error),
    }
}
