//! `run` and `enqueue`: building a job from the command line and executing
//! or queueing it.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use supercat_core::{
    load_category_tables, registry, AppConfig, CatalogStore, EvidenceSink, JobAction,
    MemoryCatalog, ScrapeJob,
};
use supercat_db::{PgCatalogStore, PgEvidenceSink};
use supercat_scraper::{
    EvidenceLogger, FixtureProvider, HttpPageProvider, HttpPageSettings, JobProcessor, JobSettings,
    PageProvider,
};

#[derive(Debug, Clone, Args)]
pub struct JobArgs {
    /// Retailer key (carrefour, jumbo, disco, vea, dia, coto)
    #[arg(long)]
    pub store: String,

    /// discover-categories, crawl-category or scrape-products
    #[arg(long, default_value = "discover-categories")]
    pub action: JobAction,

    /// Category page URL; required unless discovering
    #[arg(long)]
    pub url: Option<String>,

    /// Category names separated by `/`, root first, ending with the category
    /// at `--url`
    #[arg(long)]
    pub path: Option<String>,
}

impl JobArgs {
    pub(crate) fn to_job(&self) -> anyhow::Result<ScrapeJob> {
        if registry().lookup(&self.store).is_none() {
            anyhow::bail!("unknown retailer '{}'", self.store);
        }
        if self.action != JobAction::DiscoverCategories && self.url.is_none() {
            anyhow::bail!("{} requires --url", self.action);
        }
        Ok(ScrapeJob {
            store: self.store.clone(),
            action: self.action,
            category_url: self.url.clone(),
            parent_path: split_path(self.path.as_deref()),
        })
    }
}

/// `"Almacén / Aceites"` → `["Almacén", "Aceites"]`.
pub(crate) fn split_path(path: Option<&str>) -> Vec<String> {
    path.map(|p| {
        p.split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Wires a processor with the configured tables, crawl settings and evidence
/// snapshot directory.
pub(crate) fn build_processor(
    config: &AppConfig,
    catalog: Arc<dyn CatalogStore>,
    pages: Arc<dyn PageProvider>,
    sink: Option<Arc<dyn EvidenceSink>>,
) -> anyhow::Result<JobProcessor> {
    let tables = Arc::new(load_category_tables(&config.category_tables_path)?);
    let mut evidence = EvidenceLogger::new("scraper").with_snapshot_dir(&config.evidence_dir);
    if let Some(sink) = sink {
        evidence = evidence.with_sink(sink);
    }
    Ok(
        JobProcessor::new(catalog, pages, tables, JobSettings::from_app_config(config))
            .with_evidence(evidence),
    )
}

pub(crate) async fn run_job(
    config: &AppConfig,
    args: &JobArgs,
    fixtures: Option<&Path>,
) -> anyhow::Result<()> {
    let job = args.to_job()?;

    let processor = if let Some(dir) = fixtures {
        let base_url = registry()
            .lookup(&job.store)
            .map(|c| c.base_url.clone())
            .unwrap_or_default();
        let pages = FixtureProvider::from_dir(&base_url, dir)?;
        let tables = load_category_tables(&config.category_tables_path)?;
        let catalog = MemoryCatalog::with_reference_data(Vec::new(), tables.seed_categories());
        tracing::info!(dir = %dir.display(), "running against fixtures with an in-memory catalog");
        build_processor(config, Arc::new(catalog), Arc::new(pages), None)?
    } else {
        let pool = crate::db::connect(config).await?;
        let pages = HttpPageProvider::new(HttpPageSettings::from_app_config(config))?;
        build_processor(
            config,
            Arc::new(PgCatalogStore::new(pool.clone())),
            Arc::new(pages),
            Some(Arc::new(PgEvidenceSink::new(pool))),
        )?
    };

    let result = processor.process(&job).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.is_clean() {
        tracing::warn!(errors = result.errors.len(), "job finished with item errors");
    }
    Ok(())
}

pub(crate) async fn enqueue(config: &AppConfig, args: &JobArgs) -> anyhow::Result<()> {
    let job = args.to_job()?;
    let pool = crate::db::connect(config).await?;
    let row = supercat_db::enqueue_job(&pool, &job, config.job_max_attempts).await?;
    println!("enqueued job {} ({})", row.id, row.public_id);
    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(action: JobAction, url: Option<&str>) -> JobArgs {
        JobArgs {
            store: "jumbo".to_string(),
            action,
            url: url.map(str::to_string),
            path: Some("Lácteos / Leches".to_string()),
        }
    }

    #[test]
    fn split_path_trims_and_drops_empty_segments() {
        assert_eq!(split_path(Some("Almacén / Aceites/")), ["Almacén", "Aceites"]);
        assert!(split_path(None).is_empty());
        assert!(split_path(Some(" / ")).is_empty());
    }

    #[test]
    fn category_jobs_need_a_url() {
        let err = args(JobAction::ScrapeProducts, None).to_job().unwrap_err();
        assert!(err.to_string().contains("requires --url"));

        let job = args(
            JobAction::ScrapeProducts,
            Some("https://www.jumbo.com.ar/lacteos/leches"),
        )
        .to_job()
        .unwrap();
        assert_eq!(job.parent_path, ["Lácteos", "Leches"]);
    }

    #[test]
    fn unknown_store_is_rejected() {
        let mut bad = args(JobAction::DiscoverCategories, None);
        bad.store = "walmart".to_string();
        assert!(bad.to_job().is_err());
    }
}
