//! Queue worker.
//!
//! Runs N job slots on the current task. Each slot claims one job at a time,
//! so each job gets its own page context. A failed job goes back to the queue
//! with a growing delay until its attempts run out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use supercat_core::AppConfig;
use supercat_db::{JobStatus, PgCatalogStore, PgEvidenceSink, ScrapeJobRow};
use supercat_scraper::{HttpPageProvider, HttpPageSettings, JobProcessor, ScraperError};
use tokio::sync::watch;

/// Jobs running longer than this are assumed orphaned by a dead worker.
const STALE_JOB_SECS: u64 = 30 * 60;
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const RETRY_DELAY_BASE_SECS: u64 = 30;
const RETRY_DELAY_MAX_SECS: u64 = 30 * 60;

/// Delay before the next attempt, or `None` when retrying cannot help.
///
/// Doubles per attempt from 30s, capped at 30 minutes. A rate limit waits at
/// least as long as the retailer asked.
pub(crate) fn retry_delay_secs(attempts: i32, err: &ScraperError) -> Option<u64> {
    if err.is_permanent() {
        return None;
    }
    let exponent = u32::try_from(attempts.saturating_sub(1).max(0)).unwrap_or(0).min(16);
    let backoff = RETRY_DELAY_BASE_SECS
        .saturating_mul(1_u64 << exponent)
        .min(RETRY_DELAY_MAX_SECS);
    match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => Some(backoff.max(*retry_after_secs)),
        _ => Some(backoff),
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotTotals {
    succeeded: usize,
    failed: usize,
}

pub(crate) async fn run_worker(
    config: &AppConfig,
    concurrency: Option<usize>,
    once: bool,
) -> anyhow::Result<()> {
    let pool = crate::db::connect(config).await?;
    let pages = HttpPageProvider::new(HttpPageSettings::from_app_config(config))?;
    let processor = crate::jobs::build_processor(
        config,
        Arc::new(PgCatalogStore::new(pool.clone())),
        Arc::new(pages),
        Some(Arc::new(PgEvidenceSink::new(pool.clone()))),
    )?;

    supercat_db::requeue_stale_jobs(&pool, STALE_JOB_SECS).await?;

    let slots = concurrency.unwrap_or(config.worker_concurrency).max(1);
    let poll = Duration::from_millis(config.worker_poll_interval_ms.max(100));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received shutdown signal, finishing running jobs");
            let _ = shutdown_tx.send(true);
        }
    });

    tracing::info!(slots, poll_ms = poll.as_millis(), once, "worker started");

    let totals = futures::future::join_all((0..slots).map(|slot| {
        run_slot(
            slot,
            &pool,
            &processor,
            poll,
            once,
            shutdown_rx.clone(),
        )
    }))
    .await;

    let succeeded: usize = totals.iter().map(|t| t.succeeded).sum();
    let failed: usize = totals.iter().map(|t| t.failed).sum();
    tracing::info!(succeeded, failed, "worker stopped");
    println!("worker finished: {succeeded} succeeded, {failed} failed");

    pool.close().await;
    Ok(())
}

async fn run_slot(
    slot: usize,
    pool: &PgPool,
    processor: &JobProcessor,
    poll: Duration,
    once: bool,
    mut shutdown: watch::Receiver<bool>,
) -> SlotTotals {
    let mut totals = SlotTotals::default();
    let mut last_sweep = Instant::now();

    while !*shutdown.borrow() {
        match supercat_db::claim_next_job(pool).await {
            Ok(Some(row)) => {
                if execute(pool, processor, &row).await {
                    totals.succeeded += 1;
                } else {
                    totals.failed += 1;
                }
            }
            Ok(None) => {
                if once {
                    break;
                }
                if slot == 0 && last_sweep.elapsed() >= STALE_SWEEP_INTERVAL {
                    if let Err(e) = supercat_db::requeue_stale_jobs(pool, STALE_JOB_SECS).await {
                        tracing::warn!(error = %e, "stale job sweep failed");
                    }
                    last_sweep = Instant::now();
                }
                tokio::select! {
                    () = tokio::time::sleep(poll) => {}
                    Ok(()) = shutdown.changed() => {}
                }
            }
            Err(e) => {
                tracing::error!(slot, error = %e, "failed to claim job");
                tokio::time::sleep(poll).await;
            }
        }
    }

    totals
}

/// Runs one claimed job and records the outcome. Returns `true` on success.
async fn execute(pool: &PgPool, processor: &JobProcessor, row: &ScrapeJobRow) -> bool {
    let job = match row.to_job() {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(job_id = row.id, error = %e, "unreadable job row");
            record_failure(pool, row, &e.to_string(), None).await;
            return false;
        }
    };

    match processor.process(&job).await {
        Ok(result) => {
            if let Err(e) = supercat_db::complete_job(pool, row.id, &result).await {
                tracing::error!(job_id = row.id, error = %e, "failed to mark job as succeeded");
            }
            true
        }
        Err(err) => {
            let delay = retry_delay_secs(row.attempts, &err);
            record_failure(pool, row, &err.to_string(), delay).await;
            false
        }
    }
}

async fn record_failure(pool: &PgPool, row: &ScrapeJobRow, message: &str, delay: Option<u64>) {
    match supercat_db::fail_job(pool, row.id, message, delay).await {
        Ok(JobStatus::Queued) => tracing::warn!(
            job_id = row.id,
            store = %row.store,
            attempt = row.attempts,
            retry_in_secs = delay,
            error = message,
            "job failed, requeued"
        ),
        Ok(status) => tracing::error!(
            job_id = row.id,
            store = %row.store,
            attempt = row.attempts,
            %status,
            error = message,
            "job failed permanently"
        ),
        Err(e) => tracing::error!(job_id = row.id, error = %e, "failed to mark job as failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> ScraperError {
        ScraperError::Timeout {
            what: "goto".to_string(),
            secs: 30,
        }
    }

    #[test]
    fn retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay_secs(1, &timeout()), Some(30));
        assert_eq!(retry_delay_secs(2, &timeout()), Some(60));
        assert_eq!(retry_delay_secs(3, &timeout()), Some(120));
        assert_eq!(retry_delay_secs(40, &timeout()), Some(RETRY_DELAY_MAX_SECS));
    }

    #[test]
    fn rate_limit_waits_at_least_retry_after() {
        let err = ScraperError::RateLimited {
            url: "https://www.vea.com.ar".to_string(),
            retry_after_secs: 300,
        };
        assert_eq!(retry_delay_secs(1, &err), Some(300));
    }

    #[test]
    fn invalid_jobs_are_not_retried() {
        let err = ScraperError::InvalidJob("missing url".to_string());
        assert_eq!(retry_delay_secs(1, &err), None);
    }
}
