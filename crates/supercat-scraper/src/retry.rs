//! Retry with exponential back-off and jitter for page navigation.
//!
//! Network failures, timeouts, 5xx and 429 are retried. Bot walls (403 or a
//! challenge page) are returned at once: hammering them only makes it worse.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        ScraperError::RateLimited { .. } | ScraperError::Timeout { .. } => true,
        _ => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient
/// errors.
///
/// The n-th retry waits `backoff_base_ms × 2^(n-1)` ms ±25 % jitter, capped at
/// 60 s. A 429 with a longer `Retry-After` waits that long instead.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let requested = match &err {
                    ScraperError::RateLimited {
                        retry_after_secs, ..
                    } if backoff_base_ms > 0 => retry_after_secs.saturating_mul(1000),
                    _ => 0,
                };
                let capped = computed.max(requested).min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient navigation error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ScraperError {
        ScraperError::RateLimited {
            url: "https://www.jumbo.com.ar/lacteos".to_owned(),
            retry_after_secs: 30,
        }
    }

    #[test]
    fn bot_detection_is_not_retriable() {
        assert!(!is_retriable(&ScraperError::BotDetected {
            url: "https://www.coto.com.ar".to_owned(),
            status: 403,
        }));
    }

    #[test]
    fn server_errors_are_retriable_client_errors_are_not() {
        let status = |status| ScraperError::UnexpectedStatus {
            status,
            url: "https://x".to_owned(),
        };
        assert!(is_retriable(&status(503)));
        assert!(!is_retriable(&status(404)));
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, ScraperError>(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(rate_limited())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ScraperError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_bot_wall() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(ScraperError::BotDetected {
                    url: "https://www.vea.com.ar".to_owned(),
                    status: 403,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "bot walls must not be retried");
        assert!(matches!(result, Err(ScraperError::BotDetected { .. })));
    }
}
