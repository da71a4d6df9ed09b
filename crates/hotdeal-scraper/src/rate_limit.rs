//! Retry with exponential backoff for feed requests.
//!
//! Transient failures (429 responses and network errors) are retried with a
//! jittered exponential delay. Everything else propagates on the first
//! attempt so a broken feed fails fast and the collector moves on.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on any single backoff sleep.
const MAX_DELAY_MS: u64 = 30_000;

/// Returns `true` for errors worth retrying after a delay.
///
/// - [`ScraperError::RateLimited`]: the host asked us to back off.
/// - [`ScraperError::Http`]: connection reset, timeout, DNS failure.
///
/// Feed parse errors, 404s and other statuses are returned immediately.
fn is_retriable(err: &ScraperError) -> bool {
    matches!(
        err,
        ScraperError::RateLimited { .. } | ScraperError::Http(_)
    )
}

/// Milliseconds to wait before retry number `attempt` (1-based).
///
/// The exponential backoff `backoff_base_secs * 2^(attempt-1)` is scaled by
/// `jitter`. A 429 that carried `Retry-After` waits at least that long. The
/// result never exceeds [`MAX_DELAY_MS`].
fn retry_delay_ms(err: &ScraperError, attempt: u32, backoff_base_secs: u64, jitter: f64) -> u64 {
    let base_ms = backoff_base_secs.saturating_mul(1_000);
    let backoff = base_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
        .min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (backoff as f64 * jitter) as u64;

    let retry_after_ms = match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => retry_after_secs.saturating_mul(1_000),
        _ => 0,
    };

    jittered.max(retry_after_ms).min(MAX_DELAY_MS)
}

/// Runs `operation`, retrying transient errors up to `max_retries` extra times.
///
/// The wait before each retry comes from [`retry_delay_ms`] with a random
/// jitter factor in `[0.75, 1.25)`. With `max_retries = 2` the operation runs
/// at most three times.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;

                let jitter = rand::random::<f64>() * 0.5 + 0.75;
                let delay_ms = retry_delay_ms(&err, attempt, backoff_base_secs, jitter);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient feed error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn rate_limited() -> ScraperError {
        rate_limited_for(0)
    }

    fn rate_limited_for(retry_after_secs: u64) -> ScraperError {
        ScraperError::RateLimited {
            url: "https://feeds.example.com/rss".to_owned(),
            retry_after_secs,
        }
    }

    #[test]
    fn delay_doubles_per_attempt_and_caps() {
        let err = rate_limited();
        assert_eq!(retry_delay_ms(&err, 1, 1, 1.0), 1_000);
        assert_eq!(retry_delay_ms(&err, 2, 1, 1.0), 2_000);
        assert_eq!(retry_delay_ms(&err, 3, 1, 0.75), 3_000);
        assert_eq!(retry_delay_ms(&err, 9, 1, 1.25), MAX_DELAY_MS);
    }

    #[test]
    fn delay_waits_at_least_retry_after() {
        assert_eq!(retry_delay_ms(&rate_limited_for(5), 1, 1, 1.0), 5_000);
        assert_eq!(retry_delay_ms(&rate_limited_for(1), 3, 1, 1.0), 4_000);
        assert_eq!(retry_delay_ms(&rate_limited_for(600), 1, 0, 1.0), MAX_DELAY_MS);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_retry_sleeps_for_retry_after() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let started = tokio::time::Instant::now();
        let result = retry_with_backoff(1, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(rate_limited_for(7))
                } else {
                    Ok::<u32, ScraperError>(1)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(
            started.elapsed() >= Duration::from_secs(7),
            "waited only {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ScraperError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, ScraperError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn returns_last_error_after_exhausting_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(rate_limited())
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ScraperError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(ScraperError::NotFound {
                    url: "https://feeds.example.com/missing".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ScraperError::NotFound { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_unexpected_status() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(ScraperError::UnexpectedStatus {
                    status: 503,
                    url: "https://feeds.example.com/rss".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(ScraperError::UnexpectedStatus { status: 503, .. })
        ));
    }
}
