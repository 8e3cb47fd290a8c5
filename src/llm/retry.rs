//! Exponential backoff for a single provider.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::debug;

use crate::error::ProviderError;

/// Defaults: 3 total attempts, base 1s, max 30s.
pub const MAX_ATTEMPTS: u32 = 3;
const INITIAL_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_interval: Duration::from_secs(INITIAL_INTERVAL_SECS),
            max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
        }
    }
}

/// The last error once a provider is given up on.
#[derive(Debug)]
pub struct RetryExhausted {
    pub error: ProviderError,
    pub attempts: u32,
}

/// Retry `attempt` while it fails transiently.
///
/// Permanent errors return immediately. Each attempt is cut off at
/// `deadline`, and a wait that would cross it ends the loop with
/// [`ProviderError::DeadlineExceeded`]. A `Retry-After` hint lengthens the
/// wait but never shortens it.
pub async fn retry_with_backoff<T, Fut, F>(
    policy: &RetryPolicy,
    deadline: Instant,
    mut attempt: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = ExponentialBackoff {
        initial_interval: policy.initial_interval,
        max_interval: policy.max_interval,
        max_elapsed_time: None,
        ..Default::default()
    };

    let mut attempts = 0;
    loop {
        attempts += 1;

        let error = match timeout_at(deadline, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => ProviderError::DeadlineExceeded,
        };

        if !error.is_transient() || attempts >= policy.max_attempts {
            return Err(RetryExhausted { error, attempts });
        }

        let mut wait = backoff.next_backoff().unwrap_or(policy.max_interval);
        if let ProviderError::RateLimited {
            retry_after: Some(hint),
        } = &error
        {
            wait = wait.max(*hint);
        }

        if Instant::now() + wait >= deadline {
            debug!("Next retry would pass the deadline; giving up after {}", error);
            return Err(RetryExhausted {
                error: ProviderError::DeadlineExceeded,
                attempts,
            });
        }

        debug!(
            "Attempt {} failed ({}); retrying in {:?}",
            attempts,
            error.summary(),
            wait
        );
        sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_first_attempt() {
        let result = retry_with_backoff(&RetryPolicy::default(), far_deadline(), || async {
            Ok::<_, ProviderError>("ok")
        })
        .await;
        assert_eq!(assert_ok!(result), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhaust_after_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let result: Result<(), _> =
            retry_with_backoff(&RetryPolicy::default(), far_deadline(), move || {
                let c = counter.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::ServerError {
                        status: 503,
                        body: String::new(),
                    })
                }
            })
            .await;

        let exhausted = assert_err!(result);
        assert_eq!(exhausted.attempts, MAX_ATTEMPTS);
        assert!(matches!(exhausted.error, ProviderError::ServerError { status: 503, .. }));
        assert_eq!(count.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let result = retry_with_backoff(&RetryPolicy::default(), far_deadline(), move || {
            let c = counter.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ProviderError::Timeout(120))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

        assert_eq!(assert_ok!(result), "recovered");
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();

        let result: Result<(), _> =
            retry_with_backoff(&RetryPolicy::default(), far_deadline(), move || {
                let c = counter.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(ProviderError::Unauthorized { status: 401 })
                }
            })
            .await;

        let exhausted = assert_err!(result);
        assert_eq!(exhausted.attempts, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_past_deadline_aborts() {
        let deadline = Instant::now() + Duration::from_secs(10);
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::default(), deadline, || async {
            Err(ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            })
        })
        .await;

        let exhausted = assert_err!(result);
        assert_eq!(exhausted.attempts, 1);
        assert!(matches!(exhausted.error, ProviderError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_is_cut_at_deadline() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let result: Result<(), _> = retry_with_backoff(&RetryPolicy::default(), deadline, || async {
            sleep(Duration::from_secs(600)).await;
            Ok(())
        })
        .await;

        let exhausted = assert_err!(result);
        assert!(matches!(exhausted.error, ProviderError::DeadlineExceeded));
        assert_eq!(exhausted.attempts, 1);
    }
}
