use std::future::Future;
use std::time::Duration;

use regsync_config::shared::RetryConfig;
use tracing::debug;

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, RegsyncResult};

/// Retry policy for remote registry calls.
///
/// Only throttling signals are retryable; any other failure surfaces
/// immediately to the caller.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts before the last error is surfaced.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Returns whether an error of this kind should be retried.
    pub fn is_retryable(kind: ErrorKind) -> bool {
        kind == ErrorKind::Throttled
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Runs `operation` under `policy`, retrying throttled attempts.
///
/// Every attempt and every backoff sleep observes the shutdown signal and
/// aborts with [`ErrorKind::OperationCanceled`] once it fires. After the
/// attempt cap is exhausted, the last throttling error is surfaced.
///
/// Time is driven by the tokio clock, so tests pause it for deterministic
/// backoff behavior.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown_rx: &mut ShutdownRx,
    mut operation: F,
) -> RegsyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RegsyncResult<T>>,
{
    let mut last_err = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        if shutdown_rx.has_changed().unwrap_or(true) {
            bail!(ErrorKind::OperationCanceled, "operation aborted by shutdown");
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if RetryPolicy::is_retryable(err.kind()) => {
                debug!(attempt, "throttling detected, retrying");
                last_err = Some(err);

                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        bail!(
                            ErrorKind::OperationCanceled,
                            "retry backoff aborted by shutdown"
                        );
                    }
                    _ = tokio::time::sleep(policy.backoff) => {}
                }
            }
            Err(err) => return Err(err),
        }
    }

    match last_err {
        Some(err) => Err(err),
        None => bail!(ErrorKind::Unknown, "operation failed after retries"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::regsync_error;

    #[tokio::test]
    async fn test_success_passes_through() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let (_tx, mut rx) = create_shutdown_channel();

        let result = retry_with_policy(&policy, &mut rx, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_non_retryable_error_surfaces_immediately() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let (_tx, mut rx) = create_shutdown_channel();
        let attempts = Arc::new(AtomicU32::new(0));

        let counting = attempts.clone();
        let result: RegsyncResult<()> = retry_with_policy(&policy, &mut rx, move || {
            let counting = counting.clone();
            async move {
                counting.fetch_add(1, Ordering::SeqCst);
                Err(regsync_error!(
                    ErrorKind::RegistryRequestFailed,
                    "listing failed"
                ))
            }
        })
        .await;

        assert_eq!(
            result.unwrap_err().kind(),
            ErrorKind::RegistryRequestFailed
        );
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_error_retried_up_to_cap() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let (_tx, mut rx) = create_shutdown_channel();
        let attempts = Arc::new(AtomicU32::new(0));

        let counting = attempts.clone();
        let result: RegsyncResult<()> = retry_with_policy(&policy, &mut rx, move || {
            let counting = counting.clone();
            async move {
                counting.fetch_add(1, Ordering::SeqCst);
                Err(regsync_error!(
                    ErrorKind::Throttled,
                    "registry API throttled the request"
                ))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::Throttled);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_before_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let (tx, mut rx) = create_shutdown_channel();
        tx.shutdown().unwrap();

        let result: RegsyncResult<()> =
            retry_with_policy(&policy, &mut rx, || async { Ok(()) }).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::OperationCanceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_then_success() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let (_tx, mut rx) = create_shutdown_channel();
        let attempts = Arc::new(AtomicU32::new(0));

        let counting = attempts.clone();
        let result = retry_with_policy(&policy, &mut rx, move || {
            let counting = counting.clone();
            async move {
                if counting.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(regsync_error!(
                        ErrorKind::Throttled,
                        "registry API throttled the request"
                    ))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
