use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, RegsyncResult};

/// Upper bound on a single refill wait, used when the sustained rate is zero
/// and the bucket can never refill. The shutdown signal is the only way out
/// of such a wait.
const REFILL_WAIT_CAP: Duration = Duration::from_secs(24 * 60 * 60);

/// Token bucket state guarded by the limiter's mutex.
#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter for remote API calls.
///
/// The bucket starts full at the burst capacity and refills continuously at
/// the sustained rate. Every remote registry call acquires one token before
/// being issued.
#[derive(Debug)]
pub struct RateLimiter {
    permits_per_sec: u32,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Creates a limiter allowing `permits_per_sec` sustained requests with a
    /// burst allowance of `burst`.
    pub fn new(permits_per_sec: u32, burst: u32) -> Self {
        Self {
            permits_per_sec,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Acquires one token, suspending until one becomes available.
    ///
    /// The wait observes the shutdown signal: once it fires, the call returns
    /// an [`ErrorKind::OperationCanceled`] error instead of continuing to
    /// wait. This holds even when no token can ever become available.
    pub async fn acquire(&self, shutdown_rx: &mut ShutdownRx) -> RegsyncResult<()> {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }

                self.next_token_wait(&bucket)
            };

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    bail!(
                        ErrorKind::OperationCanceled,
                        "rate limiter wait aborted by shutdown"
                    );
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Adds tokens accrued since the last refill, capped at the burst size.
    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        bucket.last_refill = now;

        let accrued = elapsed.as_secs_f64() * self.permits_per_sec as f64;
        bucket.tokens = (bucket.tokens + accrued).min(self.burst as f64);
    }

    /// Time until at least one token accrues, capped for a zero rate.
    fn next_token_wait(&self, bucket: &Bucket) -> Duration {
        if self.permits_per_sec == 0 {
            return REFILL_WAIT_CAP;
        }

        let deficit = 1.0 - bucket.tokens;
        Duration::from_secs_f64(deficit / self.permits_per_sec as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;

    #[tokio::test]
    async fn test_burst_is_immediately_available() {
        let limiter = RateLimiter::new(1, 3);
        let (_tx, mut rx) = create_shutdown_channel();

        for _ in 0..3 {
            limiter.acquire(&mut rx).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_refill_at_sustained_rate() {
        let limiter = RateLimiter::new(2, 1);
        let (_tx, mut rx) = create_shutdown_channel();

        limiter.acquire(&mut rx).await.unwrap();

        // The bucket is empty now; the next acquire must wait for a refill,
        // which the paused clock advances through instantly.
        let start = Instant::now();
        limiter.acquire(&mut rx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_returns_error_instead_of_hanging() {
        // Zero sustained rate and an empty bucket: no token can ever become
        // available.
        let limiter = RateLimiter::new(0, 0);
        let (tx, mut rx) = create_shutdown_channel();

        tx.shutdown().unwrap();

        let err = limiter.acquire(&mut rx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationCanceled);
    }
}
