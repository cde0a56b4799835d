//! Exponential backoff with jitter for throttled inference calls

use crate::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Upper bound (exclusive) of the random jitter added to each delay, in seconds.
    pub max_jitter_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_jitter_secs: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): `2^attempt + jitter` seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.max_jitter_secs > 0.0 {
            rand::thread_rng().gen_range(0.0..self.max_jitter_secs)
        } else {
            0.0
        };
        Duration::from_secs_f64(2f64.powi(attempt as i32) + jitter)
    }
}

/// Run `call` until it succeeds, fails with a non-throttling error, or the
/// attempt cap is reached. The last error is returned unchanged.
pub async fn retry_throttled<F, Fut, T>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_throttling() && attempt < policy.max_attempts => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    "{} throttled, retrying in {:.2}s (attempt {}/{})",
                    operation,
                    delay.as_secs_f64(),
                    attempt,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn throttle_n_times(throttles: u32) -> (Result<&'static str>, u32) {
        let calls = AtomicU32::new(0);
        let result = retry_throttled(&RetryPolicy::default(), "title", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < throttles {
                    Err(PipelineError::Throttled("ThrottlingException".into()))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_below_cap() {
        for n in 0..5 {
            let (result, calls) = throttle_n_times(n).await;
            assert_eq!(result.unwrap(), "done");
            assert_eq!(calls, n + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_five_attempts() {
        for n in [5, 6, 20] {
            let (result, calls) = throttle_n_times(n).await;
            assert!(result.unwrap_err().is_throttling());
            assert_eq!(calls, 5);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_throttled(&RetryPolicy::default(), "summary", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(PipelineError::InferenceError("AccessDeniedException".into())) }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::InferenceError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_grows_exponentially_with_bounded_jitter() {
        let policy = RetryPolicy::default();
        for attempt in 1..=4 {
            let base = 2f64.powi(attempt as i32);
            let delay = policy.backoff_delay(attempt).as_secs_f64();
            assert!(delay >= base && delay < base + 1.0, "attempt {} delay {}", attempt, delay);
        }

        let no_jitter = RetryPolicy { max_jitter_secs: 0.0, ..policy };
        assert_eq!(no_jitter.backoff_delay(3), Duration::from_secs(8));
    }
}
