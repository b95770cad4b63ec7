//! Retry with bounded exponential backoff and jitter.
//!
//! Wraps fallible operations prone to transient failure: payment provider
//! calls and idempotent persistence calls. Workflow steps are NOT retried
//! through this; their failures are handled by the workflow's
//! partial-failure policy (blindly re-running a provisioning step would
//! duplicate its effect).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Backoff policy for [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any computed delay (before jitter).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

/// Computes the backoff delay for a retry attempt (1-indexed), scaled by a
/// jitter factor in `[0.5, 1.0]`.
///
/// The un-jittered delay is `min(base_delay * 2^(attempt-1), max_delay)`.
#[must_use]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let exponential = policy
        .base_delay
        .saturating_mul(2_u32.saturating_pow(exponent));
    let capped = exponential.min(policy.max_delay);
    capped.mul_f64(jitter.clamp(0.5, 1.0))
}

/// Invokes `op`, retrying on failure with exponential backoff plus jitter.
///
/// Issues at most `max_retries + 1` attempts and re-raises the last error
/// once retries are exhausted.
///
/// # Errors
///
/// Returns the final attempt's error.
pub async fn retry<T, E, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0_u32;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt > policy.max_retries {
                    tracing::error!(
                        label,
                        retries = policy.max_retries,
                        error = %err,
                        "Operation failed after exhausting retries"
                    );
                    return Err(err);
                }

                let jitter = rand::thread_rng().gen_range(0.5..=1.0);
                let delay = backoff_delay(&policy, attempt, jitter);

                tracing::warn!(
                    label,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Operation failed; retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        };

        // Jitter factor 1.0 exposes the raw schedule.
        assert_eq!(backoff_delay(&policy, 1, 1.0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&policy, 2, 1.0), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&policy, 3, 1.0), Duration::from_millis(4000));
        assert_eq!(backoff_delay(&policy, 4, 1.0), Duration::from_millis(8000));
        // 16s caps at 10s.
        assert_eq!(backoff_delay(&policy, 5, 1.0), Duration::from_millis(10_000));
    }

    #[test]
    fn jitter_scales_within_half_to_full() {
        let policy = RetryPolicy::default();
        let full = backoff_delay(&policy, 2, 1.0);
        let half = backoff_delay(&policy, 2, 0.5);
        assert_eq!(half, full.mul_f64(0.5));

        // Out-of-range jitter is clamped, never amplified.
        assert_eq!(backoff_delay(&policy, 2, 2.0), full);
        assert_eq!(backoff_delay(&policy, 2, 0.0), half);
    }

    #[tokio::test]
    async fn success_is_returned_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<u32, String> = retry("noop", fast_policy(3), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn issues_at_most_max_retries_plus_one_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), String> = retry("always-fails", fast_policy(3), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<&str, String> = retry("flaky", fast_policy(3), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient".to_string())
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
