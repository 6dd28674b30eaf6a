use crate::core::config::FetchConfig;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Exponential backoff with proportional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: usize,
    pub base_delay: Duration,
    pub factor: u32,
    /// Fraction of the nominal delay added or removed at random (0.2 = ±20%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            base_delay: Duration::from_millis(500),
            factor: 2,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(fetch: &FetchConfig) -> Self {
        Self {
            retries: fetch.retries,
            base_delay: Duration::from_millis(fetch.backoff_base_ms),
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn nominal_delay(&self, retry: usize) -> Duration {
        let exponent = u32::try_from(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Delay before retry number `retry` with jitter applied.
    pub fn delay_for(&self, retry: usize) -> Duration {
        let nominal = self.nominal_delay(retry);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return nominal;
        }
        let scale = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        nominal.mul_f64(scale)
    }
}

/// Retries an async operation while `is_retryable` accepts its error.
///
/// Runs at most `1 + policy.retries` times and returns the last error once
/// attempts are exhausted or the error is not retryable.
pub async fn with_retry<F, Fut, T, E, P>(
    mut operation: F,
    policy: &RetryPolicy,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > policy.retries || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}...",
                    attempt,
                    policy.retries + 1,
                    err,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
        }
    }
}
