//! Retry policy with exponential backoff.
//!
//! The pipeline itself never retries. A [`RetryPolicy`] is applied either by
//! the media downloader (which has its own retry rules) or by callers through
//! [`retry_with_policy`] and the [`retry`](crate::config::middleware::retry)
//! middleware, which retry only errors where
//! [`ClientError::is_retryable`] holds.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::ClientError;

/// Default backoff values.
pub mod defaults {
    use std::time::Duration;

    pub const BASE_DELAY: Duration = Duration::from_millis(500);
    pub const MULTIPLIER: f64 = 2.0;
    /// 0.2 means +/- 20%.
    pub const JITTER: f64 = 0.2;
    pub const MAX_DELAY: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
}

/// A policy the retry loops refuse to run.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RetryPolicyError {
    #[error("base delay {base:?} exceeds max delay {max:?}")]
    InvertedDelays { base: Duration, max: Duration },
    #[error("multiplier {0} is below 1.0")]
    Multiplier(f64),
    #[error("jitter {0} is outside 0.0..=1.0")]
    Jitter(f64),
}

/// How many times to attempt a call and how long to wait in between.
///
/// Media URLs expire within minutes, so the download retries use short
/// delays; see [`RetryPolicy::attempts`].
///
/// ```
/// use wacloud_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::attempts(4).base_delay(Duration::from_millis(100));
/// assert_eq!(policy.max_retries, 3);
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    /// Growth factor between delays. Must be >= 1.0.
    pub multiplier: f64,
    /// Fraction of each delay randomized in both directions, in `0.0..=1.0`.
    pub jitter: f64,
    pub max_delay: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: defaults::JITTER,
            max_delay: defaults::MAX_DELAY,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// At most `total` attempts, counting the first. Zero means one.
    pub fn attempts(total: u32) -> Self {
        Self::default().max_retries(total.saturating_sub(1))
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::attempts(1)
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Values below 1.0 are clamped to 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Values are clamped to `0.0..=1.0`.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Total number of attempts the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Fields are public, so the builder clamps are not enough.
    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if self.base_delay > self.max_delay {
            return Err(RetryPolicyError::InvertedDelays {
                base: self.base_delay,
                max: self.max_delay,
            });
        }
        if !(self.multiplier >= 1.0) {
            return Err(RetryPolicyError::Multiplier(self.multiplier));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(RetryPolicyError::Jitter(self.jitter));
        }
        Ok(())
    }

    /// Undithered delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        Duration::try_from_secs_f64(secs)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

/// Retry state for one loop: how many retries were taken and what the
/// next wait is.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    retries: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Retries taken so far.
    pub fn attempts(&self) -> u32 {
        self.retries
    }

    pub fn can_retry(&self) -> bool {
        self.retries < self.policy.max_retries
    }

    /// Delay before the next retry, with jitter applied. Advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.retries);
        self.retries += 1;

        let jitter = self.policy.jitter;
        if jitter == 0.0 {
            return delay;
        }
        let factor = 1.0 + rand::rng().random_range(-jitter..=jitter);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .map_or(self.policy.max_delay, |jittered| jittered.min(self.policy.max_delay))
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of retries.
///
/// ```ignore
/// let info = retry_with_policy(&RetryPolicy::attempts(3), || client.media_info(&id)).await?;
/// ```
pub async fn retry_with_policy<F, Fut, T>(policy: &RetryPolicy, f: F) -> Result<T, ClientError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    policy
        .validate()
        .map_err(|e| ClientError::aborted(format!("invalid retry policy: {e}")))?;

    let mut backoff = policy.backoff();
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && backoff.can_retry() => {
                let delay = backoff.next_delay();
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    error = %err,
                    retry = backoff.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
