//! Retry policy for event publication.

use crate::ports::message_bus::TransportError;
use rand::Rng;
use std::time::Duration;

/// Explicit retry policy passed to the publisher.
///
/// `max_attempts` counts the first try. The delay before attempt `n + 1` is
/// `backoff[n - 1]` (the last entry repeats), scaled by a random factor in
/// `1 ± jitter`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
    /// Fraction in `0.0..=1.0`
    pub jitter: f64,
    /// Which transport failures are worth another attempt.
    pub retryable: fn(&TransportError) -> bool,
}

fn retry_all_transport_failures(_: &TransportError) -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_millis(100),
                Duration::from_millis(500),
                Duration::from_secs(5),
            ],
            jitter: 0.2,
            retryable: retry_all_transport_failures,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn with_retryable(mut self, predicate: fn(&TransportError) -> bool) -> Self {
        self.retryable = predicate;
        self
    }

    pub fn is_retryable(&self, error: &TransportError) -> bool {
        (self.retryable)(error)
    }

    /// Un-jittered delay after the given failed attempt (1-based).
    pub fn base_delay(&self, failed_attempt: u32) -> Duration {
        if self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let index = (failed_attempt.max(1) as usize - 1).min(self.backoff.len() - 1);
        self.backoff[index]
    }

    /// Delay after the given failed attempt with jitter applied.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let base = self.base_delay(failed_attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        base.mul_f64(factor.max(0.0))
    }
}
