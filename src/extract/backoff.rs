//! Retry backoff policy
//!
//! Exponential backoff with jitter, modelled as a pure delay computation so
//! retry behaviour is testable without real sleeps. The walker owns the
//! actual `tokio::time::sleep` call.

use rand::Rng;
use std::time::Duration;

/// Exponential-with-jitter backoff bounds
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Ceiling for the first attempt
    pub initial: Duration,

    /// Absolute ceiling for any attempt
    pub max: Duration,
}

impl BackoffPolicy {
    /// Deterministic ceiling for the given attempt: `initial * 2^attempt`,
    /// capped at `max`
    pub fn ceiling_for(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(multiplier)
            .map(|d| d.min(self.max))
            .unwrap_or(self.max)
    }

    /// Jittered delay for the given attempt, uniform in `[ceiling/2, ceiling]`
    ///
    /// Half the ceiling is kept as a floor so consecutive retries from many
    /// workers do not synchronize on near-zero delays.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_for(attempt);
        if ceiling.is_zero() {
            return ceiling;
        }
        let floor = ceiling / 2;
        rand::thread_rng().gen_range(floor..=ceiling)
    }
}
