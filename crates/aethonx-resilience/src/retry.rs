// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded-exponential retry policy (spec §4.5).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on the backoff delay between attempts, regardless of how
/// many retries remain.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Retry parameters: up to `max_retries` additional attempts after the
/// first, with delay `min(base * multiplier^n, 60s)` before attempt `n+1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplier applied to the delay after every failed attempt.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Create a policy with the given bound and backoff shape.
    #[must_use]
    pub fn new(max_retries: u32, base: Duration, multiplier: f64) -> Self {
        Self { max_retries, base, multiplier }
    }

    /// The delay to wait before attempt `n + 1` (`n` is zero-based: `n = 0`
    /// is the delay before the first retry, after the initial attempt
    /// failed). Clamped at [`MAX_BACKOFF`].
    #[must_use]
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        let secs = self.base.as_secs_f64() * self.multiplier.powi(n as i32);
        Duration::from_secs_f64(secs.max(0.0)).min(MAX_BACKOFF)
    }

    /// Total number of attempts this policy allows (`max_retries + 1`).
    #[must_use]
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    /// Three additional attempts, 500ms base, doubling multiplier.
    fn default() -> Self {
        Self { max_retries: 3, base: Duration::from_millis(500), multiplier: 2.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially() {
        let p = RetryPolicy::new(5, Duration::from_secs(1), 2.0);
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn delay_clamps_at_max_backoff() {
        let p = RetryPolicy::new(10, Duration::from_secs(10), 3.0);
        assert_eq!(p.delay_for_attempt(5), MAX_BACKOFF);
    }

    #[test]
    fn total_attempts_includes_first() {
        let p = RetryPolicy::new(3, Duration::from_millis(1), 2.0);
        assert_eq!(p.total_attempts(), 4);
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        let p = RetryPolicy::new(0, Duration::from_millis(1), 2.0);
        assert_eq!(p.total_attempts(), 1);
    }
}
