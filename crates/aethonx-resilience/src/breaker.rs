// SPDX-License-Identifier: MIT OR Apache-2.0
//! Three-state circuit breaker per source (spec §4.5).

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// The breaker's externally-observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Requests pass; consecutive failures are counted.
    Closed,
    /// Requests are rejected immediately.
    Open,
    /// A bounded number of probe requests are allowed through.
    HalfOpen,
}

/// Breaker tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `closed` before tripping to `open`.
    pub failure_threshold: u32,
    /// Time spent in `open` before transitioning to `half_open`.
    pub timeout: Duration,
    /// Maximum concurrent probes allowed in `half_open`.
    pub half_open_max: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, timeout: Duration::from_secs(30), half_open_max: 3 }
    }
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_half_open_successes: u32,
    half_open_in_flight: u32,
    opened_at: Option<Instant>,
}

/// A per-source circuit breaker state machine (spec §4.5).
///
/// `closed` → (`failure_threshold` consecutive failures) → `open` →
/// (`timeout` elapses) → `half_open` → (`half_open_max` consecutive
/// successes) → `closed`, or (any failure) → `open`.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Whether a call is allowed to proceed, and if so whether it counts as a
/// half-open probe (so its outcome must be reported via [`CircuitBreaker::on_probe_result`]
/// rather than [`CircuitBreaker::on_success`]/[`CircuitBreaker::on_failure`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed normally.
    Allowed,
    /// The call may proceed as a half-open probe.
    AllowedAsProbe,
    /// The call is rejected; the breaker is open.
    Rejected,
}

impl CircuitBreaker {
    /// Create a new breaker, starting `closed`.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_half_open_successes: 0,
                half_open_in_flight: 0,
                opened_at: None,
            }),
        }
    }

    /// Current state, re-evaluating the `open` → `half_open` timeout
    /// transition as a side effect (mirrors `Allow()` in the spec's literal
    /// scenario 5).
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_in_flight = 0;
                    inner.consecutive_half_open_successes = 0;
                }
            }
        }
    }

    /// Ask whether a call may proceed, reserving a half-open probe slot if
    /// applicable.
    pub fn allow(&self) -> Admission {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        self.maybe_transition_to_half_open(&mut inner);
        match inner.state {
            BreakerState::Closed => Admission::Allowed,
            BreakerState::Open => Admission::Rejected,
            BreakerState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_max {
                    inner.half_open_in_flight += 1;
                    Admission::AllowedAsProbe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Report a successful call admitted under [`Admission::Allowed`].
    pub fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures = 0;
    }

    /// Report a failed call admitted under [`Admission::Allowed`].
    pub fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.consecutive_failures += 1;
        if inner.state == BreakerState::Closed && inner.consecutive_failures >= self.config.failure_threshold {
            self.trip(&mut inner);
        }
    }

    /// Report the outcome of a call admitted under [`Admission::AllowedAsProbe`].
    pub fn on_probe_result(&self, success: bool) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        if !success {
            self.trip(&mut inner);
            return;
        }
        inner.consecutive_half_open_successes += 1;
        if inner.consecutive_half_open_successes >= self.config.half_open_max {
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.consecutive_half_open_successes = 0;
            inner.opened_at = None;
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.consecutive_failures = 0;
        inner.consecutive_half_open_successes = 0;
        inner.half_open_in_flight = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold: 5, timeout: Duration::from_millis(20), half_open_max: 3 }
    }

    #[test]
    fn starts_closed_and_allows() {
        let b = CircuitBreaker::new(fast_config());
        assert_eq!(b.state(), BreakerState::Closed);
        assert_eq!(b.allow(), Admission::Allowed);
    }

    #[test]
    fn opens_after_failure_threshold() {
        let b = CircuitBreaker::new(fast_config());
        for _ in 0..5 {
            assert_eq!(b.allow(), Admission::Allowed);
            b.on_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(b.allow(), Admission::Rejected);
    }

    #[test]
    fn success_resets_failure_counter() {
        let b = CircuitBreaker::new(fast_config());
        for _ in 0..4 {
            b.allow();
            b.on_failure();
        }
        b.allow();
        b.on_success();
        for _ in 0..4 {
            b.allow();
            b.on_failure();
        }
        // Only 4 consecutive failures since the reset; still closed.
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn transitions_to_half_open_after_timeout() {
        let b = CircuitBreaker::new(fast_config());
        for _ in 0..5 {
            b.allow();
            b.on_failure();
        }
        assert_eq!(b.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert_eq!(b.allow(), Admission::AllowedAsProbe);
    }

    #[test]
    fn half_open_failure_reopens() {
        let b = CircuitBreaker::new(fast_config());
        for _ in 0..5 {
            b.allow();
            b.on_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(b.allow(), Admission::AllowedAsProbe);
        b.on_probe_result(false);
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_max_successes_closes() {
        let b = CircuitBreaker::new(fast_config());
        for _ in 0..5 {
            b.allow();
            b.on_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        for _ in 0..3 {
            assert_eq!(b.allow(), Admission::AllowedAsProbe);
            b.on_probe_result(true);
        }
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_bounds_concurrent_probes() {
        let b = CircuitBreaker::new(fast_config());
        for _ in 0..5 {
            b.allow();
            b.on_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        for _ in 0..3 {
            assert_eq!(b.allow(), Admission::AllowedAsProbe);
        }
        assert_eq!(b.allow(), Admission::Rejected);
    }
}
