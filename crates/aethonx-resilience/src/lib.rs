// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resilience envelope wrapping every source with bounded retries,
//! exponential backoff, and a per-source circuit breaker (spec §4.5).
//!
//! [`ResilientSource`] itself implements [`aethonx_core::Source`], so the
//! orchestrator schedules wrapped and unwrapped sources identically — the
//! envelope is transparent to everything upstream of it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod envelope;
pub mod retry;

pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use envelope::ResilientSource;
pub use retry::RetryPolicy;
