// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token-bucket rate limiting for outbound calls made by network sources
//! (spec §4.8/C8). One limiter per source, built from
//! [`aethonx_core::SourceConfig::rate_limit_per_sec`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

use aethonx_core::CancellationToken;
use governor::{Quota, RateLimiter as GovernorLimiter};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::trace;

type DirectLimiter = GovernorLimiter<governor::state::direct::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// A single source's token bucket. `None` rate ⇒ unlimited (spec: `None` ⇒
/// no rate limiting).
pub struct RateLimiter {
    inner: Option<DirectLimiter>,
}

impl RateLimiter {
    /// Build a limiter admitting `requests_per_sec` requests per second.
    /// `None` or non-positive rates are unlimited.
    #[must_use]
    pub fn new(requests_per_sec: Option<f64>) -> Self {
        let inner = requests_per_sec.and_then(|rps| {
            NonZeroU32::new(rps.ceil().max(1.0) as u32).map(|n| GovernorLimiter::direct(Quota::per_second(n)))
        });
        Self { inner }
    }

    /// An always-unlimited limiter.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Acquire one token, waiting if the bucket is empty. Returns `false` if
    /// `cancellation` fired first (spec §5: `wait(ctx)` returns immediately
    /// on cancellation).
    pub async fn wait(&self, cancellation: &CancellationToken) -> bool {
        let Some(limiter) = &self.inner else {
            return true;
        };
        match cancellation.race(limiter.until_ready()).await {
            Some(()) => {
                trace!("rate limiter admitted request");
                true
            }
            None => false,
        }
    }

    /// Non-blocking check: `true` if a token is immediately available (does
    /// not consume it unless available).
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        match &self.inner {
            None => true,
            Some(limiter) => limiter.check().is_ok(),
        }
    }
}

/// A name → [`RateLimiter`] map, one entry per configured source.
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: BTreeMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    /// An empty registry; [`RateLimiterRegistry::get`] falls back to
    /// unlimited for unknown names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source's configured rate.
    pub fn set(&mut self, source: impl Into<String>, requests_per_sec: Option<f64>) {
        self.limiters.insert(source.into(), Arc::new(RateLimiter::new(requests_per_sec)));
    }

    /// Fetch the limiter for `source`, or an unlimited one if none was
    /// configured.
    #[must_use]
    pub fn get(&self, source: &str) -> Arc<RateLimiter> {
        self.limiters.get(source).cloned().unwrap_or_else(|| Arc::new(RateLimiter::unlimited()))
    }
}
