// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`ResilientSource`]: wraps any [`Source`] with retry + circuit breaker,
//! presenting the same [`Source`] contract to the orchestrator (spec §4.5,
//! §4.6 step 3b).

use crate::breaker::{Admission, CircuitBreaker, CircuitBreakerConfig};
use crate::retry::RetryPolicy;
use aethonx_core::{Artifact, ArtifactType, ProgressUpdate, RunOutcome, ScanContext, ScanMode, Source, Target};
use aethonx_error::{AethonError, ErrorCode};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Wraps a [`Source`] with bounded retries, exponential backoff, and an
/// optional circuit breaker. The envelope does not distinguish error
/// classes: every error returned by the inner source is retried up to the
/// bound (spec §4.5).
pub struct ResilientSource {
    inner: std::sync::Arc<dyn Source>,
    retry: RetryPolicy,
    breaker: Option<CircuitBreaker>,
}

impl ResilientSource {
    /// Wrap `inner` with the given retry policy and, if `breaker_config` is
    /// `Some`, a circuit breaker.
    #[must_use]
    pub fn new(
        inner: std::sync::Arc<dyn Source>,
        retry: RetryPolicy,
        breaker_config: Option<CircuitBreakerConfig>,
    ) -> Self {
        Self { inner, retry, breaker: breaker_config.map(CircuitBreaker::new) }
    }

    /// The wrapped source's name, exposed for diagnostics before the trait
    /// object is built.
    #[must_use]
    pub fn inner_name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait]
impl Source for ResilientSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn mode(&self) -> ScanMode {
        self.inner.mode()
    }

    fn input_artifact_types(&self) -> &[ArtifactType] {
        self.inner.input_artifact_types()
    }

    fn output_artifact_types(&self) -> &[ArtifactType] {
        self.inner.output_artifact_types()
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }

    fn stage_hint(&self) -> Option<usize> {
        self.inner.stage_hint()
    }

    async fn run(&self, ctx: &ScanContext, target: &Target, inputs: &[Artifact]) -> RunOutcome {
        let name = self.inner.name();

        let is_probe = match self.breaker.as_ref().map(CircuitBreaker::allow) {
            Some(Admission::Rejected) => {
                warn!(source = name, "circuit open, rejecting call");
                return RunOutcome::failed(
                    AethonError::new(ErrorCode::CircuitOpen, "circuit breaker is open")
                        .with_context("source", name),
                );
            }
            Some(Admission::AllowedAsProbe) => true,
            Some(Admission::Allowed) | None => false,
        };

        let mut attempt = 0u32;
        let outcome = loop {
            if ctx.cancellation.is_cancelled() {
                break RunOutcome::failed(
                    AethonError::new(ErrorCode::ScanCanceled, "scan canceled before source ran")
                        .with_context("source", name),
                );
            }

            let outcome = self.inner.run(ctx, target, inputs).await;
            if outcome.error.is_none() || attempt >= self.retry.max_retries {
                if outcome.error.is_some() {
                    debug!(source = name, attempt, "source exhausted retries");
                }
                break outcome;
            }

            let delay = self.retry.delay_for_attempt(attempt);
            debug!(source = name, attempt, delay_ms = delay.as_millis() as u64, "retrying source after failure");
            if ctx.cancellation.race(tokio::time::sleep(delay)).await.is_none() {
                break RunOutcome::failed(
                    AethonError::new(ErrorCode::ScanCanceled, "scan canceled during retry backoff")
                        .with_context("source", name),
                );
            }
            attempt += 1;
        };

        if let Some(breaker) = &self.breaker {
            let succeeded = outcome.error.is_none();
            if is_probe {
                breaker.on_probe_result(succeeded);
            } else if succeeded {
                breaker.on_success();
            } else {
                breaker.on_failure();
            }
        }

        outcome
    }

    fn subscribe_progress(&self) -> Option<mpsc::Receiver<ProgressUpdate>> {
        self.inner.subscribe_progress()
    }

    async fn close(&self) -> Result<(), AethonError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aethonx_core::{CancellationToken, Target};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FlakySource {
        name: &'static str,
        failures_then_success: AtomicU32,
        calls: AtomicU32,
        inputs: Vec<ArtifactType>,
        outputs: Vec<ArtifactType>,
    }

    #[async_trait]
    impl Source for FlakySource {
        fn name(&self) -> &str {
            self.name
        }
        fn mode(&self) -> ScanMode {
            ScanMode::Passive
        }
        fn input_artifact_types(&self) -> &[ArtifactType] {
            &self.inputs
        }
        fn output_artifact_types(&self) -> &[ArtifactType] {
            &self.outputs
        }
        async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> RunOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_then_success.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n == 0 {
                    None
                } else {
                    Some(n - 1)
                }
            });
            if remaining.is_ok() {
                RunOutcome::failed(AethonError::new(ErrorCode::SourceTimeout, "flaked"))
            } else {
                RunOutcome::ok(vec![])
            }
        }
    }

    fn ctx() -> ScanContext {
        ScanContext::new(CancellationToken::new(), None)
    }

    fn target() -> Target {
        Target::new("example.com", ScanMode::Passive)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(1), 1.0)
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures_within_bound() {
        let flaky = Arc::new(FlakySource {
            name: "flaky",
            failures_then_success: AtomicU32::new(2),
            calls: AtomicU32::new(0),
            inputs: vec![],
            outputs: vec![ArtifactType::Domain],
        });
        let wrapped = ResilientSource::new(flaky.clone(), fast_retry(), None);
        let outcome = wrapped.run(&ctx(), &target(), &[]).await;
        assert!(outcome.error.is_none());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries_exhausted() {
        let flaky = Arc::new(FlakySource {
            name: "flaky",
            failures_then_success: AtomicU32::new(100),
            calls: AtomicU32::new(0),
            inputs: vec![],
            outputs: vec![ArtifactType::Domain],
        });
        let wrapped = ResilientSource::new(flaky.clone(), RetryPolicy::new(2, Duration::from_millis(1), 1.0), None);
        let outcome = wrapped.run(&ctx(), &target(), &[]).await;
        assert!(outcome.error.is_some());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn circuit_open_rejects_without_calling_inner() {
        let flaky = Arc::new(FlakySource {
            name: "flaky",
            failures_then_success: AtomicU32::new(100),
            calls: AtomicU32::new(0),
            inputs: vec![],
            outputs: vec![ArtifactType::Domain],
        });
        let breaker_config = CircuitBreakerConfig { failure_threshold: 1, timeout: Duration::from_secs(60), half_open_max: 1 };
        let wrapped = ResilientSource::new(flaky.clone(), RetryPolicy::new(0, Duration::from_millis(1), 1.0), Some(breaker_config));

        let first = wrapped.run(&ctx(), &target(), &[]).await;
        assert!(first.error.is_some());
        let calls_after_first = flaky.calls.load(Ordering::SeqCst);

        let second = wrapped.run(&ctx(), &target(), &[]).await;
        assert_eq!(second.error.unwrap().code, ErrorCode::CircuitOpen);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn cancellation_aborts_retry_loop() {
        let flaky = Arc::new(FlakySource {
            name: "flaky",
            failures_then_success: AtomicU32::new(100),
            calls: AtomicU32::new(0),
            inputs: vec![],
            outputs: vec![ArtifactType::Domain],
        });
        let token = CancellationToken::new();
        token.cancel();
        let wrapped = ResilientSource::new(flaky, RetryPolicy::new(5, Duration::from_millis(1), 1.0), None);
        let outcome = wrapped.run(&ScanContext::new(token, None), &target(), &[]).await;
        assert_eq!(outcome.error.unwrap().code, ErrorCode::ScanCanceled);
    }

    #[tokio::test]
    async fn delegates_declared_types_and_name() {
        let flaky = Arc::new(FlakySource {
            name: "flaky",
            failures_then_success: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            inputs: vec![ArtifactType::Subdomain],
            outputs: vec![ArtifactType::Ip],
        });
        let wrapped = ResilientSource::new(flaky, fast_retry(), None);
        assert_eq!(wrapped.name(), "flaky");
        assert_eq!(wrapped.input_artifact_types(), &[ArtifactType::Subdomain]);
        assert_eq!(wrapped.output_artifact_types(), &[ArtifactType::Ip]);
    }
}
