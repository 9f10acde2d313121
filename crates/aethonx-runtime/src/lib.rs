// SPDX-License-Identifier: MIT OR Apache-2.0
//! The staged orchestrator (spec §4.6/C6): the core scheduling loop that
//! walks the stage DAG built by [`aethonx_registry::StagePlanner`], runs
//! each stage's sources through a bounded worker pool wrapped in the
//! resilience envelope, and feeds their output into the aggregator and
//! streaming writer.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;

pub use config::RunConfig;

use aethonx_core::{Artifact, ArtifactType, ScanAggregator, ScanContext, ScanResult, Source, Target};
use aethonx_error::{AethonError, ErrorCode};
use aethonx_registry::StagePlanner;
use aethonx_resilience::{CircuitBreakerConfig, ResilientSource, RetryPolicy};
use aethonx_writer::{ResultDocument, StreamingWriter};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a full orchestrator run: the finalized [`ScanResult`] plus the
/// consolidated [`ResultDocument`] written to disk.
#[derive(Debug)]
pub struct EngineRun {
    /// The in-memory finalized scan state.
    pub scan: ScanResult,
    /// The document written to `result.json`.
    pub document: ResultDocument,
}

/// Drives a single scan end to end (spec §4.6 "Per-scan run").
pub struct Orchestrator {
    config: RunConfig,
    writer: Arc<StreamingWriter>,
}

impl Orchestrator {
    /// Build an orchestrator writing through `writer`, tuned by `config`.
    #[must_use]
    pub fn new(config: RunConfig, writer: Arc<StreamingWriter>) -> Self {
        Self { config, writer }
    }

    /// Run one scan against `target` using `sources` (already instantiated
    /// by [`aethonx_registry::SourceRegistry::build`]).
    ///
    /// 1. Validates `target`.
    /// 2. Plans the stage DAG.
    /// 3. Creates the root cancellation token, attaching the scan-wide
    ///    timeout (if configured) and OS-signal cancellation.
    /// 4. Walks stages serially; within a stage, sources run concurrently
    ///    up to `config.max_workers`.
    /// 5. Finalizes the aggregator, consolidates the writer, and closes
    ///    every source.
    pub async fn run(&self, target: Target, sources: Vec<Arc<dyn Source>>) -> Result<EngineRun, AethonError> {
        target.validate()?;
        let stages = StagePlanner::plan(sources)?;

        let cancellation = aethonx_core::CancellationToken::new();
        let _timeout_guard = self.spawn_timeout_guard(&cancellation);
        let _signal_guard = self.spawn_signal_guard(&cancellation);

        let scan_id = Uuid::new_v4().to_string();
        let aggregator = Arc::new(ScanAggregator::new(target.clone(), scan_id));
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));

        info!(target = %target.root, stages = stages.len(), "scan starting");

        'stages: for (stage_index, stage) in stages.iter().enumerate() {
            if cancellation.is_cancelled() {
                aggregator.add_warning("engine", "scan canceled before all stages ran");
                break 'stages;
            }

            let input_snapshot = aggregator.snapshot();
            let inputs: Vec<Artifact> = input_snapshot.artifacts.into_values().collect();

            debug!(stage = stage_index, sources = stage.len(), "running stage");

            let mut handles = Vec::with_capacity(stage.len());
            for source in stage {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let wrapped = self.wrap_source(Arc::clone(source));
                let filtered_inputs = filter_inputs(&inputs, wrapped.input_artifact_types());
                let ctx = ScanContext::new(cancellation.clone(), self.config.source_config(wrapped.name()).timeout);
                let target = target.clone();
                let aggregator = Arc::clone(&aggregator);
                let writer = Arc::clone(&self.writer);
                let fail_fast = self.config.fail_fast;

                let has_progress_channel = wrapped.subscribe_progress().is_some();

                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    let name = wrapped.name().to_string();
                    let outcome = wrapped.run(&ctx, &target, &filtered_inputs).await;

                    for artifact in outcome.artifacts {
                        if has_progress_channel {
                            writer.emit(&name, artifact.clone()).await.ok();
                        }
                        aggregator.add(artifact);
                    }
                    for warning in outcome.warnings {
                        aggregator.add_warning(&name, warning);
                    }
                    if let Some(err) = outcome.error {
                        warn!(source = %name, error = %err, "source returned a fatal error");
                        aggregator.add_error(&name, err.to_string(), false);
                        return Err(fail_fast);
                    }
                    Ok(())
                });
                handles.push(handle);
            }

            let mut stage_failed = false;
            for handle in handles {
                match handle.await {
                    Ok(Ok(())) => {}
                    Ok(Err(should_abort)) => stage_failed = stage_failed || should_abort,
                    Err(join_err) => {
                        aggregator.add_error("engine", format!("source task panicked: {join_err}"), false);
                    }
                }
            }

            if cancellation.is_cancelled() {
                aggregator.add_warning("engine", "scan canceled mid-stage");
                break 'stages;
            }
            if stage_failed {
                // fail_fast only prevents further stages from starting; it
                // never cancels in-flight peers within the same stage
                // (spec §9 open question, resolved conservatively).
                info!(stage = stage_index, "fail_fast set and a source failed; stopping further stages");
                break 'stages;
            }
        }

        for source in stages.iter().flatten() {
            if let Err(e) = source.close().await {
                warn!(source = source.name(), error = %e, "error closing source");
            }
        }

        let document = self
            .writer
            .consolidate(&aggregator)
            .await
            .map_err(|e| e.with_context("phase", "consolidate"))?;
        let scan = aggregator.finalize();

        info!(
            artifacts = document.artifacts.len(),
            warnings = document.warnings.len(),
            errors = document.errors.len(),
            "scan finished"
        );

        Ok(EngineRun { scan, document })
    }

    fn wrap_source(&self, source: Arc<dyn Source>) -> Arc<dyn Source> {
        let source_config = self.config.source_config(source.name());
        let retry = RetryPolicy::new(source_config.retries, std::time::Duration::from_millis(500), 2.0);
        let breaker_config: Option<CircuitBreakerConfig> =
            self.config.circuit_breaker_enabled.then(|| self.config.circuit_breaker);
        Arc::new(ResilientSource::new(source, retry, breaker_config))
    }

    fn spawn_timeout_guard(&self, cancellation: &aethonx_core::CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        let timeout = self.config.scan_timeout?;
        let token = cancellation.clone();
        Some(tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    info!(timeout_secs = timeout.as_secs(), "scan-wide timeout elapsed, canceling");
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        }))
    }

    fn spawn_signal_guard(&self, cancellation: &aethonx_core::CancellationToken) -> tokio::task::JoinHandle<()> {
        let token = cancellation.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal, canceling scan");
                    token.cancel();
                }
                () = token.cancelled() => {}
            }
        })
    }
}

/// Pre-filter `inputs` down to the artifact types a source declares it
/// consumes (spec §4.6 step 3a).
fn filter_inputs(inputs: &[Artifact], wanted: &[ArtifactType]) -> Vec<Artifact> {
    if wanted.is_empty() {
        return Vec::new();
    }
    inputs.iter().filter(|a| wanted.contains(&a.artifact_type)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use aethonx_core::{ArtifactType, ProgressUpdate, RunOutcome, ScanMode};
    use async_trait::async_trait;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    struct SeedSource {
        name: &'static str,
        outputs: Vec<ArtifactType>,
        priority: i32,
        value: &'static str,
        artifact_type: ArtifactType,
    }

    #[async_trait]
    impl Source for SeedSource {
        fn name(&self) -> &str {
            self.name
        }
        fn mode(&self) -> ScanMode {
            ScanMode::Passive
        }
        fn input_artifact_types(&self) -> &[ArtifactType] {
            &[]
        }
        fn output_artifact_types(&self) -> &[ArtifactType] {
            &self.outputs
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> RunOutcome {
            let a = Artifact::new(self.artifact_type, self.value, self.name, 0.8, chrono::Utc::now()).unwrap();
            RunOutcome::ok(vec![a])
        }
        fn subscribe_progress(&self) -> Option<mpsc::Receiver<ProgressUpdate>> {
            None
        }
    }

    struct ChainedSource {
        name: &'static str,
        inputs: Vec<ArtifactType>,
        outputs: Vec<ArtifactType>,
        seen_inputs: std::sync::Arc<std::sync::Mutex<usize>>,
    }

    #[async_trait]
    impl Source for ChainedSource {
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
        async fn run(&self, _ctx: &ScanContext, _target: &Target, inputs: &[Artifact]) -> RunOutcome {
            *self.seen_inputs.lock().unwrap() = inputs.len();
            let artifacts = inputs
                .iter()
                .map(|_| Artifact::new(ArtifactType::Ip, "1.2.3.4", self.name, 0.7, chrono::Utc::now()).unwrap())
                .take(1)
                .collect();
            RunOutcome::ok(artifacts)
        }
    }

    struct FailingSource {
        name: &'static str,
    }

    #[async_trait]
    impl Source for FailingSource {
        fn name(&self) -> &str {
            self.name
        }
        fn mode(&self) -> ScanMode {
            ScanMode::Passive
        }
        fn input_artifact_types(&self) -> &[ArtifactType] {
            &[]
        }
        fn output_artifact_types(&self) -> &[ArtifactType] {
            &[ArtifactType::Domain]
        }
        async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> RunOutcome {
            RunOutcome::failed(AethonError::new(ErrorCode::SourceTimeout, "always fails"))
        }
    }

    fn target() -> Target {
        Target::new("example.com", ScanMode::Passive)
    }

    async fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        let writer = Arc::new(StreamingWriter::new(dir, aethonx_writer::WriterConfig::default()).unwrap());
        Orchestrator::new(RunConfig { scan_timeout: None, ..RunConfig::default() }, writer)
    }

    #[tokio::test]
    async fn seed_only_dag_runs_both_sources_in_one_stage() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path()).await;
        let s0a: Arc<dyn Source> =
            Arc::new(SeedSource { name: "S0a", outputs: vec![ArtifactType::Domain], priority: 10, value: "example.com", artifact_type: ArtifactType::Domain });
        let s0b: Arc<dyn Source> =
            Arc::new(SeedSource { name: "S0b", outputs: vec![ArtifactType::Nameserver], priority: 5, value: "ns1.example.com", artifact_type: ArtifactType::Nameserver });

        let run = orch.run(target(), vec![s0a, s0b]).await.unwrap();
        assert_eq!(run.document.artifacts.len(), 2);
        assert!(run.document.errors.is_empty());
    }

    #[tokio::test]
    async fn chained_dag_feeds_downstream_stage() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path()).await;
        let seen = std::sync::Arc::new(std::sync::Mutex::new(0usize));
        let p: Arc<dyn Source> =
            Arc::new(SeedSource { name: "P", outputs: vec![ArtifactType::Subdomain], priority: 0, value: "api.example.com", artifact_type: ArtifactType::Subdomain });
        let q: Arc<dyn Source> = Arc::new(ChainedSource {
            name: "Q",
            inputs: vec![ArtifactType::Subdomain],
            outputs: vec![ArtifactType::Ip],
            seen_inputs: seen.clone(),
        });

        let run = orch.run(target(), vec![p, q]).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), 1);
        assert_eq!(run.document.artifacts.len(), 2);
    }

    #[tokio::test]
    async fn unsatisfiable_dag_fails_before_any_run() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path()).await;
        let x: Arc<dyn Source> = Arc::new(ChainedSource {
            name: "X",
            inputs: vec![ArtifactType::Service],
            outputs: vec![ArtifactType::Domain],
            seen_inputs: std::sync::Arc::new(std::sync::Mutex::new(0)),
        });
        let err = orch.run(target(), vec![x]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanUnsatisfiable);
    }

    #[tokio::test]
    async fn every_source_failing_yields_errors_and_no_artifacts() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(dir.path()).await;
        let f: Arc<dyn Source> = Arc::new(FailingSource { name: "flaky" });
        let run = orch.run(target(), vec![f]).await.unwrap();
        assert!(run.document.artifacts.is_empty());
        assert!(!run.document.errors.is_empty());
    }

    #[tokio::test]
    async fn cancellation_before_run_yields_partial_result_with_warning() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(StreamingWriter::new(dir.path(), aethonx_writer::WriterConfig::default()).unwrap());
        let orch = Orchestrator::new(
            RunConfig { scan_timeout: Some(std::time::Duration::from_millis(1)), ..RunConfig::default() },
            writer,
        );
        let slow: Arc<dyn Source> = Arc::new(SlowSource);
        let run = orch.run(target(), vec![slow]).await.unwrap();
        assert!(run.document.warnings.iter().any(|w| w.message.contains("cancel")) || run.scan.finished_at.is_some());
    }

    struct SlowSource;

    #[async_trait]
    impl Source for SlowSource {
        fn name(&self) -> &str {
            "slow"
        }
        fn mode(&self) -> ScanMode {
            ScanMode::Passive
        }
        fn input_artifact_types(&self) -> &[ArtifactType] {
            &[]
        }
        fn output_artifact_types(&self) -> &[ArtifactType] {
            &[ArtifactType::Domain]
        }
        async fn run(&self, ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> RunOutcome {
            if ctx.cancellation.race(tokio::time::sleep(std::time::Duration::from_secs(5))).await.is_none() {
                return RunOutcome::failed(AethonError::new(ErrorCode::ScanCanceled, "canceled"));
            }
            RunOutcome::ok(vec![])
        }
    }

    #[test]
    fn filter_inputs_drops_unwanted_types() {
        let domain = Artifact::new(ArtifactType::Domain, "example.com", "s", 0.5, chrono::Utc::now()).unwrap();
        let sub = Artifact::new(ArtifactType::Subdomain, "api.example.com", "s", 0.5, chrono::Utc::now()).unwrap();
        let filtered = filter_inputs(&[domain, sub], &[ArtifactType::Subdomain]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].artifact_type, ArtifactType::Subdomain);
    }

    #[test]
    fn filter_inputs_empty_wanted_means_no_inputs() {
        let domain = Artifact::new(ArtifactType::Domain, "example.com", "s", 0.5, chrono::Utc::now()).unwrap();
        let filtered = filter_inputs(&[domain], &[]);
        assert!(filtered.is_empty());
    }
}
