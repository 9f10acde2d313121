// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic, in-memory [`Source`] fixtures. These never touch the
//! network or the filesystem; they exist so the orchestrator, registry, and
//! writer can be exercised end to end in tests and benches without a real
//! discovery module.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use aethonx_core::{Artifact, ArtifactType, ScanContext, ScanMode, Source, SourceConfig, Target};
use aethonx_error::{AethonError, ErrorCode};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A seed source: no inputs, emits one artifact per configured value.
pub struct SeedSource {
    name: &'static str,
    artifact_type: ArtifactType,
    values: Vec<&'static str>,
    confidence: f64,
    priority: i32,
}

impl SeedSource {
    /// Build a seed source emitting `values` as `artifact_type` artifacts.
    #[must_use]
    pub fn new(name: &'static str, artifact_type: ArtifactType, values: Vec<&'static str>) -> Self {
        Self { name, artifact_type, values, confidence: 0.9, priority: 0 }
    }

    /// Override the default scheduling priority (`0`).
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
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
        std::slice::from_ref(&self.artifact_type)
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> aethonx_core::RunOutcome {
        let artifacts = self
            .values
            .iter()
            .filter_map(|v| Artifact::new(self.artifact_type, *v, self.name, self.confidence, chrono::Utc::now()).ok())
            .collect();
        aethonx_core::RunOutcome::ok(artifacts)
    }
}

/// A downstream source: consumes one artifact type, emits a fixed number of
/// artifacts of another type per input it sees. Records how many inputs it
/// was handed, for assertions on stage wiring.
pub struct ChainSource {
    name: &'static str,
    input_type: ArtifactType,
    output_type: ArtifactType,
    emit_per_input: usize,
    seen_inputs: Arc<AtomicUsize>,
}

impl ChainSource {
    /// Build a chained source mapping one `input_type` artifact to
    /// `emit_per_input` `output_type` artifacts.
    #[must_use]
    pub fn new(name: &'static str, input_type: ArtifactType, output_type: ArtifactType, emit_per_input: usize) -> Self {
        Self { name, input_type, output_type, emit_per_input, seen_inputs: Arc::new(AtomicUsize::new(0)) }
    }

    /// Number of inputs this source has been handed across all `run` calls.
    #[must_use]
    pub fn inputs_seen(&self) -> usize {
        self.seen_inputs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for ChainSource {
    fn name(&self) -> &str {
        self.name
    }

    fn mode(&self) -> ScanMode {
        ScanMode::Passive
    }

    fn input_artifact_types(&self) -> &[ArtifactType] {
        std::slice::from_ref(&self.input_type)
    }

    fn output_artifact_types(&self) -> &[ArtifactType] {
        std::slice::from_ref(&self.output_type)
    }

    async fn run(&self, _ctx: &ScanContext, _target: &Target, inputs: &[Artifact]) -> aethonx_core::RunOutcome {
        self.seen_inputs.fetch_add(inputs.len(), Ordering::SeqCst);
        let mut artifacts = Vec::new();
        for (i, input) in inputs.iter().enumerate() {
            for j in 0..self.emit_per_input {
                let value = format!("{}-{i}-{j}", input.canonical_value);
                if let Ok(a) = Artifact::new(self.output_type, value, self.name, 0.7, chrono::Utc::now()) {
                    artifacts.push(a);
                }
            }
        }
        aethonx_core::RunOutcome::ok(artifacts)
    }
}

/// Two seed sources that independently discover the *same* canonical
/// artifact under different raw spellings, for exercising merge-on-duplicate
/// across sources. Pair one with [`duplicate_pair`].
pub fn duplicate_pair(
    artifact_type: ArtifactType,
    raw_a: &'static str,
    raw_b: &'static str,
) -> (Arc<dyn Source>, Arc<dyn Source>) {
    let a: Arc<dyn Source> = Arc::new(SeedSource::new("dup-a", artifact_type, vec![raw_a]));
    let b: Arc<dyn Source> = Arc::new(SeedSource::new("dup-b", artifact_type, vec![raw_b]));
    (a, b)
}

/// A source whose `run` always fails, for resilience and fail-fast tests.
pub struct AlwaysFailingSource {
    name: &'static str,
    output_type: ArtifactType,
    call_count: Arc<AtomicUsize>,
}

impl AlwaysFailingSource {
    /// Build a source that fails every invocation.
    #[must_use]
    pub fn new(name: &'static str, output_type: ArtifactType) -> Self {
        Self { name, output_type, call_count: Arc::new(AtomicUsize::new(0)) }
    }

    /// Number of times `run` has been invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for AlwaysFailingSource {
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
        std::slice::from_ref(&self.output_type)
    }

    async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> aethonx_core::RunOutcome {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        aethonx_core::RunOutcome::failed(AethonError::new(ErrorCode::SourceTimeout, "mock source always fails"))
    }
}

/// A source that fails its first `fail_times` invocations, then succeeds.
/// Useful for exercising the retry/circuit-breaker envelope against a
/// source that is scheduled more than once (benches, repeated scans).
pub struct IntermittentSource {
    name: &'static str,
    output_type: ArtifactType,
    fail_times: usize,
    attempts: Arc<AtomicUsize>,
}

impl IntermittentSource {
    /// Build a source that fails `fail_times` times, then succeeds with one
    /// `output_type` artifact.
    #[must_use]
    pub fn new(name: &'static str, output_type: ArtifactType, fail_times: usize) -> Self {
        Self { name, output_type, fail_times, attempts: Arc::new(AtomicUsize::new(0)) }
    }
}

#[async_trait]
impl Source for IntermittentSource {
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
        std::slice::from_ref(&self.output_type)
    }

    async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> aethonx_core::RunOutcome {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_times {
            return aethonx_core::RunOutcome::failed(AethonError::new(ErrorCode::SourceTimeout, "mock transient failure"));
        }
        let a = Artifact::new(self.output_type, format!("{}-recovered", self.name), self.name, 0.6, chrono::Utc::now()).unwrap();
        aethonx_core::RunOutcome::ok(vec![a])
    }
}

/// A seed source emitting `count` distinct artifacts in one call, for
/// exercising the streaming writer's spill-to-disk threshold.
pub struct HighVolumeSource {
    name: &'static str,
    output_type: ArtifactType,
    count: usize,
}

impl HighVolumeSource {
    /// Build a source that emits `count` artifacts of `output_type` per run.
    #[must_use]
    pub fn new(name: &'static str, output_type: ArtifactType, count: usize) -> Self {
        Self { name, output_type, count }
    }
}

#[async_trait]
impl Source for HighVolumeSource {
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
        std::slice::from_ref(&self.output_type)
    }

    async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[Artifact]) -> aethonx_core::RunOutcome {
        let artifacts = (0..self.count)
            .filter_map(|i| Artifact::new(self.output_type, format!("{}-item-{i}", self.name), self.name, 0.5, chrono::Utc::now()).ok())
            .collect();
        aethonx_core::RunOutcome::ok(artifacts)
    }
}

/// Register a representative set of mock sources under recon-flavored
/// names (`seed-domain`, `cert-transparency`, `dns-resolve`), for CLI smoke
/// tests and demos that want something runnable without real network
/// access. Ignores `_config` beyond enablement, which the registry already
/// filters on.
pub fn register_demo_sources(registry: &mut aethonx_registry::SourceRegistry) {
    registry.register("seed-domain", |_: &SourceConfig| -> Arc<dyn Source> {
        Arc::new(SeedSource::new("seed-domain", ArtifactType::Domain, vec!["example.com"]).with_priority(10))
    });
    registry.register("cert-transparency", |_: &SourceConfig| -> Arc<dyn Source> {
        Arc::new(ChainSource::new("cert-transparency", ArtifactType::Domain, ArtifactType::Subdomain, 2))
    });
    registry.register("dns-resolve", |_: &SourceConfig| -> Arc<dyn Source> {
        Arc::new(ChainSource::new("dns-resolve", ArtifactType::Subdomain, ArtifactType::Ip, 1))
    });
}
