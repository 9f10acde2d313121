// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Source`] contract every discovery module implements (spec §4.1).
//! Sources are black boxes: the engine only relies on this trait, never on
//! any particular I/O pattern underneath it.

use crate::artifact::{Artifact, ArtifactType};
use crate::cancel::CancellationToken;
use crate::target::{ScanMode, Target};
use aethonx_error::AethonError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// A best-effort, lossy progress counter pushed by a long-running source.
/// Delivery never blocks the source: the channel is bounded and updates are
/// dropped when full (spec §4.6 backpressure rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Human-readable stage description (e.g. `"querying crt.sh"`).
    pub stage: String,
    /// Items processed so far.
    pub processed: u64,
    /// Total items expected, if known.
    pub total: Option<u64>,
}

/// Capacity of the bounded progress channel returned by
/// [`Source::subscribe_progress`].
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Per-scan execution context passed to [`Source::run`]: the cancellation
/// signal and an optional per-source deadline derived from
/// [`SourceConfig::timeout`].
#[derive(Clone)]
pub struct ScanContext {
    /// The scan-wide cancellation token. Sources must honor it at their
    /// next suspension point.
    pub cancellation: CancellationToken,
    /// Per-source deadline, if one was configured.
    pub deadline: Option<Duration>,
}

impl ScanContext {
    /// Build a context from a token and optional deadline.
    #[must_use]
    pub fn new(cancellation: CancellationToken, deadline: Option<Duration>) -> Self {
        Self { cancellation, deadline }
    }
}

/// The outcome of a single [`Source::run`] invocation. Artifacts and an
/// error may both be present (spec §4.1: `run() → (partial_result, error)`)
/// — a source that partially fails still returns what it found.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Artifacts discovered during this invocation, in emission order
    /// (preserved into the aggregator per spec §4.6 ordering guarantees).
    pub artifacts: Vec<Artifact>,
    /// Non-fatal warnings (spec's source-warning taxonomy).
    pub warnings: Vec<String>,
    /// Fatal-for-this-call error, if any. Retried by the resilience
    /// envelope up to its bound; does not discard `artifacts`/`warnings`.
    pub error: Option<AethonError>,
}

impl RunOutcome {
    /// An outcome with no artifacts, warnings, or error.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// An outcome carrying only artifacts.
    #[must_use]
    pub fn ok(artifacts: Vec<Artifact>) -> Self {
        Self { artifacts, warnings: Vec::new(), error: None }
    }

    /// An outcome carrying only a fatal error.
    #[must_use]
    pub fn failed(error: AethonError) -> Self {
        Self { artifacts: Vec::new(), warnings: Vec::new(), error: Some(error) }
    }
}

/// Per-source configuration record, keyed by source name in the engine
/// config's `SourceConfig` map (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Whether the source participates in the scan at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-source timeout; `None` ⇒ no per-source deadline.
    #[serde(default, with = "humantime_serde_opt")]
    pub timeout: Option<Duration>,
    /// Additional retry attempts after the first (resilience envelope).
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Token-bucket rate, in requests per second, for this source's own
    /// outbound calls. `None` ⇒ unlimited.
    #[serde(default)]
    pub rate_limit_per_sec: Option<f64>,
    /// Scheduling priority within its stage; higher runs first.
    #[serde(default)]
    pub priority: i32,
    /// Source-specific options, opaque to the engine.
    #[serde(default)]
    pub custom: serde_json::Value,
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    3
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: None,
            retries: default_retries(),
            rate_limit_per_sec: None,
            priority: 0,
            custom: serde_json::Value::Null,
        }
    }
}

/// Minimal `humantime`-free duration (de)serialization as seconds, avoiding
/// an extra workspace dependency just for this one field.
mod humantime_serde_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_secs_f64()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<f64> = Option::deserialize(d)?;
        Ok(secs.map(Duration::from_secs_f64))
    }
}

/// An independent discovery module: the orchestrator's unit of scheduling.
/// Sources are black boxes — the engine must not assume any particular I/O
/// pattern beyond this contract (spec §4.1).
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable, unique name (used for provenance, config keys, and
    /// scheduling).
    fn name(&self) -> &str;

    /// Whether this source may run in `passive`-only scans, or requires
    /// `active` mode.
    fn mode(&self) -> ScanMode;

    /// Artifact types this source consumes from earlier stages. Empty ⇒
    /// seed source (lands in stage 0).
    fn input_artifact_types(&self) -> &[ArtifactType];

    /// Artifact types this source may produce.
    fn output_artifact_types(&self) -> &[ArtifactType];

    /// Scheduling priority within a stage; higher runs first (ties broken
    /// by name).
    fn priority(&self) -> i32 {
        0
    }

    /// Explicit stage assignment, if the source requires one. `None` ⇒ the
    /// planner infers the smallest satisfiable stage.
    fn stage_hint(&self) -> Option<usize> {
        None
    }

    /// Bounded-duration execution. Must honor `ctx.cancellation` at its
    /// next suspension point. `inputs` has already been pre-filtered to
    /// this source's declared `input_artifact_types`.
    async fn run(&self, ctx: &ScanContext, target: &Target, inputs: &[Artifact]) -> RunOutcome;

    /// Subscribe to a best-effort, lossy live-progress stream. Default: no
    /// progress reporting.
    fn subscribe_progress(&self) -> Option<mpsc::Receiver<ProgressUpdate>> {
        None
    }

    /// Release resources; called once at engine shutdown.
    async fn close(&self) -> Result<(), AethonError> {
        Ok(())
    }
}

/// Push a [`ProgressUpdate`] without ever blocking the producer; drops the
/// update if the channel is full (spec §4.6, §5 backpressure rule).
pub fn publish_progress(tx: &mpsc::Sender<ProgressUpdate>, update: ProgressUpdate) {
    let _ = tx.try_send(update);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_config_defaults() {
        let c = SourceConfig::default();
        assert!(c.enabled);
        assert_eq!(c.retries, 3);
        assert!(c.timeout.is_none());
        assert_eq!(c.priority, 0);
    }

    #[test]
    fn source_config_serde_roundtrip() {
        let c = SourceConfig {
            enabled: false,
            timeout: Some(Duration::from_secs(30)),
            retries: 5,
            rate_limit_per_sec: Some(2.5),
            priority: 10,
            custom: serde_json::json!({"api_key": "x"}),
        };
        let json = serde_json::to_string(&c).unwrap();
        let back: SourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.enabled, false);
        assert_eq!(back.retries, 5);
        assert_eq!(back.timeout, Some(Duration::from_secs(30)));
        assert_eq!(back.rate_limit_per_sec, Some(2.5));
    }

    #[test]
    fn run_outcome_helpers() {
        let empty = RunOutcome::empty();
        assert!(empty.artifacts.is_empty() && empty.error.is_none());

        let failed = RunOutcome::failed(AethonError::new(
            aethonx_error::ErrorCode::SourceTimeout,
            "timed out",
        ));
        assert!(failed.error.is_some());
    }

    #[test]
    fn publish_progress_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        publish_progress(
            &tx,
            ProgressUpdate { stage: "a".into(), processed: 1, total: None },
        );
        publish_progress(
            &tx,
            ProgressUpdate { stage: "b".into(), processed: 2, total: None },
        );
        let first = rx.try_recv().unwrap();
        assert_eq!(first.stage, "a");
        assert!(rx.try_recv().is_err());
    }
}
