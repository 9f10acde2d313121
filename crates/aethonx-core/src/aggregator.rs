// SPDX-License-Identifier: MIT OR Apache-2.0
//! The scan-scoped, thread-safe artifact store (spec §4.3). All mutations
//! serialize under a single lock; readers observe either a `snapshot()`
//! copy, the lock-free atomic counters, or the immutable post-`finalize()`
//! state.

use crate::artifact::{Artifact, ArtifactId, ArtifactType};
use crate::merge::merge_artifact;
use crate::target::Target;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A non-fatal, per-source warning recorded on a [`ScanResult`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanWarning {
    /// Name of the source that raised the warning.
    pub source: String,
    /// Human-readable message.
    pub message: String,
}

/// A fatal-for-source (but non-fatal-for-scan, unless `fatal` marks an
/// engine-level failure) error recorded on a [`ScanResult`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanError {
    /// Name of the source that raised the error (or `"engine"`).
    pub source: String,
    /// Human-readable message.
    pub message: String,
    /// Whether this error is fatal for the whole scan, not just the source.
    pub fatal: bool,
}

/// Engine identity stamped onto every [`ScanResult`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanResultMetadata {
    /// Engine crate version.
    pub version: String,
    /// Source control revision, if known at build time.
    pub commit: Option<String>,
    /// Unique identifier for this scan.
    pub scan_id: String,
}

impl ScanResultMetadata {
    /// Build metadata stamped with [`crate::ENGINE_VERSION`] and a fresh
    /// scan id (the caller supplies the id so it stays deterministic under
    /// test).
    #[must_use]
    pub fn new(scan_id: impl Into<String>) -> Self {
        Self {
            version: crate::ENGINE_VERSION.to_string(),
            commit: option_env!("AETHONX_COMMIT").map(str::to_string),
            scan_id: scan_id.into(),
        }
    }
}

/// The finalized (or in-progress snapshot of a) scan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanResult {
    /// The scan subject.
    pub target: Target,
    /// When the scan began.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// When the scan finished; `None` until [`ScanAggregator::finalize`].
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Artifacts, keyed by identifier.
    pub artifacts: HashMap<ArtifactId, Artifact>,
    /// Non-fatal warnings accumulated during the scan.
    pub warnings: Vec<ScanWarning>,
    /// Fatal-for-source (or fatal-for-scan) errors accumulated during the
    /// scan.
    pub errors: Vec<ScanError>,
    /// Engine metadata.
    pub metadata: ScanResultMetadata,
}

struct AtomicStats {
    total: AtomicU64,
    by_type: Vec<AtomicU64>,
}

impl AtomicStats {
    fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            by_type: (0..ArtifactType::ALL.len()).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn record_new(&self, t: ArtifactType) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.by_type[t.index()].fetch_add(1, Ordering::Relaxed);
    }
}

struct AggregatorState {
    target: Target,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
    artifacts: HashMap<ArtifactId, Artifact>,
    warnings: Vec<ScanWarning>,
    errors: Vec<ScanError>,
    metadata: ScanResultMetadata,
    finalized: bool,
}

/// Thread-safe insert/merge store for a single scan (spec §4.3). Exposes
/// `add`/`add_warning`/`add_error`/`finalize`; readers use `snapshot()` or
/// the lock-free counters.
pub struct ScanAggregator {
    state: Mutex<AggregatorState>,
    stats: AtomicStats,
}

impl ScanAggregator {
    /// Start a new aggregator for `target`, stamped with `scan_id`.
    #[must_use]
    pub fn new(target: Target, scan_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(AggregatorState {
                target,
                started_at: chrono::Utc::now(),
                finished_at: None,
                artifacts: HashMap::new(),
                warnings: Vec::new(),
                errors: Vec::new(),
                metadata: ScanResultMetadata::new(scan_id),
                finalized: false,
            }),
            stats: AtomicStats::new(),
        }
    }

    /// Insert or merge-in-place an artifact. Returns `true` if this was a
    /// brand-new identity.
    pub fn add(&self, artifact: Artifact) -> bool {
        let mut state = self.state.lock().expect("aggregator lock poisoned");
        match state.artifacts.get_mut(&artifact.id) {
            Some(existing) => {
                merge_artifact(existing, artifact);
                false
            }
            None => {
                self.stats.record_new(artifact.artifact_type);
                state.artifacts.insert(artifact.id.clone(), artifact);
                true
            }
        }
    }

    /// Record a non-fatal, per-source warning.
    pub fn add_warning(&self, source: impl Into<String>, message: impl Into<String>) {
        let mut state = self.state.lock().expect("aggregator lock poisoned");
        state.warnings.push(ScanWarning { source: source.into(), message: message.into() });
    }

    /// Record a fatal-for-source (or, if `fatal_for_scan`, fatal-for-scan)
    /// error.
    pub fn add_error(&self, source: impl Into<String>, message: impl Into<String>, fatal_for_scan: bool) {
        let mut state = self.state.lock().expect("aggregator lock poisoned");
        state.errors.push(ScanError {
            source: source.into(),
            message: message.into(),
            fatal: fatal_for_scan,
        });
    }

    /// Take an immutable copy of the current state without requiring
    /// `finalize()`.
    #[must_use]
    pub fn snapshot(&self) -> ScanResult {
        let state = self.state.lock().expect("aggregator lock poisoned");
        ScanResult {
            target: state.target.clone(),
            started_at: state.started_at,
            finished_at: state.finished_at,
            artifacts: state.artifacts.clone(),
            warnings: state.warnings.clone(),
            errors: state.errors.clone(),
            metadata: state.metadata.clone(),
        }
    }

    /// Stamp `finished_at` and return the final, read-only result. Safe to
    /// call more than once; only the first call sets the timestamp.
    pub fn finalize(&self) -> ScanResult {
        let mut state = self.state.lock().expect("aggregator lock poisoned");
        if !state.finalized {
            state.finished_at = Some(chrono::Utc::now());
            state.finalized = true;
        }
        drop(state);
        self.snapshot()
    }

    /// Total number of distinct artifact identities, read without blocking
    /// writers.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.stats.total.load(Ordering::Relaxed)
    }

    /// Number of distinct identities of the given type, read without
    /// blocking writers.
    #[must_use]
    pub fn count_by_type(&self, t: ArtifactType) -> u64 {
        self.stats.by_type[t.index()].load(Ordering::Relaxed)
    }
}
