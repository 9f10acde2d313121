// SPDX-License-Identifier: MIT OR Apache-2.0
//! Orchestrator-level configuration: everything [`crate::Orchestrator::run`]
//! needs beyond the registry-built source list itself (spec §4.6, §5).

use aethonx_core::SourceConfig;
use aethonx_resilience::CircuitBreakerConfig;
use aethonx_writer::WriterConfig;
use std::collections::BTreeMap;
use std::time::Duration;

/// Tuning knobs for one orchestrator run. Built by `aethonx-config` from
/// CLI flags, environment variables, and defaults; the orchestrator itself
/// never reads the process environment.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Size of the shared worker pool (spec §4.6: "single bounded worker
    /// pool sized to `max_workers`"). Matches CLI `--workers/-w`, default 4.
    pub max_workers: usize,
    /// Scan-wide deadline. `None` means no deadline (CLI `--timeout 0`).
    pub scan_timeout: Option<Duration>,
    /// Whether a source's fatal error should prevent any further stage
    /// from starting (spec §9 open question, resolved: only prevents
    /// further stages, never aborts in-flight peers of the same stage).
    pub fail_fast: bool,
    /// Whether sources are wrapped with a circuit breaker in addition to
    /// retries. Matches CLI `--circuit-breaker`, default true.
    pub circuit_breaker_enabled: bool,
    /// Circuit breaker tuning, used only when `circuit_breaker_enabled`.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Per-source configuration, keyed by source name.
    pub source_configs: BTreeMap<String, SourceConfig>,
    /// Streaming writer tuning (buffer threshold before spill-to-disk).
    pub writer: WriterConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            scan_timeout: Some(Duration::from_secs(30)),
            fail_fast: false,
            circuit_breaker_enabled: true,
            circuit_breaker: CircuitBreakerConfig::default(),
            source_configs: BTreeMap::new(),
            writer: WriterConfig::default(),
        }
    }
}

impl RunConfig {
    /// The effective [`SourceConfig`] for `name`: whatever was configured,
    /// or the default if the source was never mentioned explicitly.
    #[must_use]
    pub fn source_config(&self, name: &str) -> SourceConfig {
        self.source_configs.get(name).cloned().unwrap_or_default()
    }
}
