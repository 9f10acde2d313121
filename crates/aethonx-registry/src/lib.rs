// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process-wide source registry and the stage DAG planner (spec §4.4).
//!
//! The registry is populated once at engine init, by each source
//! self-registering a factory under its stable name, and is read-only for
//! the remainder of the process's lifetime. The planner is a pure function
//! from a list of instantiated sources to an ordered list of stages.

use aethonx_core::{ArtifactType, Source, SourceConfig};
use aethonx_error::{AethonError, ErrorCode};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Builds a boxed [`Source`] from its per-source configuration. Registered
/// once per source name at engine init.
pub type SourceFactory = Arc<dyn Fn(&SourceConfig) -> Arc<dyn Source> + Send + Sync>;

/// A process-wide name → [`SourceFactory`] map. Read-only once scans begin;
/// nothing resets it between scans (spec §5, §9 "no global mutable state").
#[derive(Default, Clone)]
pub struct SourceRegistry {
    factories: BTreeMap<String, SourceFactory>,
}

impl SourceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous entry for the
    /// same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&SourceConfig) -> Arc<dyn Source> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Names of all registered sources, in sorted (stable) order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Returns `true` if a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate every `enabled` source named in `configs`, in the
    /// (already-stable, `BTreeMap`-sorted) order the configs are keyed by
    /// name. Fails if a config names a source with no registered factory,
    /// or if no source ends up enabled.
    pub fn build(&self, configs: &BTreeMap<String, SourceConfig>) -> Result<Vec<Arc<dyn Source>>, AethonError> {
        let mut built = Vec::new();
        for (name, config) in configs {
            if !config.enabled {
                continue;
            }
            let factory = self.factories.get(name).ok_or_else(|| {
                AethonError::new(ErrorCode::SourceUnknown, format!("no source registered under name '{name}'"))
                    .with_context("source", name.clone())
            })?;
            built.push(factory(config));
        }
        if built.is_empty() {
            return Err(AethonError::new(ErrorCode::NoSourcesEnabled, "no sources are enabled for this scan"));
        }
        Ok(built)
    }
}

/// An ordered group of sources scheduled together: concurrent internally,
/// serial across stages (spec §4.6).
pub type Stage = Vec<Arc<dyn Source>>;

/// Orders a flat list of sources into a stage DAG from their declared I/O
/// types (spec §4.4). Pure and deterministic given the same input.
pub struct StagePlanner;

impl StagePlanner {
    /// Plan stages for `sources`. Fails with
    /// [`ErrorCode::PlanUnsatisfiable`] naming the blocked sources if the
    /// declared I/O types form a cycle or reference a type no earlier stage
    /// produces.
    pub fn plan(sources: Vec<Arc<dyn Source>>) -> Result<Vec<Stage>, AethonError> {
        let mut produced: BTreeSet<ArtifactType> = BTreeSet::new();
        let mut remaining = sources;
        let mut stages = Vec::new();
        let mut i = 0usize;

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|s| Self::is_ready(s.as_ref(), i, &produced));

            if ready.is_empty() {
                let names: Vec<&str> = blocked.iter().map(|s| s.name()).collect();
                return Err(AethonError::new(
                    ErrorCode::PlanUnsatisfiable,
                    format!("stage planning stalled: no source among [{}] has its inputs satisfied", names.join(", ")),
                )
                .with_context("blocked_sources", serde_json::json!(names)));
            }

            let mut stage = ready;
            stage.sort_by(|a, b| b.priority().cmp(&a.priority()).then_with(|| a.name().cmp(b.name())));

            for s in &stage {
                produced.extend(s.output_artifact_types().iter().copied());
            }

            stages.push(stage);
            remaining = blocked;
            i += 1;
        }

        Ok(stages)
    }

    fn is_ready(source: &dyn Source, stage_index: usize, produced: &BTreeSet<ArtifactType>) -> bool {
        let inputs_satisfied = source.input_artifact_types().iter().all(|t| produced.contains(t));
        match source.stage_hint() {
            Some(hint) if hint == stage_index => true,
            Some(hint) if hint > stage_index => false,
            _ => inputs_satisfied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aethonx_core::{ProgressUpdate, RunOutcome, ScanContext, Target};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct StubSource {
        name: &'static str,
        mode: aethonx_core::ScanMode,
        inputs: Vec<ArtifactType>,
        outputs: Vec<ArtifactType>,
        priority: i32,
        stage_hint: Option<usize>,
    }

    #[async_trait]
    impl Source for StubSource {
        fn name(&self) -> &str {
            self.name
        }
        fn mode(&self) -> aethonx_core::ScanMode {
            self.mode
        }
        fn input_artifact_types(&self) -> &[ArtifactType] {
            &self.inputs
        }
        fn output_artifact_types(&self) -> &[ArtifactType] {
            &self.outputs
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn stage_hint(&self) -> Option<usize> {
            self.stage_hint
        }
        async fn run(&self, _ctx: &ScanContext, _target: &Target, _inputs: &[aethonx_core::Artifact]) -> RunOutcome {
            RunOutcome::empty()
        }
        fn subscribe_progress(&self) -> Option<mpsc::Receiver<ProgressUpdate>> {
            None
        }
    }

    fn stub(
        name: &'static str,
        inputs: Vec<ArtifactType>,
        outputs: Vec<ArtifactType>,
        priority: i32,
    ) -> Arc<dyn Source> {
        Arc::new(StubSource {
            name,
            mode: aethonx_core::ScanMode::Passive,
            inputs,
            outputs,
            priority,
            stage_hint: None,
        })
    }

    #[test]
    fn seed_only_dag_orders_by_priority() {
        let s0a = stub("S0a", vec![], vec![ArtifactType::Domain], 10);
        let s0b = stub("S0b", vec![], vec![ArtifactType::Nameserver], 5);
        let stages = StagePlanner::plan(vec![s0b, s0a]).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0][0].name(), "S0a");
        assert_eq!(stages[0][1].name(), "S0b");
    }

    #[test]
    fn chained_dag_splits_into_two_stages() {
        let p = stub("P", vec![], vec![ArtifactType::Subdomain], 0);
        let q = stub("Q", vec![ArtifactType::Subdomain], vec![ArtifactType::Ip], 0);
        let stages = StagePlanner::plan(vec![q, p]).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0][0].name(), "P");
        assert_eq!(stages[1][0].name(), "Q");
    }

    #[test]
    fn unsatisfiable_dag_fails_naming_blocked_sources() {
        let cyclic = stub("Cyclic", vec![ArtifactType::Ip], vec![ArtifactType::Subdomain], 0);
        let err = StagePlanner::plan(vec![cyclic]).unwrap_err();
        assert_eq!(err.code, ErrorCode::PlanUnsatisfiable);
        assert!(err.message.contains("Cyclic"));
    }

    #[test]
    fn stage_hint_forces_inclusion() {
        let seed = stub("Seed", vec![], vec![ArtifactType::Domain], 0);
        let forced = StubSource {
            name: "Forced",
            mode: aethonx_core::ScanMode::Passive,
            inputs: vec![],
            outputs: vec![ArtifactType::Ip],
            priority: 0,
            stage_hint: Some(1),
        };
        let stages = StagePlanner::plan(vec![seed, Arc::new(forced)]).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1][0].name(), "Forced");
    }

    #[test]
    fn registry_build_rejects_unknown_source() {
        let registry = SourceRegistry::new();
        let mut configs = BTreeMap::new();
        configs.insert("ghost".to_string(), SourceConfig::default());
        let err = registry.build(&configs).unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceUnknown);
    }

    #[test]
    fn registry_build_rejects_no_sources_enabled() {
        let mut registry = SourceRegistry::new();
        registry.register("x", |_cfg| {
            stub("x", vec![], vec![ArtifactType::Domain], 0)
        });
        let mut configs = BTreeMap::new();
        configs.insert("x".to_string(), SourceConfig { enabled: false, ..Default::default() });
        let err = registry.build(&configs).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoSourcesEnabled);
    }

    #[test]
    fn registry_build_instantiates_enabled_sources() {
        let mut registry = SourceRegistry::new();
        registry.register("x", |_cfg| stub("x", vec![], vec![ArtifactType::Domain], 0));
        let mut configs = BTreeMap::new();
        configs.insert("x".to_string(), SourceConfig::default());
        let built = registry.build(&configs).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name(), "x");
    }
}
