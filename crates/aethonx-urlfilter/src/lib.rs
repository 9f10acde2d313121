// SPDX-License-Identifier: MIT OR Apache-2.0
//! URL filter engine (spec §4.7/C7): a pure, deterministic pipeline that
//! turns a raw burst of discovered URLs into a ranked, deduplicated,
//! bounded-size set worth handing to downstream sources.
//!
//! The pipeline runs in a fixed order:
//! 1. volume cap ([`FilterConfig::max_urls`], if [`FilterConfig::enable_volume_control`])
//! 2. normalization ([`normalize::NormalizationStrategy`])
//! 3. probabilistic dedup ([`dedup::UrlDedup`])
//! 4. priority scoring ([`score::score_url`]), dropping below [`FilterConfig::min_priority_score`]
//! 5. similarity clustering ([`cluster::cluster_and_cap`]), if enabled
//! 6. per-pattern capping ([`pattern::cap_by_pattern`])
//!
//! [`filter`] takes ownership of nothing it doesn't return: given the
//! same `raw_urls` and [`FilterConfig`] it always produces the same
//! [`FilterStats`] and ordering, with no I/O or shared state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cluster;
pub mod dedup;
pub mod normalize;
pub mod pattern;
pub mod score;

use aethonx_core::artifact::ArtifactType;
use aethonx_core::canon::canonicalize;
use aethonx_error::AethonError;
use cluster::Clusterable;
use dedup::UrlDedup;
use normalize::{NormalizationStrategy, DEFAULT_TRACKING_PARAMS};
use pattern::PatternEntry;
use score::ScoreSignals;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for one [`filter`] run. All thresholds default to the
/// values recommended in spec §4.7; every stage except normalization can
/// be disabled independently.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Normalization strategy applied before dedup/scoring.
    pub strategy: NormalizationStrategy,
    /// Query parameters stripped by the parametric/aggressive strategies.
    pub tracking_params: Vec<String>,
    /// Whether step 1 (volume cap) runs at all.
    pub enable_volume_control: bool,
    /// Hard cap on input URLs before any other processing, applied only
    /// when [`Self::enable_volume_control`] is `true`.
    pub max_urls: usize,
    /// Target false-positive rate for the dedup bloom filter.
    pub false_positive_rate: f64,
    /// URLs scoring below this are dropped. `None` disables score-based
    /// dropping (scores are still computed and reported).
    pub min_priority_score: Option<i64>,
    /// Whether step 5 (similarity clustering) runs.
    pub enable_clustering: bool,
    /// Jaccard similarity threshold for cluster membership.
    pub cluster_similarity_threshold: f64,
    /// Max survivors kept per similarity cluster.
    pub top_k_per_cluster: usize,
    /// Minimum recurrence count before a structural pattern is capped.
    pub min_pattern_frequency: usize,
    /// Max survivors kept per structural pattern once it meets
    /// [`Self::min_pattern_frequency`]. `0` disables pattern capping.
    pub max_per_pattern: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            strategy: NormalizationStrategy::Structural,
            tracking_params: DEFAULT_TRACKING_PARAMS.iter().map(|s| (*s).to_string()).collect(),
            enable_volume_control: true,
            max_urls: 50_000,
            false_positive_rate: dedup::DEFAULT_FALSE_POSITIVE_RATE,
            min_priority_score: None,
            enable_clustering: true,
            cluster_similarity_threshold: 0.8,
            top_k_per_cluster: 3,
            min_pattern_frequency: 5,
            max_per_pattern: 3,
        }
    }
}

/// One surviving URL after the full filter pipeline, with enough
/// provenance to explain why it survived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredUrl {
    /// Original, unmodified input URL.
    pub raw: String,
    /// Normalized form used for dedup and pattern grouping.
    pub normalized: String,
    /// Weighted priority score (see [`score::score_url`]).
    pub score: i64,
    /// Which structural/extension signals contributed to the score.
    pub signals: ScoreSignals,
}

impl ScoredUrl {
    /// Canonicalize [`Self::raw`] the same way the core artifact model
    /// would for a `Url` artifact, so a source can turn a survivor
    /// directly into an `Artifact` without re-deriving canonicalization
    /// rules. This is independent of [`Self::normalized`], which serves
    /// the filter pipeline's own dedup/scoring/pattern-grouping needs.
    pub fn canonical_value(&self) -> Result<String, AethonError> {
        canonicalize(ArtifactType::Url, &self.raw)
    }
}

/// Counts of how many URLs were removed at each pipeline stage, for
/// observability (spec §4.7 requires the stats be reported, not just the
/// survivors).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    /// URLs present in the original input.
    pub input_count: usize,
    /// URLs dropped by the volume cap (step 1).
    pub volume_capped: usize,
    /// Input URLs that failed to parse and were dropped outright.
    pub unparseable: usize,
    /// URLs dropped as probabilistic duplicates (step 3).
    pub deduplicated: usize,
    /// URLs dropped for scoring below [`FilterConfig::min_priority_score`] (step 4).
    pub below_min_score: usize,
    /// URLs dropped by similarity clustering (step 5).
    pub clustered_out: usize,
    /// URLs dropped by per-pattern capping (step 6).
    pub pattern_capped: usize,
    /// URLs present in the final output.
    pub output_count: usize,
}

/// Run the full filter pipeline over `raw_urls`. Pure and deterministic:
/// given the same inputs it always returns the same outputs, in the same
/// order, with no I/O.
#[must_use]
pub fn filter(raw_urls: &[String], config: &FilterConfig) -> (Vec<ScoredUrl>, FilterStats) {
    let mut stats = FilterStats { input_count: raw_urls.len(), ..Default::default() };

    let capped: &[String] = if config.enable_volume_control && raw_urls.len() > config.max_urls {
        stats.volume_capped = raw_urls.len() - config.max_urls;
        &raw_urls[..config.max_urls]
    } else {
        raw_urls
    };

    let tracking_params: Vec<&str> = config.tracking_params.iter().map(String::as_str).collect();

    let mut dedup = UrlDedup::new(capped.len(), config.false_positive_rate);
    let mut scored: Vec<ScoredUrl> = Vec::with_capacity(capped.len());

    for raw in capped {
        let Some(normalized) = normalize::normalize(raw, config.strategy, &tracking_params) else {
            stats.unparseable += 1;
            continue;
        };
        if !dedup.insert_if_new(&normalized) {
            stats.deduplicated += 1;
            continue;
        }
        let Ok(parsed) = Url::parse(&normalized) else {
            stats.unparseable += 1;
            continue;
        };
        let (score, signals) = score::score_url(&parsed, &tracking_params);
        if let Some(min) = config.min_priority_score {
            if score < min {
                stats.below_min_score += 1;
                continue;
            }
        }
        scored.push(ScoredUrl { raw: raw.clone(), normalized, score, signals });
    }

    if config.enable_clustering && !scored.is_empty() {
        let clusterable: Vec<Clusterable> = scored
            .iter()
            .enumerate()
            .map(|(index, s)| Clusterable { index, normalized: s.normalized.clone(), score: s.score })
            .collect();
        let keep = cluster::cluster_and_cap(&clusterable, config.cluster_similarity_threshold, config.top_k_per_cluster);
        stats.clustered_out = scored.len() - keep.len();
        let keep_set: std::collections::HashSet<usize> = keep.into_iter().collect();
        scored = scored.into_iter().enumerate().filter(|(i, _)| keep_set.contains(i)).map(|(_, s)| s).collect();
    }

    if config.max_per_pattern > 0 && !scored.is_empty() {
        let entries: Vec<PatternEntry> = scored
            .iter()
            .enumerate()
            .map(|(index, s)| PatternEntry { index, path: s.normalized.clone(), score: s.score })
            .collect();
        let (keep, dropped) = pattern::cap_by_pattern(&entries, config.min_pattern_frequency, config.max_per_pattern);
        stats.pattern_capped = dropped;
        let keep_set: std::collections::HashSet<usize> = keep.into_iter().collect();
        scored = scored.into_iter().enumerate().filter(|(i, _)| keep_set.contains(i)).map(|(_, s)| s).collect();
    }

    scored.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.normalized.cmp(&b.normalized)));
    stats.output_count = scored.len();
    tracing::debug!(
        input = stats.input_count,
        output = stats.output_count,
        volume_capped = stats.volume_capped,
        deduplicated = stats.deduplicated,
        below_min_score = stats.below_min_score,
        clustered_out = stats.clustered_out,
        pattern_capped = stats.pattern_capped,
        "url filter pipeline complete"
    );
    (scored, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let (scored, stats) = filter(&[], &FilterConfig::default());
        assert!(scored.is_empty());
        assert_eq!(stats.input_count, 0);
        assert_eq!(stats.output_count, 0);
    }

    #[test]
    fn unparseable_urls_are_dropped_and_counted() {
        let (scored, stats) = filter(&urls(&["not a url", "https://example.com/a"]), &FilterConfig::default());
        assert_eq!(scored.len(), 1);
        assert_eq!(stats.unparseable, 1);
    }

    #[test]
    fn duplicate_urls_after_normalization_are_deduplicated() {
        let config = FilterConfig {
            strategy: NormalizationStrategy::Parametric,
            enable_clustering: false,
            max_per_pattern: 0,
            ..Default::default()
        };
        let (scored, stats) =
            filter(&urls(&["https://example.com/a?utm_source=x", "https://EXAMPLE.com/a"]), &config);
        assert_eq!(scored.len(), 1);
        assert_eq!(stats.deduplicated, 1);
    }

    #[test]
    fn volume_cap_truncates_before_processing() {
        let config = FilterConfig { enable_volume_control: true, max_urls: 2, ..Default::default() };
        let input = urls(&["https://example.com/a", "https://example.com/b", "https://example.com/c"]);
        let (_, stats) = filter(&input, &config);
        assert_eq!(stats.volume_capped, 1);
        assert_eq!(stats.input_count, 3);
    }

    #[test]
    fn min_priority_score_drops_low_scoring_urls() {
        let config =
            FilterConfig { min_priority_score: Some(1), enable_clustering: false, max_per_pattern: 0, ..Default::default() };
        let (scored, stats) = filter(&urls(&["https://example.com/admin/x", "https://example.com/about"]), &config);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].normalized, "https://example.com/admin/x");
        assert_eq!(stats.below_min_score, 1);
    }

    #[test]
    fn output_is_sorted_by_descending_score() {
        let config = FilterConfig { enable_clustering: false, max_per_pattern: 0, ..Default::default() };
        let (scored, _) = filter(&urls(&["https://example.com/about", "https://example.com/admin/x"]), &config);
        assert_eq!(scored[0].normalized, "https://example.com/admin/x");
        assert_eq!(scored[1].normalized, "https://example.com/about");
    }

    #[test]
    fn clustering_caps_near_duplicate_paginated_urls() {
        let config = FilterConfig {
            enable_clustering: true,
            cluster_similarity_threshold: 0.6,
            top_k_per_cluster: 1,
            max_per_pattern: 0,
            ..Default::default()
        };
        let (scored, stats) = filter(
            &urls(&[
                "https://example.com/articles?page=1",
                "https://example.com/articles?page=2",
                "https://example.com/articles?page=3",
            ]),
            &config,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(stats.clustered_out, 2);
    }

    #[test]
    fn pattern_capping_bounds_repeated_shapes() {
        let config = FilterConfig {
            strategy: NormalizationStrategy::Basic,
            enable_clustering: false,
            min_pattern_frequency: 2,
            max_per_pattern: 1,
            ..Default::default()
        };
        let (scored, stats) = filter(
            &urls(&["https://example.com/users/1", "https://example.com/users/2", "https://example.com/users/3"]),
            &config,
        );
        assert_eq!(scored.len(), 1);
        assert_eq!(stats.pattern_capped, 2);
    }

    #[test]
    fn canonical_value_matches_core_url_canonicalization() {
        let (scored, _) = filter(&urls(&["https://EXAMPLE.com:443/a"]), &FilterConfig::default());
        assert_eq!(scored[0].canonical_value().unwrap(), "https://example.com/a");
    }

    #[test]
    fn same_input_and_config_produce_identical_output() {
        let config = FilterConfig::default();
        let input = urls(&["https://example.com/a", "https://example.com/admin/b", "https://example.com/api/c"]);
        let (first, _) = filter(&input, &config);
        let (second, _) = filter(&input, &config);
        assert_eq!(first, second);
    }
}
