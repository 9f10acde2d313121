// SPDX-License-Identifier: MIT OR Apache-2.0
//! Jaccard-similarity clustering of scored URLs (spec §4.7 step 5): groups
//! near-duplicate paths and keeps only the top-scoring members of each
//! cluster, so a crawl of a thousand near-identical paginated URLs doesn't
//! drown out everything else.

use std::collections::HashSet;

/// One URL entry as seen by the clustering pass: just enough to compare
/// and rank without depending on the caller's own scored-URL type.
#[derive(Debug, Clone)]
pub struct Clusterable {
    /// Index into the caller's original scored-URL list.
    pub index: usize,
    /// Normalized URL string, used to derive path tokens.
    pub normalized: String,
    /// Priority score, used to rank within a cluster.
    pub score: i64,
}

fn tokenize(normalized: &str) -> HashSet<String> {
    normalized.split(['/', '?', '&', '=', '.', '-', '_']).filter(|s| !s.is_empty()).map(str::to_lowercase).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Cluster `items` by path-token Jaccard similarity (`threshold`, default
/// spec guidance 0.8) using single-link greedy grouping, then keep only
/// the top `top_k_per_cluster` entries (by score, ties broken by index)
/// from each cluster. Returns the indices (into the original list) that
/// survive.
#[must_use]
pub fn cluster_and_cap(items: &[Clusterable], threshold: f64, top_k_per_cluster: usize) -> Vec<usize> {
    if top_k_per_cluster == 0 || items.is_empty() {
        return items.iter().map(|i| i.index).collect();
    }

    let tokens: Vec<HashSet<String>> = items.iter().map(|i| tokenize(&i.normalized)).collect();
    let mut assigned = vec![false; items.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for i in 0..items.len() {
        if assigned[i] {
            continue;
        }
        let mut cluster = vec![i];
        assigned[i] = true;
        for j in (i + 1)..items.len() {
            if assigned[j] {
                continue;
            }
            if jaccard(&tokens[i], &tokens[j]) >= threshold {
                cluster.push(j);
                assigned[j] = true;
            }
        }
        clusters.push(cluster);
    }

    let mut kept = Vec::new();
    for mut cluster in clusters {
        cluster.sort_by(|&a, &b| items[b].score.cmp(&items[a].score).then(a.cmp(&b)));
        for &pos in cluster.iter().take(top_k_per_cluster) {
            kept.push(items[pos].index);
        }
    }
    kept.sort_unstable();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, normalized: &str, score: i64) -> Clusterable {
        Clusterable { index, normalized: normalized.to_string(), score }
    }

    #[test]
    fn near_identical_paginated_urls_cluster_together() {
        let items = vec![
            item(0, "https://example.com/articles?page=1", 0),
            item(1, "https://example.com/articles?page=2", 0),
            item(2, "https://example.com/articles?page=3", 10),
        ];
        let kept = cluster_and_cap(&items, 0.6, 1);
        assert_eq!(kept, vec![2]);
    }

    #[test]
    fn dissimilar_urls_stay_in_separate_clusters() {
        let items = vec![item(0, "https://example.com/admin/users", 5), item(1, "https://example.com/api/v1/orders", 3)];
        let kept = cluster_and_cap(&items, 0.8, 1);
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn top_k_zero_keeps_everything() {
        let items = vec![item(0, "https://example.com/a", 0), item(1, "https://example.com/a", 0)];
        let kept = cluster_and_cap(&items, 0.8, 0);
        assert_eq!(kept, vec![0, 1]);
    }

    #[test]
    fn top_k_two_keeps_two_highest_scoring_per_cluster() {
        let items = vec![
            item(0, "https://example.com/articles?page=1", 1),
            item(1, "https://example.com/articles?page=2", 5),
            item(2, "https://example.com/articles?page=3", 3),
        ];
        let kept = cluster_and_cap(&items, 0.6, 2);
        assert_eq!(kept, vec![1, 2]);
    }
}
