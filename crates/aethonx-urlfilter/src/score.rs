// SPDX-License-Identifier: MIT OR Apache-2.0
//! Priority scoring for normalized URLs (spec §4.7 step 4): a weighted
//! sum of structural signals, used to rank and optionally drop low-value
//! URLs before they reach downstream sources.

use serde::{Deserialize, Serialize};
use url::Url;

const SENSITIVE_FILE_EXTENSIONS: &[&str] = &["env", "pem", "key", "pfx", "p12", "sql", "db", "sqlite", "htpasswd"];
const BACKUP_EXTENSIONS: &[&str] = &["bak", "old", "orig", "save", "swp", "tar", "zip", "gz", "7z"];
const STATIC_ASSET_EXTENSIONS: &[&str] = &["css", "js", "png", "jpg", "jpeg", "gif", "svg", "woff", "woff2", "ico", "map"];
const EXPOSED_REPO_INDICATORS: &[&str] = &[".git", ".svn", ".hg", ".DS_Store"];
const ADMIN_PATH_INDICATORS: &[&str] = &["admin", "dashboard", "manage", "wp-admin", "console"];
const API_PATH_INDICATORS: &[&str] = &["api", "graphql", "rpc", "v1", "v2", "v3"];

const WEIGHT_SENSITIVE_FILE: i64 = 1000;
const WEIGHT_EXPOSED_REPO: i64 = 800;
const WEIGHT_BACKUP: i64 = 600;
const WEIGHT_ADMIN_PATH: i64 = 400;
const WEIGHT_API_PATH: i64 = 300;
const WEIGHT_STATIC_ASSET: i64 = -200;
const WEIGHT_TRACKING_PARAM: i64 = -100;

/// Score and classification signals recorded for one URL, kept alongside
/// the numeric score for explainability (e.g. CLI `--format json` output).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSignals {
    /// Path matched a sensitive file extension (`.env`, `.pem`, ...).
    pub sensitive_file: bool,
    /// Path contains an exposed VCS/metadata directory (`.git`, ...).
    pub exposed_repo: bool,
    /// Path matched a backup-file extension (`.bak`, `.old`, ...).
    pub backup_file: bool,
    /// Path contains an admin/management segment.
    pub admin_path: bool,
    /// Path contains an API/RPC segment.
    pub api_path: bool,
    /// Path matched a static-asset extension (penalized, not dropped).
    pub static_asset: bool,
    /// Query string carries a tracking parameter (penalized).
    pub tracking_param: bool,
}

fn extension_of(path: &str) -> Option<&str> {
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    last_segment.rsplit_once('.').map(|(_, ext)| ext).filter(|ext| !ext.is_empty())
}

fn contains_any_segment(path: &str, needles: &[&str]) -> bool {
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower.split('/').collect();
    needles.iter().any(|n| segments.iter().any(|s| s == n))
}

fn contains_any_substring(path: &str, needles: &[&str]) -> bool {
    let lower = path.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

/// Compute [`ScoreSignals`] and a weighted priority score for `url`.
/// `tracking_params` is the same default/override list used by
/// [`crate::normalize::parametric_query`].
#[must_use]
pub fn score_url(url: &Url, tracking_params: &[&str]) -> (i64, ScoreSignals) {
    let path = url.path();
    let ext = extension_of(path).map(str::to_lowercase);

    let mut signals = ScoreSignals {
        sensitive_file: ext.as_deref().is_some_and(|e| SENSITIVE_FILE_EXTENSIONS.contains(&e)),
        exposed_repo: contains_any_substring(path, EXPOSED_REPO_INDICATORS),
        backup_file: ext.as_deref().is_some_and(|e| BACKUP_EXTENSIONS.contains(&e)),
        admin_path: contains_any_segment(path, ADMIN_PATH_INDICATORS),
        api_path: contains_any_segment(path, API_PATH_INDICATORS),
        static_asset: ext.as_deref().is_some_and(|e| STATIC_ASSET_EXTENSIONS.contains(&e)),
        tracking_param: false,
    };

    signals.tracking_param =
        url.query_pairs().any(|(k, _)| tracking_params.iter().any(|t| t.eq_ignore_ascii_case(&k)));

    let mut score = 0i64;
    if signals.sensitive_file {
        score += WEIGHT_SENSITIVE_FILE;
    }
    if signals.exposed_repo {
        score += WEIGHT_EXPOSED_REPO;
    }
    if signals.backup_file {
        score += WEIGHT_BACKUP;
    }
    if signals.admin_path {
        score += WEIGHT_ADMIN_PATH;
    }
    if signals.api_path {
        score += WEIGHT_API_PATH;
    }
    if signals.static_asset {
        score += WEIGHT_STATIC_ASSET;
    }
    if signals.tracking_param {
        score += WEIGHT_TRACKING_PARAM;
    }

    (score, signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DEFAULT_TRACKING_PARAMS;

    fn u(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn sensitive_file_scores_highest() {
        let (score, signals) = score_url(&u("https://example.com/backup/.env"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.sensitive_file);
        assert_eq!(score, WEIGHT_SENSITIVE_FILE);
    }

    #[test]
    fn exposed_git_directory_detected() {
        let (score, signals) = score_url(&u("https://example.com/.git/config"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.exposed_repo);
        assert_eq!(score, WEIGHT_EXPOSED_REPO);
    }

    #[test]
    fn backup_extension_detected() {
        let (_, signals) = score_url(&u("https://example.com/db.sql.bak"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.backup_file);
    }

    #[test]
    fn admin_path_detected() {
        let (score, signals) = score_url(&u("https://example.com/admin/users"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.admin_path);
        assert_eq!(score, WEIGHT_ADMIN_PATH);
    }

    #[test]
    fn api_path_detected() {
        let (score, signals) = score_url(&u("https://example.com/api/v1/users"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.api_path);
        assert_eq!(score, WEIGHT_API_PATH);
    }

    #[test]
    fn static_asset_penalized() {
        let (score, signals) = score_url(&u("https://example.com/static/app.js"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.static_asset);
        assert_eq!(score, WEIGHT_STATIC_ASSET);
    }

    #[test]
    fn tracking_param_penalized() {
        let (score, signals) = score_url(&u("https://example.com/page?utm_source=x"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.tracking_param);
        assert_eq!(score, WEIGHT_TRACKING_PARAM);
    }

    #[test]
    fn plain_url_scores_zero() {
        let (score, signals) = score_url(&u("https://example.com/about"), DEFAULT_TRACKING_PARAMS);
        assert_eq!(score, 0);
        assert_eq!(signals, ScoreSignals::default());
    }

    #[test]
    fn signals_combine_additively() {
        let (score, signals) = score_url(&u("https://example.com/admin/api/users?utm_source=x"), DEFAULT_TRACKING_PARAMS);
        assert!(signals.admin_path && signals.api_path && signals.tracking_param);
        assert_eq!(score, WEIGHT_ADMIN_PATH + WEIGHT_API_PATH + WEIGHT_TRACKING_PARAM);
    }
}
