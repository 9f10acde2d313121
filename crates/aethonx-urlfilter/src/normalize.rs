// SPDX-License-Identifier: MIT OR Apache-2.0
//! URL normalization strategies (spec §4.7 step 2).

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// Which normalization strategy [`normalize`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationStrategy {
    /// Scheme/host canonicalization only (spec §4.2 URL rules).
    Basic,
    /// [`NormalizationStrategy::Basic`] plus dynamic path segments replaced
    /// with named placeholders.
    Structural,
    /// [`NormalizationStrategy::Basic`] plus tracking query parameters
    /// stripped and remaining keys sorted with blanked values.
    Parametric,
    /// [`NormalizationStrategy::Basic`] plus the final path segment's file
    /// extension removed.
    Extensionless,
    /// [`NormalizationStrategy::Structural`] and
    /// [`NormalizationStrategy::Parametric`] combined.
    Aggressive,
}

/// Default tracking-parameter strip list used when the caller doesn't
/// supply its own (spec §9 open question, resolved as configurable with a
/// sensible default — see `SPEC_FULL.md` §3).
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "gclsrc",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "ref",
    "ref_src",
    "igshid",
    "_ga",
    "_gl",
    "yclid",
    "dclid",
    "twclid",
    "vero_id",
    "mkt_tok",
];

struct SegmentPatterns {
    numeric_id: Regex,
    uuid: Regex,
    hash: Regex,
    slug: Regex,
    date: Regex,
    timestamp: Regex,
}

fn patterns() -> &'static SegmentPatterns {
    static PATTERNS: OnceLock<SegmentPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| SegmentPatterns {
        numeric_id: Regex::new(r"^\d+$").unwrap(),
        uuid: Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap(),
        hash: Regex::new(r"(?i)^[0-9a-f]{32,64}$").unwrap(),
        date: Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap(),
        timestamp: Regex::new(r"^\d{10,13}$").unwrap(),
        // A slug: multiple words joined by hyphens/underscores, not purely numeric.
        slug: Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+){2,}$").unwrap(),
    })
}

/// Replace a single dynamic path segment with its named placeholder, or
/// return it unchanged if it matches no known dynamic pattern. Order
/// matters: more specific patterns (uuid, date, timestamp) are checked
/// before the looser `hash`/`numeric_id`/`slug` catch-alls.
#[must_use]
pub fn replace_dynamic_segment(segment: &str) -> String {
    let p = patterns();
    if segment.is_empty() {
        return segment.to_string();
    }
    if p.uuid.is_match(segment) {
        "{uuid}".to_string()
    } else if p.date.is_match(segment) {
        "{date}".to_string()
    } else if p.timestamp.is_match(segment) {
        "{timestamp}".to_string()
    } else if p.numeric_id.is_match(segment) {
        "{numeric_id}".to_string()
    } else if p.hash.is_match(&segment.to_lowercase()) {
        "{hash}".to_string()
    } else if p.slug.is_match(&segment.to_lowercase()) {
        "{slug}".to_string()
    } else {
        segment.to_string()
    }
}

/// Apply structural normalization: every path segment matching a dynamic
/// pattern is replaced with its placeholder.
#[must_use]
pub fn structural_path(path: &str) -> String {
    path.split('/').map(replace_dynamic_segment).collect::<Vec<_>>().join("/")
}

/// Strip tracking parameters from `url`'s query string, blank all
/// remaining values, and sort keys (spec §4.7 step 2 parametric rule).
#[must_use]
pub fn parametric_query(url: &Url, tracking_params: &[&str]) -> Option<String> {
    let mut keys: Vec<String> = url
        .query_pairs()
        .map(|(k, _)| k.into_owned())
        .filter(|k| !tracking_params.iter().any(|t| t.eq_ignore_ascii_case(k)))
        .collect();
    if keys.is_empty() {
        return None;
    }
    keys.sort();
    keys.dedup();
    Some(keys.iter().map(|k| format!("{k}=")).collect::<Vec<_>>().join("&"))
}

/// Remove the file extension from the final path segment, if any.
#[must_use]
pub fn extensionless_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, last)) => {
            let stripped = last.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(last);
            format!("{dir}/{stripped}")
        }
        None => path.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(path).to_string(),
    }
}

/// Normalize `raw_url` per `strategy`, returning `None` if it fails to
/// parse as a URL at all.
#[must_use]
pub fn normalize(raw_url: &str, strategy: NormalizationStrategy, tracking_params: &[&str]) -> Option<String> {
    let mut url = Url::parse(raw_url).ok()?;
    url.set_fragment(None);

    let apply_structural = matches!(strategy, NormalizationStrategy::Structural | NormalizationStrategy::Aggressive);
    let apply_parametric = matches!(strategy, NormalizationStrategy::Parametric | NormalizationStrategy::Aggressive);
    let apply_extensionless = matches!(strategy, NormalizationStrategy::Extensionless);

    let mut path = url.path().to_string();
    if apply_structural {
        path = structural_path(&path);
    }
    if apply_extensionless {
        path = extensionless_path(&path);
    }

    let query = if apply_parametric { parametric_query(&url, tracking_params) } else { url.query().map(str::to_string) };

    url.set_path(if path.is_empty() { "/" } else { &path });
    url.set_query(query.as_deref());

    Some(url.to_string())
}
