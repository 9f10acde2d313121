// SPDX-License-Identifier: MIT OR Apache-2.0
//! The scan subject: [`Target`], its [`ScanMode`], and scope filters.

use crate::canon::canonicalize_hostname;
use globset::{Glob, GlobSet, GlobSetBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a scan may only passively consult third-party data sources, or
/// may actively interact with the target's infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Passive sources only (no direct interaction with the target).
    Passive,
    /// Active sources are also permitted.
    Active,
}

/// Optional in-scope / out-of-scope glob filters applied to discovered
/// artifact values before they're accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScopeFilter {
    /// Glob patterns a value must match at least one of (empty ⇒ no
    /// restriction).
    #[serde(default)]
    pub in_scope: Vec<String>,
    /// Glob patterns that exclude a value even if it matched `in_scope`.
    #[serde(default)]
    pub out_of_scope: Vec<String>,
}

impl ScopeFilter {
    fn build_set(patterns: &[String]) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for p in patterns {
            if let Ok(glob) = Glob::new(p) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSetBuilder::new().build().unwrap())
    }

    /// Returns `true` if `value` is in scope: matches at least one
    /// `in_scope` pattern (or `in_scope` is empty) and matches no
    /// `out_of_scope` pattern.
    #[must_use]
    pub fn allows(&self, value: &str) -> bool {
        if !self.out_of_scope.is_empty() && Self::build_set(&self.out_of_scope).is_match(value) {
            return false;
        }
        if self.in_scope.is_empty() {
            return true;
        }
        Self::build_set(&self.in_scope).is_match(value)
    }
}

/// The scan subject.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Target {
    /// Root value: lower-cased, trailing-dot-stripped.
    ///
    /// This is not reduced to the eTLD+1 against a public suffix list —
    /// no crate in this engine's lineage carries a `publicsuffix`/`psl`
    /// dependency to ground that reduction on, so `root` passes through
    /// [`canonicalize_hostname`] unchanged beyond case-folding and the
    /// trailing dot. Callers that need eTLD+1 semantics (e.g. matching
    /// `sub.example.co.uk` against `example.co.uk`) must reduce the value
    /// themselves before constructing a [`Target`].
    pub root: String,
    /// Passive or active scan mode.
    pub mode: ScanMode,
    /// Optional scope filters.
    #[serde(default)]
    pub scope: ScopeFilter,
}

impl Target {
    /// Build a target, normalizing `root` the same way [`crate::canon`]
    /// normalizes hostnames.
    #[must_use]
    pub fn new(root: impl Into<String>, mode: ScanMode) -> Self {
        Self {
            root: canonicalize_hostname(&root.into()),
            mode,
            scope: ScopeFilter::default(),
        }
    }

    /// Attach scope filters.
    #[must_use]
    pub fn with_scope(mut self, scope: ScopeFilter) -> Self {
        self.scope = scope;
        self
    }

    /// Validate the target is usable for a scan; used by the orchestrator
    /// before planning (spec §4.6 step 1).
    pub fn validate(&self) -> Result<(), aethonx_error::AethonError> {
        if self.root.is_empty() {
            return Err(aethonx_error::AethonError::new(
                aethonx_error::ErrorCode::TargetInvalid,
                "target root must not be empty",
            ));
        }
        if !self.root.contains('.') {
            return Err(aethonx_error::AethonError::new(
                aethonx_error::ErrorCode::TargetInvalid,
                "target root does not look like a domain",
            )
            .with_context("root", self.root.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_new_normalizes_root() {
        let t = Target::new("Example.COM.", ScanMode::Passive);
        assert_eq!(t.root, "example.com");
    }

    #[test]
    fn validate_rejects_empty_root() {
        let t = Target::new("", ScanMode::Passive);
        assert!(t.validate().is_err());
    }

    #[test]
    fn validate_rejects_bare_word() {
        let t = Target::new("localhost", ScanMode::Passive);
        assert!(t.validate().is_err());
    }

    #[test]
    fn validate_accepts_domain() {
        let t = Target::new("example.com", ScanMode::Passive);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn scope_empty_in_scope_allows_everything() {
        let scope = ScopeFilter::default();
        assert!(scope.allows("anything.example.com"));
    }

    #[test]
    fn scope_in_scope_restricts() {
        let scope = ScopeFilter {
            in_scope: vec!["*.example.com".into()],
            out_of_scope: vec![],
        };
        assert!(scope.allows("api.example.com"));
        assert!(!scope.allows("api.other.com"));
    }

    #[test]
    fn scope_out_of_scope_wins_over_in_scope() {
        let scope = ScopeFilter {
            in_scope: vec!["*.example.com".into()],
            out_of_scope: vec!["internal.example.com".into()],
        };
        assert!(!scope.allows("internal.example.com"));
        assert!(scope.allows("api.example.com"));
    }
}
