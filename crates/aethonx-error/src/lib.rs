// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy with stable error codes for the AethonX engine.
//!
//! Every engine error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use [`AethonError::new`] to construct errors
//! fluently. The taxonomy groups codes into the five kinds from the error
//! handling design: configuration, source-fatal, source-warning, canceled,
//! and output.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to; mirrors the error handling
/// design's taxonomy of kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid target, unsatisfiable DAG, unknown source referenced.
    Configuration,
    /// All retries exhausted or circuit open at call time.
    SourceFatal,
    /// Partial failure inside a source; source still returns partial artifacts.
    SourceWarning,
    /// Root context done (timeout, signal, or explicit cancellation).
    Canceled,
    /// Filesystem or serialization failure during writing.
    Output,
    /// Catch-all for unexpected internal errors (should not happen).
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configuration => "configuration",
            Self::SourceFatal => "source_fatal",
            Self::SourceWarning => "source_warning",
            Self::Canceled => "canceled",
            Self::Output => "output",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `SCREAMING_SNAKE_CASE` string guaranteed not
/// to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Configuration --
    /// Target root value failed validation (empty, malformed, etc).
    TargetInvalid,
    /// The stage planner could not satisfy every source's declared inputs.
    PlanUnsatisfiable,
    /// A `--src.<name>` flag or config key referenced an unregistered source.
    SourceUnknown,
    /// No sources are enabled for the scan.
    NoSourcesEnabled,
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Source-fatal --
    /// A source exhausted its retry budget.
    SourceRetriesExhausted,
    /// The circuit breaker was open at call time.
    CircuitOpen,
    /// A source's per-call timeout elapsed.
    SourceTimeout,

    // -- Source-warning --
    /// A source reported a partial failure but returned partial artifacts.
    SourcePartialFailure,

    // -- Canceled --
    /// The scan-wide root context was canceled (timeout, signal, or explicit).
    ScanCanceled,

    // -- Output --
    /// Writing a partial or the final result document failed.
    WriteFailed,
    /// Serializing an artifact or result document failed.
    SerializationFailed,

    // -- Internal --
    /// The aggregator observed an invariant violation.
    AggregatorInvariantViolated,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TargetInvalid
            | Self::PlanUnsatisfiable
            | Self::SourceUnknown
            | Self::NoSourcesEnabled
            | Self::ConfigInvalid => ErrorCategory::Configuration,

            Self::SourceRetriesExhausted | Self::CircuitOpen | Self::SourceTimeout => {
                ErrorCategory::SourceFatal
            }

            Self::SourcePartialFailure => ErrorCategory::SourceWarning,

            Self::ScanCanceled => ErrorCategory::Canceled,

            Self::WriteFailed | Self::SerializationFailed => ErrorCategory::Output,

            Self::AggregatorInvariantViolated | Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetInvalid => "TARGET_INVALID",
            Self::PlanUnsatisfiable => "PLAN_UNSATISFIABLE",
            Self::SourceUnknown => "SOURCE_UNKNOWN",
            Self::NoSourcesEnabled => "NO_SOURCES_ENABLED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::SourceRetriesExhausted => "SOURCE_RETRIES_EXHAUSTED",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::SourceTimeout => "SOURCE_TIMEOUT",
            Self::SourcePartialFailure => "SOURCE_PARTIAL_FAILURE",
            Self::ScanCanceled => "SCAN_CANCELED",
            Self::WriteFailed => "WRITE_FAILED",
            Self::SerializationFailed => "SERIALIZATION_FAILED",
            Self::AggregatorInvariantViolated => "AGGREGATOR_INVARIANT_VIOLATED",
            Self::Internal => "INTERNAL",
        }
    }

    /// Process exit code this error kind maps to, per the error handling
    /// design (`0` success is never returned from here).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Output | ErrorCategory::Internal => 1,
            ErrorCategory::SourceFatal
            | ErrorCategory::SourceWarning
            | ErrorCategory::Canceled => 0,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AethonError
// ---------------------------------------------------------------------------

/// Unified engine error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// ```
/// use aethonx_error::{AethonError, ErrorCode};
///
/// let err = AethonError::new(ErrorCode::SourceTimeout, "timed out after 30s")
///     .with_context("source", "crtsh")
///     .with_context("timeout_ms", 30_000);
/// assert_eq!(err.code.as_str(), "SOURCE_TIMEOUT");
/// ```
pub struct AethonError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl AethonError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialization
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.exit_code()`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl fmt::Debug for AethonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("AethonError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for AethonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AethonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serializable snapshot of an [`AethonError`] (without the opaque source),
/// used for the `errors` array in the final result document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AethonErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&AethonError> for AethonErrorDto {
    fn from(err: &AethonError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}
