// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable contract types for the AethonX reconnaissance engine.
//!
//! This crate is the one every other crate in the workspace depends on. It
//! defines the artifact graph ([`Artifact`], [`Relation`]), the scan subject
//! ([`Target`]) and its result ([`ScanResult`]/[`ScanAggregator`]), the
//! canonicalization functions that give artifacts a stable identity
//! ([`canon`]), and the [`Source`] trait every discovery module implements.
//!
//! Nothing here talks to the network or the filesystem — that is left to
//! the sources, the HTTP client, and the streaming writer.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregator;
pub mod artifact;
pub mod cancel;
pub mod canon;
pub mod merge;
pub mod source;
pub mod target;

pub use aggregator::{ScanAggregator, ScanResult, ScanResultMetadata, ScanWarning, ScanError};
pub use artifact::{Artifact, ArtifactId, ArtifactMetadata, ArtifactType, Relation, RelationKind};
pub use cancel::CancellationToken;
pub use source::{ProgressUpdate, RunOutcome, ScanContext, Source, SourceConfig};
pub use target::{ScanMode, ScopeFilter, Target};

/// Engine version reported in [`ScanResultMetadata`], taken from this crate's
/// own `Cargo.toml` version at compile time.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
