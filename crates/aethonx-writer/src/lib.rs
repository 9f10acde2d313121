// SPDX-License-Identifier: MIT OR Apache-2.0
//! Streaming writer: per-source partial spills and final result
//! consolidation for AethonX scans (spec §4.8/C5).
//!
//! [`StreamingWriter`] owns a scan-rooted output directory. Sources that
//! emit high artifact volumes have their buffer flushed to a
//! `partial-<source>-<seq>.ndjson` file once it crosses
//! [`WriterConfig::artifact_threshold`]; at scan end,
//! [`StreamingWriter::consolidate`] reads every partial back in
//! deterministic order, re-feeds each line through the aggregator's merge
//! (to catch late cross-source duplicates), and writes the single
//! `result.json` document. Partials are deleted on success; if the process
//! dies mid-scan, the partials left behind are themselves valid ndjson.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod result;
mod spill;

pub use result::{ArtifactDocument, ErrorDocument, RelationDocument, ResultDocument, WarningDocument};
pub use spill::{StreamingWriter, WriterConfig};
