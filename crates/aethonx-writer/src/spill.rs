// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`StreamingWriter`]: per-source buffered ndjson spill with deterministic
//! lexicographic consolidation (spec §4.8).

use crate::result::ResultDocument;
use aethonx_core::{Artifact, ScanAggregator};
use aethonx_error::{AethonError, ErrorCode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Writer tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Buffer size (artifact count) above which a source's buffer is
    /// flushed to a partial file.
    pub artifact_threshold: usize,
}

impl Default for WriterConfig {
    /// Matches the CLI default of `--streaming/-s 1000`.
    fn default() -> Self {
        Self { artifact_threshold: 1000 }
    }
}

#[derive(Default)]
struct SourceBuffer {
    items: Vec<Artifact>,
    seq: u64,
}

/// Owns a scan-rooted output directory; buffers artifacts per source and
/// spills them to `partial-<source>-<seq>.ndjson` above
/// [`WriterConfig::artifact_threshold`]. Robust to mid-scan termination:
/// any partial left on disk is itself valid ndjson (spec §4.8).
pub struct StreamingWriter {
    root: PathBuf,
    config: WriterConfig,
    buffers: Mutex<HashMap<String, SourceBuffer>>,
}

impl StreamingWriter {
    /// Create (or reuse) the output directory at `root`.
    pub fn new(root: impl Into<PathBuf>, config: WriterConfig) -> Result<Self, AethonError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            AethonError::new(ErrorCode::WriteFailed, "failed to create output directory")
                .with_context("path", root.display().to_string())
                .with_context("reason", e.to_string())
        })?;
        Ok(Self { root, config, buffers: Mutex::new(HashMap::new()) })
    }

    /// The output directory this writer owns.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append `artifact` to `source_name`'s in-memory buffer, flushing to
    /// disk if the buffer has crossed [`WriterConfig::artifact_threshold`].
    pub async fn emit(&self, source_name: &str, artifact: Artifact) -> Result<(), AethonError> {
        let to_flush = {
            let mut buffers = self.buffers.lock().expect("writer lock poisoned");
            let buf = buffers.entry(source_name.to_string()).or_default();
            buf.items.push(artifact);
            if buf.items.len() >= self.config.artifact_threshold {
                let seq = buf.seq;
                buf.seq += 1;
                Some((std::mem::take(&mut buf.items), seq))
            } else {
                None
            }
        };
        if let Some((items, seq)) = to_flush {
            self.write_partial(source_name, seq, &items).await?;
        }
        Ok(())
    }

    /// Flush every source's non-empty buffer to disk unconditionally,
    /// regardless of the threshold. Called at scan end before
    /// [`StreamingWriter::consolidate`] reads partials back so that no
    /// buffered artifact is left only in memory.
    pub async fn flush_all(&self) -> Result<(), AethonError> {
        let pending: Vec<(String, Vec<Artifact>, u64)> = {
            let mut buffers = self.buffers.lock().expect("writer lock poisoned");
            buffers
                .iter_mut()
                .filter(|(_, buf)| !buf.items.is_empty())
                .map(|(name, buf)| {
                    let seq = buf.seq;
                    buf.seq += 1;
                    (name.clone(), std::mem::take(&mut buf.items), seq)
                })
                .collect()
        };
        for (name, items, seq) in pending {
            self.write_partial(&name, seq, &items).await?;
        }
        Ok(())
    }

    async fn write_partial(&self, source_name: &str, seq: u64, items: &[Artifact]) -> Result<(), AethonError> {
        let path = self.partial_path(source_name, seq);
        let mut body = String::new();
        for artifact in items {
            let line = serde_json::to_string(artifact).map_err(|e| {
                AethonError::new(ErrorCode::SerializationFailed, "failed to serialize artifact")
                    .with_context("source", source_name)
                    .with_context("reason", e.to_string())
            })?;
            body.push_str(&line);
            body.push('\n');
        }
        tokio::fs::write(&path, body).await.map_err(|e| {
            AethonError::new(ErrorCode::WriteFailed, "failed to write partial file")
                .with_context("path", path.display().to_string())
                .with_context("reason", e.to_string())
        })?;
        debug!(source = source_name, seq, count = items.len(), "flushed partial");
        Ok(())
    }

    fn partial_path(&self, source_name: &str, seq: u64) -> PathBuf {
        self.root.join(format!("partial-{source_name}-{seq}.ndjson"))
    }

    /// List partial files currently on disk, in deterministic
    /// lexicographic `(source, seq)` order (spec §4.8).
    fn partials_in_order(&self) -> Result<Vec<PathBuf>, AethonError> {
        let mut entries: Vec<(String, u64, PathBuf)> = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                AethonError::new(ErrorCode::WriteFailed, "failed to read output directory")
                    .with_context("path", self.root.display().to_string())
                    .with_context("reason", e.to_string())
            })?;
            let path = entry.path().to_path_buf();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Some((source, seq)) = parse_partial_name(name) else { continue };
            entries.push((source, seq, path));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(entries.into_iter().map(|(_, _, path)| path).collect())
    }

    /// Read every partial back in deterministic order, re-feed each line
    /// through `aggregator`'s merge (to catch late cross-source
    /// duplicates), finalize the aggregator, and write the single
    /// `result.json`. Partials are deleted on success.
    pub async fn consolidate(&self, aggregator: &ScanAggregator) -> Result<ResultDocument, AethonError> {
        self.flush_all().await?;

        let partials = self.partials_in_order()?;
        for path in &partials {
            let body = tokio::fs::read_to_string(path).await.map_err(|e| {
                AethonError::new(ErrorCode::WriteFailed, "failed to read partial file")
                    .with_context("path", path.display().to_string())
                    .with_context("reason", e.to_string())
            })?;
            for line in body.lines().filter(|l| !l.trim().is_empty()) {
                let artifact: Artifact = serde_json::from_str(line).map_err(|e| {
                    AethonError::new(ErrorCode::SerializationFailed, "failed to parse partial line")
                        .with_context("path", path.display().to_string())
                        .with_context("reason", e.to_string())
                })?;
                aggregator.add(artifact);
            }
        }

        let scan = aggregator.finalize();
        let document = ResultDocument::from(&scan);
        let result_path = self.root.join("result.json");
        let json = serde_json::to_string_pretty(&document).map_err(|e| {
            AethonError::new(ErrorCode::SerializationFailed, "failed to serialize result document")
                .with_context("reason", e.to_string())
        })?;
        tokio::fs::write(&result_path, json).await.map_err(|e| {
            AethonError::new(ErrorCode::WriteFailed, "failed to write result.json")
                .with_context("path", result_path.display().to_string())
                .with_context("reason", e.to_string())
        })?;

        for path in &partials {
            let _ = tokio::fs::remove_file(path).await;
        }

        info!(artifacts = document.artifacts.len(), path = %result_path.display(), "consolidated scan result");
        Ok(document)
    }
}

fn parse_partial_name(name: &str) -> Option<(String, u64)> {
    let rest = name.strip_prefix("partial-")?.strip_suffix(".ndjson")?;
    let (source, seq) = rest.rsplit_once('-')?;
    let seq: u64 = seq.parse().ok()?;
    Some((source.to_string(), seq))
}
