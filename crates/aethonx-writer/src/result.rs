// SPDX-License-Identifier: MIT OR Apache-2.0
//! The stable `result.json` document schema (spec §6).

use aethonx_core::{Artifact, ArtifactId, ArtifactMetadata, RelationKind, ScanResult};
use serde::{Deserialize, Serialize};

/// One relation edge as it appears in the result document: `source_id` is
/// implicit (the owning artifact's `id`), so only target/kind/confidence/
/// evidence are carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDocument {
    /// Identifier of the artifact this edge points to.
    pub target_id: ArtifactId,
    /// Relation kind.
    pub kind: RelationKind,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Name of the source that produced this evidence.
    pub source: String,
}

/// One artifact as it appears in the result document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDocument {
    /// Stable identifier.
    pub id: ArtifactId,
    /// Closed-set artifact kind.
    #[serde(rename = "type")]
    pub artifact_type: aethonx_core::ArtifactType,
    /// Raw value as observed.
    pub value: String,
    /// Canonicalized form.
    pub canonical_value: String,
    /// Union of contributing source names.
    pub sources: Vec<String>,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Timestamp of first observation.
    pub first_seen: chrono::DateTime<chrono::Utc>,
    /// Typed metadata payload.
    pub metadata: ArtifactMetadata,
    /// Outbound relations.
    pub relations: Vec<RelationDocument>,
}

impl From<&Artifact> for ArtifactDocument {
    fn from(a: &Artifact) -> Self {
        Self {
            id: a.id.clone(),
            artifact_type: a.artifact_type,
            value: a.value.clone(),
            canonical_value: a.canonical_value.clone(),
            sources: a.sources.iter().cloned().collect(),
            confidence: a.confidence,
            first_seen: a.first_seen,
            metadata: a.metadata.clone(),
            relations: a
                .relations
                .iter()
                .map(|r| RelationDocument {
                    target_id: r.target_id.clone(),
                    kind: r.kind,
                    confidence: r.confidence,
                    source: r.evidence_source.clone(),
                })
                .collect(),
        }
    }
}

/// One warning entry in the result document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningDocument {
    /// Source that raised the warning.
    pub source: String,
    /// Human-readable message.
    pub message: String,
}

/// One error entry in the result document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDocument {
    /// Source that raised the error (or `"engine"`).
    pub source: String,
    /// Human-readable message.
    pub message: String,
    /// Whether this error was fatal for the whole scan.
    pub fatal: bool,
}

/// The stable `result.json` shape (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Scan subject.
    pub target: aethonx_core::Target,
    /// When the scan began.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// When the scan finished.
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Finalized artifacts, in no particular order.
    pub artifacts: Vec<ArtifactDocument>,
    /// Non-fatal warnings.
    pub warnings: Vec<WarningDocument>,
    /// Fatal-for-source or fatal-for-scan errors.
    pub errors: Vec<ErrorDocument>,
    /// Engine metadata.
    pub metadata: aethonx_core::ScanResultMetadata,
}

impl From<&ScanResult> for ResultDocument {
    fn from(scan: &ScanResult) -> Self {
        let mut artifacts: Vec<ArtifactDocument> = scan.artifacts.values().map(ArtifactDocument::from).collect();
        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            target: scan.target.clone(),
            started_at: scan.started_at,
            finished_at: scan.finished_at,
            artifacts,
            warnings: scan.warnings.iter().map(|w| WarningDocument { source: w.source.clone(), message: w.message.clone() }).collect(),
            errors: scan
                .errors
                .iter()
                .map(|e| ErrorDocument { source: e.source.clone(), message: e.message.clone(), fatal: e.fatal })
                .collect(),
            metadata: scan.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aethonx_core::{Artifact, ArtifactType, ScanAggregator, ScanMode, Target};
    use chrono::TimeZone;

    #[test]
    fn result_document_shape_matches_expected_fields() {
        let target = Target::new("example.com", ScanMode::Passive);
        let aggregator = ScanAggregator::new(target, "scan-fixture-0001");

        let seen = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut api = Artifact::new(ArtifactType::Subdomain, "api.example.com", "crt.sh", 0.9, seen).unwrap();
        let assets = Artifact::new(ArtifactType::Subdomain, "assets.example.com", "crt.sh", 0.6, seen).unwrap();
        api.add_relation(aethonx_core::Relation {
            source_id: api.id.clone(),
            target_id: assets.id.clone(),
            kind: aethonx_core::RelationKind::ResolvesTo,
            confidence: 0.5,
            evidence_source: "crt.sh".to_string(),
        });

        aggregator.add(api.clone());
        aggregator.add(assets.clone());
        let scan = aggregator.finalize();
        let document = ResultDocument::from(&scan);

        assert_eq!(document.target.root, "example.com");
        assert!(document.finished_at.is_some());
        assert_eq!(document.artifacts.len(), 2);
        // Sorted by id (spec §6 deterministic ordering).
        assert!(document.artifacts.windows(2).all(|w| w[0].id <= w[1].id));
        assert!(document.warnings.is_empty());
        assert!(document.errors.is_empty());

        let api_doc = document.artifacts.iter().find(|a| a.id == api.id).expect("api artifact present");
        assert_eq!(api_doc.value, "api.example.com");
        assert_eq!(api_doc.confidence, 0.9);
        assert_eq!(api_doc.sources, vec!["crt.sh".to_string()]);
        assert_eq!(api_doc.relations.len(), 1);
        assert_eq!(api_doc.relations[0].target_id, assets.id);
        assert_eq!(api_doc.relations[0].kind, aethonx_core::RelationKind::ResolvesTo);

        // Round-trips through JSON without loss of the fields checked above.
        let json = serde_json::to_string(&document).unwrap();
        let back: ResultDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.artifacts.len(), document.artifacts.len());
    }
}
