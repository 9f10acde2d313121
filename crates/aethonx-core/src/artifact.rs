// SPDX-License-Identifier: MIT OR Apache-2.0
//! The artifact graph: [`Artifact`], its closed [`ArtifactType`]/
//! [`ArtifactMetadata`] sets, and directed [`Relation`] edges.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// The closed set of artifact kinds the engine can discover. Every source
/// declares its `input_artifact_types`/`output_artifact_types` from this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// A DNS subdomain of the scan target.
    Subdomain,
    /// A root domain (the scan target itself, or a related apex).
    Domain,
    /// An IPv4 or IPv6 address.
    Ip,
    /// A URL observed during the scan.
    Url,
    /// An email address.
    Email,
    /// An authoritative nameserver.
    Nameserver,
    /// A TLS/X.509 certificate.
    Certificate,
    /// A network service (host:port + protocol).
    Service,
    /// A detected technology/fingerprint.
    Technology,
    /// A WHOIS registrant/contact record.
    WhoisContact,
    /// An exposed backup file.
    BackupFile,
    /// An exposed source repository.
    Repository,
    /// An exposed cloud storage bucket.
    StorageBucket,
    /// A discovered API endpoint or spec.
    Api,
    /// A webshell or other post-exploitation artifact.
    Webshell,
}

impl ArtifactType {
    /// All variants, in declaration order. Used by the aggregator's
    /// per-type counters and by exhaustiveness tests.
    pub const ALL: &'static [ArtifactType] = &[
        ArtifactType::Subdomain,
        ArtifactType::Domain,
        ArtifactType::Ip,
        ArtifactType::Url,
        ArtifactType::Email,
        ArtifactType::Nameserver,
        ArtifactType::Certificate,
        ArtifactType::Service,
        ArtifactType::Technology,
        ArtifactType::WhoisContact,
        ArtifactType::BackupFile,
        ArtifactType::Repository,
        ArtifactType::StorageBucket,
        ArtifactType::Api,
        ArtifactType::Webshell,
    ];

    /// Stable lower-case tag used both in serialized form and as the type
    /// discriminator hashed into the artifact identifier.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Subdomain => "subdomain",
            Self::Domain => "domain",
            Self::Ip => "ip",
            Self::Url => "url",
            Self::Email => "email",
            Self::Nameserver => "nameserver",
            Self::Certificate => "certificate",
            Self::Service => "service",
            Self::Technology => "technology",
            Self::WhoisContact => "whois_contact",
            Self::BackupFile => "backup_file",
            Self::Repository => "repository",
            Self::StorageBucket => "storage_bucket",
            Self::Api => "api",
            Self::Webshell => "webshell",
        }
    }

    /// Index into [`ArtifactType::ALL`], used for the aggregator's
    /// fixed-size atomic per-type counters.
    #[must_use]
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).expect("exhaustive ALL")
    }
}

/// A stable hex identifier, derived from `sha256(type || "\x00" || canonical_value)`.
pub type ArtifactId = String;

/// Compute the stable identifier for an artifact of the given type and
/// canonical value. Two implementations agree iff they canonicalize
/// identically (spec §6).
#[must_use]
pub fn artifact_id(artifact_type: ArtifactType, canonical_value: &str) -> ArtifactId {
    let mut hasher = Sha256::new();
    hasher.update(artifact_type.tag().as_bytes());
    hasher.update(b"\x00");
    hasher.update(canonical_value.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// A directed, typed edge between two artifacts, stored on the source-side
/// artifact. `target_id` is a plain identifier, never a pointer — relations
/// are looked up through the aggregator (spec §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Relation {
    /// Identifier of the artifact this edge originates from.
    pub source_id: ArtifactId,
    /// Identifier of the artifact this edge points to.
    pub target_id: ArtifactId,
    /// The kind of relationship.
    pub kind: RelationKind,
    /// Confidence in `[0.0, 1.0]` that this relation holds.
    pub confidence: f64,
    /// Name of the source that produced this evidence.
    pub evidence_source: String,
}

/// The closed set of relation kinds. All kinds except [`RelationKind::ChildOf`]
/// may participate in cycles (spec §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// A name resolves to an address.
    ResolvesTo,
    /// A domain is served by a nameserver.
    HasNameserver,
    /// A domain has a WHOIS contact.
    HasContact,
    /// A host serves a URL or service.
    Serves,
    /// A service runs on a technology.
    RunsOn,
    /// A certificate was issued for a name.
    IssuedFor,
    /// A subdomain is a child of a parent domain. Never cyclic.
    ChildOf,
    /// A generic cross-reference between artifacts.
    References,
}

/// One of the closed set of typed metadata payloads, selected by
/// [`ArtifactType`]. Serializes as `{"type": "...", "data": {...}}`
/// (spec §6, §9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ArtifactMetadata {
    /// Metadata for [`ArtifactType::Subdomain`].
    Subdomain(SubdomainMetadata),
    /// Metadata for [`ArtifactType::Domain`].
    Domain(DomainMetadata),
    /// Metadata for [`ArtifactType::Ip`].
    Ip(IpMetadata),
    /// Metadata for [`ArtifactType::Url`].
    Url(UrlMetadata),
    /// Metadata for [`ArtifactType::Email`].
    Email(EmailMetadata),
    /// Metadata for [`ArtifactType::Nameserver`].
    Nameserver(NameserverMetadata),
    /// Metadata for [`ArtifactType::Certificate`].
    Certificate(CertificateMetadata),
    /// Metadata for [`ArtifactType::Service`].
    Service(ServiceMetadata),
    /// Metadata for [`ArtifactType::Technology`].
    Technology(TechnologyMetadata),
    /// Metadata for [`ArtifactType::WhoisContact`].
    WhoisContact(WhoisContactMetadata),
    /// Metadata for [`ArtifactType::BackupFile`].
    BackupFile(BackupFileMetadata),
    /// Metadata for [`ArtifactType::Repository`].
    Repository(RepositoryMetadata),
    /// Metadata for [`ArtifactType::StorageBucket`].
    StorageBucket(StorageBucketMetadata),
    /// Metadata for [`ArtifactType::Api`].
    Api(ApiMetadata),
    /// Metadata for [`ArtifactType::Webshell`].
    Webshell(WebshellMetadata),
}

impl ArtifactMetadata {
    /// The [`ArtifactType`] this payload's variant corresponds to.
    #[must_use]
    pub fn artifact_type(&self) -> ArtifactType {
        match self {
            Self::Subdomain(_) => ArtifactType::Subdomain,
            Self::Domain(_) => ArtifactType::Domain,
            Self::Ip(_) => ArtifactType::Ip,
            Self::Url(_) => ArtifactType::Url,
            Self::Email(_) => ArtifactType::Email,
            Self::Nameserver(_) => ArtifactType::Nameserver,
            Self::Certificate(_) => ArtifactType::Certificate,
            Self::Service(_) => ArtifactType::Service,
            Self::Technology(_) => ArtifactType::Technology,
            Self::WhoisContact(_) => ArtifactType::WhoisContact,
            Self::BackupFile(_) => ArtifactType::BackupFile,
            Self::Repository(_) => ArtifactType::Repository,
            Self::StorageBucket(_) => ArtifactType::StorageBucket,
            Self::Api(_) => ArtifactType::Api,
            Self::Webshell(_) => ArtifactType::Webshell,
        }
    }

    /// Default (empty) metadata for a freshly-created artifact of `t`.
    #[must_use]
    pub fn empty_for(t: ArtifactType) -> Self {
        match t {
            ArtifactType::Subdomain => Self::Subdomain(SubdomainMetadata::default()),
            ArtifactType::Domain => Self::Domain(DomainMetadata::default()),
            ArtifactType::Ip => Self::Ip(IpMetadata::default()),
            ArtifactType::Url => Self::Url(UrlMetadata::default()),
            ArtifactType::Email => Self::Email(EmailMetadata::default()),
            ArtifactType::Nameserver => Self::Nameserver(NameserverMetadata::default()),
            ArtifactType::Certificate => Self::Certificate(CertificateMetadata::default()),
            ArtifactType::Service => Self::Service(ServiceMetadata::default()),
            ArtifactType::Technology => Self::Technology(TechnologyMetadata::default()),
            ArtifactType::WhoisContact => Self::WhoisContact(WhoisContactMetadata::default()),
            ArtifactType::BackupFile => Self::BackupFile(BackupFileMetadata::default()),
            ArtifactType::Repository => Self::Repository(RepositoryMetadata::default()),
            ArtifactType::StorageBucket => Self::StorageBucket(StorageBucketMetadata::default()),
            ArtifactType::Api => Self::Api(ApiMetadata::default()),
            ArtifactType::Webshell => Self::Webshell(WebshellMetadata::default()),
        }
    }
}

/// Metadata carried by [`ArtifactType::Subdomain`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubdomainMetadata {
    /// Resolved IP addresses, if any were observed alongside the name.
    #[serde(default)]
    pub resolved_ips: BTreeSet<String>,
}

/// Metadata carried by [`ArtifactType::Domain`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DomainMetadata {
    /// Registrar name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
}

/// Metadata carried by [`ArtifactType::Ip`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IpMetadata {
    /// Autonomous system number, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Observed open ports.
    #[serde(default)]
    pub open_ports: BTreeSet<u16>,
    /// Geolocated country code (ISO 3166-1 alpha-2), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Metadata carried by [`ArtifactType::Url`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UrlMetadata {
    /// Observed HTTP status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Page title, if fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Priority score assigned by the URL filter engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<i64>,
}

/// Metadata carried by [`ArtifactType::Email`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmailMetadata {
    /// Context the email was discovered in (e.g. `"whois"`, `"page_scrape"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_via: Option<String>,
}

/// Metadata carried by [`ArtifactType::Nameserver`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NameserverMetadata {
    /// IP addresses the nameserver resolves to.
    #[serde(default)]
    pub resolved_ips: BTreeSet<String>,
}

/// Metadata carried by [`ArtifactType::Certificate`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CertificateMetadata {
    /// Certificate issuer common name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Subject alternative names covered by this certificate.
    #[serde(default)]
    pub san: BTreeSet<String>,
    /// RFC 3339 not-before timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    /// RFC 3339 not-after timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<String>,
    /// When this metadata was last refreshed; used for merge precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}

/// Metadata carried by [`ArtifactType::Service`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceMetadata {
    /// Port number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Transport/application protocol (e.g. `"tcp"`, `"http"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Banner text, if grabbed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

/// Metadata carried by [`ArtifactType::Technology`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TechnologyMetadata {
    /// Product name (e.g. `"nginx"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Detected version string, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Fingerprint categories (e.g. `"web-server"`, `"cms"`).
    #[serde(default)]
    pub categories: BTreeSet<String>,
}

/// Metadata carried by [`ArtifactType::WhoisContact`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WhoisContactMetadata {
    /// Registrant organization name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Registrant country.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Metadata carried by [`ArtifactType::BackupFile`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BackupFileMetadata {
    /// File size in bytes, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// File extension (e.g. `"sql.gz"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// Metadata carried by [`ArtifactType::Repository`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepositoryMetadata {
    /// Hosting provider (e.g. `"github"`, `"exposed-.git"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Whether the repository is publicly exposed.
    #[serde(default)]
    pub exposed: bool,
}

/// Metadata carried by [`ArtifactType::StorageBucket`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StorageBucketMetadata {
    /// Cloud provider (e.g. `"s3"`, `"gcs"`, `"azure-blob"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Whether the bucket allows public listing.
    #[serde(default)]
    pub public: bool,
}

/// Metadata carried by [`ArtifactType::Api`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiMetadata {
    /// Location of the API spec (e.g. an OpenAPI document URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
    /// Whether the API appears to require authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_auth: Option<bool>,
}

/// Metadata carried by [`ArtifactType::Webshell`] artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WebshellMetadata {
    /// Detected webshell family/framework, if identifiable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

/// A discovered entity with provenance, confidence, and typed metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Artifact {
    /// Stable identifier: `artifact_id(artifact_type, canonical_value)`.
    pub id: ArtifactId,
    /// Closed-set artifact kind.
    pub artifact_type: ArtifactType,
    /// Raw value as observed by the producing source.
    pub value: String,
    /// Canonicalized form of `value` (see [`crate::canon`]).
    pub canonical_value: String,
    /// Union of source names that have contributed to this artifact.
    pub sources: BTreeSet<String>,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Timestamp of first observation.
    pub first_seen: chrono::DateTime<chrono::Utc>,
    /// Typed metadata payload.
    pub metadata: ArtifactMetadata,
    /// Outbound relations, stored on this (the source-side) artifact.
    pub relations: Vec<Relation>,
}

impl Artifact {
    /// Build a new artifact from a raw value, computing its canonical form
    /// and identifier. `source` is recorded as the sole initial provenance
    /// entry.
    pub fn new(
        artifact_type: ArtifactType,
        raw_value: impl Into<String>,
        source: impl Into<String>,
        confidence: f64,
        first_seen: chrono::DateTime<chrono::Utc>,
    ) -> Result<Self, aethonx_error::AethonError> {
        let raw_value = raw_value.into();
        let canonical_value = crate::canon::canonicalize(artifact_type, &raw_value)?;
        let id = artifact_id(artifact_type, &canonical_value);
        let mut sources = BTreeSet::new();
        sources.insert(source.into());
        Ok(Self {
            id,
            artifact_type,
            value: raw_value,
            canonical_value,
            sources,
            confidence: confidence.clamp(0.0, 1.0),
            first_seen,
            metadata: ArtifactMetadata::empty_for(artifact_type),
            relations: Vec::new(),
        })
    }

    /// Attach a relation originating from this artifact, deduplicating by
    /// `(target_id, kind)` and keeping the higher-confidence edge.
    pub fn add_relation(&mut self, relation: Relation) {
        if let Some(existing) = self
            .relations
            .iter_mut()
            .find(|r| r.target_id == relation.target_id && r.kind == relation.kind)
        {
            if relation.confidence > existing.confidence {
                *existing = relation;
            }
        } else {
            self.relations.push(relation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_type_index_covers_all() {
        for (i, t) in ArtifactType::ALL.iter().enumerate() {
            assert_eq!(t.index(), i);
        }
    }

    #[test]
    fn artifact_id_is_deterministic() {
        let a = artifact_id(ArtifactType::Domain, "example.com");
        let b = artifact_id(ArtifactType::Domain, "example.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // sha256 hex
    }

    #[test]
    fn artifact_id_distinguishes_type() {
        let a = artifact_id(ArtifactType::Domain, "example.com");
        let b = artifact_id(ArtifactType::Subdomain, "example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn metadata_variant_matches_type() {
        for t in ArtifactType::ALL {
            let m = ArtifactMetadata::empty_for(*t);
            assert_eq!(m.artifact_type(), *t);
        }
    }

    #[test]
    fn new_artifact_clamps_confidence() {
        let a = Artifact::new(
            ArtifactType::Domain,
            "Example.com.",
            "test",
            1.5,
            chrono::Utc::now(),
        )
        .unwrap();
        assert_eq!(a.confidence, 1.0);
        assert_eq!(a.canonical_value, "example.com");
    }

    #[test]
    fn add_relation_dedups_keeping_highest_confidence() {
        let mut a = Artifact::new(ArtifactType::Domain, "example.com", "s", 0.5, chrono::Utc::now())
            .unwrap();
        a.add_relation(Relation {
            source_id: a.id.clone(),
            target_id: "t1".into(),
            kind: RelationKind::ResolvesTo,
            confidence: 0.4,
            evidence_source: "s1".into(),
        });
        a.add_relation(Relation {
            source_id: a.id.clone(),
            target_id: "t1".into(),
            kind: RelationKind::ResolvesTo,
            confidence: 0.9,
            evidence_source: "s2".into(),
        });
        assert_eq!(a.relations.len(), 1);
        assert_eq!(a.relations[0].confidence, 0.9);
        assert_eq!(a.relations[0].evidence_source, "s2");
    }
}
