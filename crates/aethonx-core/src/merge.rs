// SPDX-License-Identifier: MIT OR Apache-2.0
//! Merge rule for artifacts that collide on identity (spec §3, §4.2).

use crate::artifact::{Artifact, ArtifactMetadata};

/// Merge `incoming` into `existing` in place, per spec's merge rule:
/// union source sets; `confidence = max`; `first_seen = min`; relations
/// concatenated then edge-deduped (keep highest confidence per
/// `(target, kind)`); metadata merged field-wise preferring non-empty
/// values from higher-confidence constituents.
///
/// # Panics
///
/// Never panics; if `existing` and `incoming` disagree on
/// `artifact_type`/`id` (which the aggregator never allows), the metadata
/// merge is a no-op and `existing`'s variant is kept, preserving the
/// "metadata type is monotone" invariant.
pub fn merge_artifact(existing: &mut Artifact, incoming: Artifact) {
    debug_assert_eq!(existing.id, incoming.id, "merge requires equal identity");

    let incoming_is_higher_confidence = incoming.confidence > existing.confidence;

    existing.sources.extend(incoming.sources);
    existing.confidence = existing.confidence.max(incoming.confidence);
    existing.first_seen = existing.first_seen.min(incoming.first_seen);

    for relation in incoming.relations {
        existing.add_relation(relation);
    }

    merge_metadata(
        &mut existing.metadata,
        incoming.metadata,
        incoming_is_higher_confidence,
    );

    // Prefer the raw value recorded alongside the higher-confidence
    // observation; canonical_value is identical by construction (same id).
    if incoming_is_higher_confidence {
        existing.value = incoming.value;
    }
}

fn merge_metadata(existing: &mut ArtifactMetadata, incoming: ArtifactMetadata, incoming_wins_ties: bool) {
    use ArtifactMetadata as M;
    match (existing, incoming) {
        (M::Subdomain(e), M::Subdomain(i)) => {
            e.resolved_ips.extend(i.resolved_ips);
        }
        (M::Domain(e), M::Domain(i)) => {
            prefer_non_empty_option(&mut e.registrar, i.registrar, incoming_wins_ties);
        }
        (M::Ip(e), M::Ip(i)) => {
            prefer_non_empty_option(&mut e.asn, i.asn, incoming_wins_ties);
            e.open_ports.extend(i.open_ports);
            prefer_non_empty_option(&mut e.country, i.country, incoming_wins_ties);
        }
        (M::Url(e), M::Url(i)) => {
            prefer_non_empty_option(&mut e.status_code, i.status_code, incoming_wins_ties);
            prefer_non_empty_option(&mut e.title, i.title, incoming_wins_ties);
            prefer_non_empty_option(&mut e.priority_score, i.priority_score, incoming_wins_ties);
        }
        (M::Email(e), M::Email(i)) => {
            prefer_non_empty_option(&mut e.discovered_via, i.discovered_via, incoming_wins_ties);
        }
        (M::Nameserver(e), M::Nameserver(i)) => {
            e.resolved_ips.extend(i.resolved_ips);
        }
        (M::Certificate(e), M::Certificate(i)) => {
            let incoming_is_newer = match (&e.last_updated, &i.last_updated) {
                (Some(a), Some(b)) => b > a,
                (None, Some(_)) => true,
                _ => false,
            };
            prefer_non_empty_option(&mut e.issuer, i.issuer, incoming_is_newer);
            e.san.extend(i.san);
            prefer_non_empty_option(&mut e.not_before, i.not_before, incoming_is_newer);
            prefer_non_empty_option(&mut e.not_after, i.not_after, incoming_is_newer);
            if incoming_is_newer {
                e.last_updated = i.last_updated;
            }
        }
        (M::Service(e), M::Service(i)) => {
            prefer_non_empty_option(&mut e.port, i.port, incoming_wins_ties);
            prefer_non_empty_option(&mut e.protocol, i.protocol, incoming_wins_ties);
            prefer_non_empty_option(&mut e.banner, i.banner, incoming_wins_ties);
        }
        (M::Technology(e), M::Technology(i)) => {
            prefer_non_empty_option(&mut e.name, i.name, incoming_wins_ties);
            prefer_non_empty_option(&mut e.version, i.version, incoming_wins_ties);
            e.categories.extend(i.categories);
        }
        (M::WhoisContact(e), M::WhoisContact(i)) => {
            prefer_non_empty_option(&mut e.organization, i.organization, incoming_wins_ties);
            prefer_non_empty_option(&mut e.country, i.country, incoming_wins_ties);
        }
        (M::BackupFile(e), M::BackupFile(i)) => {
            prefer_non_empty_option(&mut e.size_bytes, i.size_bytes, incoming_wins_ties);
            prefer_non_empty_option(&mut e.extension, i.extension, incoming_wins_ties);
        }
        (M::Repository(e), M::Repository(i)) => {
            prefer_non_empty_option(&mut e.provider, i.provider, incoming_wins_ties);
            e.exposed = e.exposed || i.exposed;
        }
        (M::StorageBucket(e), M::StorageBucket(i)) => {
            prefer_non_empty_option(&mut e.provider, i.provider, incoming_wins_ties);
            e.public = e.public || i.public;
        }
        (M::Api(e), M::Api(i)) => {
            prefer_non_empty_option(&mut e.spec_url, i.spec_url, incoming_wins_ties);
            prefer_non_empty_option(&mut e.requires_auth, i.requires_auth, incoming_wins_ties);
        }
        (M::Webshell(e), M::Webshell(i)) => {
            prefer_non_empty_option(&mut e.framework, i.framework, incoming_wins_ties);
        }
        // Mismatched variants should never happen (same identity implies
        // same artifact_type); keep `existing` untouched.
        _ => {}
    }
}

/// (a) non-empty over empty, (b) when both non-empty, prefer `incoming` iff
/// `incoming_wins_ties` (the higher-confidence constituent).
fn prefer_non_empty_option<T>(existing: &mut Option<T>, incoming: Option<T>, incoming_wins_ties: bool) {
    match (existing.is_some(), incoming.is_some()) {
        (false, true) => *existing = incoming,
        (true, true) if incoming_wins_ties => *existing = incoming,
        _ => {}
    }
}
