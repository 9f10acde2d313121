// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type-specific canonicalization (spec §4.2). Every function here is pure
//! and idempotent: `canonicalize(t, canonicalize(t, x)) == canonicalize(t, x)`.

use crate::artifact::ArtifactType;
use aethonx_error::{AethonError, ErrorCode};
use std::net::IpAddr;
use unicode_normalization::UnicodeNormalization;

/// Dispatch to the canonicalization function for `artifact_type`.
pub fn canonicalize(artifact_type: ArtifactType, raw: &str) -> Result<String, AethonError> {
    match artifact_type {
        ArtifactType::Domain | ArtifactType::Subdomain | ArtifactType::Nameserver => {
            Ok(canonicalize_hostname(raw))
        }
        ArtifactType::Ip => canonicalize_ip(raw),
        ArtifactType::Url => canonicalize_url(raw),
        ArtifactType::Email => Ok(canonicalize_email(raw)),
        ArtifactType::Certificate => Ok(canonicalize_certificate(raw)),
        // The remaining types have no distinguished canonical form beyond
        // trimming; identity still discriminates by type + trimmed value.
        ArtifactType::Service
        | ArtifactType::Technology
        | ArtifactType::WhoisContact
        | ArtifactType::BackupFile
        | ArtifactType::Repository
        | ArtifactType::StorageBucket
        | ArtifactType::Api
        | ArtifactType::Webshell => Ok(raw.trim().to_string()),
    }
}

/// `domain`/`subdomain`/`nameserver`: lower-case, NFC-normalized, trailing
/// dot removed, punycode preserved (we never transcode between Unicode and
/// punycode forms — only normalize what's already there).
#[must_use]
pub fn canonicalize_hostname(raw: &str) -> String {
    let trimmed = raw.trim();
    let no_trailing_dot = trimmed.strip_suffix('.').unwrap_or(trimmed);
    no_trailing_dot.nfc().collect::<String>().to_lowercase()
}

/// `ip`: parsed and re-serialized; IPv4-in-IPv6 collapsed to IPv4.
pub fn canonicalize_ip(raw: &str) -> Result<String, AethonError> {
    let addr: IpAddr = raw.trim().parse().map_err(|_| {
        AethonError::new(ErrorCode::ConfigInvalid, "invalid IP address")
            .with_context("value", raw)
    })?;
    let canonical = match addr {
        IpAddr::V4(v4) => IpAddr::V4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped().or_else(|| v6.to_ipv4()) {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
    };
    Ok(canonical.to_string())
}

/// `url`: lower-case scheme and host, default ports removed, empty
/// path→`/`, fragment dropped, path and query preserved case-sensitively.
pub fn canonicalize_url(raw: &str) -> Result<String, AethonError> {
    let mut parsed = url::Url::parse(raw.trim()).map_err(|e| {
        AethonError::new(ErrorCode::ConfigInvalid, "invalid URL")
            .with_context("value", raw)
            .with_context("reason", e.to_string())
    })?;

    parsed.set_fragment(None);

    let is_default_port = matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443)) | ("ftp", Some(21))
    );
    if is_default_port {
        let _ = parsed.set_port(None);
    }

    if parsed.path().is_empty() {
        parsed.set_path("/");
    }

    // Scheme and host are already lower-cased by the `url` crate; we only
    // need to guard against hosts supplied with mixed-case punycode labels.
    Ok(parsed.to_string())
}

/// `email`: lower-case whole address.
#[must_use]
pub fn canonicalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `certificate`: hex serial lower-cased, colons and whitespace removed.
#[must_use]
pub fn canonicalize_certificate(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect::<String>()
        .to_lowercase()
}

/// `hash`: lower-case; validated length in `{32,40,64,128}` (MD5, SHA-1,
/// SHA-256, SHA-512). Not an [`ArtifactType`] variant on its own — used by
/// sources that embed hashes inside other artifacts' metadata.
pub fn canonicalize_hash(raw: &str) -> Result<String, AethonError> {
    let lower = raw.trim().to_lowercase();
    if !lower.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AethonError::new(ErrorCode::ConfigInvalid, "hash is not hex")
            .with_context("value", raw));
    }
    match lower.len() {
        32 | 40 | 64 | 128 => Ok(lower),
        other => Err(AethonError::new(ErrorCode::ConfigInvalid, "unsupported hash length")
            .with_context("value", raw)
            .with_context("length", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_lowercases_and_strips_trailing_dot() {
        assert_eq!(canonicalize_hostname("API.Example.COM."), "api.example.com");
    }

    #[test]
    fn hostname_is_idempotent() {
        let once = canonicalize_hostname("Foo.Example.com.");
        let twice = canonicalize_hostname(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn ip_collapses_ipv4_mapped_ipv6() {
        let c = canonicalize_ip("::ffff:192.0.2.1").unwrap();
        assert_eq!(c, "192.0.2.1");
    }

    #[test]
    fn ip_rejects_garbage() {
        assert!(canonicalize_ip("not-an-ip").is_err());
    }

    #[test]
    fn ip_passthrough_ipv6() {
        let c = canonicalize_ip("2001:db8::1").unwrap();
        assert_eq!(c, "2001:db8::1");
    }

    #[test]
    fn url_lowercases_scheme_and_host_strips_default_port_and_fragment() {
        let c = canonicalize_url("HTTPS://Example.COM:443/Path?Query=1#frag").unwrap();
        assert_eq!(c, "https://example.com/Path?Query=1");
    }

    #[test]
    fn url_preserves_nondefault_port() {
        let c = canonicalize_url("http://example.com:8080/").unwrap();
        assert_eq!(c, "http://example.com:8080/");
    }

    #[test]
    fn url_empty_path_becomes_slash() {
        let c = canonicalize_url("http://example.com").unwrap();
        assert_eq!(c, "http://example.com/");
    }

    #[test]
    fn url_path_and_query_case_preserved() {
        let c = canonicalize_url("http://example.com/MixedCase?Key=Value").unwrap();
        assert_eq!(c, "http://example.com/MixedCase?Key=Value");
    }

    #[test]
    fn email_lowercases() {
        assert_eq!(canonicalize_email("Admin@Example.COM"), "admin@example.com");
    }

    #[test]
    fn certificate_strips_colons_and_whitespace() {
        assert_eq!(
            canonicalize_certificate("AB: CD : EF\n01"),
            "abcdef01"
        );
    }

    #[test]
    fn hash_validates_length() {
        assert!(canonicalize_hash(&"a".repeat(32)).is_ok());
        assert!(canonicalize_hash(&"a".repeat(40)).is_ok());
        assert!(canonicalize_hash(&"a".repeat(64)).is_ok());
        assert!(canonicalize_hash(&"a".repeat(128)).is_ok());
        assert!(canonicalize_hash(&"a".repeat(33)).is_err());
    }

    #[test]
    fn hash_rejects_non_hex() {
        assert!(canonicalize_hash(&"z".repeat(32)).is_err());
    }

    #[test]
    fn canonicalize_dispatches_by_type() {
        assert_eq!(
            canonicalize(ArtifactType::Subdomain, "API.EXAMPLE.COM.").unwrap(),
            "api.example.com"
        );
        assert_eq!(
            canonicalize(ArtifactType::Email, "A@B.com").unwrap(),
            "a@b.com"
        );
    }
}
