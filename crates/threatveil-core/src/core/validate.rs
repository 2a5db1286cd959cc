// crates/threatveil-core/src/core/validate.rs
// ============================================================================
// Module: ThreatVeil Input Validation
// Description: Domain and code-organization input validation.
// Purpose: Reject malformed scan targets before any probe work begins.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Scan targets are bare hostnames. URLs, IP literals, localhost and
//! reserved names are rejected with field-level reasons so the API layer can
//! surface a 400 without guessing. Code organization names are restricted to
//! the hosting platform's allowed character set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted length for a code organization name.
const MAX_CODE_ORG_LENGTH: usize = 50;
/// Maximum length of one DNS label.
const MAX_LABEL_LENGTH: usize = 63;
/// Reserved names never accepted as scan targets.
const RESERVED_DOMAINS: [&str; 3] = ["localhost", "local", "test"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Input validation errors with field-level reasons.
///
/// # Invariants
/// - Variants are stable for programmatic handling; messages are safe to
///   surface to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Domain field was empty.
    #[error("domain is required")]
    EmptyDomain,
    /// Domain was given as a URL rather than a bare hostname.
    #[error("provide a bare domain (for example example.com), not a URL")]
    UrlDomain,
    /// Domain was an IPv4 or IPv6 literal.
    #[error("IP addresses are not supported; provide a domain name")]
    IpAddress,
    /// Domain is a reserved or local-only name.
    #[error("localhost and reserved test domains are not supported")]
    ReservedDomain,
    /// Domain failed the bare-hostname shape check.
    #[error("invalid domain format; use a valid domain like example.com")]
    MalformedDomain,
    /// Code organization contained characters outside the allowed set.
    #[error("code organization may only contain letters, numbers, and hyphens")]
    MalformedCodeOrg,
    /// Code organization exceeded the accepted length.
    #[error("code organization name must be {MAX_CODE_ORG_LENGTH} characters or less")]
    CodeOrgTooLong,
}

// ============================================================================
// SECTION: Domain Validation
// ============================================================================

/// Validates and normalizes a scan target domain.
///
/// Returns the lowercase, trimmed domain on success.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first failed check.
pub fn validate_domain(raw: &str) -> Result<String, ValidationError> {
    let domain = raw.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return Err(ValidationError::EmptyDomain);
    }
    if domain.contains("://") || domain.starts_with("//") {
        return Err(ValidationError::UrlDomain);
    }
    if is_ipv4_literal(&domain) || is_ipv6_literal(&domain) {
        return Err(ValidationError::IpAddress);
    }
    if RESERVED_DOMAINS.contains(&domain.as_str()) {
        return Err(ValidationError::ReservedDomain);
    }
    if !has_valid_hostname_shape(&domain) {
        return Err(ValidationError::MalformedDomain);
    }
    Ok(domain)
}

/// Returns true when the input parses as a dotted-quad IPv4 literal.
fn is_ipv4_literal(domain: &str) -> bool {
    let octets: Vec<&str> = domain.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|octet| !octet.is_empty() && octet.len() <= 3 && octet.bytes().all(|b| b.is_ascii_digit()))
}

/// Returns true when the input looks like an IPv6 literal.
fn is_ipv6_literal(domain: &str) -> bool {
    domain.contains(':') && domain.bytes().all(|b| b.is_ascii_hexdigit() || b == b':')
}

/// Returns true when the input has the shape of a bare hostname with a TLD.
fn has_valid_hostname_shape(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let Some((tld, body)) = labels.split_last() else {
        return false;
    };
    if tld.len() < 2 || !tld.bytes().all(|b| b.is_ascii_lowercase()) {
        return false;
    }
    body.iter().all(|label| is_valid_label(label))
}

/// Returns true when one DNS label is well formed.
fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return false;
    }
    let bytes = label.as_bytes();
    let interior_ok =
        bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    interior_ok && !label.starts_with('-') && !label.ends_with('-')
}

// ============================================================================
// SECTION: Code Organization Validation
// ============================================================================

/// Validates an optional code organization name.
///
/// Empty or absent input normalizes to `None`.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the name is malformed or too long.
pub fn validate_code_org(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let org = raw.trim();
    if org.is_empty() {
        return Ok(None);
    }
    if org.len() > MAX_CODE_ORG_LENGTH {
        return Err(ValidationError::CodeOrgTooLong);
    }
    if !org.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
        return Err(ValidationError::MalformedCodeOrg);
    }
    Ok(Some(org.to_string()))
}
