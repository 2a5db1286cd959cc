// crates/threatveil-core/tests/validate.rs
// ============================================================================
// Module: Validation Tests
// Description: Validate scan-target input checks.
// Purpose: Pin the accepted and rejected domain and code-org shapes.
// Dependencies: threatveil-core
// ============================================================================

//! Input validation tests for domains and code organizations.

use threatveil_core::ValidationError;
use threatveil_core::validate_code_org;
use threatveil_core::validate_domain;

#[test]
fn bare_domains_normalize_to_lowercase() {
    assert_eq!(validate_domain("Example.COM "), Ok("example.com".to_string()));
    assert_eq!(
        validate_domain("sub.shop.example.co.uk"),
        Ok("sub.shop.example.co.uk".to_string())
    );
    assert_eq!(validate_domain("xn--bcher-kva.ch"), Ok("xn--bcher-kva.ch".to_string()));
}

#[test]
fn urls_are_rejected() {
    assert_eq!(validate_domain("https://example.com"), Err(ValidationError::UrlDomain));
    assert_eq!(validate_domain("http://example.com/path"), Err(ValidationError::UrlDomain));
    assert_eq!(validate_domain("//example.com"), Err(ValidationError::UrlDomain));
}

#[test]
fn ip_literals_are_rejected() {
    assert_eq!(validate_domain("192.168.0.1"), Err(ValidationError::IpAddress));
    assert_eq!(validate_domain("2001:db8::1"), Err(ValidationError::IpAddress));
}

#[test]
fn reserved_names_are_rejected() {
    assert_eq!(validate_domain("localhost"), Err(ValidationError::ReservedDomain));
    assert_eq!(validate_domain("test"), Err(ValidationError::ReservedDomain));
}

#[test]
fn malformed_domains_are_rejected() {
    assert_eq!(validate_domain(""), Err(ValidationError::EmptyDomain));
    assert_eq!(validate_domain("   "), Err(ValidationError::EmptyDomain));
    assert_eq!(validate_domain("nodot"), Err(ValidationError::MalformedDomain));
    assert_eq!(validate_domain("example.c"), Err(ValidationError::MalformedDomain));
    assert_eq!(validate_domain("-bad.example.com"), Err(ValidationError::MalformedDomain));
    assert_eq!(validate_domain("bad-.example.com"), Err(ValidationError::MalformedDomain));
    assert_eq!(validate_domain("exa mple.com"), Err(ValidationError::MalformedDomain));
    assert_eq!(validate_domain("example.123"), Err(ValidationError::MalformedDomain));
}

#[test]
fn code_org_accepts_platform_charset() {
    assert_eq!(validate_code_org(Some("acme-labs")), Ok(Some("acme-labs".to_string())));
    assert_eq!(validate_code_org(Some(" Acme42 ")), Ok(Some("Acme42".to_string())));
}

#[test]
fn code_org_normalizes_absent_values() {
    assert_eq!(validate_code_org(None), Ok(None));
    assert_eq!(validate_code_org(Some("")), Ok(None));
    assert_eq!(validate_code_org(Some("   ")), Ok(None));
}

#[test]
fn code_org_rejects_bad_input() {
    assert_eq!(validate_code_org(Some("acme/labs")), Err(ValidationError::MalformedCodeOrg));
    assert_eq!(validate_code_org(Some("acme labs")), Err(ValidationError::MalformedCodeOrg));
    let long = "a".repeat(51);
    assert_eq!(validate_code_org(Some(&long)), Err(ValidationError::CodeOrgTooLong));
}
