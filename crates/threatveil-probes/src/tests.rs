// crates/threatveil-probes/src/tests.rs
// ============================================================================
// Module: Probe Unit Tests
// Description: Unit tests for pure probe helpers.
// Purpose: Pin fingerprint extraction and the CVSS and expiry ladders.
// Dependencies: threatveil-probes
// ============================================================================

//! ## Overview
//! Unit tests for the pure helpers inside the probe adapters.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::json;
use threatveil_core::Severity;

use crate::fingerprint::tech_fingerprint;
use crate::tls::expiry_severity;
use crate::vulndb::best_cvss;
use crate::vulndb::severity_from_cvss;

// ============================================================================
// SECTION: Fingerprint Tests
// ============================================================================

#[test]
fn fingerprint_collects_known_headers_in_stable_order() {
    let mut headers = BTreeMap::new();
    headers.insert("server".to_string(), "nginx/1.24.0".to_string());
    headers.insert("x-powered-by".to_string(), "Express".to_string());
    headers.insert("content-type".to_string(), "text/html".to_string());
    assert_eq!(tech_fingerprint(&headers), vec!["nginx/1.24.0", "Express"]);
}

#[test]
fn fingerprint_dedupes_and_skips_empty_values() {
    let mut headers = BTreeMap::new();
    headers.insert("server".to_string(), "nginx".to_string());
    headers.insert("x-powered-by".to_string(), "nginx".to_string());
    headers.insert("x-generator".to_string(), "  ".to_string());
    assert_eq!(tech_fingerprint(&headers), vec!["nginx"]);
}

#[test]
fn fingerprint_is_empty_without_tech_headers() {
    let headers = BTreeMap::new();
    assert!(tech_fingerprint(&headers).is_empty());
}

// ============================================================================
// SECTION: CVSS Tests
// ============================================================================

#[test]
fn best_cvss_prefers_newer_metric_versions() {
    let source = json!({
        "cvss3_1": { "score": 9.8 },
        "cvss3": { "score": 8.8 },
        "cvss2": { "score": 6.8 },
        "cvss": { "score": 5.0 },
    });
    assert!((best_cvss(&source) - 9.8).abs() < f64::EPSILON);

    let source = json!({
        "cvss3": { "score": 8.8 },
        "cvss": { "score": 5.0 },
    });
    assert!((best_cvss(&source) - 8.8).abs() < f64::EPSILON);

    let source = json!({ "cvss": { "score": 5.0 } });
    assert!((best_cvss(&source) - 5.0).abs() < f64::EPSILON);

    let source = json!({});
    assert!(best_cvss(&source).abs() < f64::EPSILON);
}

#[test]
fn cvss_severity_ladder_matches_published_bands() {
    assert_eq!(severity_from_cvss(9.8), Severity::Critical);
    assert_eq!(severity_from_cvss(9.0), Severity::Critical);
    assert_eq!(severity_from_cvss(8.9), Severity::High);
    assert_eq!(severity_from_cvss(7.0), Severity::High);
    assert_eq!(severity_from_cvss(6.9), Severity::Medium);
    assert_eq!(severity_from_cvss(4.0), Severity::Medium);
    assert_eq!(severity_from_cvss(3.9), Severity::Low);
    assert_eq!(severity_from_cvss(0.0), Severity::Low);
}

// ============================================================================
// SECTION: Expiry Ladder Tests
// ============================================================================

#[test]
fn expiry_ladder_matches_published_bands() {
    assert_eq!(expiry_severity(-1), Some(Severity::Critical));
    assert_eq!(expiry_severity(0), Some(Severity::High));
    assert_eq!(expiry_severity(7), Some(Severity::High));
    assert_eq!(expiry_severity(8), Some(Severity::Medium));
    assert_eq!(expiry_severity(30), Some(Severity::Medium));
    assert_eq!(expiry_severity(31), None);
    assert_eq!(expiry_severity(365), None);
}
