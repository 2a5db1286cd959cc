// crates/threatveil-webhooks/src/tests.rs
// ============================================================================
// Module: Webhook Unit Tests
// Description: Signature and body-construction unit tests.
// Purpose: Pin the signing scheme and canonical body layout.
// Dependencies: threatveil-webhooks
// ============================================================================

//! ## Overview
//! Unit tests for body signing, verification, and canonical body shape.

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

use serde_json::json;
use threatveil_core::EventType;
use threatveil_core::Timestamp;

use crate::dispatcher::event_body;
use crate::signature::sign_body;
use crate::signature::verify_signature;

// ============================================================================
// SECTION: Signature Tests
// ============================================================================

#[test]
fn signatures_round_trip() {
    let body = br#"{"data":{},"event":"test","timestamp":"2026-01-01T00:00:00Z"}"#;
    let header = sign_body("whsec_secret", body);
    assert!(header.starts_with("sha256="));
    assert!(verify_signature("whsec_secret", body, &header));
}

#[test]
fn verification_rejects_wrong_secret_or_tampered_body() {
    let body = b"{\"event\":\"test\"}";
    let header = sign_body("whsec_secret", body);
    assert!(!verify_signature("whsec_other", body, &header));
    assert!(!verify_signature("whsec_secret", b"{\"event\":\"tast\"}", &header));
    assert!(!verify_signature("whsec_secret", body, "sha256=deadbeef"));
}

#[test]
fn signatures_are_deterministic_per_body_and_secret() {
    let body = b"payload";
    assert_eq!(sign_body("s", body), sign_body("s", body));
    assert_ne!(sign_body("s", body), sign_body("t", body));
}

// ============================================================================
// SECTION: Body Tests
// ============================================================================

#[test]
fn event_bodies_are_canonical_and_carry_the_contract_fields() {
    let now = Timestamp::UNIX_EPOCH.plus_days(19_000);
    let body = event_body(EventType::DecisionVerified, &json!({ "decision_id": "d-1" }), now)
        .expect("body builds");
    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("body parses");
    assert_eq!(parsed["event"], "decision.verified");
    assert_eq!(parsed["data"]["decision_id"], "d-1");
    assert_eq!(parsed["timestamp"], now.to_rfc3339());
    // Canonical form is stable byte-for-byte.
    let again = event_body(EventType::DecisionVerified, &json!({ "decision_id": "d-1" }), now)
        .expect("body builds");
    assert_eq!(body, again);
}
