// crates/threatveil-webhooks/src/signature.rs
// ============================================================================
// Module: Webhook Signatures
// Description: HMAC-SHA256 body signing and constant-time verification.
// Purpose: Let receivers authenticate deliveries with a shared secret.
// Dependencies: hmac, sha2, subtle, threatveil-core
// ============================================================================

//! ## Overview
//! Every delivery body is signed with HMAC-SHA256 under the webhook's
//! secret and sent as `sha256=<hex>` in the signature header. Verification
//! recomputes the digest over the raw body and compares in constant time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use threatveil_core::hex_encode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Signature header name sent with every delivery.
pub const SIGNATURE_HEADER: &str = "X-ThreatVeil-Signature";
/// Scheme prefix carried by the signature header value.
const SIGNATURE_PREFIX: &str = "sha256=";

/// HMAC-SHA256 alias.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Signs a delivery body, returning the full header value.
#[must_use]
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length; the fallback arm cannot be reached
    // but keeps this infallible without panicking.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return SIGNATURE_PREFIX.to_string();
    };
    mac.update(body);
    format!("{SIGNATURE_PREFIX}{}", hex_encode(&mac.finalize().into_bytes()))
}

/// Verifies a signature header against the raw body in constant time.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let expected = sign_body(secret, body);
    expected.as_bytes().ct_eq(header_value.as_bytes()).into()
}
