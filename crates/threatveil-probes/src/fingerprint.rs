// crates/threatveil-probes/src/fingerprint.rs
// ============================================================================
// Module: Tech Fingerprint Extraction
// Description: Server and framework tokens from HTTP response headers.
// Purpose: Feed the vulnerability-database probe with technology keywords.
// Dependencies: std::collections
// ============================================================================

//! ## Overview
//! The HTTP probe records `Server`, `X-Powered-By`, and `X-Generator`
//! response headers; this module turns them into the deduplicated token list
//! the vulnerability-database probe searches with.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response headers mined for technology tokens.
const FINGERPRINT_HEADERS: [&str; 3] = ["server", "x-powered-by", "x-generator"];

// ============================================================================
// SECTION: Extraction
// ============================================================================

/// Extracts deduplicated, order-stable technology tokens from lowercase
/// response headers.
#[must_use]
pub fn tech_fingerprint(headers: &BTreeMap<String, String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut tokens = Vec::new();
    for header in FINGERPRINT_HEADERS {
        if let Some(value) = headers.get(header) {
            let token = value.trim();
            if !token.is_empty() && seen.insert(token.to_string()) {
                tokens.push(token.to_string());
            }
        }
    }
    tokens
}
