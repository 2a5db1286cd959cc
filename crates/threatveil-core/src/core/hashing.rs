// crates/threatveil-core/src/core/hashing.rs
// ============================================================================
// Module: ThreatVeil Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content-addressed keys.
// Purpose: Provide deterministic cache keys and digests for signed bodies.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Cache keys are content-addressed: SHA-256 over the namespace and the RFC
//! 8785 (JCS) canonical JSON of the inputs, truncated to the first 24 hex
//! characters. Canonical bytes are also reused by the webhook dispatcher so
//! signatures are computed over a stable body encoding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of hex characters kept in a cache-key digest.
const CACHE_KEY_HEX_CHARS: usize = 24;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes raw bytes with SHA-256 and returns the lowercase hex digest.
#[must_use]
pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Builds a content-addressed cache key for a namespace and input value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the inputs cannot be
/// canonicalized.
pub fn cache_key<T: Serialize + ?Sized>(namespace: &str, inputs: &T) -> Result<String, HashError> {
    let mut bytes = namespace.as_bytes().to_vec();
    bytes.push(b':');
    bytes.extend(canonical_json_bytes(inputs)?);
    let digest = hash_bytes_hex(&bytes);
    let short = digest.get(..CACHE_KEY_HEX_CHARS).unwrap_or(&digest);
    Ok(format!("{namespace}:{short}"))
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let hi = byte >> 4;
        let lo = byte & 0x0f;
        out.push(hex_char(hi));
        out.push(hex_char(lo));
    }
    out
}

/// Maps a nibble to its lowercase hex character.
const fn hex_char(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'a' + nibble - 10) as char,
    }
}
