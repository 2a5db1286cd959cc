// crates/threatveil-server/src/auth.rs
// ============================================================================
// Module: API Authentication
// Description: Signed-token issue and verification for internal endpoints.
// Purpose: Guard the internal rescan endpoint with HS256 tokens.
// Dependencies: axum, jsonwebtoken, serde
// ============================================================================

//! ## Overview
//! The internal rescan endpoint accepts only bearer tokens signed with the
//! deployment's secret. Tokens carry a subject and an expiry; verification
//! rejects anything expired, malformed, or signed with a different key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Token claims for internal endpoints.
///
/// # Invariants
/// - `exp` is unix seconds; expired tokens never verify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token subject (caller identity).
    pub sub: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

// ============================================================================
// SECTION: Issue & Verify
// ============================================================================

/// Issues an HS256 token for the internal rescan endpoint.
///
/// # Errors
///
/// Returns [`jsonwebtoken::errors::Error`] when encoding fails.
pub fn issue_token(
    secret: &str,
    subject: &str,
    expires_unix: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: subject.to_string(),
        exp: expires_unix,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Verifies the bearer token on a request.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] when the header is missing, malformed,
/// expired, or signed with a different secret.
pub fn verify_bearer(headers: &HeaderMap, secret: &str) -> Result<Claims, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(ApiError::Unauthorized)?;
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;
    Ok(data.claims)
}
