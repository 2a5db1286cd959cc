// crates/threatveil-engine/src/credentials.rs
// ============================================================================
// Module: Credential Sealer
// Description: Authenticated encryption for connector credential blobs.
// Purpose: Keep third-party credentials opaque at rest.
// Dependencies: aes-gcm, rand, sha2
// ============================================================================

//! ## Overview
//! Connector credentials are sealed with AES-256-GCM before persistence.
//! The key comes from the deployment's encryption key or, when unset, is
//! derived from the signing secret with SHA-256. Sealed blobs carry their
//! nonce as a prefix so opening needs only the blob and the key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use aes_gcm::KeyInit;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;
/// AES-256 key length in bytes.
const KEY_LEN: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sealing and opening errors.
///
/// # Invariants
/// - Variants never carry key or plaintext material.
#[derive(Debug, Error)]
pub enum SealError {
    /// Provided key material had the wrong length.
    #[error("encryption key must be {KEY_LEN} bytes")]
    BadKeyLength,
    /// Ciphertext was too short or failed authentication.
    #[error("credential blob failed authentication")]
    OpenFailed,
    /// Encryption failed.
    #[error("credential sealing failed")]
    SealFailed,
}

// ============================================================================
// SECTION: Credential Sealer
// ============================================================================

/// AES-256-GCM sealer for connector credentials.
pub struct CredentialSealer {
    /// Cipher initialized with the deployment key.
    cipher: Aes256Gcm,
}

impl CredentialSealer {
    /// Creates a sealer from explicit key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::BadKeyLength`] when the key is not 32 bytes.
    pub fn from_key_bytes(key: &[u8]) -> Result<Self, SealError> {
        if key.len() != KEY_LEN {
            return Err(SealError::BadKeyLength);
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Creates a sealer by deriving the key from the signing secret.
    #[must_use]
    pub fn derived_from_secret(jwt_secret: &str) -> Self {
        let digest = Sha256::digest(jwt_secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Seals plaintext credentials into a nonce-prefixed blob.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::SealFailed`] when encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let mut nonce_bytes = [0_u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext =
            self.cipher.encrypt(nonce, plaintext).map_err(|_| SealError::SealFailed)?;
        let mut blob = nonce_bytes.to_vec();
        blob.extend(ciphertext);
        Ok(blob)
    }

    /// Opens a nonce-prefixed blob back into plaintext credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SealError::OpenFailed`] when the blob is malformed or
    /// authentication fails.
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>, SealError> {
        if blob.len() <= NONCE_LEN {
            return Err(SealError::OpenFailed);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher.decrypt(nonce, ciphertext).map_err(|_| SealError::OpenFailed)
    }
}
