// crates/threatveil-webhooks/src/transport.rs
// ============================================================================
// Module: Delivery Transport
// Description: Outbound POST seam for webhook deliveries.
// Purpose: Keep the dispatcher testable against in-process listeners.
// Dependencies: reqwest, async-trait, thiserror
// ============================================================================

//! ## Overview
//! The dispatcher talks to endpoints through [`DeliveryTransport`], a
//! one-method seam. [`HttpTransport`] is the production implementation with
//! the delivery timeout applied per request; tests substitute their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Timeout applied to each delivery attempt.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Transport Contract
// ============================================================================

/// Transport errors.
///
/// # Invariants
/// - Variants are stable; messages never include request bodies.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure before a response arrived.
    #[error("delivery transport failure: {0}")]
    Network(String),
}

/// Response captured from one delivery attempt.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes (callers truncate before persistence).
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Returns true for 2xx responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Outbound POST seam for webhook deliveries.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Posts a signed body to a webhook URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received; non-2xx
    /// responses are returned as values, not errors.
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Production transport over reqwest.
pub struct HttpTransport {
    /// HTTP client with the delivery timeout.
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates the transport with the given user agent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] when the client cannot be
    /// constructed.
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let _: Result<(), _> = rustls::crypto::aws_lc_rs::default_provider().install_default();
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Network(err.to_string()))?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.post(url).body(body.to_vec());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?
            .to_vec();
        Ok(TransportResponse {
            status,
            body,
        })
    }
}
