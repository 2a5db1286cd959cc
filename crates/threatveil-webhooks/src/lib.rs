// crates/threatveil-webhooks/src/lib.rs
// ============================================================================
// Module: ThreatVeil Webhooks Library
// Description: HMAC-signed webhook fan-out with bounded retries.
// Purpose: Deliver posture events to subscriber endpoints with a full log.
// Dependencies: crate::{dispatcher, signature, transport}
// ============================================================================

//! ## Overview
//! Event emission fans out to every enabled webhook subscribed to the event
//! type. Each delivery is signed with HMAC-SHA256 over a canonical JSON
//! body, attempted up to three times with exponential backoff, and recorded
//! attempt by attempt in the delivery log. Receivers verify authenticity by
//! recomputing the signature and comparing in constant time.
//!
//! Security posture: webhook URLs and responses are untrusted; response
//! bodies are truncated before persistence and secrets never appear in
//! logs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dispatcher;
pub mod signature;
pub mod transport;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dispatcher::DispatchError;
pub use dispatcher::MAX_ATTEMPTS;
pub use dispatcher::WebhookDispatcher;
pub use dispatcher::event_body;
pub use signature::SIGNATURE_HEADER;
pub use signature::sign_body;
pub use signature::verify_signature;
pub use transport::DeliveryTransport;
pub use transport::HttpTransport;
pub use transport::TransportResponse;
