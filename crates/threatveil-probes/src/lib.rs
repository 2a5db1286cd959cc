// crates/threatveil-probes/src/lib.rs
// ============================================================================
// Module: ThreatVeil Probes Library
// Description: Probe adapters for every external posture source.
// Purpose: Expose one adapter per source behind a shared error-shielded trait.
// Dependencies: crate::{adapter, codesearch, ctlog, dns, fingerprint, http, intel, tls, vulndb}
// ============================================================================

//! ## Overview
//! Each external source (DNS, HTTPS, TLS, certificate-transparency logs,
//! threat intelligence, the vulnerability database, and code search) has one
//! adapter implementing [`Probe`]. Adapters return `(metadata, signals)` and
//! are wrapped by [`shielded`], which converts any failure into a single
//! service-error signal so a scan never fails because one source did.
//!
//! Security posture: every probe consumes untrusted remote content; adapters
//! bound response sizes and timeouts and never interpret payloads beyond the
//! documented fields.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adapter;
pub mod codesearch;
pub mod ctlog;
pub mod dns;
pub mod fingerprint;
pub mod http;
pub mod intel;
pub mod tls;
pub mod vulndb;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adapter::Probe;
pub use adapter::ProbeContext;
pub use adapter::ProbeError;
pub use adapter::ProbeOutcome;
pub use adapter::shield_future;
pub use adapter::shielded;
pub use adapter::with_backoff;
pub use codesearch::AiIndicators;
pub use codesearch::CodeSearchProbe;
pub use ctlog::CtLogProbe;
pub use dns::DnsProbe;
pub use fingerprint::tech_fingerprint;
pub use http::HttpProbe;
pub use intel::ThreatIntelProbe;
pub use tls::TlsProbe;
pub use vulndb::VulnDbProbe;
