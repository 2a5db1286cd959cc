// crates/threatveil-server/src/lib.rs
// ============================================================================
// Module: ThreatVeil Server Library
// Description: HTTP API surface under /api/v1.
// Purpose: Map the engine's services onto the stable route contract.
// Dependencies: crate::{auth, error, routes, state}
// ============================================================================

//! ## Overview
//! The server exposes the stable `/api/v1` contract: scans, decisions,
//! verification, organization intelligence, assets, webhooks, and
//! connectors. Handlers are thin: they validate inputs, call one engine
//! service, and map its error taxonomy onto status codes. Recoverable
//! failures were already converted to data below this layer; only input,
//! auth, quota, and genuinely internal errors cross as non-2xx.
//!
//! Security posture: all request bodies are untrusted; the internal rescan
//! endpoint requires a signed token.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::Claims;
pub use auth::issue_token;
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
