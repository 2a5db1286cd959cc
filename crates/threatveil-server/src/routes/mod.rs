// crates/threatveil-server/src/routes/mod.rs
// ============================================================================
// Module: API Routes
// Description: Route assembly for the /api/v1 surface.
// Purpose: Compose the per-area routers onto one versioned router.
// Dependencies: axum, crate::state
// ============================================================================

//! ## Overview
//! One router per API area, merged under `/api/v1`. Paths, methods, and
//! status codes are a stable contract; handlers live beside their area.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assets;
pub mod connectors;
pub mod decisions;
pub mod internal;
pub mod org;
pub mod scan;
pub mod verification;
pub mod webhooks;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

// ============================================================================
// SECTION: Router Assembly
// ============================================================================

/// Builds the versioned API router.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(scan::router())
        .merge(decisions::router())
        .merge(verification::router())
        .merge(org::router())
        .merge(assets::router())
        .merge(webhooks::router())
        .merge(connectors::router())
        .merge(internal::router())
        .with_state(state);
    Router::new().nest("/api/v1", api)
}
