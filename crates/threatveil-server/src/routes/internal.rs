// crates/threatveil-server/src/routes/internal.rs
// ============================================================================
// Module: Internal Routes
// Description: Liveness ping and the token-guarded rescan endpoint.
// Purpose: Operational endpoints outside the tenant-facing surface.
// Dependencies: axum, crate::{auth, error, state}, threatveil-engine
// ============================================================================

//! ## Overview
//! `/ping` answers liveness; `/internal/rescan` runs a scan on behalf of
//! internal automation and requires a bearer token signed with the
//! deployment secret (issued by the `threatveil-token` helper).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde_json::json;
use threatveil_core::Timestamp;
use threatveil_engine::ScanRequest;

use crate::auth::verify_bearer;
use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Request body for the internal rescan endpoint.
#[derive(Debug, Deserialize)]
pub struct RescanRequest {
    /// Domain to rescan.
    pub domain: String,
    /// Optional code organization.
    #[serde(default)]
    pub github_org: Option<String>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Internal routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ping", get(ping)).route("/internal/rescan", post(rescan))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness check.
async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Token-guarded rescan for internal automation.
///
/// Internal callers bypass the per-IP rate limit but not validation or
/// quota checks.
async fn rescan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RescanRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = verify_bearer(&headers, &state.jwt_secret)?;
    let request = ScanRequest {
        domain: body.domain,
        code_org: body.github_org,
    };
    let scan = state.orchestrator.run(&request, None, Timestamp::now()).await?;
    tracing::info!(subject = %claims.sub, scan_id = %scan.id, "internal rescan completed");
    Ok(Json(json!({ "scan_id": scan.id, "risk_score": scan.risk_score })))
}
