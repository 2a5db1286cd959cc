// crates/threatveil-server/src/routes/scan.rs
// ============================================================================
// Module: Scan Routes
// Description: Vendor scan trigger and scan retrieval endpoints.
// Purpose: Expose the orchestrator behind the stable scan contract.
// Dependencies: axum, crate::{error, state}, threatveil-core, threatveil-engine
// ============================================================================

//! ## Overview
//! `POST /scan/vendor` runs one orchestrated scan: 200 with the result,
//! 400 on invalid input, 402 on quota exhaustion, 429 on rate limiting.
//! Retrieval endpoints serve the persisted scan, its AI catalog, and the
//! previous scan for trend display.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use threatveil_core::EventType;
use threatveil_core::ScanAiRecord;
use threatveil_core::ScanId;
use threatveil_core::ScanRecord;
use threatveil_core::Timestamp;
use threatveil_engine::ScanRequest;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Request body for `POST /scan/vendor`.
#[derive(Debug, Deserialize)]
pub struct ScanVendorRequest {
    /// Domain to scan.
    pub domain: String,
    /// Optional code organization scanned alongside the domain.
    #[serde(default)]
    pub github_org: Option<String>,
}

/// Response wrapper for scan results.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    /// The completed scan.
    pub result: ScanRecord,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Scan routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan/vendor", post(scan_vendor))
        .route("/scan/{id}", get(get_scan).delete(delete_scan))
        .route("/scan/{id}/ai", get(get_scan_ai))
        .route("/scan/{id}/previous", get(get_previous_scan))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Runs one vendor scan.
async fn scan_vendor(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(body): Json<ScanVendorRequest>,
) -> Result<Json<ScanResponse>, ApiError> {
    let now = Timestamp::now();
    let request = ScanRequest {
        domain: body.domain,
        code_org: body.github_org,
    };
    let scan = state.orchestrator.run(&request, Some(peer.ip()), now).await?;

    // A changed score against the previous scan is an org-visible event.
    if let Some(org_id) = &scan.org_id
        && let Ok(Some(previous)) = state.store.previous_scan(&scan.id)
        && previous.risk_score != scan.risk_score
    {
        let payload = json!({
            "scan_id": scan.id,
            "domain": scan.domain,
            "previous_score": previous.risk_score,
            "risk_score": scan.risk_score,
        });
        if let Err(err) =
            state.dispatcher.emit_event(org_id, EventType::RiskScoreChanged, &payload, now)
        {
            tracing::warn!(scan_id = %scan.id, error = %err, "risk-change event emission failed");
        }
    }

    Ok(Json(ScanResponse {
        result: scan,
    }))
}

/// Fetches one scan.
async fn get_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScanResponse>, ApiError> {
    let scan = state.store.get_scan(&ScanId::new(id))?.ok_or(ApiError::NotFound("scan"))?;
    Ok(Json(ScanResponse {
        result: scan,
    }))
}

/// Deletes one scan.
async fn delete_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.delete_scan(&ScanId::new(id))?;
    Ok(Json(json!({ "deleted": true })))
}

/// Fetches a scan's AI catalog.
async fn get_scan_ai(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScanAiRecord>, ApiError> {
    let record =
        state.store.get_scan_ai(&ScanId::new(id))?.ok_or(ApiError::NotFound("ai catalog"))?;
    Ok(Json(record))
}

/// Fetches the scan preceding the given one for the same domain.
async fn get_previous_scan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScanResponse>, ApiError> {
    let previous = state
        .store
        .previous_scan(&ScanId::new(id))?
        .ok_or(ApiError::NotFound("previous scan"))?;
    Ok(Json(ScanResponse {
        result: previous,
    }))
}
