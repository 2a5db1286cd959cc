// crates/threatveil-server/src/routes/assets.rs
// ============================================================================
// Module: Asset Routes
// Description: Asset CRUD with scheduling fields.
// Purpose: Manage the org's scannable and tracked entities.
// Dependencies: axum, crate::{error, state}, threatveil-core
// ============================================================================

//! ## Overview
//! Assets carry their monitoring frequency and risk weight. Creating a
//! periodic asset seeds `next_scan_at` so the scheduler picks it up;
//! deleting is a soft status change, preserving history.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use threatveil_core::AssetId;
use threatveil_core::AssetKind;
use threatveil_core::AssetRecord;
use threatveil_core::AssetStatus;
use threatveil_core::OrgId;
use threatveil_core::ScanFrequency;
use threatveil_core::Timestamp;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Request body for asset creation.
#[derive(Debug, Deserialize)]
pub struct AssetCreateRequest {
    /// Asset variant.
    pub kind: AssetKind,
    /// Asset name (domain, org slug, account id, vendor name).
    pub name: String,
    /// Risk-weight multiplier; clamped to the allowed range.
    #[serde(default)]
    pub risk_weight: Option<f64>,
    /// Priority level (1 is highest).
    #[serde(default)]
    pub priority: Option<u8>,
    /// Monitoring frequency.
    #[serde(default)]
    pub frequency: Option<ScanFrequency>,
}

/// Request body for asset updates.
#[derive(Debug, Deserialize)]
pub struct AssetUpdateRequest {
    /// New risk weight, when changing.
    #[serde(default)]
    pub risk_weight: Option<f64>,
    /// New priority, when changing.
    #[serde(default)]
    pub priority: Option<u8>,
    /// New frequency, when changing.
    #[serde(default)]
    pub frequency: Option<ScanFrequency>,
    /// New status, when changing.
    #[serde(default)]
    pub status: Option<AssetStatus>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Asset routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/org/{id}/assets", get(list_assets).post(create_asset))
        .route(
            "/org/{id}/assets/{asset_id}",
            get(get_asset).patch(update_asset).delete(delete_asset),
        )
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Resolves and validates the organization id.
fn org_id(state: &AppState, raw: String) -> Result<OrgId, ApiError> {
    let id = OrgId::new(raw);
    state.store.get_org(&id)?.ok_or(ApiError::NotFound("organization"))?;
    Ok(id)
}

/// Lists the organization's assets.
async fn list_assets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<AssetRecord>>, ApiError> {
    let org = org_id(&state, id)?;
    Ok(Json(state.store.assets_for_org(&org)?))
}

/// Creates an asset and seeds its schedule when periodic.
async fn create_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AssetCreateRequest>,
) -> Result<Json<AssetRecord>, ApiError> {
    let org = org_id(&state, id)?;
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("asset name is required".to_string()));
    }
    let now = Timestamp::now();
    let frequency = body.frequency.unwrap_or(ScanFrequency::Weekly);
    // Periodic assets are due immediately so the first scheduled scan runs
    // on the next tick.
    let next_scan_at = frequency.interval_days().map(|_| now);
    let asset = AssetRecord {
        id: AssetId::random(),
        org_id: org,
        kind: body.kind,
        name,
        risk_weight: AssetRecord::clamp_risk_weight(body.risk_weight.unwrap_or(1.0)),
        priority: body.priority.unwrap_or(3),
        frequency,
        status: AssetStatus::Active,
        last_scan_at: None,
        next_scan_at,
        last_risk_score: None,
        created_at: now,
    };
    state.store.insert_asset(&asset)?;
    Ok(Json(asset))
}

/// Fetches one asset.
async fn get_asset(
    State(state): State<Arc<AppState>>,
    Path((id, asset_id)): Path<(String, String)>,
) -> Result<Json<AssetRecord>, ApiError> {
    let org = org_id(&state, id)?;
    let asset = state
        .store
        .get_asset(&AssetId::new(asset_id))?
        .filter(|asset| asset.org_id == org)
        .ok_or(ApiError::NotFound("asset"))?;
    Ok(Json(asset))
}

/// Updates an asset's monitoring fields.
async fn update_asset(
    State(state): State<Arc<AppState>>,
    Path((id, asset_id)): Path<(String, String)>,
    Json(body): Json<AssetUpdateRequest>,
) -> Result<Json<AssetRecord>, ApiError> {
    let org = org_id(&state, id)?;
    let mut asset = state
        .store
        .get_asset(&AssetId::new(asset_id))?
        .filter(|asset| asset.org_id == org)
        .ok_or(ApiError::NotFound("asset"))?;
    if let Some(weight) = body.risk_weight {
        asset.risk_weight = AssetRecord::clamp_risk_weight(weight);
    }
    if let Some(priority) = body.priority {
        asset.priority = priority;
    }
    if let Some(frequency) = body.frequency {
        asset.frequency = frequency;
        asset.next_scan_at = frequency.interval_days().map(|_| Timestamp::now());
    }
    if let Some(status) = body.status {
        asset.status = status;
    }
    state.store.update_asset(&asset)?;
    Ok(Json(asset))
}

/// Soft-deletes an asset.
async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path((id, asset_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let mut asset = state
        .store
        .get_asset(&AssetId::new(asset_id))?
        .filter(|asset| asset.org_id == org)
        .ok_or(ApiError::NotFound("asset"))?;
    asset.status = AssetStatus::Deleted;
    asset.next_scan_at = None;
    state.store.update_asset(&asset)?;
    Ok(Json(json!({ "deleted": true })))
}
