// crates/threatveil-server/src/routes/decisions.rs
// ============================================================================
// Module: Decision Routes
// Description: Idempotent generation, listing, status changes, and impact.
// Purpose: Expose the decision engine behind the stable contract.
// Dependencies: axum, crate::{error, state}, threatveil-core, threatveil-engine
// ============================================================================

//! ## Overview
//! Generation is idempotent per scan. Status changes go through the
//! lifecycle state machine; illegal edges answer 409. The impact endpoint
//! serves the one-per-decision measurement row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use threatveil_core::DecisionId;
use threatveil_core::DecisionImpactRecord;
use threatveil_core::DecisionRecord;
use threatveil_core::DecisionStatus;
use threatveil_core::EventType;
use threatveil_core::ScanId;
use threatveil_core::Timestamp;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Request body for `PATCH /decisions/{id}`.
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    /// Requested lifecycle status (wire label).
    pub status: String,
}

/// Response for a status change.
#[derive(Debug, Serialize)]
pub struct StatusChangeResponse {
    /// The decision after the transition.
    pub decision: DecisionRecord,
    /// Risk delta returned when entering resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_delta: Option<i16>,
}

/// Impact response with the numeric confidence value.
#[derive(Debug, Serialize)]
pub struct ImpactResponse {
    /// The impact row.
    #[serde(flatten)]
    pub impact: DecisionImpactRecord,
    /// Numeric confidence from the closed ladder.
    pub confidence_value: f64,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Decision routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scans/{id}/decisions", post(generate_decisions).get(list_decisions))
        .route("/decisions/{id}", patch(change_status))
        .route("/decisions/{id}/impact", get(get_impact))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Generates (idempotently) the decisions for a scan.
async fn generate_decisions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DecisionRecord>>, ApiError> {
    let now = Timestamp::now();
    let scan_id = ScanId::new(id);
    let had_decisions = !state.store.decisions_for_scan(&scan_id)?.is_empty();
    let decisions = state.generator.generate_for_scan(&scan_id, now)?;

    if !had_decisions && !decisions.is_empty() {
        for decision in &decisions {
            let Some(org_id) = &decision.org_id else {
                continue;
            };
            let payload = json!({
                "decision_id": decision.id,
                "scan_id": decision.scan_id,
                "action_id": decision.action,
                "title": decision.title,
                "priority": decision.priority,
            });
            if let Err(err) =
                state.dispatcher.emit_event(org_id, EventType::DecisionCreated, &payload, now)
            {
                tracing::warn!(decision_id = %decision.id, error = %err, "decision event emission failed");
            }
        }
    }
    Ok(Json(decisions))
}

/// Lists the decisions for a scan in priority order.
async fn list_decisions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DecisionRecord>>, ApiError> {
    Ok(Json(state.store.decisions_for_scan(&ScanId::new(id))?))
}

/// Applies one lifecycle transition.
async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<StatusChangeResponse>, ApiError> {
    let to = DecisionStatus::parse(&body.status)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {}", body.status)))?;
    let now = Timestamp::now();
    let outcome = state.lifecycle.transition(&DecisionId::new(id), to, now)?;

    if outcome.decision.status == DecisionStatus::Verified
        && let Some(org_id) = &outcome.decision.org_id
    {
        let payload = json!({
            "decision_id": outcome.decision.id,
            "action_id": outcome.decision.action,
            "verified_at": outcome.decision.verified_at,
        });
        if let Err(err) =
            state.dispatcher.emit_event(org_id, EventType::DecisionVerified, &payload, now)
        {
            tracing::warn!(decision_id = %outcome.decision.id, error = %err, "verify event emission failed");
        }
    }
    Ok(Json(StatusChangeResponse {
        decision: outcome.decision,
        risk_delta: outcome.risk_delta,
    }))
}

/// Fetches a decision's impact row.
async fn get_impact(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ImpactResponse>, ApiError> {
    let impact =
        state.store.get_impact(&DecisionId::new(id))?.ok_or(ApiError::NotFound("impact"))?;
    let confidence_value = impact.confidence.value();
    Ok(Json(ImpactResponse {
        impact,
        confidence_value,
    }))
}
