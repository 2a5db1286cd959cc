// crates/threatveil-server/src/routes/verification.rs
// ============================================================================
// Module: Verification Routes
// Description: Manual verification trigger, run history, and evidence.
// Purpose: Expose the verification engine behind the stable contract.
// Dependencies: axum, crate::{error, state}, threatveil-core
// ============================================================================

//! ## Overview
//! `POST /decisions/{id}/verify` runs the per-action re-probe and records
//! the run; the companion GET endpoints serve the run history and the
//! before/after evidence snapshots.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use serde_json::json;
use threatveil_core::DecisionId;
use threatveil_core::EventType;
use threatveil_core::EvidenceSnapshotRecord;
use threatveil_core::Timestamp;
use threatveil_core::VerificationResult;
use threatveil_core::VerificationRunRecord;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Verification routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/decisions/{id}/verify", post(run_verification))
        .route("/decisions/{id}/verification", get(get_verification))
        .route("/decisions/{id}/evidence", get(get_evidence))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Runs verification for a decision.
async fn run_verification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VerificationRunRecord>, ApiError> {
    let now = Timestamp::now();
    let decision_id = DecisionId::new(id);
    let run = state.verifier.verify(&decision_id, now).await?;

    if run.result == VerificationResult::Pass
        && let Ok(Some(decision)) = state.store.get_decision(&decision_id)
        && let Some(org_id) = &decision.org_id
    {
        let payload = json!({
            "decision_id": decision.id,
            "action_id": decision.action,
            "confidence": run.confidence,
        });
        if let Err(err) =
            state.dispatcher.emit_event(org_id, EventType::DecisionVerified, &payload, now)
        {
            tracing::warn!(decision_id = %decision.id, error = %err, "verify event emission failed");
        }
    }
    Ok(Json(run))
}

/// Returns a decision's verification runs, newest first.
async fn get_verification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<VerificationRunRecord>>, ApiError> {
    Ok(Json(state.store.verification_runs(&DecisionId::new(id))?))
}

/// Returns a decision's evidence snapshots in capture order.
async fn get_evidence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<EvidenceSnapshotRecord>>, ApiError> {
    Ok(Json(state.store.evidence_for_decision(&DecisionId::new(id))?))
}
