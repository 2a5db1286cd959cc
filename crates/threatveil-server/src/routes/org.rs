// crates/threatveil-server/src/routes/org.rs
// ============================================================================
// Module: Organization Routes
// Description: Org-level posture, trends, briefs, and signal queries.
// Purpose: Expose the aggregator behind the stable contract.
// Dependencies: axum, crate::{error, state}, threatveil-core, threatveil-engine
// ============================================================================

//! ## Overview
//! Organization intelligence endpoints: the executive overview, the horizon
//! view, weekly risk timeline, weekly brief, AI governance and security
//! posture, raw signal queries, and the compact summary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::routing::get;
use serde::Deserialize;
use serde_json::json;
use threatveil_core::EventType;
use threatveil_core::OrgId;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::Timestamp;
use threatveil_engine::OrgOverview;
use threatveil_engine::RiskTimelinePoint;
use threatveil_engine::WeeklyBrief;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default timeline window in weeks.
const DEFAULT_TIMELINE_WEEKS: usize = 8;
/// Default signal query cap.
const DEFAULT_SIGNAL_LIMIT: usize = 50;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Query parameters for the risk timeline.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    /// Number of weekly buckets.
    #[serde(default)]
    pub weeks: Option<usize>,
}

/// Query parameters for signal listing.
#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    /// Minimum severity wire label.
    #[serde(default)]
    pub severity: Option<String>,
    /// Maximum number of signals.
    #[serde(default)]
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Organization routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/org/{id}/overview", get(get_overview))
        .route("/org/{id}/horizon", get(get_horizon))
        .route("/org/{id}/risk-timeline", get(get_risk_timeline))
        .route("/org/{id}/weekly-brief", get(get_weekly_brief))
        .route("/org/{id}/ai-governance", get(get_ai_governance))
        .route("/org/{id}/ai-security", get(get_ai_security))
        .route("/org/{id}/signals", get(get_signals))
        .route("/org/{id}/summary", get(get_summary))
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

/// Executive overview.
async fn get_overview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrgOverview>, ApiError> {
    let org = org_id(&state, id)?;
    Ok(Json(state.aggregator.overview(&org)?))
}

/// Horizon view: the overview plus the latest timeline window.
async fn get_horizon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let overview = state.aggregator.overview(&org)?;
    let timeline = state.aggregator.risk_timeline(&org, DEFAULT_TIMELINE_WEEKS, Timestamp::now())?;
    Ok(Json(json!({ "overview": overview, "timeline": timeline })))
}

/// Weekly risk timeline.
async fn get_risk_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<RiskTimelinePoint>>, ApiError> {
    let org = org_id(&state, id)?;
    let weeks = query.weeks.unwrap_or(DEFAULT_TIMELINE_WEEKS);
    Ok(Json(state.aggregator.risk_timeline(&org, weeks, Timestamp::now())?))
}

/// Weekly brief snapshot; emits the brief-generated event.
async fn get_weekly_brief(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<WeeklyBrief>, ApiError> {
    let org = org_id(&state, id)?;
    let now = Timestamp::now();
    let brief = state.aggregator.weekly_brief(&org, now)?;
    let payload = json!({
        "risk_delta": brief.risk_delta,
        "ai_exposure": brief.ai_exposure,
        "last_scan_id": brief.last_scan_id,
    });
    if let Err(err) =
        state.dispatcher.emit_event(&org, EventType::WeeklyBriefGenerated, &payload, now)
    {
        tracing::warn!(org_id = %org, error = %err, "brief event emission failed");
    }
    Ok(Json(brief))
}

/// AI governance posture: catalog-centric view.
async fn get_ai_governance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let overview = state.aggregator.overview(&org)?;
    Ok(Json(json!({
        "ai_posture": overview.ai_posture,
        "decisions": overview.decisions,
    })))
}

/// AI security posture: exposure-centric view.
async fn get_ai_security(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let overview = state.aggregator.overview(&org)?;
    let ai_signals: Vec<&Signal> = overview
        .top_signals
        .iter()
        .filter(|signal| signal.category == threatveil_core::Category::AiIntegration)
        .collect();
    Ok(Json(json!({
        "ai_posture": overview.ai_posture,
        "ai_signals": ai_signals,
    })))
}

/// Raw signal query with severity floor and limit.
async fn get_signals(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<Vec<Signal>>, ApiError> {
    let org = org_id(&state, id)?;
    let min_severity = match query.severity.as_deref() {
        None => None,
        Some("low") => Some(Severity::Low),
        Some("medium") => Some(Severity::Medium),
        Some("high") => Some(Severity::High),
        Some("critical") => Some(Severity::Critical),
        Some(other) => {
            return Err(ApiError::BadRequest(format!("unknown severity: {other}")));
        }
    };
    let limit = query.limit.unwrap_or(DEFAULT_SIGNAL_LIMIT);
    Ok(Json(state.store.signals_for_org(&org, min_severity, limit)?))
}

/// Compact organization summary.
async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let record = state.store.get_org(&org)?.ok_or(ApiError::NotFound("organization"))?;
    let overview = state.aggregator.overview(&org)?;
    Ok(Json(json!({
        "organization": {
            "id": record.id,
            "name": record.name,
            "primary_domain": record.primary_domain,
            "plan": record.plan,
            "scans_this_month": record.scans_this_month,
            "scans_limit": record.scans_limit,
        },
        "risk_score": overview.risk_score,
        "severity_counts": overview.severity_counts,
        "decisions": overview.decisions,
    })))
}
