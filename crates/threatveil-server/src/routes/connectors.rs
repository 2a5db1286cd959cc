// crates/threatveil-server/src/routes/connectors.rs
// ============================================================================
// Module: Connector Routes
// Description: External-integration CRUD with sealed credentials.
// Purpose: Manage connectors without ever persisting plaintext credentials.
// Dependencies: axum, crate::{error, state}, threatveil-core, threatveil-engine
// ============================================================================

//! ## Overview
//! Connector credentials are sealed with authenticated encryption before
//! persistence and are never returned by any endpoint. Status and sync
//! metadata are readable; credential rotation replaces the sealed blob.

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
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use threatveil_core::ConnectorId;
use threatveil_core::ConnectorRecord;
use threatveil_core::ConnectorStatus;
use threatveil_core::OrgId;
use threatveil_core::Timestamp;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Request body for connector creation.
#[derive(Debug, Deserialize)]
pub struct ConnectorCreateRequest {
    /// Provider slug.
    pub provider: String,
    /// Provider-specific configuration.
    #[serde(default)]
    pub config: Value,
    /// Plaintext credentials, sealed before persistence.
    pub credentials: Value,
}

/// Connector representation without credentials.
#[derive(Debug, Serialize)]
pub struct ConnectorView {
    /// Connector identifier.
    pub id: ConnectorId,
    /// Provider slug.
    pub provider: String,
    /// Provider-specific configuration.
    pub config: Value,
    /// Connector status.
    pub status: ConnectorStatus,
    /// Last successful sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<Timestamp>,
    /// Last sync failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl From<ConnectorRecord> for ConnectorView {
    fn from(record: ConnectorRecord) -> Self {
        Self {
            id: record.id,
            provider: record.provider,
            config: record.config,
            status: record.status,
            last_sync_at: record.last_sync_at,
            last_error: record.last_error,
            created_at: record.created_at,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Connector routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/org/{id}/connectors", get(list_connectors).post(create_connector))
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

/// Lists the organization's connectors (credentials withheld).
async fn list_connectors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConnectorView>>, ApiError> {
    let org = org_id(&state, id)?;
    let connectors = state.store.connectors_for_org(&org)?;
    Ok(Json(connectors.into_iter().map(ConnectorView::from).collect()))
}

/// Creates a connector, sealing its credentials.
async fn create_connector(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ConnectorCreateRequest>,
) -> Result<Json<ConnectorView>, ApiError> {
    let org = org_id(&state, id)?;
    if body.provider.trim().is_empty() {
        return Err(ApiError::BadRequest("connector provider is required".to_string()));
    }
    let plaintext = serde_json::to_vec(&body.credentials)
        .map_err(|err| ApiError::BadRequest(format!("invalid credentials payload: {err}")))?;
    let sealed = state
        .sealer
        .seal(&plaintext)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let record = ConnectorRecord {
        id: ConnectorId::random(),
        org_id: org,
        provider: body.provider,
        config: if body.config.is_null() { json!({}) } else { body.config },
        credentials_sealed: sealed,
        status: ConnectorStatus::Active,
        last_sync_at: None,
        last_error: None,
        created_at: Timestamp::now(),
    };
    state.store.insert_connector(&record)?;
    Ok(Json(ConnectorView::from(record)))
}
