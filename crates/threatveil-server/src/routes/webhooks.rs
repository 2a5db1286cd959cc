// crates/threatveil-server/src/routes/webhooks.rs
// ============================================================================
// Module: Webhook Routes
// Description: Webhook CRUD, the test event, and the delivery log.
// Purpose: Manage event subscriptions per organization.
// Dependencies: axum, crate::{error, state}, threatveil-core, threatveil-webhooks
// ============================================================================

//! ## Overview
//! Webhook management endpoints. Secrets are accepted on create and never
//! echoed back; the test endpoint emits the `test` event through the real
//! dispatcher so subscribers can validate their signature handling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use threatveil_core::DeliveryRecord;
use threatveil_core::EventType;
use threatveil_core::OrgId;
use threatveil_core::Timestamp;
use threatveil_core::WebhookId;
use threatveil_core::WebhookRecord;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Delivery-log page size.
const DELIVERY_LOG_LIMIT: usize = 50;

// ============================================================================
// SECTION: DTOs
// ============================================================================

/// Request body for webhook creation.
#[derive(Debug, Deserialize)]
pub struct WebhookCreateRequest {
    /// Delivery URL.
    pub url: String,
    /// HMAC signing secret.
    pub secret: String,
    /// Subscribed event wire names.
    pub events: Vec<String>,
    /// Custom delivery headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Whether deliveries are dispatched.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Default for the enabled flag.
const fn default_enabled() -> bool {
    true
}

/// Webhook representation without the secret.
#[derive(Debug, Serialize)]
pub struct WebhookView {
    /// Webhook identifier.
    pub id: WebhookId,
    /// Delivery URL.
    pub url: String,
    /// Subscribed events.
    pub events: BTreeSet<EventType>,
    /// Custom headers.
    pub headers: BTreeMap<String, String>,
    /// Enabled flag.
    pub enabled: bool,
    /// Creation time.
    pub created_at: Timestamp,
}

impl From<WebhookRecord> for WebhookView {
    fn from(record: WebhookRecord) -> Self {
        Self {
            id: record.id,
            url: record.url,
            events: record.events,
            headers: record.headers,
            enabled: record.enabled,
            created_at: record.created_at,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Webhook routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/org/{id}/webhooks", get(list_webhooks).post(create_webhook))
        .route("/org/{id}/webhooks/test", post(test_webhooks))
        .route("/org/{id}/webhooks/{webhook_id}", get(get_webhook).delete(delete_webhook))
        .route("/org/{id}/webhooks/{webhook_id}/deliveries", get(list_deliveries))
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

/// Lists the organization's webhooks (secrets withheld).
async fn list_webhooks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<WebhookView>>, ApiError> {
    let org = org_id(&state, id)?;
    let webhooks = state.store.webhooks_for_org(&org)?;
    Ok(Json(webhooks.into_iter().map(WebhookView::from).collect()))
}

/// Creates a webhook subscription.
async fn create_webhook(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<WebhookCreateRequest>,
) -> Result<Json<WebhookView>, ApiError> {
    let org = org_id(&state, id)?;
    if !body.url.starts_with("https://") && !body.url.starts_with("http://") {
        return Err(ApiError::BadRequest("webhook url must be http(s)".to_string()));
    }
    if body.secret.trim().is_empty() {
        return Err(ApiError::BadRequest("webhook secret is required".to_string()));
    }
    let mut events = BTreeSet::new();
    for raw in &body.events {
        let event = EventType::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown event type: {raw}")))?;
        events.insert(event);
    }
    if events.is_empty() {
        return Err(ApiError::BadRequest("at least one event type is required".to_string()));
    }
    let record = WebhookRecord {
        id: WebhookId::random(),
        org_id: org,
        url: body.url,
        secret: body.secret,
        events,
        headers: body.headers,
        enabled: body.enabled,
        created_at: Timestamp::now(),
    };
    state.store.insert_webhook(&record)?;
    Ok(Json(WebhookView::from(record)))
}

/// Fetches one webhook (secret withheld).
async fn get_webhook(
    State(state): State<Arc<AppState>>,
    Path((id, webhook_id)): Path<(String, String)>,
) -> Result<Json<WebhookView>, ApiError> {
    let org = org_id(&state, id)?;
    let record = state
        .store
        .get_webhook(&WebhookId::new(webhook_id))?
        .filter(|record| record.org_id == org)
        .ok_or(ApiError::NotFound("webhook"))?;
    Ok(Json(WebhookView::from(record)))
}

/// Deletes a webhook and its delivery log.
async fn delete_webhook(
    State(state): State<Arc<AppState>>,
    Path((id, webhook_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let record = state
        .store
        .get_webhook(&WebhookId::new(webhook_id))?
        .filter(|record| record.org_id == org)
        .ok_or(ApiError::NotFound("webhook"))?;
    state.store.delete_webhook(&record.id)?;
    Ok(Json(json!({ "deleted": true })))
}

/// Emits the `test` event to every subscribed webhook.
async fn test_webhooks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org = org_id(&state, id)?;
    let now = Timestamp::now();
    let payload = json!({ "message": "ThreatVeil webhook test", "org_id": org });
    let dispatched = state
        .dispatcher
        .emit_event(&org, EventType::Test, &payload, now)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(json!({ "dispatched": dispatched })))
}

/// Lists a webhook's recent deliveries.
async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Path((id, webhook_id)): Path<(String, String)>,
) -> Result<Json<Vec<DeliveryRecord>>, ApiError> {
    let org = org_id(&state, id)?;
    let record = state
        .store
        .get_webhook(&WebhookId::new(webhook_id))?
        .filter(|record| record.org_id == org)
        .ok_or(ApiError::NotFound("webhook"))?;
    Ok(Json(state.store.deliveries_for_webhook(&record.id, DELIVERY_LOG_LIMIT)?))
}
