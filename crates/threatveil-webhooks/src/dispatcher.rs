// crates/threatveil-webhooks/src/dispatcher.rs
// ============================================================================
// Module: Webhook Dispatcher
// Description: Event fan-out with signing, retries, and a delivery log.
// Purpose: Deliver events without blocking emission or losing the audit trail.
// Dependencies: threatveil-core, crate::{signature, transport}, tokio
// ============================================================================

//! ## Overview
//! `emit_event` finds every enabled webhook subscribed to the event type
//! and dispatches each on its own task, so emission never blocks on slow
//! endpoints and no cross-webhook ordering exists. Each delivery creates a
//! pending log row, signs the canonical body, and retries on network error
//! or non-2xx with exponential backoff until success or exhaustion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use threatveil_core::DeliveryId;
use threatveil_core::DeliveryRecord;
use threatveil_core::DeliveryStatus;
use threatveil_core::EventType;
use threatveil_core::OrgId;
use threatveil_core::PostureStore;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;
use threatveil_core::WebhookRecord;
use threatveil_core::canonical_json_bytes;

use crate::signature::SIGNATURE_HEADER;
use crate::signature::sign_body;
use crate::transport::DeliveryTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Delivery attempts before a delivery fails terminally.
pub const MAX_ATTEMPTS: u32 = 3;
/// Cap applied to persisted response bodies.
const RESPONSE_BODY_CAP: usize = 1000;
/// Event-type header name.
const EVENT_HEADER: &str = "X-ThreatVeil-Event";
/// Delivery-id header name.
const DELIVERY_HEADER: &str = "X-ThreatVeil-Delivery";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dispatcher errors.
///
/// Endpoint failures never appear here; they land in the delivery log.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The event body could not be canonicalized.
    #[error("event body canonicalization failed: {0}")]
    Body(String),
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// HMAC-signed webhook dispatcher.
pub struct WebhookDispatcher {
    /// Persistence backend for subscriptions and the delivery log.
    store: Arc<dyn PostureStore>,
    /// Outbound POST transport.
    transport: Arc<dyn DeliveryTransport>,
    /// Base unit of the exponential backoff (one second in production).
    retry_base: Duration,
}

impl WebhookDispatcher {
    /// Creates a dispatcher with the production backoff base.
    #[must_use]
    pub fn new(store: Arc<dyn PostureStore>, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            store,
            transport,
            retry_base: Duration::from_secs(1),
        }
    }

    /// Overrides the backoff base (test hook).
    #[must_use]
    pub const fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    /// Emits an event to every subscribed, enabled webhook.
    ///
    /// Deliveries run on detached tasks; emission returns as soon as the
    /// fan-out is spawned and no cross-webhook ordering exists.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] when the subscription query fails.
    pub fn emit_event(
        &self,
        org_id: &OrgId,
        event: EventType,
        payload: &Value,
        now: Timestamp,
    ) -> Result<usize, DispatchError> {
        let webhooks = self.store.webhooks_for_event(org_id, event)?;
        let count = webhooks.len();
        for webhook in webhooks {
            // Each task owns an independent dispatcher over the same store
            // and transport handles.
            let task_dispatcher = Self {
                store: Arc::clone(&self.store),
                transport: Arc::clone(&self.transport),
                retry_base: self.retry_base,
            };
            let payload = payload.clone();
            tokio::spawn(async move {
                if let Err(err) = task_dispatcher.deliver(&webhook, event, &payload, now).await {
                    tracing::warn!(webhook_id = %webhook.id, error = %err, "webhook delivery errored");
                }
            });
        }
        Ok(count)
    }

    /// Delivers one event to one webhook, recording every attempt.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the body cannot be built or the
    /// delivery log cannot be written; endpoint failures are recorded, not
    /// raised.
    pub async fn deliver(
        &self,
        webhook: &WebhookRecord,
        event: EventType,
        payload: &Value,
        now: Timestamp,
    ) -> Result<DeliveryRecord, DispatchError> {
        let body = event_body(event, payload, now)?;
        let mut delivery = DeliveryRecord {
            id: DeliveryId::random(),
            webhook_id: webhook.id.clone(),
            event,
            payload: payload.clone(),
            status: DeliveryStatus::Pending,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
            response_code: None,
            response_body: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_delivery(&delivery)?;

        let headers = self.build_headers(webhook, event, &delivery.id, &body);
        while delivery.attempts < delivery.max_attempts {
            delivery.attempts += 1;
            match self.transport.post(&webhook.url, &headers, &body).await {
                Ok(response) => {
                    delivery.response_code = Some(response.status);
                    delivery.response_body =
                        Some(truncate_body(&response.body, RESPONSE_BODY_CAP));
                    if response.is_success() {
                        delivery.status = DeliveryStatus::Success;
                        delivery.error = None;
                        self.store.update_delivery(&delivery)?;
                        tracing::info!(
                            webhook_id = %webhook.id,
                            delivery_id = %delivery.id,
                            attempts = delivery.attempts,
                            "webhook delivered"
                        );
                        return Ok(delivery);
                    }
                    delivery.error = Some(format!("endpoint returned {}", response.status));
                }
                Err(err) => {
                    delivery.error = Some(err.to_string());
                }
            }
            self.store.update_delivery(&delivery)?;
            if delivery.attempts < delivery.max_attempts {
                tokio::time::sleep(self.backoff_delay(delivery.attempts)).await;
            }
        }

        delivery.status = DeliveryStatus::Failed;
        self.store.update_delivery(&delivery)?;
        tracing::warn!(
            webhook_id = %webhook.id,
            delivery_id = %delivery.id,
            attempts = delivery.attempts,
            error = delivery.error.as_deref().unwrap_or_default(),
            "webhook delivery failed"
        );
        Ok(delivery)
    }

    /// Builds the delivery headers, custom headers last.
    fn build_headers(
        &self,
        webhook: &WebhookRecord,
        event: EventType,
        delivery_id: &DeliveryId,
        body: &[u8],
    ) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (EVENT_HEADER.to_string(), event.as_str().to_string()),
            (SIGNATURE_HEADER.to_string(), sign_body(&webhook.secret, body)),
            (DELIVERY_HEADER.to_string(), delivery_id.to_string()),
        ];
        for (name, value) in &webhook.headers {
            headers.push((name.clone(), value.clone()));
        }
        headers
    }

    /// Computes the backoff delay after a failed attempt (2^attempt units).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_base.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

// ============================================================================
// SECTION: Body Construction
// ============================================================================

/// Builds the canonical delivery body `{event, timestamp, data}`.
///
/// # Errors
///
/// Returns [`DispatchError::Body`] when canonicalization fails.
pub fn event_body(
    event: EventType,
    payload: &Value,
    now: Timestamp,
) -> Result<Vec<u8>, DispatchError> {
    let body = json!({
        "event": event.as_str(),
        "timestamp": now.to_rfc3339(),
        "data": payload,
    });
    canonical_json_bytes(&body).map_err(|err| DispatchError::Body(err.to_string()))
}

/// Truncates a response body for persistence.
fn truncate_body(body: &[u8], cap: usize) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars().take(cap).collect()
}
