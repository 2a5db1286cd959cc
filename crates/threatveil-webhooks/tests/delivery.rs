// crates/threatveil-webhooks/tests/delivery.rs
// ============================================================================
// Module: Delivery Tests
// Description: End-to-end webhook delivery against a local listener.
// Purpose: Pin signing headers, retry behavior, and the delivery log.
// Dependencies: threatveil-webhooks, threatveil-core, tiny_http, tokio
// ============================================================================

//! Webhook delivery tests: headers, retries, exhaustion, and fan-out
//! filtering.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde_json::json;
use threatveil_core::DeliveryStatus;
use threatveil_core::EventType;
use threatveil_core::MemoryStore;
use threatveil_core::OrgId;
use threatveil_core::PostureStore;
use threatveil_core::Timestamp;
use threatveil_core::WebhookId;
use threatveil_core::WebhookRecord;
use threatveil_core::WebhookStore;
use threatveil_webhooks::HttpTransport;
use threatveil_webhooks::WebhookDispatcher;
use threatveil_webhooks::verify_signature;

/// Captured request from the listener.
#[derive(Debug, Clone)]
struct CapturedRequest {
    /// Raw request body.
    body: Vec<u8>,
    /// Headers as name/value pairs (lowercased names).
    headers: Vec<(String, String)>,
}

/// Spawns a listener that fails `failures` times, then succeeds.
fn spawn_endpoint(
    failures: usize,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
) -> Result<(String, thread::JoinHandle<()>), Box<dyn std::error::Error>> {
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    let port = server.server_addr().to_ip().map(|addr| addr.port()).ok_or("no listen port")?;
    let handle = thread::spawn(move || {
        for (index, mut request) in server.incoming_requests().take(6).enumerate() {
            let mut body = Vec::new();
            let _ = std::io::Read::read_to_end(request.as_reader(), &mut body);
            let headers = request
                .headers()
                .iter()
                .map(|header| {
                    (header.field.as_str().as_str().to_ascii_lowercase(), header.value.to_string())
                })
                .collect();
            if let Ok(mut captured) = captured.lock() {
                captured.push(CapturedRequest {
                    body,
                    headers,
                });
            }
            let status = if index < failures { 500 } else { 200 };
            let _ = request.respond(
                tiny_http::Response::from_string("ok")
                    .with_status_code(tiny_http::StatusCode(status)),
            );
        }
    });
    Ok((format!("http://127.0.0.1:{port}/hook"), handle))
}

/// Builds a webhook record for the endpoint.
fn webhook(url: &str, events: &[EventType], enabled: bool, now: Timestamp) -> WebhookRecord {
    let mut headers = BTreeMap::new();
    headers.insert("X-Custom-Tag".to_string(), "ops".to_string());
    WebhookRecord {
        id: WebhookId::random(),
        org_id: OrgId::new("org-1"),
        url: url.to_string(),
        secret: "whsec_secret".to_string(),
        events: events.iter().copied().collect::<BTreeSet<_>>(),
        headers,
        enabled,
        created_at: now,
    }
}

/// Builds a dispatcher with a fast retry base for tests.
fn dispatcher(store: &Arc<MemoryStore>) -> Result<Arc<WebhookDispatcher>, Box<dyn std::error::Error>> {
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(store) as Arc<dyn PostureStore>;
    let transport = Arc::new(HttpTransport::new("threatveil-test")?);
    Ok(Arc::new(
        WebhookDispatcher::new(dyn_store, transport)
            .with_retry_base(Duration::from_millis(10)),
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn first_attempt_success_records_and_signs() -> Result<(), Box<dyn std::error::Error>> {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let (url, _handle) = spawn_endpoint(0, Arc::clone(&captured))?;
    let store = Arc::new(MemoryStore::new());
    let now = Timestamp::UNIX_EPOCH.plus_days(19_000);
    let hook = webhook(&url, &[EventType::Test], true, now);
    store.insert_webhook(&hook)?;

    let dispatcher = dispatcher(&store)?;
    let delivery =
        dispatcher.deliver(&hook, EventType::Test, &json!({ "ping": true }), now).await?;
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.response_code, Some(200));

    let captured = captured.lock().map_err(|_| "capture lock poisoned")?;
    let request = captured.first().ok_or("no request captured")?;
    let find = |name: &str| {
        request
            .headers
            .iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value.clone())
    };
    assert_eq!(find("x-threatveil-event").as_deref(), Some("test"));
    assert_eq!(find("x-threatveil-delivery").as_deref(), Some(delivery.id.as_str()));
    assert_eq!(find("x-custom-tag").as_deref(), Some("ops"));
    assert_eq!(find("content-type").as_deref(), Some("application/json"));
    let signature = find("x-threatveil-signature").ok_or("missing signature header")?;
    // Receivers recompute the HMAC over the raw body and compare.
    assert!(verify_signature("whsec_secret", &request.body, &signature));
    assert!(!verify_signature("whsec_wrong", &request.body, &signature));

    let parsed: serde_json::Value = serde_json::from_slice(&request.body)?;
    assert_eq!(parsed["event"], "test");
    assert_eq!(parsed["data"]["ping"], true);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_retry_until_success() -> Result<(), Box<dyn std::error::Error>> {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let (url, _handle) = spawn_endpoint(2, Arc::clone(&captured))?;
    let store = Arc::new(MemoryStore::new());
    let now = Timestamp::UNIX_EPOCH.plus_days(19_000);
    let hook = webhook(&url, &[EventType::DecisionCreated], true, now);
    store.insert_webhook(&hook)?;

    let dispatcher = dispatcher(&store)?;
    let delivery = dispatcher
        .deliver(&hook, EventType::DecisionCreated, &json!({ "decision_id": "d-1" }), now)
        .await?;
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 3);
    assert_eq!(delivery.response_code, Some(200));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_deliveries_fail_terminally() -> Result<(), Box<dyn std::error::Error>> {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let (url, _handle) = spawn_endpoint(6, Arc::clone(&captured))?;
    let store = Arc::new(MemoryStore::new());
    let now = Timestamp::UNIX_EPOCH.plus_days(19_000);
    let hook = webhook(&url, &[EventType::RiskScoreChanged], true, now);
    store.insert_webhook(&hook)?;

    let dispatcher = dispatcher(&store)?;
    let delivery = dispatcher
        .deliver(&hook, EventType::RiskScoreChanged, &json!({ "score": 40 }), now)
        .await?;
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 3);
    assert_eq!(delivery.response_code, Some(500));
    assert!(delivery.error.is_some());

    // The log row reflects the terminal state.
    let logged = store.deliveries_for_webhook(&hook.id, 10)?;
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].status, DeliveryStatus::Failed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn emission_targets_only_enabled_subscribers() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = Timestamp::UNIX_EPOCH.plus_days(19_000);
    let org = OrgId::new("org-1");
    // Subscribed and enabled; unsubscribed; disabled.
    let captured = Arc::new(Mutex::new(Vec::new()));
    let (url, _handle) = spawn_endpoint(0, Arc::clone(&captured))?;
    store.insert_webhook(&webhook(&url, &[EventType::Test], true, now))?;
    store.insert_webhook(&webhook(&url, &[EventType::DecisionCreated], true, now))?;
    store.insert_webhook(&webhook(&url, &[EventType::Test], false, now))?;

    let dispatcher = dispatcher(&store)?;
    let spawned = dispatcher.emit_event(&org, EventType::Test, &json!({}), now)?;
    assert_eq!(spawned, 1);
    Ok(())
}
