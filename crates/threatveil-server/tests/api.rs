// crates/threatveil-server/tests/api.rs
// ============================================================================
// Module: API Surface Tests
// Description: Exercise the /api/v1 contract over the in-memory store.
// Purpose: Pin paths, status codes, and body shapes end to end.
// Dependencies: threatveil-server, threatveil-core, tower, http-body-util
// ============================================================================

//! API contract tests: scan flow, decision flow, auth, and error mapping.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use common::TEST_SECRET;
use common::finding;
use common::test_router;
use http_body_util::BodyExt;
use serde_json::Value;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::MemoryStore;
use threatveil_core::Severity;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use threatveil_server::issue_token;
use tower::ServiceExt;

/// Sends one JSON request and returns status and parsed body.
async fn send(
    router: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    send_with_auth(router, method, uri, body, None).await
}

/// Sends one JSON request with an optional bearer token.
async fn send_with_auth(
    router: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> Result<(StatusCode, Value), Box<dyn std::error::Error>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    })?;
    let response = router.oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((status, parsed))
}

#[tokio::test]
async fn ping_answers_ok() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(&store, Vec::new())?;
    let (status, body) = send(router, "GET", "/api/v1/ping", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    Ok(())
}

#[tokio::test]
async fn invalid_domains_answer_400_with_a_reason() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(&store, Vec::new())?;
    let (status, body) = send(
        router,
        "POST",
        "/api/v1/scan/vendor",
        Some(json!({ "domain": "https://example.com" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().is_some_and(|detail| detail.contains("bare domain")));
    Ok(())
}

#[tokio::test]
async fn scan_flow_round_trips_through_the_api() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(&store, Vec::new())?;

    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/v1/scan/vendor",
        Some(json!({ "domain": "Example.COM" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["domain"], "example.com");
    assert_eq!(body["result"]["risk_score"], 0);
    assert_eq!(body["result"]["signals"][0]["id"], "scan_completed_no_findings");
    let scan_id = body["result"]["id"].as_str().ok_or("scan id missing")?.to_string();

    let (status, body) = send(router.clone(), "GET", &format!("/api/v1/scan/{scan_id}"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["id"], scan_id.as_str());

    // Every scan carries an AI catalog, empty here.
    let (status, body) =
        send(router.clone(), "GET", &format!("/api/v1/scan/{scan_id}/ai"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ai_score"], 0);

    let (status, _) =
        send(router.clone(), "GET", &format!("/api/v1/scan/{scan_id}/previous"), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(router, "GET", "/api/v1/scan/nope", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn decision_generation_is_idempotent_over_the_api()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(
        &store,
        vec![finding("cve_CVE-2024-0001", SignalKind::Cve, Severity::High, Category::Software)],
    )?;

    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/v1/scan/vendor",
        Some(json!({ "domain": "example.com" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let scan_id = body["result"]["id"].as_str().ok_or("scan id missing")?.to_string();

    let (status, first) =
        send(router.clone(), "POST", &format!("/api/v1/scans/{scan_id}/decisions"), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, second) =
        send(router.clone(), "POST", &format!("/api/v1/scans/{scan_id}/decisions"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(first.as_array().map(Vec::len), Some(1));
    assert_eq!(first[0]["action"], "patch-cves");

    let (status, listed) =
        send(router, "GET", &format!("/api/v1/scans/{scan_id}/decisions"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, first);
    Ok(())
}

#[tokio::test]
async fn status_changes_enforce_the_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(
        &store,
        vec![finding("cve_CVE-2024-0001", SignalKind::Cve, Severity::High, Category::Software)],
    )?;

    let (_, body) = send(
        router.clone(),
        "POST",
        "/api/v1/scan/vendor",
        Some(json!({ "domain": "example.com" })),
    )
    .await?;
    let scan_id = body["result"]["id"].as_str().ok_or("scan id missing")?.to_string();
    let (_, decisions) =
        send(router.clone(), "POST", &format!("/api/v1/scans/{scan_id}/decisions"), None).await?;
    let decision_id = decisions[0]["id"].as_str().ok_or("decision id missing")?.to_string();

    // Verified straight from pending is an illegal edge.
    let (status, _) = send(
        router.clone(),
        "PATCH",
        &format!("/api/v1/decisions/{decision_id}"),
        Some(json!({ "status": "verified" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        router.clone(),
        "PATCH",
        &format!("/api/v1/decisions/{decision_id}"),
        Some(json!({ "status": "nonsense" })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        router.clone(),
        "PATCH",
        &format!("/api/v1/decisions/{decision_id}"),
        Some(json!({ "status": "resolved" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"]["status"], "resolved");
    assert!(body["decision"]["resolved_at"].is_string());

    // Entering resolved produced the impact row. No scan has completed
    // after the resolution yet, so the tier is the lowest one.
    let (status, body) =
        send(router.clone(), "GET", &format!("/api/v1/decisions/{decision_id}/impact"), None)
            .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confidence_value"], 0.2);

    let (status, _) = send(
        router,
        "PATCH",
        "/api/v1/decisions/unknown",
        Some(json!({ "status": "resolved" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn internal_rescan_requires_a_signed_token() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(&store, Vec::new())?;
    let body = json!({ "domain": "example.com" });

    let (status, _) =
        send(router.clone(), "POST", "/api/v1/internal/rescan", Some(body.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = Timestamp::now().plus_seconds(-3600).unix_seconds();
    let stale = issue_token(TEST_SECRET, "ops", expired)?;
    let (status, _) = send_with_auth(
        router.clone(),
        "POST",
        "/api/v1/internal/rescan",
        Some(body.clone()),
        Some(&stale),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = issue_token(TEST_SECRET, "ops", Timestamp::now().plus_seconds(600).unix_seconds())?;
    let (status, response) =
        send_with_auth(router, "POST", "/api/v1/internal/rescan", Some(body), Some(&fresh))
            .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(response["scan_id"].is_string());
    Ok(())
}

#[tokio::test]
async fn org_endpoints_answer_404_for_unknown_orgs() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(&store, Vec::new())?;
    for uri in [
        "/api/v1/org/nope/overview",
        "/api/v1/org/nope/weekly-brief",
        "/api/v1/org/nope/signals",
        "/api/v1/org/nope/risk-timeline?weeks=4",
    ] {
        let (status, _) = send(router.clone(), "GET", uri, None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri} must 404");
    }
    Ok(())
}

#[tokio::test]
async fn org_overview_reflects_scanned_posture() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let router = test_router(
        &store,
        vec![finding(
            "http_header_strict_transport_security_missing",
            SignalKind::Http,
            Severity::High,
            Category::Software,
        )],
    )?;
    let (_, body) = send(
        router.clone(),
        "POST",
        "/api/v1/scan/vendor",
        Some(json!({ "domain": "example.com" })),
    )
    .await?;
    let scan_id = body["result"]["id"].as_str().ok_or("scan id missing")?.to_string();
    let (_, scan) = send(router.clone(), "GET", &format!("/api/v1/scan/{scan_id}"), None).await?;
    let org_id = scan["result"]["org_id"].as_str().ok_or("org id missing")?.to_string();

    let (status, overview) =
        send(router.clone(), "GET", &format!("/api/v1/org/{org_id}/overview"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["severity_counts"]["high"], 1);

    let (status, summary) =
        send(router, "GET", &format!("/api/v1/org/{org_id}/summary"), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["organization"]["primary_domain"], "example.com");
    assert_eq!(summary["organization"]["scans_this_month"], 1);
    Ok(())
}
