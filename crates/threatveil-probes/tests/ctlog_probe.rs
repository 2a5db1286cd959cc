// crates/threatveil-probes/tests/ctlog_probe.rs
// ============================================================================
// Module: CT Log Probe Tests
// Description: Exercise the CT probe against a local listener.
// Purpose: Pin entry deduplication and the churn threshold.
// Dependencies: threatveil-probes, threatveil-core, tiny_http, tokio
// ============================================================================

//! CT log probe tests against an in-process aggregator stub.

use std::thread;

use serde_json::Value;
use serde_json::json;
use threatveil_core::Severity;
use threatveil_core::Timestamp;
use threatveil_probes::CtLogProbe;
use threatveil_probes::Probe;
use threatveil_probes::ProbeContext;

/// Spawns a listener answering with the given JSON body.
fn spawn_aggregator(
    body: Value,
) -> Result<(String, thread::JoinHandle<()>), Box<dyn std::error::Error>> {
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    let port = server.server_addr().to_ip().map(|addr| addr.port()).ok_or("no listen port")?;
    let handle = thread::spawn(move || {
        for request in server.incoming_requests().take(4) {
            let _ = request.respond(tiny_http::Response::from_string(body.to_string()));
        }
    });
    Ok((format!("http://127.0.0.1:{port}"), handle))
}

/// Builds a probe context.
fn context() -> ProbeContext {
    ProbeContext {
        domain: "example.com".to_string(),
        code_org: None,
        observed_at: Timestamp::UNIX_EPOCH.plus_days(19_000),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_entries_are_deduplicated_by_id() -> Result<(), Box<dyn std::error::Error>> {
    let body = json!([
        { "id": 1, "name_value": "example.com" },
        { "id": 1, "name_value": "example.com" },
        { "id": 2, "name_value": "www.example.com" },
    ]);
    let (base, _handle) = spawn_aggregator(body)?;
    let probe = CtLogProbe::new("threatveil-test")?.with_base_url(base);
    let outcome = probe.run(&context()).await?;
    assert_eq!(
        outcome.metadata.get("count").and_then(Value::as_u64),
        Some(2)
    );
    assert!(outcome.signals.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn high_entry_count_is_a_medium_churn_finding() -> Result<(), Box<dyn std::error::Error>> {
    let entries: Vec<Value> =
        (0..60).map(|id| json!({ "id": id, "name_value": "example.com" })).collect();
    let (base, _handle) = spawn_aggregator(Value::Array(entries))?;
    let probe = CtLogProbe::new("threatveil-test")?.with_base_url(base);
    let outcome = probe.run(&context()).await?;
    let churn =
        outcome.signals.iter().find(|s| s.id == "ct_high_churn").ok_or("missing churn signal")?;
    assert_eq!(churn.severity, Severity::Medium);
    Ok(())
}
