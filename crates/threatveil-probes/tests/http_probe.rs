// crates/threatveil-probes/tests/http_probe.rs
// ============================================================================
// Module: HTTP Probe Tests
// Description: Exercise the HTTP probe against a local listener.
// Purpose: Pin header findings, redirect detection, and fingerprint output.
// Dependencies: threatveil-probes, threatveil-core, tiny_http, tokio
// ============================================================================

//! HTTP probe behavior tests against an in-process listener.

use std::thread;

use threatveil_core::Category;
use threatveil_core::Severity;
use threatveil_core::Timestamp;
use threatveil_probes::HttpProbe;
use threatveil_probes::Probe;
use threatveil_probes::ProbeContext;

/// Spawns a listener that answers every request with the given headers.
fn spawn_listener(
    headers: Vec<(&'static str, &'static str)>,
    status: u16,
) -> Result<(String, thread::JoinHandle<()>), Box<dyn std::error::Error>> {
    let server = tiny_http::Server::http("127.0.0.1:0")
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    let port = server.server_addr().to_ip().map(|addr| addr.port()).ok_or("no listen port")?;
    let handle = thread::spawn(move || {
        // Serve a bounded number of requests, then exit with the test.
        for request in server.incoming_requests().take(8) {
            let mut response = tiny_http::Response::from_string("ok")
                .with_status_code(tiny_http::StatusCode(status));
            for (name, value) in &headers {
                if let Ok(header) =
                    tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes())
                {
                    response.add_header(header);
                }
            }
            let _ = request.respond(response);
        }
    });
    Ok((format!("http://127.0.0.1:{port}"), handle))
}

/// Builds a probe context for the local listener.
fn context() -> ProbeContext {
    ProbeContext {
        domain: "example.com".to_string(),
        code_org: None,
        observed_at: Timestamp::UNIX_EPOCH.plus_days(19_000),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_security_headers_emit_findings() -> Result<(), Box<dyn std::error::Error>> {
    let (base, _handle) = spawn_listener(vec![("Server", "nginx/1.24.0")], 200)?;
    let probe = HttpProbe::new("threatveil-test")?.with_base_override(base);
    let outcome = probe.run(&context()).await?;

    let header_signals: Vec<_> =
        outcome.signals.iter().filter(|s| s.id.starts_with("http_header_")).collect();
    assert_eq!(header_signals.len(), 6);
    for signal in &header_signals {
        assert_eq!(signal.category, Category::Software);
        assert!(!signal.evidence.raw.is_null());
    }
    let hsts = header_signals
        .iter()
        .find(|s| s.id == "http_header_strict_transport_security_missing")
        .ok_or("missing hsts signal")?;
    assert_eq!(hsts.severity, Severity::High);
    let frame_options = header_signals
        .iter()
        .find(|s| s.id == "http_header_x_frame_options_missing")
        .ok_or("missing x-frame-options signal")?;
    assert_eq!(frame_options.severity, Severity::Medium);

    let tokens = outcome.metadata.pointer("/tech_tokens").and_then(|v| v.as_array()).cloned();
    assert_eq!(tokens.map(|t| t.len()), Some(1));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn present_security_headers_emit_no_header_findings()
-> Result<(), Box<dyn std::error::Error>> {
    let (base, _handle) = spawn_listener(
        vec![
            ("Strict-Transport-Security", "max-age=63072000"),
            ("Content-Security-Policy", "default-src 'self'"),
            ("X-Frame-Options", "DENY"),
            ("X-Content-Type-Options", "nosniff"),
            ("Referrer-Policy", "no-referrer"),
            ("Permissions-Policy", "camera=()"),
        ],
        200,
    )?;
    let probe = HttpProbe::new("threatveil-test")?.with_base_override(base);
    let outcome = probe.run(&context()).await?;
    assert!(outcome.signals.iter().all(|s| !s.id.starts_with("http_header_")));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn non_redirecting_plain_http_is_a_high_finding()
-> Result<(), Box<dyn std::error::Error>> {
    let (base, _handle) = spawn_listener(vec![], 200)?;
    let probe = HttpProbe::new("threatveil-test")?.with_base_override(base);
    let outcome = probe.run(&context()).await?;
    let redirect = outcome
        .signals
        .iter()
        .find(|s| s.id == "http_no_https_redirect")
        .ok_or("missing redirect signal")?;
    assert_eq!(redirect.severity, Severity::High);
    assert_eq!(redirect.category, Category::Network);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn https_redirect_location_suppresses_the_finding()
-> Result<(), Box<dyn std::error::Error>> {
    // The redirect target must be https:// to satisfy the enforcement check;
    // an unroutable loopback port keeps the follow client off the network.
    let (base, _handle) =
        spawn_listener(vec![("Location", "https://127.0.0.1:1/")], 301)?;
    let probe = HttpProbe::new("threatveil-test")?.with_base_override(base);
    let outcome = probe.run(&context()).await?;
    assert!(outcome.signals.iter().all(|s| s.id != "http_no_https_redirect"));
    assert_eq!(
        outcome.metadata.pointer("/redirect_to_https").and_then(serde_json::Value::as_bool),
        Some(true)
    );
    Ok(())
}
