// crates/threatveil-engine/tests/orchestrator.rs
// ============================================================================
// Module: Orchestrator Tests
// Description: End-to-end orchestration over stub probes.
// Purpose: Pin the clean-domain, partial-failure, quota, and decision flows.
// Dependencies: threatveil-engine, threatveil-core, tokio
// ============================================================================

//! Orchestrator behavior tests over the in-memory store.

mod common;

use std::sync::Arc;

use common::StaticProbe;
use common::finding;
use common::fixed_now;
use common::orchestrator;
use threatveil_core::Category;
use threatveil_core::DecisionStore;
use threatveil_core::MemoryStore;
use threatveil_core::OrgStore;
use threatveil_core::PlanTier;
use threatveil_core::PostureStore;
use threatveil_core::ScanStore;
use threatveil_core::Severity;
use threatveil_core::SignalKind;
use threatveil_engine::DecisionGenerator;
use threatveil_engine::ScanError;
use threatveil_engine::ScanRequest;
use threatveil_probes::Probe;

/// Standard stage-A stubs with no findings.
fn clean_stage_a() -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(StaticProbe::clean("dns", "DNS")),
        Arc::new(StaticProbe::clean("http", "HTTP")),
        Arc::new(StaticProbe::clean("tls", "TLS")),
        Arc::new(StaticProbe::clean("threat_intel", "ThreatIntel")),
    ]
}

#[tokio::test]
async fn clean_domain_synthesizes_the_no_findings_signal()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let orchestrator =
        orchestrator(&store, clean_stage_a(), Arc::new(StaticProbe::clean("ct", "CT")))?;
    let request = ScanRequest {
        domain: "example.com".to_string(),
        code_org: None,
    };

    let scan = orchestrator.run(&request, None, fixed_now()).await?;
    assert_eq!(scan.risk_score, 0);
    assert_eq!(scan.partial_failures, 0);
    assert_eq!(scan.signals.len(), 1);
    assert_eq!(scan.signals[0].id, "scan_completed_no_findings");
    assert!(scan.likelihoods.thirty_day >= 0.0);
    assert!(scan.likelihoods.ninety_day >= scan.likelihoods.thirty_day);

    // Exactly one scan row persisted, linked to a fresh organization.
    let persisted = store.get_scan(&scan.id)?.ok_or("scan not persisted")?;
    assert_eq!(persisted.id, scan.id);
    let org_id = persisted.org_id.ok_or("scan not linked to an org")?;
    let org = store.get_org(&org_id)?.ok_or("org not created")?;
    assert_eq!(org.primary_domain, "example.com");
    assert_eq!(org.scans_this_month, 1);

    // And the clean scan generates no decisions.
    let dyn_store: Arc<dyn PostureStore> = store;
    let generator = DecisionGenerator::new(dyn_store);
    assert!(generator.generate_for_scan(&scan.id, fixed_now())?.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_probe_yields_partial_failure_not_error()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = fixed_now();
    let stage_a: Vec<Arc<dyn Probe>> = vec![
        Arc::new(StaticProbe::failing("dns", "DNS")),
        Arc::new(StaticProbe::with_signals(
            "http",
            "HTTP",
            vec![finding(
                "http_no_https_redirect",
                SignalKind::Http,
                Severity::High,
                Category::Network,
                "http",
                now,
            )],
        )),
        Arc::new(StaticProbe::with_signals(
            "tls",
            "TLS",
            vec![finding(
                "tls_expiring_soon",
                SignalKind::Tls,
                Severity::Medium,
                Category::Network,
                "tls",
                now,
            )],
        )),
        Arc::new(StaticProbe::clean("threat_intel", "ThreatIntel")),
    ];
    let orchestrator = orchestrator(&store, stage_a, Arc::new(StaticProbe::clean("ct", "CT")))?;
    let request = ScanRequest {
        domain: "example.com".to_string(),
        code_org: None,
    };

    let scan = orchestrator.run(&request, None, now).await?;
    assert_eq!(scan.partial_failures, 1);
    let dns_error = scan
        .signals
        .iter()
        .find(|s| s.id == "service_dns_failure")
        .ok_or("missing dns service-error signal")?;
    assert_eq!(dns_error.severity, Severity::Low);
    assert!(scan.signals.iter().any(|s| s.id == "http_no_https_redirect"));
    assert!(scan.signals.iter().any(|s| s.id == "tls_expiring_soon"));
    // The raw payload records every probe, including the failed one.
    assert!(scan.raw_payload.contains_key("dns"));
    assert!(scan.raw_payload.get("dns").is_some_and(|meta| meta.get("error").is_some()));
    Ok(())
}

#[tokio::test]
async fn invalid_domains_are_refused_before_any_work() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let orchestrator =
        orchestrator(&store, clean_stage_a(), Arc::new(StaticProbe::clean("ct", "CT")))?;
    let request = ScanRequest {
        domain: "https://example.com".to_string(),
        code_org: None,
    };
    let outcome = orchestrator.run(&request, None, fixed_now()).await;
    assert!(matches!(outcome, Err(ScanError::Validation(_))));
    Ok(())
}

#[tokio::test]
async fn free_plan_quota_refuses_with_upgrade_error() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let orchestrator =
        orchestrator(&store, clean_stage_a(), Arc::new(StaticProbe::clean("ct", "CT")))?;
    let request = ScanRequest {
        domain: "example.com".to_string(),
        code_org: None,
    };
    // First scan creates the org; exhaust its quota afterwards.
    let scan = orchestrator.run(&request, None, fixed_now()).await?;
    let org_id = store
        .get_scan(&scan.id)?
        .and_then(|s| s.org_id)
        .ok_or("scan not linked to an org")?;
    let org = store.get_org(&org_id)?.ok_or("org missing")?;
    assert_eq!(org.plan, PlanTier::Free);
    for _ in org.scans_this_month..org.scans_limit {
        store.bump_scan_counter(&org_id)?;
    }

    let outcome = orchestrator.run(&request, None, fixed_now()).await;
    assert!(matches!(outcome, Err(ScanError::QuotaExceeded { .. })));
    Ok(())
}

#[tokio::test]
async fn decision_generation_is_idempotent_per_scan() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = fixed_now();
    let stage_a: Vec<Arc<dyn Probe>> = vec![
        Arc::new(StaticProbe::clean("dns", "DNS")),
        Arc::new(StaticProbe::with_signals(
            "http",
            "HTTP",
            vec![finding(
                "cve_CVE-2024-0001",
                SignalKind::Cve,
                Severity::High,
                Category::Software,
                "vulndb",
                now,
            )],
        )),
        Arc::new(StaticProbe::clean("tls", "TLS")),
        Arc::new(StaticProbe::clean("threat_intel", "ThreatIntel")),
    ];
    let orchestrator = orchestrator(&store, stage_a, Arc::new(StaticProbe::clean("ct", "CT")))?;
    let request = ScanRequest {
        domain: "example.com".to_string(),
        code_org: None,
    };
    let scan = orchestrator.run(&request, None, now).await?;

    let dyn_store: Arc<dyn PostureStore> = Arc::clone(&store) as Arc<dyn PostureStore>;
    let generator = DecisionGenerator::new(dyn_store);
    let first = generator.generate_for_scan(&scan.id, now)?;
    let second = generator.generate_for_scan(&scan.id, now.plus_days(1))?;
    assert_eq!(first.len(), 1);
    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].priority, second[0].priority);
    assert_eq!(first[0].before_score, scan.risk_score);
    assert_eq!(store.decisions_for_scan(&scan.id)?.len(), 1);
    Ok(())
}
