// crates/threatveil-engine/tests/impact_verification.rs
// ============================================================================
// Module: Impact & Verification Tests
// Description: Confidence tiering, lifecycle side effects, auto-verification.
// Purpose: Pin the resolved-decision measurement and closure flows.
// Dependencies: threatveil-engine, threatveil-core, tokio
// ============================================================================

//! Impact, lifecycle, and auto-verification behavior over the in-memory
//! store.

mod common;

use std::sync::Arc;

use common::finding;
use common::fixed_now;
use common::scan_record;
use common::verifier;
use threatveil_core::ActionId;
use threatveil_core::Category;
use threatveil_core::ConfidenceTier;
use threatveil_core::DecisionId;
use threatveil_core::DecisionRecord;
use threatveil_core::DecisionStatus;
use threatveil_core::DecisionStore;
use threatveil_core::MemoryStore;
use threatveil_core::OrgId;
use threatveil_core::PostureStore;
use threatveil_core::ScanId;
use threatveil_core::ScanStore;
use threatveil_core::Severity;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use threatveil_engine::DecisionLifecycle;
use threatveil_engine::ImpactService;

/// Builds a decision row in the given state.
#[allow(clippy::too_many_arguments, reason = "Fixture builder mirrors the record shape.")]
fn decision(
    id: &str,
    scan_id: &str,
    org_id: &OrgId,
    domain: &str,
    action: ActionId,
    status: DecisionStatus,
    before_score: u8,
    resolved_at: Option<Timestamp>,
    created_at: Timestamp,
) -> DecisionRecord {
    DecisionRecord {
        id: DecisionId::new(id),
        scan_id: ScanId::new(scan_id),
        org_id: Some(org_id.clone()),
        domain: domain.to_string(),
        code_org: None,
        action,
        title: action.title().to_string(),
        recommended_fix: action.recommended_fix().to_string(),
        effort: action.effort().to_string(),
        reduction_percent: action.reduction_percent(),
        priority: action.priority(),
        status,
        before_score,
        after_score: None,
        accepted_at: None,
        resolved_at,
        verified_at: None,
        verification_scan_id: None,
        confidence_score: None,
        confidence_reason: None,
        business_impact: None,
        created_at,
        updated_at: created_at,
    }
}

#[test]
fn impact_without_after_scan_is_lowest_tier() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(&store) as Arc<dyn PostureStore>;
    let now = fixed_now();
    let org_id = OrgId::new("org-1");
    let origin = scan_record("scan-a", "example.com", Some(org_id.clone()), Vec::new(), now);
    store.insert_scan(&origin)?;
    let row = decision(
        "d-1",
        "scan-a",
        &org_id,
        "example.com",
        ActionId::PatchCves,
        DecisionStatus::Resolved,
        40,
        Some(now.plus_days(1)),
        now,
    );
    store.insert_decision(&row)?;

    let impact = ImpactService::new(dyn_store).compute(&row, now.plus_days(2))?;
    assert_eq!(impact.confidence, ConfidenceTier::NoAfterScan);
    assert!((impact.confidence.value() - 0.2).abs() < f64::EPSILON);
    assert_eq!(impact.risk_after, None);
    assert_eq!(impact.delta, None);
    assert_eq!(impact.risk_before, 40);
    Ok(())
}

#[test]
fn impact_tiers_follow_scan_recency_and_signal_disappearance()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(&store) as Arc<dyn PostureStore>;
    let now = fixed_now();
    let org_id = OrgId::new("org-1");

    // Originating scan carries two high CVE findings.
    let cve_signals = vec![
        finding("cve_CVE-2024-0001", SignalKind::Cve, Severity::High, Category::Software, "vulndb", now),
        finding("cve_CVE-2024-0002", SignalKind::Cve, Severity::High, Category::Software, "vulndb", now),
    ];
    let origin = scan_record("scan-a", "example.com", Some(org_id.clone()), cve_signals, now);
    store.insert_scan(&origin)?;

    let resolved_at = now.plus_days(1);
    let row = decision(
        "d-1",
        "scan-a",
        &org_id,
        "example.com",
        ActionId::PatchCves,
        DecisionStatus::Resolved,
        origin.risk_score,
        Some(resolved_at),
        now,
    );
    store.insert_decision(&row)?;

    // A clean after-scan two days after resolution: recent and confirmed.
    let after = scan_record(
        "scan-b",
        "example.com",
        Some(org_id.clone()),
        Vec::new(),
        resolved_at.plus_days(2),
    );
    store.insert_scan(&after)?;
    let impact = ImpactService::new(Arc::clone(&dyn_store))
        .compute(&row, resolved_at.plus_days(2))?;
    assert_eq!(impact.confidence, ConfidenceTier::RecentConfirmed);
    assert_eq!(impact.risk_after, Some(after.risk_score));

    // Measured ten days after the after-scan: stale tier, same row replaced.
    let impact = ImpactService::new(dyn_store).compute(&row, resolved_at.plus_days(12))?;
    assert_eq!(impact.confidence, ConfidenceTier::StaleAfterScan);
    assert_eq!(store.get_impact(&row.id)?.map(|i| i.confidence), Some(impact.confidence));
    Ok(())
}

#[test]
fn resolving_a_decision_records_after_score_and_impact()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(&store) as Arc<dyn PostureStore>;
    let now = fixed_now();
    let org_id = OrgId::new("org-1");
    let origin = scan_record("scan-a", "example.com", Some(org_id.clone()), Vec::new(), now);
    store.insert_scan(&origin)?;
    let row = decision(
        "d-1",
        "scan-a",
        &org_id,
        "example.com",
        ActionId::AuditData,
        DecisionStatus::Pending,
        35,
        None,
        now,
    );
    store.insert_decision(&row)?;

    let lifecycle = DecisionLifecycle::new(
        Arc::clone(&dyn_store),
        Arc::new(ImpactService::new(Arc::clone(&dyn_store))),
    );
    let outcome = lifecycle.transition(&row.id, DecisionStatus::Resolved, now.plus_days(1))?;
    assert_eq!(outcome.decision.status, DecisionStatus::Resolved);
    assert!(outcome.decision.resolved_at.is_some());
    assert_eq!(outcome.decision.after_score, Some(origin.risk_score));
    assert_eq!(
        outcome.risk_delta,
        Some(i16::from(row.before_score) - i16::from(origin.risk_score))
    );
    assert!(store.get_impact(&row.id)?.is_some());

    // Stepping back out of resolved clears resolution state and the impact.
    let outcome =
        lifecycle.transition(&row.id, DecisionStatus::InProgress, now.plus_days(2))?;
    assert_eq!(outcome.decision.status, DecisionStatus::InProgress);
    assert_eq!(outcome.decision.resolved_at, None);
    assert_eq!(outcome.decision.after_score, None);
    assert!(store.get_impact(&row.id)?.is_none());

    // Every transition appended a decision_transition audit entry.
    let audit: Vec<_> = store
        .audit_entries()?
        .into_iter()
        .filter(|entry| entry.action == "decision_transition")
        .collect();
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|entry| entry.resource_type == "decision"));
    assert!(audit.iter().all(|entry| entry.resource_id == row.id.to_string()));
    assert_eq!(
        audit[0].details.get("from").and_then(serde_json::Value::as_str),
        Some("pending")
    );
    assert_eq!(
        audit[0].details.get("to").and_then(serde_json::Value::as_str),
        Some("resolved")
    );
    assert_eq!(
        audit[1].details.get("to").and_then(serde_json::Value::as_str),
        Some("in_progress")
    );
    Ok(())
}

#[test]
fn verified_requires_resolved_through_the_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(&store) as Arc<dyn PostureStore>;
    let now = fixed_now();
    let org_id = OrgId::new("org-1");
    let row = decision(
        "d-1",
        "scan-a",
        &org_id,
        "example.com",
        ActionId::PatchCves,
        DecisionStatus::Pending,
        35,
        None,
        now,
    );
    store.insert_decision(&row)?;
    let lifecycle = DecisionLifecycle::new(
        Arc::clone(&dyn_store),
        Arc::new(ImpactService::new(dyn_store)),
    );
    let outcome = lifecycle.transition(&row.id, DecisionStatus::Verified, now);
    assert!(outcome.is_err());
    Ok(())
}

#[tokio::test]
async fn cve_fix_auto_verifies_on_the_next_clean_scan()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = fixed_now();
    let org_id = OrgId::new("org-1");

    // Scan A: two high CVE findings.
    let cve_signals = vec![
        finding("cve_CVE-2024-0001", SignalKind::Cve, Severity::High, Category::Software, "vulndb", now),
        finding("cve_CVE-2024-0002", SignalKind::Cve, Severity::High, Category::Software, "vulndb", now),
    ];
    let scan_a = scan_record("scan-a", "example.com", Some(org_id.clone()), cve_signals, now);
    store.insert_scan(&scan_a)?;

    // The patch decision is resolved before scan B runs.
    let resolved_at = now.plus_days(1);
    let row = decision(
        "d-1",
        "scan-a",
        &org_id,
        "example.com",
        ActionId::PatchCves,
        DecisionStatus::Resolved,
        scan_a.risk_score,
        Some(resolved_at),
        now,
    );
    store.insert_decision(&row)?;

    // Scan B two days later: no CVE findings.
    let scan_b = scan_record(
        "scan-b",
        "example.com",
        Some(org_id),
        Vec::new(),
        now.plus_days(2),
    );
    store.insert_scan(&scan_b)?;

    verifier(&store)?.auto_verify_for_scan(&scan_b, now.plus_days(2)).await;

    let verified = store.get_decision(&row.id)?.ok_or("decision missing")?;
    assert_eq!(verified.status, DecisionStatus::Verified);
    assert!(verified.verified_at.is_some());
    assert_eq!(verified.verification_scan_id, Some(scan_b.id));
    assert_eq!(verified.confidence_score, Some(1.0));
    Ok(())
}

#[tokio::test]
async fn auto_verification_skips_decisions_resolved_after_the_scan()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = fixed_now();
    let org_id = OrgId::new("org-1");
    let scan_a = scan_record(
        "scan-a",
        "example.com",
        Some(org_id.clone()),
        vec![finding(
            "cve_CVE-2024-0001",
            SignalKind::Cve,
            Severity::High,
            Category::Software,
            "vulndb",
            now,
        )],
        now,
    );
    store.insert_scan(&scan_a)?;
    let scan_b =
        scan_record("scan-b", "example.com", Some(org_id.clone()), Vec::new(), now.plus_days(1));
    store.insert_scan(&scan_b)?;

    // Resolved after scan B completed: the scan cannot prove this fix.
    let row = decision(
        "d-1",
        "scan-a",
        &org_id,
        "example.com",
        ActionId::PatchCves,
        DecisionStatus::Resolved,
        scan_a.risk_score,
        Some(now.plus_days(2)),
        now,
    );
    store.insert_decision(&row)?;

    verifier(&store)?.auto_verify_for_scan(&scan_b, now.plus_days(2)).await;
    let untouched = store.get_decision(&row.id)?.ok_or("decision missing")?;
    assert_eq!(untouched.status, DecisionStatus::Resolved);
    assert!(untouched.verified_at.is_none());
    Ok(())
}
