// crates/threatveil-engine/tests/scheduler.rs
// ============================================================================
// Module: Scheduler Tests
// Description: Due-asset pickup, schedule advancement, and lifecycle.
// Purpose: Pin the catch-up, error-isolation, and start/stop behavior.
// Dependencies: threatveil-engine, threatveil-core, tokio
// ============================================================================

//! Continuous-monitoring scheduler behavior over stub probes.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::StaticProbe;
use common::fixed_now;
use common::orchestrator;
use threatveil_core::AssetId;
use threatveil_core::AssetKind;
use threatveil_core::AssetRecord;
use threatveil_core::AssetStatus;
use threatveil_core::MemoryStore;
use threatveil_core::OrgId;
use threatveil_core::OrgRecord;
use threatveil_core::OrgStore;
use threatveil_core::PlanTier;
use threatveil_core::ScanFrequency;
use threatveil_core::ScheduleStore;
use threatveil_core::Timestamp;
use threatveil_engine::MonitorScheduler;
use threatveil_probes::Probe;

/// Inserts an organization and one domain asset due at `next_scan_at`.
fn seed_asset(
    store: &MemoryStore,
    frequency: ScanFrequency,
    next_scan_at: Option<Timestamp>,
    status: AssetStatus,
    now: Timestamp,
) -> Result<AssetRecord, Box<dyn std::error::Error>> {
    let org = OrgRecord {
        id: OrgId::new("org-1"),
        name: "example.com".to_string(),
        primary_domain: "example.com".to_string(),
        plan: PlanTier::Free,
        scans_this_month: 0,
        scans_limit: OrgRecord::DEFAULT_SCANS_LIMIT,
        created_at: now,
    };
    if store.find_org_by_domain("example.com")?.is_none() {
        store.insert_org(&org)?;
    }
    let asset = AssetRecord {
        id: AssetId::new("asset-1"),
        org_id: org.id,
        kind: AssetKind::Domain,
        name: "example.com".to_string(),
        risk_weight: 1.0,
        priority: 1,
        frequency,
        status,
        last_scan_at: None,
        next_scan_at,
        last_risk_score: None,
        created_at: now,
    };
    store.insert_asset(&asset)?;
    Ok(asset)
}

/// Builds a scheduler over clean stub probes.
fn scheduler(
    store: &Arc<MemoryStore>,
) -> Result<Arc<MonitorScheduler>, Box<dyn std::error::Error>> {
    let stage_a: Vec<Arc<dyn Probe>> = vec![
        Arc::new(StaticProbe::clean("dns", "DNS")),
        Arc::new(StaticProbe::clean("http", "HTTP")),
        Arc::new(StaticProbe::clean("tls", "TLS")),
        Arc::new(StaticProbe::clean("threat_intel", "ThreatIntel")),
    ];
    let orchestrator = orchestrator(store, stage_a, Arc::new(StaticProbe::clean("ct", "CT")))?;
    let dyn_store: Arc<dyn threatveil_core::PostureStore> =
        Arc::clone(store) as Arc<dyn threatveil_core::PostureStore>;
    Ok(Arc::new(MonitorScheduler::new(dyn_store, orchestrator, Duration::from_secs(300))))
}

#[tokio::test]
async fn overdue_daily_asset_is_scanned_once_and_advanced_24h()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = fixed_now();
    // next_scan_at three hours in the past.
    let asset = seed_asset(
        &store,
        ScanFrequency::Daily,
        Some(now.plus_seconds(-3 * 3600)),
        AssetStatus::Active,
        now.plus_days(-10),
    )?;

    let scheduler = scheduler(&store)?;
    scheduler.run_due_scans(now).await;

    let updated = store.get_asset(&asset.id)?.ok_or("asset missing")?;
    assert_eq!(updated.last_scan_at, Some(now));
    // Advanced by exactly one day from the tick time, not from the old slot.
    assert_eq!(updated.next_scan_at, Some(now.plus_days(1)));
    assert!(updated.last_risk_score.is_some());

    let schedule = store.schedule_for_asset(&asset.id)?.ok_or("schedule missing")?;
    assert_eq!(schedule.run_count, 1);
    assert!(schedule.last_scan_id.is_some());
    assert_eq!(schedule.last_error, None);

    let audit = store.audit_entries()?;
    assert!(audit.iter().any(|entry| entry.action == "scheduled_scan"));

    // A second tick at the same instant finds nothing due.
    scheduler.run_due_scans(now).await;
    let schedule = store.schedule_for_asset(&asset.id)?.ok_or("schedule missing")?;
    assert_eq!(schedule.run_count, 1);
    Ok(())
}

#[tokio::test]
async fn manual_and_paused_assets_are_never_picked_up()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let now = fixed_now();
    let manual = seed_asset(
        &store,
        ScanFrequency::Manual,
        Some(now.plus_days(-1)),
        AssetStatus::Active,
        now.plus_days(-10),
    )?;

    let scheduler = scheduler(&store)?;
    scheduler.run_due_scans(now).await;
    let untouched = store.get_asset(&manual.id)?.ok_or("asset missing")?;
    assert_eq!(untouched.last_scan_at, None);
    assert!(store.schedule_for_asset(&manual.id)?.is_none());
    Ok(())
}

#[tokio::test]
async fn start_and_stop_are_idempotent_with_status_snapshots()
-> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler(&store)?;
    assert!(!scheduler.status().running);

    scheduler.start();
    scheduler.start();
    let status = scheduler.status();
    assert!(status.running);
    assert_eq!(status.jobs.len(), 1);
    assert_eq!(status.jobs[0].job_id, "run_due_scans");

    scheduler.stop().await;
    scheduler.stop().await;
    assert!(!scheduler.status().running);
    assert!(scheduler.status().jobs.is_empty());
    Ok(())
}
