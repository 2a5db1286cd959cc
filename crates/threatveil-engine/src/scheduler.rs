// crates/threatveil-engine/src/scheduler.rs
// ============================================================================
// Module: Continuous-Monitoring Scheduler
// Description: Periodic tick that scans due assets and advances schedules.
// Purpose: Keep posture current without blocking or duplicating scans.
// Dependencies: threatveil-core, crate::orchestrator, tokio
// ============================================================================

//! ## Overview
//! One scheduler instance per process. Each tick selects active,
//! periodically monitored assets whose `next_scan_at` has passed, scans
//! them one at a time, and advances their schedules. A failing asset
//! records its error and never halts the others. Start and stop are
//! idempotent; stop waits for the in-flight tick to drain.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use threatveil_core::AssetId;
use threatveil_core::AssetKind;
use threatveil_core::AssetRecord;
use threatveil_core::AuditLogRecord;
use threatveil_core::PostureStore;
use threatveil_core::ScanId;
use threatveil_core::ScheduleId;
use threatveil_core::ScheduleRecord;
use threatveil_core::ScheduleStatus;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::orchestrator::ScanOrchestrator;
use crate::orchestrator::ScanRequest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default tick period.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(5 * 60);
/// Job identifier reported in status snapshots.
const TICK_JOB_ID: &str = "run_due_scans";
/// Job name reported in status snapshots.
const TICK_JOB_NAME: &str = "Check and run due asset scans";

// ============================================================================
// SECTION: Status Snapshot
// ============================================================================

/// One scheduled job in a status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerJob {
    /// Job identifier.
    pub job_id: String,
    /// Human-readable job name.
    pub name: String,
    /// Next expected fire time.
    pub next_run_time: Option<Timestamp>,
}

/// Scheduler status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the tick task is running.
    pub running: bool,
    /// Registered jobs.
    pub jobs: Vec<SchedulerJob>,
}

// ============================================================================
// SECTION: Tick Worker
// ============================================================================

/// The per-tick work, shared between the loop task and manual ticks.
struct TickWorker {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
    /// Orchestrator invoked for each due asset.
    orchestrator: Arc<ScanOrchestrator>,
}

impl TickWorker {
    /// One tick: scan every due asset, isolating per-asset failures.
    async fn run_due_scans(&self, now: Timestamp) {
        let due = match self.store.due_assets(now) {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "due-asset query failed");
                return;
            }
        };
        if due.is_empty() {
            tracing::debug!("no assets due for scanning");
            return;
        }
        tracing::info!(count = due.len(), "assets due for scanning");
        for asset in due {
            let asset_id = asset.id.clone();
            if let Err(err) = self.scan_asset(asset, now).await {
                tracing::error!(asset_id = %asset_id, error = %err, "scheduled scan failed");
                self.record_schedule_error(&asset_id, &err);
            }
        }
    }

    /// Scans one asset and advances its schedule.
    async fn scan_asset(&self, mut asset: AssetRecord, now: Timestamp) -> Result<(), String> {
        let scan_id = if asset.kind == AssetKind::Domain {
            let request = ScanRequest {
                domain: asset.name.clone(),
                code_org: None,
            };
            let scan = self
                .orchestrator
                .run(&request, None, now)
                .await
                .map_err(|err| err.to_string())?;
            asset.last_risk_score = Some(scan.risk_score);
            Some(scan.id)
        } else {
            // Code orgs, cloud accounts, and SaaS vendors carry metadata
            // only; the schedule still advances.
            None
        };

        asset.last_scan_at = Some(now);
        if let Some(days) = asset.frequency.interval_days() {
            asset.next_scan_at = Some(now.plus_days(days));
        }
        self.store.update_asset(&asset).map_err(|err| err.to_string())?;
        self.advance_schedule(&asset, scan_id.clone(), now).map_err(|err| err.to_string())?;
        self.append_audit(&asset, scan_id, now);
        Ok(())
    }

    /// Advances (or creates) the asset's schedule after a successful run.
    fn advance_schedule(
        &self,
        asset: &AssetRecord,
        scan_id: Option<ScanId>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut schedule = self.store.schedule_for_asset(&asset.id)?.unwrap_or(ScheduleRecord {
            id: ScheduleId::random(),
            asset_id: asset.id.clone(),
            frequency: asset.frequency,
            next_run_at: asset.next_scan_at,
            last_run_at: None,
            last_scan_id: None,
            status: ScheduleStatus::Active,
            run_count: 0,
            error_count: 0,
            last_error: None,
        });
        schedule.frequency = asset.frequency;
        schedule.last_run_at = Some(now);
        schedule.next_run_at = asset.next_scan_at;
        schedule.last_scan_id = scan_id;
        schedule.run_count += 1;
        schedule.last_error = None;
        self.store.upsert_schedule(&schedule)
    }

    /// Records a scheduled-scan failure on the asset's schedule.
    fn record_schedule_error(&self, asset_id: &AssetId, error: &str) {
        let schedule = match self.store.schedule_for_asset(asset_id) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(asset_id = %asset_id, error = %err, "schedule lookup failed");
                None
            }
        };
        if let Some(mut schedule) = schedule {
            schedule.error_count += 1;
            schedule.last_error = Some(error.to_string());
            if let Err(err) = self.store.upsert_schedule(&schedule) {
                tracing::warn!(asset_id = %asset_id, error = %err, "schedule error update failed");
            }
        }
    }

    /// Appends the scheduled-scan audit entry.
    fn append_audit(&self, asset: &AssetRecord, scan_id: Option<ScanId>, now: Timestamp) {
        let entry = AuditLogRecord {
            org_id: asset.org_id.clone(),
            action: "scheduled_scan".to_string(),
            resource_type: "asset".to_string(),
            resource_id: asset.id.to_string(),
            details: json!({
                "asset_name": asset.name,
                "asset_kind": asset.kind,
                "scan_id": scan_id,
                "frequency": asset.frequency,
            }),
            created_at: now,
        };
        if let Err(err) = self.store.append_audit(&entry) {
            tracing::warn!(asset_id = %asset.id, error = %err, "audit append failed");
        }
    }
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Running-state for one scheduler instance.
struct RunningState {
    /// Tick task handle.
    handle: JoinHandle<()>,
    /// Shutdown signal for the tick loop.
    shutdown: Arc<Notify>,
}

/// Continuous-monitoring scheduler.
///
/// # Invariants
/// - Exactly one instance per process; `start`/`stop` are idempotent.
/// - `next_scan_at` advances exactly once per completed scheduled run.
pub struct MonitorScheduler {
    /// Shared per-tick worker.
    worker: Arc<TickWorker>,
    /// Tick period.
    period: Duration,
    /// Running state when started.
    running: Mutex<Option<RunningState>>,
    /// Next expected tick time for status snapshots.
    next_tick: Arc<Mutex<Option<Timestamp>>>,
}

impl MonitorScheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(
        store: Arc<dyn PostureStore>,
        orchestrator: Arc<ScanOrchestrator>,
        period: Duration,
    ) -> Self {
        Self {
            worker: Arc::new(TickWorker {
                store,
                orchestrator,
            }),
            period,
            running: Mutex::new(None),
            next_tick: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts the tick task. Idempotent: a running scheduler is untouched.
    pub fn start(&self) {
        let Ok(mut running) = self.running.lock() else {
            return;
        };
        if running.is_some() {
            tracing::warn!("scheduler already running");
            return;
        }
        let shutdown = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&shutdown);
        let worker = Arc::clone(&self.worker);
        let next_tick = Arc::clone(&self.next_tick);
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick of a tokio interval fires immediately; consume
            // it so the scheduler waits one full period before scanning.
            interval.tick().await;
            let period_secs = i64::try_from(period.as_secs()).unwrap_or(i64::MAX);
            loop {
                if let Ok(mut slot) = next_tick.lock() {
                    *slot = Some(Timestamp::now().plus_seconds(period_secs));
                }
                tokio::select! {
                    () = stop_signal.notified() => break,
                    _ = interval.tick() => {
                        worker.run_due_scans(Timestamp::now()).await;
                    }
                }
            }
        });
        *running = Some(RunningState {
            handle,
            shutdown,
        });
        tracing::info!(period_secs = self.period.as_secs(), "scheduler started");
    }

    /// Stops the tick task, draining any in-flight tick. Idempotent.
    pub async fn stop(&self) {
        let state = {
            let Ok(mut running) = self.running.lock() else {
                return;
            };
            running.take()
        };
        let Some(state) = state else {
            tracing::warn!("scheduler not running");
            return;
        };
        state.shutdown.notify_one();
        if let Err(err) = state.handle.await {
            tracing::warn!(error = %err, "scheduler task join failed");
        }
        if let Ok(mut next_tick) = self.next_tick.lock() {
            *next_tick = None;
        }
        tracing::info!("scheduler stopped");
    }

    /// Returns the status snapshot.
    #[must_use]
    pub fn status(&self) -> SchedulerStatus {
        let running = self.running.lock().map(|state| state.is_some()).unwrap_or(false);
        let next_run_time = self.next_tick.lock().ok().and_then(|slot| *slot);
        let jobs = if running {
            vec![SchedulerJob {
                job_id: TICK_JOB_ID.to_string(),
                name: TICK_JOB_NAME.to_string(),
                next_run_time,
            }]
        } else {
            Vec::new()
        };
        SchedulerStatus {
            running,
            jobs,
        }
    }

    /// Runs one tick immediately (manual trigger and tests).
    pub async fn run_due_scans(&self, now: Timestamp) {
        self.worker.run_due_scans(now).await;
    }
}
