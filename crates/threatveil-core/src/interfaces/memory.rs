// crates/threatveil-core/src/interfaces/memory.rs
// ============================================================================
// Module: In-Memory Posture Store
// Description: Mutex-guarded reference implementation of the store traits.
// Purpose: Back tests and ephemeral deployments without a database.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`MemoryStore`] implements every storage trait over plain maps behind a
//! single mutex. It preserves the same ordering and filtering semantics as
//! the durable store so engine and server tests exercise real query
//! behavior, not stubs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::identifiers::AssetId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::ScanId;
use crate::core::identifiers::WebhookId;
use crate::core::records::AssetRecord;
use crate::core::records::AssetStatus;
use crate::core::records::AuditLogRecord;
use crate::core::records::CacheEntryRecord;
use crate::core::records::ConnectorRecord;
use crate::core::records::DecisionImpactRecord;
use crate::core::records::DecisionRecord;
use crate::core::records::DeliveryRecord;
use crate::core::records::EventType;
use crate::core::records::EvidenceSnapshotRecord;
use crate::core::records::OrgRecord;
use crate::core::records::ScanAiRecord;
use crate::core::records::ScanRecord;
use crate::core::records::ScheduleRecord;
use crate::core::records::VerificationRunRecord;
use crate::core::records::WebhookRecord;
use crate::core::signal::Severity;
use crate::core::signal::Signal;
use crate::core::time::Timestamp;
use crate::interfaces::AuditStore;
use crate::interfaces::CacheStore;
use crate::interfaces::ConnectorStore;
use crate::interfaces::DecisionStore;
use crate::interfaces::OrgStore;
use crate::interfaces::ScanStore;
use crate::interfaces::ScheduleStore;
use crate::interfaces::StoreError;
use crate::interfaces::WebhookStore;

use crate::core::decision::DecisionStatus;
use crate::core::identifiers::ConnectorId;

// ============================================================================
// SECTION: Inner State
// ============================================================================

/// Mutable state behind the store mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Organizations by id.
    orgs: BTreeMap<OrgId, OrgRecord>,
    /// Assets by id.
    assets: BTreeMap<AssetId, AssetRecord>,
    /// Scans by id.
    scans: BTreeMap<ScanId, ScanRecord>,
    /// AI catalogs by scan id.
    scan_ai: BTreeMap<ScanId, ScanAiRecord>,
    /// Decisions by id.
    decisions: BTreeMap<DecisionId, DecisionRecord>,
    /// Impact rows by decision id.
    impacts: BTreeMap<DecisionId, DecisionImpactRecord>,
    /// Verification runs in insertion order.
    verification_runs: Vec<VerificationRunRecord>,
    /// Evidence snapshots in insertion order.
    evidence: Vec<EvidenceSnapshotRecord>,
    /// Schedules by asset id.
    schedules: BTreeMap<AssetId, ScheduleRecord>,
    /// Webhooks by id.
    webhooks: BTreeMap<WebhookId, WebhookRecord>,
    /// Deliveries by id.
    deliveries: BTreeMap<DeliveryId, DeliveryRecord>,
    /// Connectors by id.
    connectors: BTreeMap<ConnectorId, ConnectorRecord>,
    /// Cache entries by key.
    cache: BTreeMap<String, CacheEntryRecord>,
    /// Audit entries in insertion order.
    audit: Vec<AuditLogRecord>,
}

// ============================================================================
// SECTION: Memory Store
// ============================================================================

/// In-memory reference store.
///
/// # Invariants
/// - Semantics (ordering, filters, idempotency) match the durable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Guarded state.
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, converting poisoning into a backend error.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }

    /// Returns all audit entries (test observability helper).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the mutex is poisoned.
    pub fn audit_entries(&self) -> Result<Vec<AuditLogRecord>, StoreError> {
        Ok(self.lock()?.audit.clone())
    }
}

impl OrgStore for MemoryStore {
    fn find_org_by_domain(&self, domain: &str) -> Result<Option<OrgRecord>, StoreError> {
        Ok(self.lock()?.orgs.values().find(|org| org.primary_domain == domain).cloned())
    }

    fn get_org(&self, org_id: &OrgId) -> Result<Option<OrgRecord>, StoreError> {
        Ok(self.lock()?.orgs.get(org_id).cloned())
    }

    fn insert_org(&self, org: &OrgRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.orgs.values().any(|existing| existing.primary_domain == org.primary_domain) {
            return Err(StoreError::Conflict(format!(
                "primary domain taken: {}",
                org.primary_domain
            )));
        }
        inner.orgs.insert(org.id.clone(), org.clone());
        Ok(())
    }

    fn bump_scan_counter(&self, org_id: &OrgId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let org = inner
            .orgs
            .get_mut(org_id)
            .ok_or_else(|| StoreError::NotFound(org_id.to_string()))?;
        org.scans_this_month += 1;
        Ok(())
    }

    fn insert_asset(&self, asset: &AssetRecord) -> Result<(), StoreError> {
        self.lock()?.assets.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    fn update_asset(&self, asset: &AssetRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.assets.contains_key(&asset.id) {
            return Err(StoreError::NotFound(asset.id.to_string()));
        }
        inner.assets.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    fn get_asset(&self, asset_id: &AssetId) -> Result<Option<AssetRecord>, StoreError> {
        Ok(self.lock()?.assets.get(asset_id).cloned())
    }

    fn assets_for_org(&self, org_id: &OrgId) -> Result<Vec<AssetRecord>, StoreError> {
        Ok(self
            .lock()?
            .assets
            .values()
            .filter(|asset| &asset.org_id == org_id && asset.status != AssetStatus::Deleted)
            .cloned()
            .collect())
    }

    fn due_assets(&self, now: Timestamp) -> Result<Vec<AssetRecord>, StoreError> {
        Ok(self
            .lock()?
            .assets
            .values()
            .filter(|asset| {
                asset.status == AssetStatus::Active
                    && asset.frequency.interval_days().is_some()
                    && asset.next_scan_at.is_some_and(|next| next <= now)
            })
            .cloned()
            .collect())
    }
}

impl ScanStore for MemoryStore {
    fn insert_scan(&self, scan: &ScanRecord) -> Result<(), StoreError> {
        self.lock()?.scans.insert(scan.id.clone(), scan.clone());
        Ok(())
    }

    fn get_scan(&self, scan_id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self.lock()?.scans.get(scan_id).cloned())
    }

    fn delete_scan(&self, scan_id: &ScanId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.scans.remove(scan_id).is_none() {
            return Err(StoreError::NotFound(scan_id.to_string()));
        }
        inner.scan_ai.remove(scan_id);
        Ok(())
    }

    fn latest_scan_for_domain(&self, domain: &str) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self
            .lock()?
            .scans
            .values()
            .filter(|scan| scan.domain == domain)
            .max_by_key(|scan| scan.created_at)
            .cloned())
    }

    fn latest_scan_for_domain_after(
        &self,
        domain: &str,
        after: Timestamp,
    ) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self
            .lock()?
            .scans
            .values()
            .filter(|scan| scan.domain == domain && scan.created_at > after)
            .max_by_key(|scan| scan.created_at)
            .cloned())
    }

    fn latest_scan_for_org_after(
        &self,
        org_id: &OrgId,
        after: Timestamp,
    ) -> Result<Option<ScanRecord>, StoreError> {
        Ok(self
            .lock()?
            .scans
            .values()
            .filter(|scan| scan.org_id.as_ref() == Some(org_id) && scan.created_at > after)
            .max_by_key(|scan| scan.created_at)
            .cloned())
    }

    fn previous_scan(&self, scan_id: &ScanId) -> Result<Option<ScanRecord>, StoreError> {
        let inner = self.lock()?;
        let current = inner
            .scans
            .get(scan_id)
            .ok_or_else(|| StoreError::NotFound(scan_id.to_string()))?;
        Ok(inner
            .scans
            .values()
            .filter(|scan| scan.domain == current.domain && scan.created_at < current.created_at)
            .max_by_key(|scan| scan.created_at)
            .cloned())
    }

    fn scans_for_org(&self, org_id: &OrgId, limit: usize) -> Result<Vec<ScanRecord>, StoreError> {
        let inner = self.lock()?;
        let mut scans: Vec<ScanRecord> = inner
            .scans
            .values()
            .filter(|scan| scan.org_id.as_ref() == Some(org_id))
            .cloned()
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        scans.truncate(limit);
        Ok(scans)
    }

    fn upsert_scan_ai(&self, record: &ScanAiRecord) -> Result<(), StoreError> {
        self.lock()?.scan_ai.insert(record.scan_id.clone(), record.clone());
        Ok(())
    }

    fn get_scan_ai(&self, scan_id: &ScanId) -> Result<Option<ScanAiRecord>, StoreError> {
        Ok(self.lock()?.scan_ai.get(scan_id).cloned())
    }

    fn signals_for_org(
        &self,
        org_id: &OrgId,
        min_severity: Option<Severity>,
        limit: usize,
    ) -> Result<Vec<Signal>, StoreError> {
        let inner = self.lock()?;
        let mut scans: Vec<&ScanRecord> = inner
            .scans
            .values()
            .filter(|scan| scan.org_id.as_ref() == Some(org_id))
            .collect();
        scans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut signals = Vec::new();
        for scan in scans {
            for signal in &scan.signals {
                if min_severity.is_none_or(|floor| signal.severity >= floor) {
                    signals.push(signal.clone());
                    if signals.len() >= limit {
                        return Ok(signals);
                    }
                }
            }
        }
        Ok(signals)
    }
}

impl DecisionStore for MemoryStore {
    fn insert_decision(&self, decision: &DecisionRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.decisions.contains_key(&decision.id) {
            return Err(StoreError::Conflict(decision.id.to_string()));
        }
        inner.decisions.insert(decision.id.clone(), decision.clone());
        Ok(())
    }

    fn get_decision(&self, decision_id: &DecisionId) -> Result<Option<DecisionRecord>, StoreError> {
        Ok(self.lock()?.decisions.get(decision_id).cloned())
    }

    fn update_decision(&self, decision: &DecisionRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.decisions.contains_key(&decision.id) {
            return Err(StoreError::NotFound(decision.id.to_string()));
        }
        inner.decisions.insert(decision.id.clone(), decision.clone());
        Ok(())
    }

    fn decisions_for_scan(&self, scan_id: &ScanId) -> Result<Vec<DecisionRecord>, StoreError> {
        let mut decisions: Vec<DecisionRecord> = self
            .lock()?
            .decisions
            .values()
            .filter(|decision| &decision.scan_id == scan_id)
            .cloned()
            .collect();
        decisions.sort_by_key(|decision| decision.priority);
        Ok(decisions)
    }

    fn decisions_for_org(&self, org_id: &OrgId) -> Result<Vec<DecisionRecord>, StoreError> {
        let mut decisions: Vec<DecisionRecord> = self
            .lock()?
            .decisions
            .values()
            .filter(|decision| decision.org_id.as_ref() == Some(org_id))
            .cloned()
            .collect();
        decisions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(decisions)
    }

    fn resolved_unverified_for_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        Ok(self
            .lock()?
            .decisions
            .values()
            .filter(|decision| {
                decision.domain == domain
                    && decision.status == DecisionStatus::Resolved
                    && decision.verified_at.is_none()
            })
            .cloned()
            .collect())
    }

    fn upsert_impact(&self, impact: &DecisionImpactRecord) -> Result<(), StoreError> {
        self.lock()?.impacts.insert(impact.decision_id.clone(), impact.clone());
        Ok(())
    }

    fn get_impact(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Option<DecisionImpactRecord>, StoreError> {
        Ok(self.lock()?.impacts.get(decision_id).cloned())
    }

    fn delete_impact(&self, decision_id: &DecisionId) -> Result<(), StoreError> {
        self.lock()?.impacts.remove(decision_id);
        Ok(())
    }

    fn insert_verification_run(&self, run: &VerificationRunRecord) -> Result<(), StoreError> {
        self.lock()?.verification_runs.push(run.clone());
        Ok(())
    }

    fn verification_runs(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Vec<VerificationRunRecord>, StoreError> {
        let mut runs: Vec<VerificationRunRecord> = self
            .lock()?
            .verification_runs
            .iter()
            .filter(|run| &run.decision_id == decision_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    fn insert_evidence(&self, snapshot: &EvidenceSnapshotRecord) -> Result<(), StoreError> {
        self.lock()?.evidence.push(snapshot.clone());
        Ok(())
    }

    fn evidence_for_decision(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Vec<EvidenceSnapshotRecord>, StoreError> {
        Ok(self
            .lock()?
            .evidence
            .iter()
            .filter(|snapshot| &snapshot.decision_id == decision_id)
            .cloned()
            .collect())
    }
}

impl ScheduleStore for MemoryStore {
    fn upsert_schedule(&self, schedule: &ScheduleRecord) -> Result<(), StoreError> {
        self.lock()?.schedules.insert(schedule.asset_id.clone(), schedule.clone());
        Ok(())
    }

    fn schedule_for_asset(
        &self,
        asset_id: &AssetId,
    ) -> Result<Option<ScheduleRecord>, StoreError> {
        Ok(self.lock()?.schedules.get(asset_id).cloned())
    }
}

impl WebhookStore for MemoryStore {
    fn insert_webhook(&self, webhook: &WebhookRecord) -> Result<(), StoreError> {
        self.lock()?.webhooks.insert(webhook.id.clone(), webhook.clone());
        Ok(())
    }

    fn get_webhook(&self, webhook_id: &WebhookId) -> Result<Option<WebhookRecord>, StoreError> {
        Ok(self.lock()?.webhooks.get(webhook_id).cloned())
    }

    fn update_webhook(&self, webhook: &WebhookRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.webhooks.contains_key(&webhook.id) {
            return Err(StoreError::NotFound(webhook.id.to_string()));
        }
        inner.webhooks.insert(webhook.id.clone(), webhook.clone());
        Ok(())
    }

    fn delete_webhook(&self, webhook_id: &WebhookId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.webhooks.remove(webhook_id).is_none() {
            return Err(StoreError::NotFound(webhook_id.to_string()));
        }
        inner.deliveries.retain(|_, delivery| &delivery.webhook_id != webhook_id);
        Ok(())
    }

    fn webhooks_for_org(&self, org_id: &OrgId) -> Result<Vec<WebhookRecord>, StoreError> {
        Ok(self
            .lock()?
            .webhooks
            .values()
            .filter(|webhook| &webhook.org_id == org_id)
            .cloned()
            .collect())
    }

    fn webhooks_for_event(
        &self,
        org_id: &OrgId,
        event: EventType,
    ) -> Result<Vec<WebhookRecord>, StoreError> {
        Ok(self
            .lock()?
            .webhooks
            .values()
            .filter(|webhook| {
                &webhook.org_id == org_id && webhook.enabled && webhook.events.contains(&event)
            })
            .cloned()
            .collect())
    }

    fn insert_delivery(&self, delivery: &DeliveryRecord) -> Result<(), StoreError> {
        self.lock()?.deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(())
    }

    fn update_delivery(&self, delivery: &DeliveryRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.deliveries.contains_key(&delivery.id) {
            return Err(StoreError::NotFound(delivery.id.to_string()));
        }
        inner.deliveries.insert(delivery.id.clone(), delivery.clone());
        Ok(())
    }

    fn deliveries_for_webhook(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        let mut deliveries: Vec<DeliveryRecord> = self
            .lock()?
            .deliveries
            .values()
            .filter(|delivery| &delivery.webhook_id == webhook_id)
            .cloned()
            .collect();
        deliveries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        deliveries.truncate(limit);
        Ok(deliveries)
    }
}

impl ConnectorStore for MemoryStore {
    fn insert_connector(&self, connector: &ConnectorRecord) -> Result<(), StoreError> {
        self.lock()?.connectors.insert(connector.id.clone(), connector.clone());
        Ok(())
    }

    fn update_connector(&self, connector: &ConnectorRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.connectors.contains_key(&connector.id) {
            return Err(StoreError::NotFound(connector.id.to_string()));
        }
        inner.connectors.insert(connector.id.clone(), connector.clone());
        Ok(())
    }

    fn connectors_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectorRecord>, StoreError> {
        Ok(self
            .lock()?
            .connectors
            .values()
            .filter(|connector| &connector.org_id == org_id)
            .cloned()
            .collect())
    }
}

impl CacheStore for MemoryStore {
    fn cache_get(&self, key: &str) -> Result<Option<CacheEntryRecord>, StoreError> {
        Ok(self.lock()?.cache.get(key).cloned())
    }

    fn cache_put(&self, entry: &CacheEntryRecord) -> Result<(), StoreError> {
        self.lock()?.cache.insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}

impl AuditStore for MemoryStore {
    fn append_audit(&self, entry: &AuditLogRecord) -> Result<(), StoreError> {
        self.lock()?.audit.push(entry.clone());
        Ok(())
    }
}
