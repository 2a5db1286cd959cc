// crates/threatveil-core/src/interfaces/mod.rs
// ============================================================================
// Module: ThreatVeil Interfaces
// Description: Backend-agnostic interfaces for storage and prose capability.
// Purpose: Define the contract surfaces used by the engine and server.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how ThreatVeil integrates with external systems without
//! embedding backend specifics. The store traits are synchronous and
//! transactional per operation; the summary capability is asynchronous and
//! never authoritative. Absent capabilities are represented by explicit null
//! implementations with deterministic fallback, never by errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod memory;

pub use memory::MemoryStore;

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::identifiers::AssetId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::ScanId;
use crate::core::identifiers::WebhookId;
use crate::core::likelihood::Likelihoods;
use crate::core::records::AssetRecord;
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

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors returned by store implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested row does not exist.
    #[error("row not found: {0}")]
    NotFound(String),
    /// Uniqueness or state conflict.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Row (de)serialization failed.
    #[error("serialization failure: {0}")]
    Serialization(String),
    /// Backend reported an error.
    #[error("store backend failure: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Organization & Asset Store
// ============================================================================

/// Storage operations for organizations and their assets.
pub trait OrgStore {
    /// Finds an organization by its unique primary domain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn find_org_by_domain(&self, domain: &str) -> Result<Option<OrgRecord>, StoreError>;

    /// Fetches an organization by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_org(&self, org_id: &OrgId) -> Result<Option<OrgRecord>, StoreError>;

    /// Inserts a new organization.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the primary domain is taken.
    fn insert_org(&self, org: &OrgRecord) -> Result<(), StoreError>;

    /// Increments the organization's monthly scan counter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn bump_scan_counter(&self, org_id: &OrgId) -> Result<(), StoreError>;

    /// Inserts a new asset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_asset(&self, asset: &AssetRecord) -> Result<(), StoreError>;

    /// Updates an existing asset row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the asset does not exist.
    fn update_asset(&self, asset: &AssetRecord) -> Result<(), StoreError>;

    /// Fetches an asset by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_asset(&self, asset_id: &AssetId) -> Result<Option<AssetRecord>, StoreError>;

    /// Lists an organization's assets, excluding soft-deleted rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn assets_for_org(&self, org_id: &OrgId) -> Result<Vec<AssetRecord>, StoreError>;

    /// Selects assets due for a scheduled scan at `now`.
    ///
    /// Due means: active status, periodic frequency, and `next_scan_at` at
    /// or before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn due_assets(&self, now: Timestamp) -> Result<Vec<AssetRecord>, StoreError>;
}

// ============================================================================
// SECTION: Scan Store
// ============================================================================

/// Storage operations for scans and AI sub-scan catalogs.
pub trait ScanStore {
    /// Inserts a completed scan. Scans are immutable once written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_scan(&self, scan: &ScanRecord) -> Result<(), StoreError>;

    /// Fetches a scan by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_scan(&self, scan_id: &ScanId) -> Result<Option<ScanRecord>, StoreError>;

    /// Deletes a scan and its owned rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the scan does not exist.
    fn delete_scan(&self, scan_id: &ScanId) -> Result<(), StoreError>;

    /// Returns the most recent scan for a domain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn latest_scan_for_domain(&self, domain: &str) -> Result<Option<ScanRecord>, StoreError>;

    /// Returns the most recent scan for a domain strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn latest_scan_for_domain_after(
        &self,
        domain: &str,
        after: Timestamp,
    ) -> Result<Option<ScanRecord>, StoreError>;

    /// Returns the most recent scan for an organization strictly after `after`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn latest_scan_for_org_after(
        &self,
        org_id: &OrgId,
        after: Timestamp,
    ) -> Result<Option<ScanRecord>, StoreError>;

    /// Returns the scan for the same domain immediately preceding `scan_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when `scan_id` does not exist.
    fn previous_scan(&self, scan_id: &ScanId) -> Result<Option<ScanRecord>, StoreError>;

    /// Lists an organization's scans, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn scans_for_org(&self, org_id: &OrgId, limit: usize) -> Result<Vec<ScanRecord>, StoreError>;

    /// Inserts or replaces a scan's AI sub-scan catalog.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_scan_ai(&self, record: &ScanAiRecord) -> Result<(), StoreError>;

    /// Fetches a scan's AI sub-scan catalog.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_scan_ai(&self, scan_id: &ScanId) -> Result<Option<ScanAiRecord>, StoreError>;

    /// Lists recent signals for an organization filtered by minimum severity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn signals_for_org(
        &self,
        org_id: &OrgId,
        min_severity: Option<Severity>,
        limit: usize,
    ) -> Result<Vec<Signal>, StoreError>;
}

// ============================================================================
// SECTION: Decision Store
// ============================================================================

/// Storage operations for decisions, impacts, and verification artifacts.
pub trait DecisionStore {
    /// Inserts a generated decision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the deterministic id exists.
    fn insert_decision(&self, decision: &DecisionRecord) -> Result<(), StoreError>;

    /// Fetches a decision by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_decision(&self, decision_id: &DecisionId) -> Result<Option<DecisionRecord>, StoreError>;

    /// Replaces a decision row (lifecycle mutations only).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the decision does not exist.
    fn update_decision(&self, decision: &DecisionRecord) -> Result<(), StoreError>;

    /// Lists decisions for a scan in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn decisions_for_scan(&self, scan_id: &ScanId) -> Result<Vec<DecisionRecord>, StoreError>;

    /// Lists decisions for an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn decisions_for_org(&self, org_id: &OrgId) -> Result<Vec<DecisionRecord>, StoreError>;

    /// Lists resolved, not-yet-verified decisions for a domain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn resolved_unverified_for_domain(
        &self,
        domain: &str,
    ) -> Result<Vec<DecisionRecord>, StoreError>;

    /// Inserts or replaces a decision's impact row (idempotent per decision).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_impact(&self, impact: &DecisionImpactRecord) -> Result<(), StoreError>;

    /// Fetches a decision's impact row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_impact(&self, decision_id: &DecisionId)
    -> Result<Option<DecisionImpactRecord>, StoreError>;

    /// Deletes a decision's impact row, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_impact(&self, decision_id: &DecisionId) -> Result<(), StoreError>;

    /// Appends a verification run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_verification_run(&self, run: &VerificationRunRecord) -> Result<(), StoreError>;

    /// Lists a decision's verification runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn verification_runs(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Vec<VerificationRunRecord>, StoreError>;

    /// Appends a verification evidence snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_evidence(&self, snapshot: &EvidenceSnapshotRecord) -> Result<(), StoreError>;

    /// Lists a decision's evidence snapshots in capture order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn evidence_for_decision(
        &self,
        decision_id: &DecisionId,
    ) -> Result<Vec<EvidenceSnapshotRecord>, StoreError>;
}

// ============================================================================
// SECTION: Schedule Store
// ============================================================================

/// Storage operations for scan schedules.
pub trait ScheduleStore {
    /// Inserts or replaces the schedule for an asset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_schedule(&self, schedule: &ScheduleRecord) -> Result<(), StoreError>;

    /// Fetches the active schedule for an asset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn schedule_for_asset(&self, asset_id: &AssetId)
    -> Result<Option<ScheduleRecord>, StoreError>;
}

// ============================================================================
// SECTION: Webhook Store
// ============================================================================

/// Storage operations for webhooks and delivery logs.
pub trait WebhookStore {
    /// Inserts a webhook subscription.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_webhook(&self, webhook: &WebhookRecord) -> Result<(), StoreError>;

    /// Fetches a webhook by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_webhook(&self, webhook_id: &WebhookId) -> Result<Option<WebhookRecord>, StoreError>;

    /// Replaces a webhook row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the webhook does not exist.
    fn update_webhook(&self, webhook: &WebhookRecord) -> Result<(), StoreError>;

    /// Deletes a webhook and its delivery log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the webhook does not exist.
    fn delete_webhook(&self, webhook_id: &WebhookId) -> Result<(), StoreError>;

    /// Lists an organization's webhooks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn webhooks_for_org(&self, org_id: &OrgId) -> Result<Vec<WebhookRecord>, StoreError>;

    /// Lists enabled webhooks subscribed to an event type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn webhooks_for_event(
        &self,
        org_id: &OrgId,
        event: EventType,
    ) -> Result<Vec<WebhookRecord>, StoreError>;

    /// Inserts a delivery row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_delivery(&self, delivery: &DeliveryRecord) -> Result<(), StoreError>;

    /// Replaces a delivery row as attempts progress.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the delivery does not exist.
    fn update_delivery(&self, delivery: &DeliveryRecord) -> Result<(), StoreError>;

    /// Lists a webhook's deliveries, newest first, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn deliveries_for_webhook(
        &self,
        webhook_id: &WebhookId,
        limit: usize,
    ) -> Result<Vec<DeliveryRecord>, StoreError>;
}

// ============================================================================
// SECTION: Connector Store
// ============================================================================

/// Storage operations for external connectors.
pub trait ConnectorStore {
    /// Inserts a connector.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn insert_connector(&self, connector: &ConnectorRecord) -> Result<(), StoreError>;

    /// Replaces a connector row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the connector does not exist.
    fn update_connector(&self, connector: &ConnectorRecord) -> Result<(), StoreError>;

    /// Lists an organization's connectors.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn connectors_for_org(&self, org_id: &OrgId) -> Result<Vec<ConnectorRecord>, StoreError>;
}

// ============================================================================
// SECTION: Cache & Audit Store
// ============================================================================

/// Storage operations for content-addressed cache entries.
pub trait CacheStore {
    /// Fetches a cache entry by key, expired or not.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn cache_get(&self, key: &str) -> Result<Option<CacheEntryRecord>, StoreError>;

    /// Inserts or replaces a cache entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn cache_put(&self, entry: &CacheEntryRecord) -> Result<(), StoreError>;
}

/// Append-only audit log storage.
pub trait AuditStore {
    /// Appends an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn append_audit(&self, entry: &AuditLogRecord) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Posture Store
// ============================================================================

/// Complete storage surface required by the engine and server.
pub trait PostureStore:
    OrgStore
    + ScanStore
    + DecisionStore
    + ScheduleStore
    + WebhookStore
    + ConnectorStore
    + CacheStore
    + AuditStore
    + Send
    + Sync
{
}

impl<T> PostureStore for T where
    T: OrgStore
        + ScanStore
        + DecisionStore
        + ScheduleStore
        + WebhookStore
        + ConnectorStore
        + CacheStore
        + AuditStore
        + Send
        + Sync
{
}

// ============================================================================
// SECTION: Summary Capability
// ============================================================================

/// Errors returned by summary providers.
///
/// # Invariants
/// - Variants are stable; callers always substitute the deterministic
///   fallback on error.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// Provider call failed.
    #[error("summary provider failure: {0}")]
    Provider(String),
}

/// Inputs for summary generation.
#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    /// Signals produced by the scan.
    pub signals: &'a [Signal],
    /// Aggregate risk score.
    pub risk_score: u8,
    /// Breach likelihood estimates.
    pub likelihoods: Likelihoods,
}

/// Non-authoritative prose capability.
///
/// Implementations produce cosmetic summaries only; every score and decision
/// stays deterministic regardless of what this returns.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    /// Produces a prose summary for a completed scan.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError`] when the provider call fails; callers fall
    /// back to [`fallback_summary`].
    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, SummaryError>;
}

/// Null capability: always produces the deterministic template.
///
/// Wired when no summary API key is configured, so a missing capability is
/// data rather than an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSummary;

#[async_trait]
impl SummaryProvider for NullSummary {
    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, SummaryError> {
        Ok(fallback_summary(&input))
    }
}

/// Builds the deterministic fallback summary from top signal details.
#[must_use]
pub fn fallback_summary(input: &SummaryInput<'_>) -> String {
    let high: Vec<&str> = input
        .signals
        .iter()
        .filter(|s| matches!(s.severity, Severity::High | Severity::Critical))
        .take(3)
        .map(|s| s.detail.as_str())
        .collect();
    let medium: Vec<&str> = input
        .signals
        .iter()
        .filter(|s| s.severity == Severity::Medium)
        .take(2)
        .map(|s| s.detail.as_str())
        .collect();
    let bullets = if high.is_empty() && medium.is_empty() {
        "No critical misconfigurations detected.".to_string()
    } else {
        let mut parts = high;
        parts.extend(medium);
        parts.join("; ")
    };
    format!(
        "Risk score {}/100. Focus on {bullets}. Estimated breach likelihood: {:.0}% (30d) and {:.0}% (90d).",
        input.risk_score,
        input.likelihoods.thirty_day * 100.0,
        input.likelihoods.ninety_day * 100.0,
    )
}
