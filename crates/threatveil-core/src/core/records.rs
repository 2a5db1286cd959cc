// crates/threatveil-core/src/core/records.rs
// ============================================================================
// Module: ThreatVeil Persisted Records
// Description: Entity records shared by the store, engine, and server.
// Purpose: One shape per persisted entity with stable serialization.
// Dependencies: crate::core::{confidence, decision, identifiers, signal, time}, serde
// ============================================================================

//! ## Overview
//! Records are the canonical in-memory form of every persisted entity. The
//! SQLite store serializes them; the engine mutates them only through the
//! operations the specification allows (scans are immutable once written,
//! decisions change only via the lifecycle machine).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::ai::AiExposureLevel;
use crate::core::confidence::ConfidenceTier;
use crate::core::decision::ActionId;
use crate::core::decision::DecisionStatus;
use crate::core::decision::VerificationResult;
use crate::core::identifiers::AssetId;
use crate::core::identifiers::ConnectorId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::DeliveryId;
use crate::core::identifiers::EvidenceId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::ScanId;
use crate::core::identifiers::ScheduleId;
use crate::core::identifiers::VerificationRunId;
use crate::core::identifiers::WebhookId;
use crate::core::likelihood::Likelihoods;
use crate::core::signal::Category;
use crate::core::signal::Severity;
use crate::core::signal::Signal;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Organization
// ============================================================================

/// Plan tier governing the monthly scan quota.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Free tier with a monthly scan limit.
    #[default]
    Free,
    /// Paid tier without the free-plan quota check.
    Pro,
}

/// Tenant root. Identified by a unique primary domain.
///
/// # Invariants
/// - `primary_domain` is unique across organizations.
/// - `scans_this_month <= scans_limit` is enforced before enqueue on the
///   free plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgRecord {
    /// Organization identifier.
    pub id: OrgId,
    /// Display name.
    pub name: String,
    /// Unique primary domain.
    pub primary_domain: String,
    /// Plan tier.
    pub plan: PlanTier,
    /// Scans consumed this calendar month.
    pub scans_this_month: u32,
    /// Monthly scan quota.
    pub scans_limit: u32,
    /// Creation time.
    pub created_at: Timestamp,
}

impl OrgRecord {
    /// Default monthly scan quota for new organizations.
    pub const DEFAULT_SCANS_LIMIT: u32 = 30;

    /// Returns true when another scan may be enqueued under the plan quota.
    #[must_use]
    pub const fn within_scan_quota(&self) -> bool {
        match self.plan {
            PlanTier::Free => self.scans_this_month < self.scans_limit,
            PlanTier::Pro => true,
        }
    }
}

// ============================================================================
// SECTION: Asset
// ============================================================================

/// Asset variants. Only domain and code-org assets are probed.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// DNS domain.
    Domain,
    /// Code hosting organization.
    CodeOrg,
    /// Cloud tenant (metadata only).
    CloudAccount,
    /// SaaS vendor (metadata only).
    SaasVendor,
}

impl AssetKind {
    /// Returns true when this asset kind is actively probed.
    #[must_use]
    pub const fn is_probed(self) -> bool {
        matches!(self, Self::Domain | Self::CodeOrg)
    }
}

/// Asset status.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Eligible for scheduled scanning.
    Active,
    /// Temporarily excluded from scheduling.
    Paused,
    /// Soft-deleted.
    Deleted,
}

/// Scan frequency for continuous monitoring.
///
/// # Invariants
/// - Variants are stable for serialization; `Manual` assets are never picked
///   up by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanFrequency {
    /// Scan daily.
    Daily,
    /// Scan weekly.
    Weekly,
    /// Scan monthly.
    Monthly,
    /// Scan only on demand.
    Manual,
}

impl ScanFrequency {
    /// Returns the scheduling interval in whole days, if periodic.
    #[must_use]
    pub const fn interval_days(self) -> Option<i64> {
        match self {
            Self::Daily => Some(1),
            Self::Weekly => Some(7),
            Self::Monthly => Some(30),
            Self::Manual => None,
        }
    }
}

/// A scannable or tracked entity belonging to one organization.
///
/// # Invariants
/// - `risk_weight` is within `[0.1, 2.0]`.
/// - Active assets with a periodic frequency always carry `next_scan_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Asset identifier.
    pub id: AssetId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Asset variant.
    pub kind: AssetKind,
    /// Asset name (domain, organization slug, account id, vendor name).
    pub name: String,
    /// Risk-weight multiplier used in org-level aggregation.
    pub risk_weight: f64,
    /// Priority level (1 is highest).
    pub priority: u8,
    /// Monitoring frequency.
    pub frequency: ScanFrequency,
    /// Asset status.
    pub status: AssetStatus,
    /// Last completed scan time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_at: Option<Timestamp>,
    /// Next scheduled scan time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scan_at: Option<Timestamp>,
    /// Risk score from the last completed scan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_risk_score: Option<u8>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl AssetRecord {
    /// Lower bound of the risk-weight multiplier.
    pub const MIN_RISK_WEIGHT: f64 = 0.1;
    /// Upper bound of the risk-weight multiplier.
    pub const MAX_RISK_WEIGHT: f64 = 2.0;

    /// Clamps a requested risk weight into the allowed range.
    #[must_use]
    pub fn clamp_risk_weight(weight: f64) -> f64 {
        weight.clamp(Self::MIN_RISK_WEIGHT, Self::MAX_RISK_WEIGHT)
    }
}

// ============================================================================
// SECTION: Scan
// ============================================================================

/// Per-category score entry.
///
/// # Invariants
/// - `score` is within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Clamped category score.
    pub score: u8,
    /// Weight applied during aggregation.
    pub weight: f64,
    /// Severity label derived from the clamped score.
    pub severity: Severity,
}

/// One execution over one asset at one moment. Immutable once written.
///
/// # Invariants
/// - `risk_score` is within `[0, 100]`.
/// - `signals` is never empty in a completed scan.
/// - `raw_payload` is keyed by probe name for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Scan identifier.
    pub id: ScanId,
    /// Owning organization, when linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<OrgId>,
    /// Scanned domain.
    pub domain: String,
    /// Optional code organization scanned alongside the domain.
    #[serde(default, rename = "github_org", skip_serializing_if = "Option::is_none")]
    pub code_org: Option<String>,
    /// Aggregate risk score.
    pub risk_score: u8,
    /// Per-category scores.
    pub categories: BTreeMap<Category, CategoryScore>,
    /// Normalized signals produced by the scan.
    pub signals: Vec<Signal>,
    /// Prose summary (non-authoritative).
    pub summary: String,
    /// Breach likelihood estimates.
    #[serde(flatten)]
    pub likelihoods: Likelihoods,
    /// Raw per-probe payloads keyed by probe name.
    pub raw_payload: BTreeMap<String, Value>,
    /// Number of probes that failed and were absorbed as signals.
    pub partial_failures: u32,
    /// Creation time.
    pub created_at: Timestamp,
}

/// AI sub-scan catalog attached to a scan.
///
/// # Invariants
/// - `ai_score` is within `[0, 100]` and `exposure` is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAiRecord {
    /// Scan the catalog belongs to.
    pub scan_id: ScanId,
    /// Detected AI tool names.
    pub ai_tools: Vec<String>,
    /// Detected AI-related files.
    pub ai_files: Vec<Value>,
    /// Detected agent configurations.
    pub ai_agents: Vec<Value>,
    /// Detected AI key leaks.
    pub ai_keys: Vec<Value>,
    /// AI exposure score.
    pub ai_score: u8,
    /// Coarse exposure level derived from the score.
    pub exposure: AiExposureLevel,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// A deterministically derived remediation item.
///
/// # Invariants
/// - `status` in `{resolved, verified}` implies `resolved_at` is set.
/// - `status = verified` implies the decision passed through `resolved`.
/// - Mutated only through the lifecycle state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Decision identifier (deterministic per scan and action).
    pub id: DecisionId,
    /// Originating scan.
    pub scan_id: ScanId,
    /// Owning organization, when linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<OrgId>,
    /// Domain the originating scan covered.
    pub domain: String,
    /// Code organization the originating scan covered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_org: Option<String>,
    /// Remediation action identifier.
    pub action: ActionId,
    /// Decision title.
    pub title: String,
    /// Recommended-fix prose.
    pub recommended_fix: String,
    /// Effort estimate.
    pub effort: String,
    /// Estimated risk reduction percentage.
    pub reduction_percent: u8,
    /// Rule priority (1 is highest).
    pub priority: u8,
    /// Lifecycle status.
    pub status: DecisionStatus,
    /// Risk score of the originating scan.
    pub before_score: u8,
    /// Risk score of the first scan after resolution, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_score: Option<u8>,
    /// Time the decision was accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<Timestamp>,
    /// Time the decision was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Timestamp>,
    /// Time the decision was verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<Timestamp>,
    /// Scan that verified the decision, when bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_scan_id: Option<ScanId>,
    /// Verification confidence copied onto the decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    /// Explanation of the confidence value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_reason: Option<String>,
    /// Optional business-impact note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

/// Measured risk delta for a resolved decision. One-to-one per decision.
///
/// # Invariants
/// - At most one row per decision; creation is idempotent per decision id.
/// - `confidence` is one of the four tier values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionImpactRecord {
    /// Decision the impact belongs to.
    pub decision_id: DecisionId,
    /// Risk score before resolution.
    pub risk_before: u8,
    /// Risk score after resolution, when an after-scan exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_after: Option<u8>,
    /// `risk_after - risk_before`, when an after-scan exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i16>,
    /// Confidence tier for the measurement.
    pub confidence: ConfidenceTier,
    /// Explanation of any non-1.0 confidence.
    pub notes: String,
    /// Computation time.
    pub computed_at: Timestamp,
}

/// One verification attempt on a decision.
///
/// # Invariants
/// - `confidence` is one of the four tier values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRunRecord {
    /// Run identifier.
    pub id: VerificationRunId,
    /// Decision under verification.
    pub decision_id: DecisionId,
    /// Run outcome.
    pub result: VerificationResult,
    /// Confidence in the outcome.
    pub confidence: f64,
    /// Explanation of the outcome.
    pub notes: String,
    /// Evidence snapshot captured during the run.
    pub evidence: Value,
    /// Run time.
    pub created_at: Timestamp,
}

/// Stage of a verification evidence snapshot.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStage {
    /// State captured before the fix.
    Before,
    /// State captured after the fix.
    After,
    /// Computed difference between the two.
    Diff,
}

/// Before/after snapshot captured during verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshotRecord {
    /// Snapshot identifier.
    pub id: EvidenceId,
    /// Decision the snapshot belongs to.
    pub decision_id: DecisionId,
    /// Snapshot stage tag.
    pub stage: EvidenceStage,
    /// Snapshot payload.
    pub payload: Value,
    /// Capture time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Scheduling
// ============================================================================

/// Schedule status.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Schedule is live.
    Active,
    /// Schedule is paused.
    Paused,
}

/// Per-asset scheduling record.
///
/// # Invariants
/// - `next_run_at` advances exactly once per completed scheduled run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Schedule identifier.
    pub id: ScheduleId,
    /// Asset being scheduled.
    pub asset_id: AssetId,
    /// Monitoring frequency.
    pub frequency: ScanFrequency,
    /// Next scheduled run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<Timestamp>,
    /// Last completed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<Timestamp>,
    /// Scan produced by the last run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_id: Option<ScanId>,
    /// Schedule status.
    pub status: ScheduleStatus,
    /// Completed run count.
    pub run_count: u32,
    /// Failed run count.
    pub error_count: u32,
    /// Last failure message, cleared on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// ============================================================================
// SECTION: Webhooks
// ============================================================================

/// Event types emitted to webhooks.
///
/// # Invariants
/// - Wire names are the published dotted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Weekly brief generated.
    #[serde(rename = "weekly_brief.generated")]
    WeeklyBriefGenerated,
    /// Decision created.
    #[serde(rename = "decision.created")]
    DecisionCreated,
    /// Decision verified.
    #[serde(rename = "decision.verified")]
    DecisionVerified,
    /// Organization risk score changed.
    #[serde(rename = "risk.score_changed")]
    RiskScoreChanged,
    /// Endpoint test event.
    #[serde(rename = "test")]
    Test,
}

impl EventType {
    /// Returns the stable wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeeklyBriefGenerated => "weekly_brief.generated",
            Self::DecisionCreated => "decision.created",
            Self::DecisionVerified => "decision.verified",
            Self::RiskScoreChanged => "risk.score_changed",
            Self::Test => "test",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "weekly_brief.generated" => Some(Self::WeeklyBriefGenerated),
            "decision.created" => Some(Self::DecisionCreated),
            "decision.verified" => Some(Self::DecisionVerified),
            "risk.score_changed" => Some(Self::RiskScoreChanged),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

/// Webhook subscription.
///
/// # Invariants
/// - `secret` signs every delivery body; it is never logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRecord {
    /// Webhook identifier.
    pub id: WebhookId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Delivery URL.
    pub url: String,
    /// HMAC signing secret.
    pub secret: String,
    /// Subscribed event set.
    pub events: BTreeSet<EventType>,
    /// Custom headers attached to deliveries.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Whether deliveries are dispatched.
    pub enabled: bool,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Delivery status.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created, not yet delivered.
    Pending,
    /// Delivered with a 2xx response.
    Success,
    /// Exhausted all attempts.
    Failed,
}

/// One webhook delivery with its attempt history.
///
/// # Invariants
/// - `attempts <= max_attempts`.
/// - `response_body` is truncated to the recorded cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Delivery identifier (also the `X-ThreatVeil-Delivery` header value).
    pub id: DeliveryId,
    /// Webhook the delivery targets.
    pub webhook_id: WebhookId,
    /// Event type delivered.
    pub event: EventType,
    /// Event payload.
    pub payload: Value,
    /// Delivery status.
    pub status: DeliveryStatus,
    /// Attempts made so far.
    pub attempts: u32,
    /// Maximum attempts before the delivery fails.
    pub max_attempts: u32,
    /// Last HTTP response code, when a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
    /// Last response body, truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    /// Final error string, when the delivery failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

// ============================================================================
// SECTION: Connectors
// ============================================================================

/// Connector status.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorStatus {
    /// Connector is syncing.
    Active,
    /// Connector is disabled.
    Disabled,
    /// Last sync failed.
    Error,
}

/// External integration with sealed credentials.
///
/// # Invariants
/// - `credentials_sealed` is an authenticated-encryption blob; plaintext
///   credentials never appear in a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    /// Connector identifier.
    pub id: ConnectorId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Provider slug.
    pub provider: String,
    /// Provider-specific configuration.
    pub config: Value,
    /// Sealed credentials blob (nonce-prefixed ciphertext).
    pub credentials_sealed: Vec<u8>,
    /// Connector status.
    pub status: ConnectorStatus,
    /// Last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<Timestamp>,
    /// Last sync failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Audit Log
// ============================================================================

/// Append-only audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogRecord {
    /// Owning organization.
    pub org_id: OrgId,
    /// Action label (for example `scheduled_scan`).
    pub action: String,
    /// Resource type the action touched.
    pub resource_type: String,
    /// Resource identifier the action touched.
    pub resource_id: String,
    /// Structured detail payload.
    pub details: Value,
    /// Entry time.
    pub created_at: Timestamp,
}

// ============================================================================
// SECTION: Cache Entries
// ============================================================================

/// Content-addressed cache entry.
///
/// # Invariants
/// - `key` is the `namespace:digest` form produced by
///   [`crate::core::hashing::cache_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryRecord {
    /// Content-addressed key.
    pub key: String,
    /// Cached JSON blob.
    pub value: Value,
    /// Expiry time.
    pub expires_at: Timestamp,
}
