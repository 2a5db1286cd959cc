// crates/threatveil-core/src/core/decision.rs
// ============================================================================
// Module: ThreatVeil Decision Engine
// Description: Fixed remediation rule set and the decision lifecycle machine.
// Purpose: Derive a bounded, ordered decision set and govern status changes.
// Dependencies: crate::core::{ai, signal}, serde, thiserror
// ============================================================================

//! ## Overview
//! Decisions are derived deterministically from a scan snapshot: the rule
//! table is fixed, evaluated in priority order, and truncated to three
//! entries. No randomness and no model output participate. The lifecycle
//! state machine below is the only way a persisted decision changes status;
//! entering or leaving the resolved and verified states carries explicit
//! timestamp and cleanup effects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ai::has_agent_tool;
use crate::core::signal::Category;
use crate::core::signal::Severity;
use crate::core::signal::Signal;
use crate::core::signal::SignalKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of decisions generated per scan.
pub const MAX_DECISIONS_PER_SCAN: usize = 3;

/// Evidence source label emitted by the TLS probe.
const TLS_SOURCE: &str = "tls";

// ============================================================================
// SECTION: Action Identifiers
// ============================================================================

/// Fixed remediation action identifiers.
///
/// # Invariants
/// - Variants are stable; wire ids match the published rule table.
/// - Priority ordering is ascending (1 is most urgent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionId {
    /// Rotate exposed AI credentials.
    KeyRotation,
    /// Patch high-severity vulnerabilities.
    PatchCves,
    /// Review agent-framework access controls.
    ReviewAgents,
    /// Audit data access policies.
    AuditData,
    /// Update certificate configuration.
    UpdateTls,
    /// Review network exposure.
    ReviewNetwork,
    /// Audit AI tool usage.
    AuditAiTools,
}

impl ActionId {
    /// All actions in priority order.
    pub const ALL: [Self; 7] = [
        Self::KeyRotation,
        Self::PatchCves,
        Self::ReviewAgents,
        Self::AuditData,
        Self::UpdateTls,
        Self::ReviewNetwork,
        Self::AuditAiTools,
    ];

    /// Returns the stable wire identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeyRotation => "key-rotation",
            Self::PatchCves => "patch-cves",
            Self::ReviewAgents => "review-agents",
            Self::AuditData => "audit-data",
            Self::UpdateTls => "update-tls",
            Self::ReviewNetwork => "review-network",
            Self::AuditAiTools => "audit-ai-tools",
        }
    }

    /// Parses a wire identifier.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == raw)
    }

    /// Returns the decision title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::KeyRotation => "Rotate Exposed Credentials",
            Self::PatchCves => "Patch Critical Vulnerabilities",
            Self::ReviewAgents => "Review Agent Access Controls",
            Self::AuditData => "Audit Data Access Policies",
            Self::UpdateTls => "Update Certificate Configuration",
            Self::ReviewNetwork => "Review Network Exposure",
            Self::AuditAiTools => "Audit AI Tool Usage",
        }
    }

    /// Returns the effort estimate.
    #[must_use]
    pub const fn effort(self) -> &'static str {
        match self {
            Self::KeyRotation => "~1h",
            Self::PatchCves => "2-4h",
            Self::ReviewAgents => "2h",
            Self::AuditData => "1-2h",
            Self::UpdateTls => "30m",
            Self::ReviewNetwork | Self::AuditAiTools => "1h",
        }
    }

    /// Returns the estimated risk reduction percentage.
    #[must_use]
    pub const fn reduction_percent(self) -> u8 {
        match self {
            Self::KeyRotation => 25,
            Self::PatchCves => 20,
            Self::ReviewAgents | Self::AuditData => 15,
            Self::UpdateTls | Self::ReviewNetwork => 10,
            Self::AuditAiTools => 5,
        }
    }

    /// Returns the rule priority (1 is highest).
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::KeyRotation => 1,
            Self::PatchCves => 2,
            Self::ReviewAgents => 3,
            Self::AuditData => 4,
            Self::UpdateTls => 5,
            Self::ReviewNetwork => 6,
            Self::AuditAiTools => 7,
        }
    }

    /// Returns the recommended-fix prose.
    #[must_use]
    pub const fn recommended_fix(self) -> &'static str {
        match self {
            Self::KeyRotation => {
                "Revoke the exposed API keys, issue replacements from the provider console, \
                 and move secrets into a managed secret store."
            }
            Self::PatchCves => {
                "Upgrade the affected components to patched releases and redeploy; verify the \
                 advisories no longer apply to the running versions."
            }
            Self::ReviewAgents => {
                "Inventory agent-framework deployments, restrict their tool and data access to \
                 the minimum required, and gate autonomous actions behind approvals."
            }
            Self::AuditData => {
                "Review which repositories and records are publicly reachable, remove exposed \
                 files, and tighten access policies on data stores."
            }
            Self::UpdateTls => {
                "Renew the certificate before expiry and confirm the full chain is served; \
                 enable automated renewal where the host supports it."
            }
            Self::ReviewNetwork => {
                "Walk the externally visible surface (DNS records, open endpoints, redirects) \
                 and close or harden anything that does not need to be public."
            }
            Self::AuditAiTools => {
                "Catalog the AI services in use, confirm each has an owner and a data-handling \
                 policy, and retire integrations nobody claims."
            }
        }
    }
}

// ============================================================================
// SECTION: Decision Generation
// ============================================================================

/// Snapshot inputs for decision generation.
///
/// # Invariants
/// - `ai_tools` and `ai_key_leaks` come from the scan's AI sub-scan; both may
///   be empty.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    /// Signals produced by the scan.
    pub signals: &'a [Signal],
    /// Detected AI tool names.
    pub ai_tools: &'a [String],
    /// Number of leaked AI keys detected.
    pub ai_key_leaks: usize,
}

/// A generated decision before persistence.
///
/// # Invariants
/// - `priority` matches the action's table priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionDraft {
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
}

impl DecisionDraft {
    /// Builds the draft for one action.
    fn for_action(action: ActionId) -> Self {
        Self {
            action,
            title: action.title().to_string(),
            recommended_fix: action.recommended_fix().to_string(),
            effort: action.effort().to_string(),
            reduction_percent: action.reduction_percent(),
            priority: action.priority(),
        }
    }
}

/// Generates the ordered decision set for a scan snapshot.
///
/// Rules are evaluated in priority order and the result is capped at
/// [`MAX_DECISIONS_PER_SCAN`]. Deterministic and idempotent: identical
/// inputs always yield the same drafts in the same order.
#[must_use]
pub fn generate_decisions(inputs: &DecisionInputs<'_>) -> Vec<DecisionDraft> {
    let mut drafts = Vec::new();
    for action in ActionId::ALL {
        if drafts.len() >= MAX_DECISIONS_PER_SCAN {
            break;
        }
        if rule_triggers(action, inputs, drafts.len()) {
            drafts.push(DecisionDraft::for_action(action));
        }
    }
    drafts
}

/// Evaluates one rule's trigger against the snapshot.
fn rule_triggers(action: ActionId, inputs: &DecisionInputs<'_>, selected: usize) -> bool {
    match action {
        ActionId::KeyRotation => inputs.ai_key_leaks > 0,
        ActionId::PatchCves => inputs
            .signals
            .iter()
            .any(|s| s.kind == SignalKind::Cve && s.severity >= Severity::High),
        ActionId::ReviewAgents => has_agent_tool(inputs.ai_tools),
        ActionId::AuditData => {
            inputs.signals.iter().any(|s| s.category == Category::DataExposure)
        }
        ActionId::UpdateTls => inputs.signals.iter().any(|s| {
            s.evidence.source_service == TLS_SOURCE
                && matches!(s.severity, Severity::High | Severity::Medium)
        }),
        ActionId::ReviewNetwork => {
            selected < MAX_DECISIONS_PER_SCAN
                && inputs
                    .signals
                    .iter()
                    .any(|s| s.category == Category::Network && s.severity != Severity::Low)
        }
        // Agent tools are handled by the review-agents rule; this one covers
        // plain AI tool usage that has no stronger match.
        ActionId::AuditAiTools => {
            selected < MAX_DECISIONS_PER_SCAN
                && inputs.ai_tools.iter().any(|tool| !has_agent_tool(std::slice::from_ref(tool)))
        }
    }
}

// ============================================================================
// SECTION: Decision Status
// ============================================================================

/// Decision lifecycle states.
///
/// # Invariants
/// - Variants are stable for serialization and API contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    /// Newly generated, not yet acknowledged.
    Pending,
    /// Acknowledged by the organization.
    Accepted,
    /// Remediation work underway.
    InProgress,
    /// Remediation reported complete.
    Resolved,
    /// Remediation independently verified.
    Verified,
}

impl DecisionStatus {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Verified => "verified",
        }
    }

    /// Parses a wire label.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Transition Plan
// ============================================================================

/// Lifecycle transition errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested transition is not in the lifecycle graph.
    #[error("cannot transition decision from {from:?} to {to:?}")]
    NotAllowed {
        /// Current status.
        from: DecisionStatus,
        /// Requested status.
        to: DecisionStatus,
    },
}

/// Effects a legal transition applies to the decision row.
///
/// # Invariants
/// - `sets_resolved_at` and `clears_resolution` are never both true.
/// - `drops_impact` implies the impact row must be deleted before any
///   recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionPlan {
    /// Set `accepted_at` to the transition time.
    pub sets_accepted_at: bool,
    /// Set `resolved_at` to the transition time.
    pub sets_resolved_at: bool,
    /// Set `verified_at` to the transition time.
    pub sets_verified_at: bool,
    /// Clear `resolved_at` and `after_score`.
    pub clears_resolution: bool,
    /// Clear `verified_at` and `verification_scan_id`.
    pub clears_verification: bool,
    /// Delete the decision's impact row.
    pub drops_impact: bool,
    /// Recompute the impact row after the transition (entering resolved).
    pub recomputes_impact: bool,
}

impl DecisionStatus {
    /// Plans a lifecycle transition.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotAllowed`] when the edge is not in the
    /// lifecycle graph.
    pub const fn plan_transition(self, to: Self) -> Result<TransitionPlan, TransitionError> {
        let plan = match (self, to) {
            (Self::Pending, Self::Accepted) | (Self::InProgress, Self::Accepted) => {
                TransitionPlan {
                    sets_accepted_at: true,
                    sets_resolved_at: false,
                    sets_verified_at: false,
                    clears_resolution: false,
                    clears_verification: false,
                    drops_impact: false,
                    recomputes_impact: false,
                }
            }
            (Self::Pending | Self::Accepted, Self::InProgress) => TransitionPlan {
                sets_accepted_at: false,
                sets_resolved_at: false,
                sets_verified_at: false,
                clears_resolution: false,
                clears_verification: false,
                drops_impact: false,
                recomputes_impact: false,
            },
            (Self::Pending | Self::InProgress, Self::Resolved) => TransitionPlan {
                sets_accepted_at: false,
                sets_resolved_at: true,
                sets_verified_at: false,
                clears_resolution: false,
                clears_verification: false,
                drops_impact: false,
                recomputes_impact: true,
            },
            (Self::Resolved, Self::Verified) => TransitionPlan {
                sets_accepted_at: false,
                sets_resolved_at: false,
                sets_verified_at: true,
                clears_resolution: false,
                clears_verification: false,
                drops_impact: false,
                recomputes_impact: false,
            },
            (Self::Resolved, Self::InProgress) => TransitionPlan {
                sets_accepted_at: false,
                sets_resolved_at: false,
                sets_verified_at: false,
                clears_resolution: true,
                clears_verification: true,
                drops_impact: true,
                recomputes_impact: false,
            },
            (Self::Verified, Self::Resolved) => TransitionPlan {
                sets_accepted_at: false,
                sets_resolved_at: true,
                sets_verified_at: false,
                clears_resolution: false,
                clears_verification: true,
                drops_impact: true,
                recomputes_impact: true,
            },
            (from, to) => {
                return Err(TransitionError::NotAllowed {
                    from,
                    to,
                });
            }
        };
        Ok(plan)
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Verification run outcomes.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationResult {
    /// The fix is observably deployed.
    Pass,
    /// The fix is observably absent.
    Fail,
    /// The fix could not be determined.
    Unknown,
}

impl VerificationResult {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Unknown => "unknown",
        }
    }
}

/// Verification rules matched from action keys.
///
/// The legacy `enable-hsts` and `fix-headers` keys alias onto the same HSTS
/// rule rather than existing as distinct entries.
///
/// # Invariants
/// - Variants are stable for rule dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationRule {
    /// Re-run the AI key code search and compare counts.
    KeyRotation,
    /// Re-fetch headers; pass when `strict-transport-security` is present.
    HstsHeader,
    /// Re-fetch headers; pass when a CSP (or report-only CSP) is present.
    CspHeader,
    /// Re-probe TLS; pass on validity with enough runway.
    UpdateTls,
    /// Compare CVE-tagged signal counts between scans.
    PatchCves,
    /// Compare agent-keyword tool counts between scans.
    ReviewAgents,
    /// Compare data-exposure signal counts between scans.
    AuditData,
    /// Compare non-low network signal counts between scans.
    ReviewNetwork,
}

impl VerificationRule {
    /// Matches an action key (wire id) onto a verification rule.
    ///
    /// Returns `None` for keys with no re-probe rule; those verifications
    /// resolve to `unknown`.
    #[must_use]
    pub fn from_action_key(key: &str) -> Option<Self> {
        match key {
            "key-rotation" => Some(Self::KeyRotation),
            "enable-hsts" | "fix-headers" => Some(Self::HstsHeader),
            "enable-csp" => Some(Self::CspHeader),
            "update-tls" => Some(Self::UpdateTls),
            "patch-cves" => Some(Self::PatchCves),
            "review-agents" => Some(Self::ReviewAgents),
            "audit-data" => Some(Self::AuditData),
            "review-network" => Some(Self::ReviewNetwork),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Signal Counters
// ============================================================================

/// Counts CVE-tagged signals at high severity or above.
#[must_use]
pub fn count_cve_signals(signals: &[Signal]) -> usize {
    signals.iter().filter(|s| s.kind == SignalKind::Cve && s.severity >= Severity::High).count()
}

/// Counts data-exposure signals.
#[must_use]
pub fn count_data_exposure_signals(signals: &[Signal]) -> usize {
    signals.iter().filter(|s| s.category == Category::DataExposure).count()
}

/// Counts TLS-sourced signals at medium severity or above.
#[must_use]
pub fn count_tls_signals(signals: &[Signal]) -> usize {
    signals
        .iter()
        .filter(|s| {
            s.evidence.source_service == TLS_SOURCE
                && matches!(s.severity, Severity::High | Severity::Medium | Severity::Critical)
        })
        .count()
}

/// Counts non-low network signals.
#[must_use]
pub fn count_network_signals(signals: &[Signal]) -> usize {
    signals
        .iter()
        .filter(|s| s.category == Category::Network && s.severity != Severity::Low)
        .count()
}

/// Counts agent-framework tools among detected AI tools.
#[must_use]
pub fn count_agent_tools(tools: &[String]) -> usize {
    tools.iter().filter(|tool| has_agent_tool(std::slice::from_ref(*tool))).count()
}
