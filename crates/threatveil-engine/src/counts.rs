// crates/threatveil-engine/src/counts.rs
// ============================================================================
// Module: Snapshot Counts
// Description: Per-action trigger counts extracted from a scan snapshot.
// Purpose: Feed impact tiering, verification, and auto-verification.
// Dependencies: threatveil-core
// ============================================================================

//! ## Overview
//! Every per-action "did the triggering signal disappear" test reduces to
//! comparing counts between two scan snapshots. This module extracts those
//! counts once from a scan and its AI catalog so impact, verification, and
//! auto-verification all reason over the same numbers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use threatveil_core::ActionId;
use threatveil_core::ScanAiRecord;
use threatveil_core::ScanRecord;
use threatveil_core::count_agent_tools;
use threatveil_core::count_cve_signals;
use threatveil_core::count_data_exposure_signals;
use threatveil_core::count_network_signals;
use threatveil_core::count_tls_signals;

// ============================================================================
// SECTION: Snapshot Counts
// ============================================================================

/// Trigger-relevant counts for one scan snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotCounts {
    /// High-or-worse CVE-tagged signals.
    pub cve_high: usize,
    /// Data-exposure signals.
    pub data_exposure: usize,
    /// TLS-sourced signals at medium severity or above.
    pub tls_issues: usize,
    /// Non-low network signals.
    pub network_issues: usize,
    /// Agent-framework tools in the AI catalog.
    pub agent_tools: usize,
    /// Leaked AI keys in the AI catalog.
    pub ai_keys: usize,
}

impl SnapshotCounts {
    /// Extracts counts from a scan and its optional AI catalog.
    #[must_use]
    pub fn from_scan(scan: &ScanRecord, ai: Option<&ScanAiRecord>) -> Self {
        Self {
            cve_high: count_cve_signals(&scan.signals),
            data_exposure: count_data_exposure_signals(&scan.signals),
            tls_issues: count_tls_signals(&scan.signals),
            network_issues: count_network_signals(&scan.signals),
            agent_tools: ai.map_or(0, |record| count_agent_tools(&record.ai_tools)),
            ai_keys: ai.map_or(0, |record| record.ai_keys.len()),
        }
    }

    /// Returns the count relevant to one action's trigger.
    ///
    /// `None` for actions whose trigger has no count-based disappearance
    /// test.
    #[must_use]
    pub const fn for_action(&self, action: ActionId) -> Option<usize> {
        match action {
            ActionId::KeyRotation => Some(self.ai_keys),
            ActionId::PatchCves => Some(self.cve_high),
            ActionId::ReviewAgents => Some(self.agent_tools),
            ActionId::AuditData => Some(self.data_exposure),
            ActionId::UpdateTls => Some(self.tls_issues),
            ActionId::ReviewNetwork => Some(self.network_issues),
            ActionId::AuditAiTools => None,
        }
    }

    /// Tests whether an action's triggering count strictly decreased.
    ///
    /// `None` when the action has no count-based test.
    #[must_use]
    pub fn strictly_decreased(before: &Self, after: &Self, action: ActionId) -> Option<bool> {
        match (before.for_action(action), after.for_action(action)) {
            (Some(before_count), Some(after_count)) => Some(after_count < before_count),
            _ => None,
        }
    }

    /// Tests whether an action's triggering signal is fully gone.
    ///
    /// `None` when the action has no count-based test (audits are never
    /// auto-verified).
    #[must_use]
    pub const fn fully_resolved(after: &Self, action: ActionId) -> Option<bool> {
        match after.for_action(action) {
            Some(count) => Some(count == 0),
            None => None,
        }
    }
}
