// crates/threatveil-engine/src/impact.rs
// ============================================================================
// Module: Impact Service
// Description: Risk-delta measurement for resolved decisions.
// Purpose: Produce the one-per-decision impact row with its confidence tier.
// Dependencies: threatveil-core, crate::counts
// ============================================================================

//! ## Overview
//! When a decision enters the resolved state, the impact service measures
//! the risk delta: the decision's before-score against the first scan after
//! resolution. Confidence follows the fixed four-value ladder from scan
//! recency and whether the action's triggering signal strictly decreased.
//! Impact rows are idempotent per decision and failures here never block a
//! status transition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use threatveil_core::ConfidenceTier;
use threatveil_core::DecisionImpactRecord;
use threatveil_core::DecisionRecord;
use threatveil_core::PostureStore;
use threatveil_core::ScanRecord;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;

use crate::counts::SnapshotCounts;

// ============================================================================
// SECTION: Impact Service
// ============================================================================

/// Impact computation for resolved decisions.
pub struct ImpactService {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
}

impl ImpactService {
    /// Creates the service over the given store.
    #[must_use]
    pub const fn new(store: Arc<dyn PostureStore>) -> Self {
        Self {
            store,
        }
    }

    /// Computes (or recomputes) the impact row for a resolved decision.
    ///
    /// Idempotent per decision id: repeated calls replace the same row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails; callers treat this as
    /// non-blocking and log it.
    pub fn compute(
        &self,
        decision: &DecisionRecord,
        now: Timestamp,
    ) -> Result<DecisionImpactRecord, StoreError> {
        let after_scan = self.find_after_scan(decision)?;
        let (confidence, risk_after) = match &after_scan {
            None => (ConfidenceTier::NoAfterScan, None),
            Some(scan) => {
                let age_days = now.whole_days_since(scan.created_at);
                let disappeared = self.signal_disappeared(decision, scan)?;
                (ConfidenceTier::classify(Some(age_days), disappeared), Some(scan.risk_score))
            }
        };
        let delta = risk_after
            .map(|after| i16::from(after) - i16::from(decision.before_score));
        let impact = DecisionImpactRecord {
            decision_id: decision.id.clone(),
            risk_before: decision.before_score,
            risk_after,
            delta,
            confidence,
            notes: confidence.reason().to_string(),
            computed_at: now,
        };
        self.store.upsert_impact(&impact)?;
        Ok(impact)
    }

    /// Finds the scan measuring the decision's after-state.
    ///
    /// First the most recent scan for the organization strictly after the
    /// resolution time, else the most recent scan for the domain newer than
    /// the decision itself.
    fn find_after_scan(
        &self,
        decision: &DecisionRecord,
    ) -> Result<Option<ScanRecord>, StoreError> {
        if let (Some(org_id), Some(resolved_at)) = (&decision.org_id, decision.resolved_at)
            && let Some(scan) = self.store.latest_scan_for_org_after(org_id, resolved_at)?
        {
            return Ok(Some(scan));
        }
        self.store.latest_scan_for_domain_after(&decision.domain, decision.created_at)
    }

    /// Tests whether the action's triggering signal strictly decreased
    /// between the originating scan and the after-scan.
    ///
    /// `None` when the originating scan is gone or the action has no
    /// count-based test.
    fn signal_disappeared(
        &self,
        decision: &DecisionRecord,
        after_scan: &ScanRecord,
    ) -> Result<Option<bool>, StoreError> {
        let Some(before_scan) = self.store.get_scan(&decision.scan_id)? else {
            return Ok(None);
        };
        let before_ai = self.store.get_scan_ai(&before_scan.id)?;
        let after_ai = self.store.get_scan_ai(&after_scan.id)?;
        let before = SnapshotCounts::from_scan(&before_scan, before_ai.as_ref());
        let after = SnapshotCounts::from_scan(after_scan, after_ai.as_ref());
        Ok(SnapshotCounts::strictly_decreased(&before, &after, decision.action))
    }
}
