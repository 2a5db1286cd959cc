// crates/threatveil-engine/src/decisions.rs
// ============================================================================
// Module: Decision Generation Service
// Description: Idempotent decision generation for a persisted scan.
// Purpose: Materialize the rule engine's drafts as stable decision rows.
// Dependencies: threatveil-core
// ============================================================================

//! ## Overview
//! Generation is idempotent per scan: decision ids are deterministic
//! composites of the scan id and action id, and a scan that already has
//! decisions returns them unchanged. Each new row copies the scan's risk
//! score into `before_score` and starts in the pending state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use threatveil_core::DecisionId;
use threatveil_core::DecisionInputs;
use threatveil_core::DecisionRecord;
use threatveil_core::DecisionStatus;
use threatveil_core::PostureStore;
use threatveil_core::ScanId;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;
use threatveil_core::generate_decisions;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Decision generation errors.
///
/// # Invariants
/// - Variants are stable for API status mapping.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Scan does not exist.
    #[error("scan not found: {0}")]
    ScanNotFound(ScanId),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Idempotent decision generator.
pub struct DecisionGenerator {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
}

impl DecisionGenerator {
    /// Creates the generator over the given store.
    #[must_use]
    pub const fn new(store: Arc<dyn PostureStore>) -> Self {
        Self {
            store,
        }
    }

    /// Generates (or returns the existing) decisions for a scan.
    ///
    /// Calling twice returns the same set with the same priorities and ids;
    /// no duplicate rows are created.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError`] when the scan is missing or persistence
    /// fails.
    pub fn generate_for_scan(
        &self,
        scan_id: &ScanId,
        now: Timestamp,
    ) -> Result<Vec<DecisionRecord>, GenerateError> {
        let scan = self
            .store
            .get_scan(scan_id)?
            .ok_or_else(|| GenerateError::ScanNotFound(scan_id.clone()))?;
        let existing = self.store.decisions_for_scan(scan_id)?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let ai = self.store.get_scan_ai(scan_id)?;
        let empty_tools = Vec::new();
        let inputs = DecisionInputs {
            signals: &scan.signals,
            ai_tools: ai.as_ref().map_or(&empty_tools, |record| &record.ai_tools),
            ai_key_leaks: ai.as_ref().map_or(0, |record| record.ai_keys.len()),
        };
        for draft in generate_decisions(&inputs) {
            let record = DecisionRecord {
                id: DecisionId::derived(scan_id, draft.action.as_str()),
                scan_id: scan_id.clone(),
                org_id: scan.org_id.clone(),
                domain: scan.domain.clone(),
                code_org: scan.code_org.clone(),
                action: draft.action,
                title: draft.title,
                recommended_fix: draft.recommended_fix,
                effort: draft.effort,
                reduction_percent: draft.reduction_percent,
                priority: draft.priority,
                status: DecisionStatus::Pending,
                before_score: scan.risk_score,
                after_score: None,
                accepted_at: None,
                resolved_at: None,
                verified_at: None,
                verification_scan_id: None,
                confidence_score: None,
                confidence_reason: None,
                business_impact: None,
                created_at: now,
                updated_at: now,
            };
            match self.store.insert_decision(&record) {
                Ok(()) => {}
                // A concurrent generation won the race; the read below
                // returns its rows.
                Err(StoreError::Conflict(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(self.store.decisions_for_scan(scan_id)?)
    }
}
