// crates/threatveil-engine/src/lifecycle.rs
// ============================================================================
// Module: Decision Lifecycle Service
// Description: Applies lifecycle transitions to persisted decisions.
// Purpose: The only mutation path for decision status and its side effects.
// Dependencies: threatveil-core, crate::impact, serde_json
// ============================================================================

//! ## Overview
//! Status changes come exclusively through this service: the core state
//! machine validates the edge and yields a transition plan, this service
//! applies the plan's timestamp and cleanup effects, persists the row, runs
//! the entering-resolved and entering-verified side effects, and appends a
//! `decision_transition` audit entry. Impact computation failures are
//! swallowed so a transition never blocks on measurement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use threatveil_core::AuditLogRecord;
use threatveil_core::DecisionId;
use threatveil_core::DecisionRecord;
use threatveil_core::DecisionStatus;
use threatveil_core::PostureStore;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;
use threatveil_core::TransitionError;

use crate::impact::ImpactService;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lifecycle service errors.
///
/// # Invariants
/// - Variants are stable for API status mapping.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Decision does not exist.
    #[error("decision not found: {0}")]
    NotFound(DecisionId),
    /// The requested edge is not in the lifecycle graph.
    #[error(transparent)]
    Transition(#[from] TransitionError),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Transition Outcome
// ============================================================================

/// Result of a successful transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The decision after the transition.
    pub decision: DecisionRecord,
    /// `before_score - after_score` when entering resolved bound an
    /// after-scan.
    pub risk_delta: Option<i16>,
}

// ============================================================================
// SECTION: Lifecycle Service
// ============================================================================

/// Decision lifecycle service.
pub struct DecisionLifecycle {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
    /// Impact computation invoked on entering resolved.
    impact: Arc<ImpactService>,
}

impl DecisionLifecycle {
    /// Creates the service over its collaborators.
    #[must_use]
    pub const fn new(store: Arc<dyn PostureStore>, impact: Arc<ImpactService>) -> Self {
        Self {
            store,
            impact,
        }
    }

    /// Applies one lifecycle transition.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the decision is missing, the edge is
    /// illegal, or persistence fails. Impact computation failures are
    /// swallowed.
    pub fn transition(
        &self,
        decision_id: &DecisionId,
        to: DecisionStatus,
        now: Timestamp,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let mut decision = self
            .store
            .get_decision(decision_id)?
            .ok_or_else(|| LifecycleError::NotFound(decision_id.clone()))?;
        let plan = decision.status.plan_transition(to)?;
        let from = decision.status;

        decision.status = to;
        decision.updated_at = now;
        if plan.sets_accepted_at {
            decision.accepted_at = Some(now);
        }
        if plan.clears_resolution {
            decision.resolved_at = None;
            decision.after_score = None;
        }
        if plan.clears_verification {
            decision.verified_at = None;
            decision.verification_scan_id = None;
        }
        if plan.drops_impact {
            self.store.delete_impact(&decision.id)?;
        }

        let mut risk_delta = None;
        if plan.sets_resolved_at {
            decision.resolved_at = Some(now);
            // The latest scan for the same domain records the after-state
            // known at resolution time.
            if let Some(scan) = self.store.latest_scan_for_domain(&decision.domain)? {
                decision.after_score = Some(scan.risk_score);
                risk_delta =
                    Some(i16::from(decision.before_score) - i16::from(scan.risk_score));
            }
        }
        if plan.sets_verified_at {
            decision.verified_at = Some(now);
            if let Some(resolved_at) = decision.resolved_at
                && let Some(scan) =
                    self.store.latest_scan_for_domain_after(&decision.domain, resolved_at)?
            {
                decision.verification_scan_id = Some(scan.id);
            }
        }

        self.store.update_decision(&decision)?;
        self.append_audit(&decision, from, now);

        if plan.recomputes_impact
            && let Err(err) = self.impact.compute(&decision, now)
        {
            // Impact is measurement, not state; the transition stands.
            tracing::warn!(decision_id = %decision.id, error = %err, "impact computation failed");
        }

        Ok(TransitionOutcome {
            decision,
            risk_delta,
        })
    }

    /// Appends the decision-transition audit entry.
    fn append_audit(&self, decision: &DecisionRecord, from: DecisionStatus, now: Timestamp) {
        let Some(org_id) = &decision.org_id else {
            return;
        };
        let entry = AuditLogRecord {
            org_id: org_id.clone(),
            action: "decision_transition".to_string(),
            resource_type: "decision".to_string(),
            resource_id: decision.id.to_string(),
            details: json!({
                "action_id": decision.action,
                "from": from,
                "to": decision.status,
                "scan_id": decision.scan_id,
            }),
            created_at: now,
        };
        if let Err(err) = self.store.append_audit(&entry) {
            tracing::warn!(decision_id = %decision.id, error = %err, "audit append failed");
        }
    }
}
