// crates/threatveil-engine/src/verification.rs
// ============================================================================
// Module: Verification Engine
// Description: Per-action re-probes that prove a fix is deployed.
// Purpose: Turn resolved decisions into verified ones with tiered confidence.
// Dependencies: threatveil-core, threatveil-probes, crate::counts
// ============================================================================

//! ## Overview
//! Verification is independent of impact measurement: it re-probes the
//! specific surface an action claims to have fixed. Header actions re-fetch
//! the domain's HTTPS headers, the TLS action re-runs the handshake, the
//! key-rotation action re-runs the AI key search, and the count-based
//! actions compare the originating scan against the latest one. Every run
//! is recorded with before/after evidence; a pass advances the decision to
//! verified. The post-scan auto-verification pass applies the same rule
//! matching against a freshly committed scan and never fails that scan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use threatveil_core::ConfidenceTier;
use threatveil_core::DecisionId;
use threatveil_core::DecisionRecord;
use threatveil_core::DecisionStatus;
use threatveil_core::EvidenceId;
use threatveil_core::EvidenceSnapshotRecord;
use threatveil_core::EvidenceStage;
use threatveil_core::PostureStore;
use threatveil_core::ScanId;
use threatveil_core::ScanRecord;
use threatveil_core::StoreError;
use threatveil_core::Timestamp;
use threatveil_core::VerificationResult;
use threatveil_core::VerificationRule;
use threatveil_core::VerificationRunId;
use threatveil_core::VerificationRunRecord;
use threatveil_probes::CodeSearchProbe;
use threatveil_probes::HttpProbe;
use threatveil_probes::Probe;
use threatveil_probes::ProbeContext;
use threatveil_probes::TlsProbe;

use crate::counts::SnapshotCounts;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Days of certificate runway required for a high-confidence TLS pass.
const TLS_HIGH_CONFIDENCE_RUNWAY_DAYS: i64 = 30;
/// Confidence assigned when no verification rule exists for an action.
const NO_RULE_CONFIDENCE: ConfidenceTier = ConfidenceTier::StaleAfterScan;
/// Confidence assigned when the verification probe itself failed.
const PROBE_FAILURE_CONFIDENCE: ConfidenceTier = ConfidenceTier::NoAfterScan;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Verification service errors.
///
/// Probe failures never appear here; they produce `unknown` runs.
///
/// # Invariants
/// - Variants are stable for API status mapping.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Decision does not exist.
    #[error("decision not found: {0}")]
    NotFound(DecisionId),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Rule Evaluation Result
// ============================================================================

/// Outcome of evaluating one verification rule.
struct RuleOutcome {
    /// Pass, fail, or unknown.
    result: VerificationResult,
    /// Confidence tier for the outcome.
    confidence: ConfidenceTier,
    /// Explanation recorded on the run.
    notes: String,
    /// Before-state evidence payload, when captured.
    before: Option<Value>,
    /// After-state evidence payload, when captured.
    after: Option<Value>,
    /// Comparison scan used, when one was.
    comparison_scan: Option<ScanId>,
}

impl RuleOutcome {
    /// Builds an `unknown` outcome with the given tier and notes.
    fn unknown(confidence: ConfidenceTier, notes: impl Into<String>) -> Self {
        Self {
            result: VerificationResult::Unknown,
            confidence,
            notes: notes.into(),
            before: None,
            after: None,
            comparison_scan: None,
        }
    }
}

// ============================================================================
// SECTION: Verification Engine
// ============================================================================

/// Per-action verification engine.
pub struct VerificationEngine {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
    /// HTTP probe for header re-fetches.
    http: Arc<HttpProbe>,
    /// TLS probe for certificate re-probes.
    tls: Arc<TlsProbe>,
    /// Code-search probe for key-rotation re-counts.
    code_search: Arc<CodeSearchProbe>,
}

impl VerificationEngine {
    /// Creates the engine over its probes and store.
    #[must_use]
    pub fn new(
        store: Arc<dyn PostureStore>,
        http: Arc<HttpProbe>,
        tls: Arc<TlsProbe>,
        code_search: Arc<CodeSearchProbe>,
    ) -> Self {
        Self {
            store,
            http,
            tls,
            code_search,
        }
    }

    /// Runs verification for a decision and records the run.
    ///
    /// On a pass the decision advances to verified with the run's
    /// confidence copied onto it.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] when the decision is missing or persistence
    /// fails; probe failures produce `unknown` runs instead of errors.
    pub async fn verify(
        &self,
        decision_id: &DecisionId,
        now: Timestamp,
    ) -> Result<VerificationRunRecord, VerifyError> {
        let decision = self
            .store
            .get_decision(decision_id)?
            .ok_or_else(|| VerifyError::NotFound(decision_id.clone()))?;

        let outcome = match VerificationRule::from_action_key(decision.action.as_str()) {
            None => RuleOutcome::unknown(
                NO_RULE_CONFIDENCE,
                format!("no verification rule for action {}", decision.action.as_str()),
            ),
            Some(rule) => self.evaluate(rule, &decision, now).await?,
        };

        let run = VerificationRunRecord {
            id: VerificationRunId::random(),
            decision_id: decision.id.clone(),
            result: outcome.result,
            confidence: outcome.confidence.value(),
            notes: outcome.notes.clone(),
            evidence: json!({
                "before": outcome.before.clone(),
                "after": outcome.after.clone(),
            }),
            created_at: now,
        };
        self.store.insert_verification_run(&run)?;
        if let Some(before) = outcome.before {
            self.record_evidence(&decision.id, EvidenceStage::Before, before, now)?;
        }
        if let Some(after) = outcome.after {
            self.record_evidence(&decision.id, EvidenceStage::After, after, now)?;
        }

        if outcome.result == VerificationResult::Pass {
            self.advance_to_verified(
                decision,
                outcome.comparison_scan,
                outcome.confidence,
                &outcome.notes,
                now,
            )?;
        }
        Ok(run)
    }

    /// Auto-verification pass over a freshly committed scan.
    ///
    /// Advances every matching resolved decision whose triggering signal is
    /// fully gone in the new scan. Never fails the enclosing scan.
    pub async fn auto_verify_for_scan(&self, scan: &ScanRecord, now: Timestamp) {
        let candidates = match self.store.resolved_unverified_for_domain(&scan.domain) {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::warn!(scan_id = %scan.id, error = %err, "auto-verification query failed");
                return;
            }
        };
        if candidates.is_empty() {
            return;
        }
        let scan_ai = self.store.get_scan_ai(&scan.id).ok().flatten();
        let after = SnapshotCounts::from_scan(scan, scan_ai.as_ref());
        for decision in candidates {
            let eligible = decision
                .resolved_at
                .is_some_and(|resolved_at| resolved_at <= scan.created_at);
            if !eligible {
                continue;
            }
            if SnapshotCounts::fully_resolved(&after, decision.action) != Some(true) {
                continue;
            }
            let decision_id = decision.id.clone();
            if let Err(err) = self.advance_to_verified(
                decision,
                Some(scan.id.clone()),
                ConfidenceTier::RecentConfirmed,
                "Verified: triggering signal no longer detected",
                now,
            ) {
                tracing::warn!(
                    decision_id = %decision_id,
                    error = %err,
                    "auto-verification failed"
                );
            } else {
                tracing::info!(decision_id = %decision_id, scan_id = %scan.id, "decision auto-verified");
            }
        }
    }

    /// Evaluates one rule against a decision.
    async fn evaluate(
        &self,
        rule: VerificationRule,
        decision: &DecisionRecord,
        now: Timestamp,
    ) -> Result<RuleOutcome, VerifyError> {
        let ctx = ProbeContext {
            domain: decision.domain.clone(),
            code_org: decision.code_org.clone(),
            observed_at: now,
        };
        let outcome = match rule {
            VerificationRule::KeyRotation => self.verify_key_rotation(decision, now).await?,
            VerificationRule::HstsHeader => {
                self.verify_header_present(&ctx, &["strict-transport-security"]).await
            }
            VerificationRule::CspHeader => {
                self.verify_header_present(
                    &ctx,
                    &["content-security-policy", "content-security-policy-report-only"],
                )
                .await
            }
            VerificationRule::UpdateTls => self.verify_tls(&ctx).await,
            VerificationRule::PatchCves
            | VerificationRule::ReviewAgents
            | VerificationRule::AuditData
            | VerificationRule::ReviewNetwork => self.verify_by_comparison(decision, now)?,
        };
        Ok(outcome)
    }

    /// Key rotation: re-run the AI key search and compare counts.
    async fn verify_key_rotation(
        &self,
        decision: &DecisionRecord,
        now: Timestamp,
    ) -> Result<RuleOutcome, VerifyError> {
        let Some(code_org) = decision.code_org.as_deref() else {
            return Ok(RuleOutcome::unknown(
                NO_RULE_CONFIDENCE,
                "decision has no code organization to re-probe",
            ));
        };
        let original = self
            .store
            .get_scan_ai(&decision.scan_id)?
            .map_or(0, |record| record.ai_keys.len());
        match self.code_search.ai_indicators(code_org, now).await {
            Err(err) => Ok(RuleOutcome::unknown(
                PROBE_FAILURE_CONFIDENCE,
                format!("key re-probe failed: {err}"),
            )),
            Ok(indicators) => {
                let current = indicators.key_leaks.len();
                let passed = current < original;
                Ok(RuleOutcome {
                    result: if passed {
                        VerificationResult::Pass
                    } else {
                        VerificationResult::Fail
                    },
                    confidence: ConfidenceTier::RecentConfirmed,
                    notes: format!("exposed AI keys: {original} before, {current} now"),
                    before: Some(json!({ "ai_keys": original })),
                    after: Some(json!({ "ai_keys": current })),
                    comparison_scan: None,
                })
            }
        }
    }

    /// Header rules: re-fetch HTTPS headers and check presence.
    async fn verify_header_present(
        &self,
        ctx: &ProbeContext,
        accepted: &[&str],
    ) -> RuleOutcome {
        match self.http.run(ctx).await {
            Err(err) => RuleOutcome::unknown(
                PROBE_FAILURE_CONFIDENCE,
                format!("header re-fetch failed: {err}"),
            ),
            Ok(outcome) => {
                let headers = outcome
                    .metadata
                    .get("headers")
                    .and_then(Value::as_object)
                    .map(|map| map.keys().cloned().collect::<Vec<_>>())
                    .unwrap_or_default();
                let present =
                    accepted.iter().any(|header| headers.iter().any(|h| h == header));
                RuleOutcome {
                    result: if present {
                        VerificationResult::Pass
                    } else {
                        VerificationResult::Fail
                    },
                    confidence: ConfidenceTier::RecentConfirmed,
                    notes: if present {
                        format!("required header present ({})", accepted.join(" or "))
                    } else {
                        format!("required header still missing ({})", accepted.join(" or "))
                    },
                    before: None,
                    after: Some(json!({ "headers": headers })),
                    comparison_scan: None,
                }
            }
        }
    }

    /// TLS rule: re-probe the certificate and check runway.
    async fn verify_tls(&self, ctx: &ProbeContext) -> RuleOutcome {
        match self.tls.run(ctx).await {
            Err(err) => RuleOutcome::unknown(
                PROBE_FAILURE_CONFIDENCE,
                format!("tls re-probe failed: {err}"),
            ),
            Ok(outcome) => {
                let days = outcome
                    .metadata
                    .get("days_to_expiry")
                    .and_then(Value::as_i64);
                let after = Some(outcome.metadata.clone());
                match days {
                    Some(days) if days > TLS_HIGH_CONFIDENCE_RUNWAY_DAYS => RuleOutcome {
                        result: VerificationResult::Pass,
                        confidence: ConfidenceTier::RecentConfirmed,
                        notes: format!("certificate valid with {days} days of runway"),
                        before: None,
                        after,
                        comparison_scan: None,
                    },
                    Some(days) if days > 0 => RuleOutcome {
                        result: VerificationResult::Pass,
                        confidence: ConfidenceTier::RecentAmbiguous,
                        notes: format!("certificate valid but only {days} days of runway"),
                        before: None,
                        after,
                        comparison_scan: None,
                    },
                    Some(days) => RuleOutcome {
                        result: VerificationResult::Fail,
                        confidence: ConfidenceTier::RecentConfirmed,
                        notes: format!("certificate expired ({days} days)"),
                        before: None,
                        after,
                        comparison_scan: None,
                    },
                    None => RuleOutcome {
                        result: VerificationResult::Fail,
                        confidence: ConfidenceTier::RecentConfirmed,
                        notes: "tls endpoint unreachable or certificate unavailable".to_string(),
                        before: None,
                        after,
                        comparison_scan: None,
                    },
                }
            }
        }
    }

    /// Count-based rules: compare the originating scan with the latest one.
    fn verify_by_comparison(
        &self,
        decision: &DecisionRecord,
        now: Timestamp,
    ) -> Result<RuleOutcome, VerifyError> {
        let Some(before_scan) = self.store.get_scan(&decision.scan_id)? else {
            return Ok(RuleOutcome::unknown(
                NO_RULE_CONFIDENCE,
                "originating scan no longer exists",
            ));
        };
        let latest = self.store.latest_scan_for_domain(&decision.domain)?;
        let Some(after_scan) = latest.filter(|scan| scan.id != before_scan.id) else {
            return Ok(RuleOutcome::unknown(
                PROBE_FAILURE_CONFIDENCE,
                "no scan has completed since the decision was created",
            ));
        };
        let before_ai = self.store.get_scan_ai(&before_scan.id)?;
        let after_ai = self.store.get_scan_ai(&after_scan.id)?;
        let before = SnapshotCounts::from_scan(&before_scan, before_ai.as_ref());
        let after = SnapshotCounts::from_scan(&after_scan, after_ai.as_ref());
        let decreased = SnapshotCounts::strictly_decreased(&before, &after, decision.action);
        let age_days = now.whole_days_since(after_scan.created_at);
        let confidence = ConfidenceTier::classify(Some(age_days), decreased);
        let (result, notes) = match decreased {
            Some(true) => (
                VerificationResult::Pass,
                "triggering signal count strictly decreased".to_string(),
            ),
            Some(false) => (
                VerificationResult::Fail,
                "triggering signal count did not decrease".to_string(),
            ),
            None => (
                VerificationResult::Unknown,
                "action has no count-based verification test".to_string(),
            ),
        };
        Ok(RuleOutcome {
            result,
            confidence,
            notes,
            before: Some(json!({
                "scan_id": before_scan.id,
                "count": before.for_action(decision.action),
            })),
            after: Some(json!({
                "scan_id": after_scan.id,
                "count": after.for_action(decision.action),
            })),
            comparison_scan: Some(after_scan.id),
        })
    }

    /// Advances a decision to verified after a pass.
    fn advance_to_verified(
        &self,
        mut decision: DecisionRecord,
        comparison_scan: Option<ScanId>,
        confidence: ConfidenceTier,
        reason: &str,
        now: Timestamp,
    ) -> Result<(), VerifyError> {
        // Only resolved decisions advance; a pass on any other state is
        // recorded but does not move the lifecycle.
        let Ok(plan) = decision.status.plan_transition(DecisionStatus::Verified) else {
            return Ok(());
        };
        if plan.sets_verified_at {
            decision.verified_at = Some(now);
        }
        decision.status = DecisionStatus::Verified;
        decision.updated_at = now;
        if comparison_scan.is_some() {
            decision.verification_scan_id = comparison_scan;
        } else if let Some(resolved_at) = decision.resolved_at
            && let Some(scan) =
                self.store.latest_scan_for_domain_after(&decision.domain, resolved_at)?
        {
            decision.verification_scan_id = Some(scan.id);
        }
        decision.confidence_score = Some(confidence.value());
        decision.confidence_reason = Some(reason.to_string());
        self.store.update_decision(&decision)?;
        Ok(())
    }

    /// Persists one evidence snapshot row.
    fn record_evidence(
        &self,
        decision_id: &DecisionId,
        stage: EvidenceStage,
        payload: Value,
        now: Timestamp,
    ) -> Result<(), VerifyError> {
        self.store.insert_evidence(&EvidenceSnapshotRecord {
            id: EvidenceId::random(),
            decision_id: decision_id.clone(),
            stage,
            payload,
            created_at: now,
        })?;
        Ok(())
    }
}
