// crates/threatveil-engine/src/orchestrator.rs
// ============================================================================
// Module: Scan Orchestrator
// Description: Two-stage probe fan-out, aggregation, and persistence.
// Purpose: Turn one scan request into exactly one persisted, scored scan.
// Dependencies: threatveil-core, threatveil-probes, crate::{cache, ratelimit, verification}
// ============================================================================

//! ## Overview
//! One orchestrator call produces exactly one persisted scan. Stage A fans
//! out the independent probes (DNS, HTTP, TLS, CT, threat intel) in
//! parallel behind error shields; Stage B runs the probes that depend on
//! Stage A's tech fingerprint (vulnerability DB) and on the request's code
//! organization (code search). Partial failures become service-error
//! signals, never errors. Post-processing (the AI sub-scan and
//! auto-verification) observes the committed scan and is never allowed to
//! fail it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use threatveil_core::AiExposureLevel;
use threatveil_core::OrgId;
use threatveil_core::OrgRecord;
use threatveil_core::PlanTier;
use threatveil_core::PostureStore;
use threatveil_core::ScanAiRecord;
use threatveil_core::ScanId;
use threatveil_core::ScanRecord;
use threatveil_core::ScoringWeights;
use threatveil_core::Signal;
use threatveil_core::StoreError;
use threatveil_core::SummaryInput;
use threatveil_core::SummaryProvider;
use threatveil_core::Timestamp;
use threatveil_core::ValidationError;
use threatveil_core::cache_key;
use threatveil_core::compute_ai_score;
use threatveil_core::estimate_likelihoods;
use threatveil_core::fallback_summary;
use threatveil_core::has_agent_tool;
use threatveil_core::score_signals;
use threatveil_core::validate_code_org;
use threatveil_core::validate_domain;
use threatveil_probes::AiIndicators;
use threatveil_probes::CodeSearchProbe;
use threatveil_probes::Probe;
use threatveil_probes::ProbeContext;
use threatveil_probes::ProbeError;
use threatveil_probes::ProbeOutcome;
use threatveil_probes::VulnDbProbe;
use threatveil_probes::shield_future;
use threatveil_probes::shielded;

use crate::cache::ENRICHMENT_TTL_SECONDS;
use crate::cache::SUMMARY_TTL_SECONDS;
use crate::cache::SignalCache;
use crate::ratelimit::RateLimiter;
use crate::verification::VerificationEngine;

// ============================================================================
// SECTION: Scan Request & Errors
// ============================================================================

/// A scan request before validation.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Raw domain input.
    pub domain: String,
    /// Raw optional code organization input.
    pub code_org: Option<String>,
}

/// Errors a scan call can refuse with.
///
/// Probe failures never appear here; they are absorbed into signals.
///
/// # Invariants
/// - Variants are stable for API status mapping.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Input failed validation (maps to 400).
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Caller exceeded the per-IP rate limit (maps to 429).
    #[error("rate limit exceeded; try again in 1 minute")]
    RateLimited,
    /// Organization exhausted its monthly scan quota (maps to 402).
    #[error("monthly scan limit of {limit} reached; upgrade to continue scanning")]
    QuotaExceeded {
        /// The organization's monthly limit.
        limit: u32,
    },
    /// Persistence failed (maps to 500).
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Probe Set
// ============================================================================

/// The probes one orchestrator fans out over.
///
/// # Invariants
/// - `stage_a` probes are independent of each other.
/// - `ct` runs with Stage A but goes through the enrichment cache.
pub struct ProbeSet {
    /// Independent Stage-A probes (DNS, HTTP, TLS, threat intel).
    pub stage_a: Vec<Arc<dyn Probe>>,
    /// Certificate-transparency probe (Stage A, cached).
    pub ct: Arc<dyn Probe>,
    /// Vulnerability-database probe (Stage B, fingerprint-driven).
    pub vulndb: Arc<VulnDbProbe>,
    /// Code-search probe (Stage B, code-org-driven).
    pub code_search: Arc<CodeSearchProbe>,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Scan orchestrator.
pub struct ScanOrchestrator {
    /// Persistence backend.
    store: Arc<dyn PostureStore>,
    /// Enrichment cache with single-flight.
    cache: Arc<SignalCache>,
    /// Probe set.
    probes: ProbeSet,
    /// Prose capability (never authoritative).
    summary: Arc<dyn SummaryProvider>,
    /// Scoring weights.
    weights: ScoringWeights,
    /// Per-IP rate limiter.
    rate_limiter: Arc<RateLimiter>,
    /// Verification engine for the post-scan auto-verification pass.
    verifier: Arc<VerificationEngine>,
}

impl ScanOrchestrator {
    /// Creates an orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PostureStore>,
        cache: Arc<SignalCache>,
        probes: ProbeSet,
        summary: Arc<dyn SummaryProvider>,
        weights: ScoringWeights,
        rate_limiter: Arc<RateLimiter>,
        verifier: Arc<VerificationEngine>,
    ) -> Self {
        Self {
            store,
            cache,
            probes,
            summary,
            weights,
            rate_limiter,
            verifier,
        }
    }

    /// Runs one scan and persists exactly one scan row.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] on invalid input, rate limiting, quota
    /// exhaustion, or persistence failure. Probe failures never raise; they
    /// surface as service-error signals with `partial_failures` advanced.
    pub async fn run(
        &self,
        request: &ScanRequest,
        client_ip: Option<IpAddr>,
        now: Timestamp,
    ) -> Result<ScanRecord, ScanError> {
        let started = std::time::Instant::now();
        let domain = validate_domain(&request.domain)?;
        let code_org = validate_code_org(request.code_org.as_deref())?;
        if let Some(ip) = client_ip
            && !self.rate_limiter.check(ip)
        {
            return Err(ScanError::RateLimited);
        }

        let org = self.find_or_create_org(&domain, now)?;
        if !org.within_scan_quota() {
            return Err(ScanError::QuotaExceeded {
                limit: org.scans_limit,
            });
        }
        self.store.bump_scan_counter(&org.id)?;

        let ctx = ProbeContext {
            domain: domain.clone(),
            code_org: code_org.clone(),
            observed_at: now,
        };

        // Stage A: independent probes in parallel, CT through the cache.
        let stage_a = join_all(
            self.probes.stage_a.iter().map(|probe| shielded(probe.as_ref(), &ctx)),
        );
        let ct_ctx = ctx.clone();
        let ct_probe = Arc::clone(&self.probes.ct);
        let ct_name = self.probes.ct.name();
        let ct_inputs = json!({ "domain": domain });
        let ct = shield_future(
            ct_name,
            self.probes.ct.display_name(),
            self.probes.ct.failure_category(),
            now,
            self.cache.signal_bundle(
                "ctlog",
                &ct_inputs,
                ENRICHMENT_TTL_SECONDS,
                now,
                async move { ct_probe.run(&ct_ctx).await },
            ),
        );
        let (stage_a_outcomes, ct_outcome) = tokio::join!(stage_a, ct);

        let mut outcomes: Vec<(&'static str, ProbeOutcome)> = self
            .probes
            .stage_a
            .iter()
            .map(|probe| probe.name())
            .zip(stage_a_outcomes)
            .collect();
        outcomes.push((ct_name, ct_outcome));

        // Stage B begins only after the fingerprint extraction completes.
        let tokens = tech_tokens(&outcomes);
        let (vuln_outcome, code_outcome) =
            tokio::join!(self.stage_b_vulndb(&tokens, now), self.stage_b_code_search(&code_org, now));
        outcomes.push((VulnDbProbe::NAME, vuln_outcome));
        outcomes.push((CodeSearchProbe::NAME, code_outcome));

        // Merge, count failures, score.
        let mut signals: Vec<Signal> = Vec::new();
        let mut raw_payload = std::collections::BTreeMap::new();
        for (name, outcome) in outcomes {
            raw_payload.insert(name.to_string(), outcome.metadata);
            signals.extend(outcome.signals);
        }
        let partial_failures =
            u32::try_from(signals.iter().filter(|s| s.is_service_error()).count())
                .unwrap_or(u32::MAX);

        let (risk_score, categories) = score_signals(&signals, &self.weights);
        let likelihoods = estimate_likelihoods(&signals);
        if signals.is_empty() {
            signals.push(Signal::no_findings(now));
        }

        let summary = self
            .cached_summary(
                &SummaryInput {
                    signals: &signals,
                    risk_score,
                    likelihoods,
                },
                now,
            )
            .await;

        let scan = ScanRecord {
            id: ScanId::random(),
            org_id: Some(org.id.clone()),
            domain: domain.clone(),
            code_org: code_org.clone(),
            risk_score,
            categories,
            signals,
            summary,
            likelihoods,
            raw_payload,
            partial_failures,
            created_at: now,
        };
        self.store.insert_scan(&scan)?;

        // Post-processing observes the committed scan and never fails it.
        self.post_process(&scan, now).await;

        let duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if partial_failures > 0 {
            tracing::warn!(
                domain = %scan.domain,
                risk_score,
                duration_ms,
                signal_count = scan.signals.len(),
                partial_failures,
                scan_id = %scan.id,
                "scan_complete"
            );
        } else {
            tracing::info!(
                domain = %scan.domain,
                risk_score,
                duration_ms,
                signal_count = scan.signals.len(),
                partial_failures,
                scan_id = %scan.id,
                "scan_complete"
            );
        }
        Ok(scan)
    }

    /// Finds the organization for a primary domain, creating it on first
    /// contact.
    fn find_or_create_org(&self, domain: &str, now: Timestamp) -> Result<OrgRecord, StoreError> {
        if let Some(org) = self.store.find_org_by_domain(domain)? {
            return Ok(org);
        }
        let org = OrgRecord {
            id: OrgId::random(),
            name: domain.to_string(),
            primary_domain: domain.to_string(),
            plan: PlanTier::Free,
            scans_this_month: 0,
            scans_limit: OrgRecord::DEFAULT_SCANS_LIMIT,
            created_at: now,
        };
        self.store.insert_org(&org)?;
        Ok(org)
    }

    /// Runs the cached vulnerability-database stage.
    async fn stage_b_vulndb(&self, tokens: &[String], now: Timestamp) -> ProbeOutcome {
        if tokens.is_empty() {
            return ProbeOutcome::new(json!({ "cves": [] }), Vec::new());
        }
        let mut sorted = tokens.to_vec();
        sorted.sort_unstable();
        let probe = Arc::clone(&self.probes.vulndb);
        let owned_tokens = tokens.to_vec();
        shield_future(
            VulnDbProbe::NAME,
            VulnDbProbe::DISPLAY_NAME,
            VulnDbProbe::FAILURE_CATEGORY,
            now,
            self.cache.signal_bundle(
                "vulndb",
                &json!({ "tokens": sorted }),
                ENRICHMENT_TTL_SECONDS,
                now,
                async move { probe.search(&owned_tokens, now).await },
            ),
        )
        .await
    }

    /// Runs the cached code-search stage.
    async fn stage_b_code_search(
        &self,
        code_org: &Option<String>,
        now: Timestamp,
    ) -> ProbeOutcome {
        let Some(org) = code_org.clone() else {
            return ProbeOutcome::new(json!({ "leaks": [] }), Vec::new());
        };
        let probe = Arc::clone(&self.probes.code_search);
        shield_future(
            CodeSearchProbe::NAME,
            CodeSearchProbe::DISPLAY_NAME,
            CodeSearchProbe::FAILURE_CATEGORY,
            now,
            self.cache.signal_bundle(
                "code_search",
                &json!({ "org": org }),
                ENRICHMENT_TTL_SECONDS,
                now,
                async move { probe.search_leaks(&org, now).await },
            ),
        )
        .await
    }

    /// Produces the scan summary through the cache with the deterministic
    /// fallback on any failure.
    async fn cached_summary(&self, input: &SummaryInput<'_>, now: Timestamp) -> String {
        let digest_input: Vec<Value> = input
            .signals
            .iter()
            .map(|signal| json!({ "id": signal.id, "severity": signal.severity }))
            .collect();
        let payload = json!({
            "risk_score": input.risk_score,
            "likelihoods": input.likelihoods,
            "signals": digest_input,
        });
        let Ok(key) = cache_key("summary", &payload) else {
            return fallback_summary(input);
        };
        let provider = Arc::clone(&self.summary);
        let fetch = async move {
            provider
                .summarize(SummaryInput {
                    signals: input.signals,
                    risk_score: input.risk_score,
                    likelihoods: input.likelihoods,
                })
                .await
                .map(Value::String)
                .map_err(|err| ProbeError::InvalidResponse(err.to_string()))
        };
        match self.cache.get_or_fetch(&key, SUMMARY_TTL_SECONDS, now, fetch).await {
            Ok(Value::String(text)) => text,
            Ok(_) | Err(_) => fallback_summary(input),
        }
    }

    /// Post-scan work: the AI sub-scan and auto-verification.
    ///
    /// Both observe the committed scan; neither is allowed to fail it.
    async fn post_process(&self, scan: &ScanRecord, now: Timestamp) {
        let ai_record = self.ai_scan(scan, now).await;
        if let Err(err) = self.store.upsert_scan_ai(&ai_record) {
            tracing::warn!(scan_id = %scan.id, error = %err, "ai sub-scan persistence failed");
        }
        self.verifier.auto_verify_for_scan(scan, now).await;
    }

    /// Catalogs the scan's AI surface and computes the AI score.
    async fn ai_scan(&self, scan: &ScanRecord, now: Timestamp) -> ScanAiRecord {
        let indicators = match scan.code_org.as_deref() {
            Some(org) => match self.probes.code_search.ai_indicators(org, now).await {
                Ok(indicators) => indicators,
                Err(err) => {
                    tracing::warn!(scan_id = %scan.id, error = %err, "ai indicator scan failed");
                    AiIndicators::default()
                }
            },
            None => AiIndicators::default(),
        };
        let agent_present =
            has_agent_tool(&indicators.tools) || !indicators.agents.is_empty();
        let ai_score = compute_ai_score(
            indicators.tools.len(),
            indicators.key_leaks.len(),
            agent_present,
        );
        ScanAiRecord {
            scan_id: scan.id.clone(),
            ai_tools: indicators.tools,
            ai_files: indicators.files,
            ai_agents: indicators.agents,
            ai_keys: indicators.key_leaks,
            ai_score,
            exposure: AiExposureLevel::from_score(ai_score),
            created_at: now,
        }
    }
}

// ============================================================================
// SECTION: Fingerprint Extraction
// ============================================================================

/// Pulls the tech-fingerprint tokens out of the HTTP probe's metadata.
fn tech_tokens(outcomes: &[(&'static str, ProbeOutcome)]) -> Vec<String> {
    outcomes
        .iter()
        .find(|(name, _)| *name == "http")
        .and_then(|(_, outcome)| outcome.metadata.get("tech_tokens"))
        .and_then(Value::as_array)
        .map(|tokens| {
            tokens.iter().filter_map(Value::as_str).map(ToString::to_string).collect()
        })
        .unwrap_or_default()
}
