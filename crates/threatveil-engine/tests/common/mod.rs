// crates/threatveil-engine/tests/common/mod.rs
// ============================================================================
// Module: Engine Test Fixtures
// Description: Shared stubs and builders for engine integration tests.
// Purpose: Build orchestrators over the in-memory store with stub probes.
// Dependencies: threatveil-core, threatveil-engine, threatveil-probes
// ============================================================================

//! Shared fixtures: stub probes, record builders, and the orchestrator
//! assembly used across the engine test suite.

#![allow(dead_code, reason = "Shared test helpers may be unused in some suites.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::MemoryStore;
use threatveil_core::NullSummary;
use threatveil_core::PostureStore;
use threatveil_core::ScanId;
use threatveil_core::ScanRecord;
use threatveil_core::ScoringWeights;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use threatveil_core::estimate_likelihoods;
use threatveil_core::score_signals;
use threatveil_engine::ProbeSet;
use threatveil_engine::RateLimiter;
use threatveil_engine::ScanOrchestrator;
use threatveil_engine::SignalCache;
use threatveil_engine::VerificationEngine;
use threatveil_probes::CodeSearchProbe;
use threatveil_probes::HttpProbe;
use threatveil_probes::Probe;
use threatveil_probes::ProbeContext;
use threatveil_probes::ProbeError;
use threatveil_probes::ProbeOutcome;
use threatveil_probes::TlsProbe;

/// A probe stub with a fixed outcome.
pub struct StaticProbe {
    /// Probe name.
    pub probe_name: &'static str,
    /// Display name for service-error titles.
    pub display: &'static str,
    /// Signals the probe returns.
    pub signals: Vec<Signal>,
    /// Metadata the probe returns.
    pub metadata: Value,
    /// When true the probe fails with a transport error.
    pub fail: bool,
}

impl StaticProbe {
    /// Builds a succeeding stub with no findings.
    pub fn clean(probe_name: &'static str, display: &'static str) -> Self {
        Self {
            probe_name,
            display,
            signals: Vec::new(),
            metadata: json!({}),
            fail: false,
        }
    }

    /// Builds a failing stub.
    pub fn failing(probe_name: &'static str, display: &'static str) -> Self {
        Self {
            probe_name,
            display,
            signals: Vec::new(),
            metadata: json!({}),
            fail: true,
        }
    }

    /// Builds a succeeding stub with fixed signals.
    pub fn with_signals(
        probe_name: &'static str,
        display: &'static str,
        signals: Vec<Signal>,
    ) -> Self {
        Self {
            probe_name,
            display,
            signals,
            metadata: json!({}),
            fail: false,
        }
    }
}

#[async_trait]
impl Probe for StaticProbe {
    fn name(&self) -> &'static str {
        self.probe_name
    }

    fn display_name(&self) -> &'static str {
        self.display
    }

    fn failure_category(&self) -> Category {
        Category::Network
    }

    async fn run(&self, _ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError> {
        if self.fail {
            return Err(ProbeError::Transport("stubbed outage".to_string()));
        }
        Ok(ProbeOutcome::new(self.metadata.clone(), self.signals.clone()))
    }
}

/// Builds a finding signal for fixtures.
pub fn finding(
    id: &str,
    kind: SignalKind,
    severity: Severity,
    category: Category,
    source: &str,
    observed_at: Timestamp,
) -> Signal {
    Signal::finding(
        id,
        kind,
        "Fixture Finding",
        "fixture finding detail",
        severity,
        category,
        EvidenceEnvelope::rule(source, observed_at, json!({})),
    )
}

/// Builds a scan record with the given signals, scored with defaults.
pub fn scan_record(
    id: &str,
    domain: &str,
    org_id: Option<threatveil_core::OrgId>,
    signals: Vec<Signal>,
    created_at: Timestamp,
) -> ScanRecord {
    let (risk_score, categories) = score_signals(&signals, &ScoringWeights::default());
    let likelihoods = estimate_likelihoods(&signals);
    ScanRecord {
        id: ScanId::new(id),
        org_id,
        domain: domain.to_string(),
        code_org: None,
        risk_score,
        categories,
        signals,
        summary: "fixture summary".to_string(),
        likelihoods,
        raw_payload: BTreeMap::new(),
        partial_failures: 0,
        created_at,
    }
}

/// Builds the verification engine over unconfigured live probes.
///
/// The probes are never reached by count-comparison and auto-verification
/// paths, which is all the engine tests exercise.
pub fn verifier(store: &Arc<MemoryStore>) -> Result<Arc<VerificationEngine>, ProbeError> {
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(store) as Arc<dyn PostureStore>;
    Ok(Arc::new(VerificationEngine::new(
        dyn_store,
        Arc::new(HttpProbe::new("threatveil-test")?),
        Arc::new(TlsProbe::new()),
        Arc::new(CodeSearchProbe::new("threatveil-test", None)?),
    )))
}

/// Assembles an orchestrator over the in-memory store and stub probes.
pub fn orchestrator(
    store: &Arc<MemoryStore>,
    stage_a: Vec<Arc<dyn Probe>>,
    ct: Arc<dyn Probe>,
) -> Result<Arc<ScanOrchestrator>, ProbeError> {
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(store) as Arc<dyn PostureStore>;
    let cache = Arc::new(SignalCache::new(Arc::clone(&dyn_store)));
    let probes = ProbeSet {
        stage_a,
        ct,
        vulndb: Arc::new(threatveil_probes::VulnDbProbe::new("threatveil-test", None)?),
        code_search: Arc::new(CodeSearchProbe::new("threatveil-test", None)?),
    };
    Ok(Arc::new(ScanOrchestrator::new(
        dyn_store,
        cache,
        probes,
        Arc::new(NullSummary),
        ScoringWeights::default(),
        Arc::new(RateLimiter::new(60)),
        verifier(store)?,
    )))
}

/// Fixed test time.
pub fn fixed_now() -> Timestamp {
    Timestamp::UNIX_EPOCH.plus_days(19_000)
}
