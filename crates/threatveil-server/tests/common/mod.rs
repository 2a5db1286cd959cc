// crates/threatveil-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Fixtures
// Description: Router assembly over the in-memory store and stub probes.
// Purpose: Drive the API surface without touching the network.
// Dependencies: threatveil-core, threatveil-engine, threatveil-server
// ============================================================================

//! Shared fixtures for API tests: stub probes and full router assembly.

#![allow(dead_code, reason = "Shared test helpers may be unused in some suites.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::connect_info::MockConnectInfo;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::MemoryStore;
use threatveil_core::NullSummary;
use threatveil_core::PostureStore;
use threatveil_core::ScoringWeights;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use threatveil_engine::DecisionGenerator;
use threatveil_engine::DecisionLifecycle;
use threatveil_engine::ImpactService;
use threatveil_engine::OrgAggregator;
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
use threatveil_probes::VulnDbProbe;
use threatveil_server::AppState;
use threatveil_server::build_router;
use threatveil_webhooks::HttpTransport;
use threatveil_webhooks::WebhookDispatcher;

/// Test signing secret.
pub const TEST_SECRET: &str = "test-signing-secret";

/// A probe stub with a fixed outcome.
pub struct StaticProbe {
    /// Probe name.
    pub probe_name: &'static str,
    /// Display name for service-error titles.
    pub display: &'static str,
    /// Signals the probe returns.
    pub signals: Vec<Signal>,
}

impl StaticProbe {
    /// Builds a succeeding stub with no findings.
    pub fn clean(probe_name: &'static str, display: &'static str) -> Self {
        Self {
            probe_name,
            display,
            signals: Vec::new(),
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
        Ok(ProbeOutcome::new(json!({}), self.signals.clone()))
    }
}

/// Builds a finding signal for fixtures.
pub fn finding(id: &str, kind: SignalKind, severity: Severity, category: Category) -> Signal {
    Signal::finding(
        id,
        kind,
        "Fixture Finding",
        "fixture finding detail",
        severity,
        category,
        EvidenceEnvelope::rule("fixture", Timestamp::UNIX_EPOCH.plus_days(19_000), json!({})),
    )
}

/// Assembles the full router over stub probes and the in-memory store.
pub fn test_router(
    store: &Arc<MemoryStore>,
    http_signals: Vec<Signal>,
) -> Result<Router, Box<dyn std::error::Error>> {
    let dyn_store: Arc<dyn PostureStore> = Arc::clone(store) as Arc<dyn PostureStore>;
    let http_probe = Arc::new(HttpProbe::new("threatveil-test")?);
    let tls_probe = Arc::new(TlsProbe::new());
    let code_search = Arc::new(CodeSearchProbe::new("threatveil-test", None)?);

    let stage_a: Vec<Arc<dyn Probe>> = vec![
        Arc::new(StaticProbe::clean("dns", "DNS")),
        Arc::new(StaticProbe::with_signals("http", "HTTP", http_signals)),
        Arc::new(StaticProbe::clean("tls", "TLS")),
        Arc::new(StaticProbe::clean("threat_intel", "ThreatIntel")),
    ];
    let probes = ProbeSet {
        stage_a,
        ct: Arc::new(StaticProbe::clean("ct", "CT")),
        vulndb: Arc::new(VulnDbProbe::new("threatveil-test", None)?),
        code_search: Arc::clone(&code_search),
    };

    let verifier = Arc::new(VerificationEngine::new(
        Arc::clone(&dyn_store),
        http_probe,
        tls_probe,
        code_search,
    ));
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::clone(&dyn_store),
        Arc::new(SignalCache::new(Arc::clone(&dyn_store))),
        probes,
        Arc::new(NullSummary),
        ScoringWeights::default(),
        Arc::new(RateLimiter::new(60)),
        Arc::clone(&verifier),
    ));
    let impact = Arc::new(ImpactService::new(Arc::clone(&dyn_store)));
    let dispatcher = Arc::new(
        WebhookDispatcher::new(
            Arc::clone(&dyn_store),
            Arc::new(HttpTransport::new("threatveil-test")?),
        )
        .with_retry_base(Duration::from_millis(10)),
    );
    let state = Arc::new(AppState {
        store: Arc::clone(&dyn_store),
        orchestrator,
        generator: Arc::new(DecisionGenerator::new(Arc::clone(&dyn_store))),
        lifecycle: Arc::new(DecisionLifecycle::new(Arc::clone(&dyn_store), impact)),
        verifier,
        aggregator: Arc::new(OrgAggregator::new(Arc::clone(&dyn_store))),
        dispatcher,
        sealer: Arc::new(threatveil_engine::CredentialSealer::derived_from_secret(TEST_SECRET)),
        jwt_secret: TEST_SECRET.to_string(),
    });
    Ok(build_router(state)
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 43210)))))
}
