// crates/threatveil-server/src/main.rs
// ============================================================================
// Module: ThreatVeil Server Binary
// Description: Process entrypoint wiring config, store, engine, and routes.
// Purpose: Start the API with the scheduler and stop both cleanly.
// Dependencies: threatveil-{config,core,engine,probes,server,store-sqlite,webhooks}
// ============================================================================

//! ## Overview
//! Startup order: load and validate configuration, initialise structured
//! logging, open the durable store, assemble the probe set and engine
//! services, start the continuous-monitoring scheduler when enabled, and
//! serve the API. Shutdown stops the scheduler and drains in-flight work
//! before the process exits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use threatveil_config::ThreatVeilConfig;
use threatveil_core::NullSummary;
use threatveil_core::PostureStore;
use threatveil_core::ScoringWeights;
use threatveil_core::SummaryProvider;
use threatveil_engine::CredentialSealer;
use threatveil_engine::DecisionGenerator;
use threatveil_engine::DecisionLifecycle;
use threatveil_engine::GeminiSummary;
use threatveil_engine::ImpactService;
use threatveil_engine::MonitorScheduler;
use threatveil_engine::OrgAggregator;
use threatveil_engine::ProbeSet;
use threatveil_engine::RateLimiter;
use threatveil_engine::ScanOrchestrator;
use threatveil_engine::SignalCache;
use threatveil_engine::VerificationEngine;
use threatveil_probes::CodeSearchProbe;
use threatveil_probes::CtLogProbe;
use threatveil_probes::DnsProbe;
use threatveil_probes::HttpProbe;
use threatveil_probes::Probe;
use threatveil_probes::ThreatIntelProbe;
use threatveil_probes::TlsProbe;
use threatveil_probes::VulnDbProbe;
use threatveil_server::AppState;
use threatveil_server::build_router;
use threatveil_store_sqlite::SqlitePostureStore;
use threatveil_store_sqlite::SqliteStoreConfig;
use threatveil_webhooks::HttpTransport;
use threatveil_webhooks::WebhookDispatcher;
use tower_http::cors::AllowOrigin;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Entrypoint
// ============================================================================

/// Process entrypoint.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ThreatVeilConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but this build persists to the embedded store");
    }
    let store: Arc<dyn PostureStore> =
        Arc::new(SqlitePostureStore::open(&SqliteStoreConfig::new(&config.sqlite_path))?);

    // Probe set: live adapters configured from the deployment keys.
    let http_probe = Arc::new(HttpProbe::new(&config.user_agent)?);
    let tls_probe = Arc::new(TlsProbe::new());
    let code_search = Arc::new(CodeSearchProbe::new(
        &config.user_agent,
        config.github_token.clone(),
    )?);
    let stage_a: Vec<Arc<dyn Probe>> = vec![
        Arc::new(DnsProbe::new()),
        Arc::clone(&http_probe) as Arc<dyn Probe>,
        Arc::clone(&tls_probe) as Arc<dyn Probe>,
        Arc::new(ThreatIntelProbe::new(
            &config.user_agent,
            config.threat_intel_api_key.clone(),
        )?),
    ];
    let probes = ProbeSet {
        stage_a,
        ct: Arc::new(CtLogProbe::new(&config.user_agent)?),
        vulndb: Arc::new(VulnDbProbe::new(&config.user_agent, config.vulndb_api_key.clone())?),
        code_search: Arc::clone(&code_search),
    };

    // Absent LLM keys wire the null capability, never an error.
    let summary: Arc<dyn SummaryProvider> = match &config.llm_api_key {
        Some(key) => Arc::new(GeminiSummary::new(key.clone())?),
        None => Arc::new(NullSummary),
    };
    let sealer = Arc::new(match config.encryption_key {
        Some(key) => CredentialSealer::from_key_bytes(&key)?,
        None => CredentialSealer::derived_from_secret(&config.jwt_secret),
    });

    let cache = Arc::new(SignalCache::new(Arc::clone(&store)));
    let rate_limiter =
        Arc::new(RateLimiter::new(usize::try_from(config.rate_limit_per_minute).unwrap_or(60)));
    let verifier = Arc::new(VerificationEngine::new(
        Arc::clone(&store),
        http_probe,
        tls_probe,
        code_search,
    ));
    let orchestrator = Arc::new(ScanOrchestrator::new(
        Arc::clone(&store),
        cache,
        probes,
        summary,
        ScoringWeights::default(),
        rate_limiter,
        Arc::clone(&verifier),
    ));
    let impact = Arc::new(ImpactService::new(Arc::clone(&store)));
    let lifecycle = Arc::new(DecisionLifecycle::new(Arc::clone(&store), impact));
    let generator = Arc::new(DecisionGenerator::new(Arc::clone(&store)));
    let aggregator = Arc::new(OrgAggregator::new(Arc::clone(&store)));
    let dispatcher = Arc::new(WebhookDispatcher::new(
        Arc::clone(&store),
        Arc::new(HttpTransport::new(&config.user_agent)?),
    ));

    let scheduler = Arc::new(MonitorScheduler::new(
        Arc::clone(&store),
        Arc::clone(&orchestrator),
        Duration::from_secs(config.scheduler_interval_minutes * 60),
    ));
    if config.scheduler_enabled {
        scheduler.start();
    }

    let state = Arc::new(AppState {
        store,
        orchestrator,
        generator,
        lifecycle,
        verifier,
        aggregator,
        dispatcher,
        sealer,
        jwt_secret: config.jwt_secret.clone(),
    });

    let origins: Vec<_> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);
    let router = build_router(state).layer(cors);

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%address, "threatveil api listening");
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop().await;
    tracing::info!("threatveil api stopped");
    Ok(())
}

/// Resolves when the process receives an interrupt.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("interrupt handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
