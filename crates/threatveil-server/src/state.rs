// crates/threatveil-server/src/state.rs
// ============================================================================
// Module: Application State
// Description: Shared service handles injected into every handler.
// Purpose: One assembly point for the engine's services.
// Dependencies: threatveil-core, threatveil-engine, threatveil-webhooks
// ============================================================================

//! ## Overview
//! [`AppState`] owns the store and every engine service the handlers reach
//! for. Assembly happens once at startup; handlers receive it as shared
//! state and never construct services themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use threatveil_core::PostureStore;
use threatveil_engine::CredentialSealer;
use threatveil_engine::DecisionGenerator;
use threatveil_engine::DecisionLifecycle;
use threatveil_engine::OrgAggregator;
use threatveil_engine::ScanOrchestrator;
use threatveil_engine::VerificationEngine;
use threatveil_webhooks::WebhookDispatcher;

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared state for every API handler.
pub struct AppState {
    /// Persistence backend.
    pub store: Arc<dyn PostureStore>,
    /// Scan orchestrator.
    pub orchestrator: Arc<ScanOrchestrator>,
    /// Decision generator.
    pub generator: Arc<DecisionGenerator>,
    /// Decision lifecycle service.
    pub lifecycle: Arc<DecisionLifecycle>,
    /// Verification engine.
    pub verifier: Arc<VerificationEngine>,
    /// Organization aggregator.
    pub aggregator: Arc<OrgAggregator>,
    /// Webhook dispatcher.
    pub dispatcher: Arc<WebhookDispatcher>,
    /// Connector credential sealer.
    pub sealer: Arc<CredentialSealer>,
    /// Signing secret for internal endpoints.
    pub jwt_secret: String,
}
