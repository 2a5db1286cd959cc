// crates/threatveil-core/src/core/mod.rs
// ============================================================================
// Module: ThreatVeil Core Model
// Description: Domain types and deterministic computations.
// Purpose: Group the signal model, scoring, decisions, and shared records.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! The core model groups the closed enumerations, the signal schema with its
//! evidence envelope, scoring and likelihood estimation, the decision rule
//! set with its lifecycle state machine, and the persisted record shapes
//! shared between the engine, store, and server crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod ai;
pub mod confidence;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod likelihood;
pub mod records;
pub mod scoring;
pub mod signal;
pub mod time;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ai::AiExposureLevel;
pub use ai::AGENT_KEYWORDS;
pub use ai::compute_ai_score;
pub use ai::has_agent_tool;
pub use confidence::ConfidenceTier;
pub use confidence::RECENT_AFTER_SCAN_DAYS;
pub use decision::ActionId;
pub use decision::DecisionDraft;
pub use decision::DecisionInputs;
pub use decision::DecisionStatus;
pub use decision::MAX_DECISIONS_PER_SCAN;
pub use decision::TransitionError;
pub use decision::TransitionPlan;
pub use decision::VerificationResult;
pub use decision::VerificationRule;
pub use decision::count_agent_tools;
pub use decision::count_cve_signals;
pub use decision::count_data_exposure_signals;
pub use decision::count_network_signals;
pub use decision::count_tls_signals;
pub use decision::generate_decisions;
pub use hashing::HashError;
pub use hashing::cache_key;
pub use hashing::canonical_json_bytes;
pub use hashing::hash_bytes_hex;
pub use hashing::hex_encode;
pub use identifiers::AssetId;
pub use identifiers::ConnectorId;
pub use identifiers::DecisionId;
pub use identifiers::DeliveryId;
pub use identifiers::EvidenceId;
pub use identifiers::OrgId;
pub use identifiers::ScanId;
pub use identifiers::ScheduleId;
pub use identifiers::VerificationRunId;
pub use identifiers::WebhookId;
pub use likelihood::Likelihoods;
pub use likelihood::estimate_likelihoods;
pub use records::AssetKind;
pub use records::AssetRecord;
pub use records::AssetStatus;
pub use records::AuditLogRecord;
pub use records::CacheEntryRecord;
pub use records::CategoryScore;
pub use records::ConnectorRecord;
pub use records::ConnectorStatus;
pub use records::DecisionImpactRecord;
pub use records::DecisionRecord;
pub use records::DeliveryRecord;
pub use records::DeliveryStatus;
pub use records::EventType;
pub use records::EvidenceSnapshotRecord;
pub use records::EvidenceStage;
pub use records::OrgRecord;
pub use records::PlanTier;
pub use records::ScanAiRecord;
pub use records::ScanFrequency;
pub use records::ScanRecord;
pub use records::ScheduleRecord;
pub use records::ScheduleStatus;
pub use records::VerificationRunRecord;
pub use records::WebhookRecord;
pub use scoring::ScoringWeights;
pub use scoring::score_signals;
pub use signal::Category;
pub use signal::DetectionMethod;
pub use signal::EvidenceEnvelope;
pub use signal::Severity;
pub use signal::Signal;
pub use signal::SignalKind;
pub use time::Timestamp;
pub use validate::ValidationError;
pub use validate::validate_code_org;
pub use validate::validate_domain;
