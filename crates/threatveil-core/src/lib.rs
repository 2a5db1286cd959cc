// crates/threatveil-core/src/lib.rs
// ============================================================================
// Module: ThreatVeil Core Library
// Description: Public API surface for the ThreatVeil core.
// Purpose: Expose the domain model, deterministic logic, and interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! ThreatVeil core provides the normalized signal model, deterministic risk
//! scoring, the decision rule engine with its lifecycle state machine, and
//! the interface seams used by the orchestration, storage, and delivery
//! crates. Core logic is pure: it never reads the wall clock and never
//! performs I/O; hosts supply timestamps and snapshots explicitly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditStore;
pub use interfaces::CacheStore;
pub use interfaces::ConnectorStore;
pub use interfaces::DecisionStore;
pub use interfaces::MemoryStore;
pub use interfaces::NullSummary;
pub use interfaces::OrgStore;
pub use interfaces::PostureStore;
pub use interfaces::ScanStore;
pub use interfaces::ScheduleStore;
pub use interfaces::StoreError;
pub use interfaces::SummaryError;
pub use interfaces::SummaryInput;
pub use interfaces::SummaryProvider;
pub use interfaces::WebhookStore;
pub use interfaces::fallback_summary;
