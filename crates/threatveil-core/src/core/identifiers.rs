// crates/threatveil-core/src/core/identifiers.rs
// ============================================================================
// Module: ThreatVeil Identifiers
// Description: Canonical opaque identifiers for ThreatVeil entities.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout ThreatVeil.
//! Identifiers are opaque strings on the wire (UUID v4 for generated rows,
//! deterministic composites for idempotent decision rows) and are never
//! interpreted by the core.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier newtype with the shared API surface.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from an existing string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random (UUID v4) identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier! {
    /// Organization (tenant root) identifier.
    OrgId
}

string_identifier! {
    /// Asset identifier scoped within an organization.
    AssetId
}

string_identifier! {
    /// Scan identifier; one per execution over one asset.
    ScanId
}

string_identifier! {
    /// Security decision identifier.
    ///
    /// Generated decisions use the deterministic composite form from
    /// [`DecisionId::derived`] so repeated generation for one scan yields the
    /// same identifiers.
    DecisionId
}

string_identifier! {
    /// Webhook subscription identifier.
    WebhookId
}

string_identifier! {
    /// Webhook delivery attempt identifier.
    DeliveryId
}

string_identifier! {
    /// External connector identifier.
    ConnectorId
}

string_identifier! {
    /// Scan schedule identifier.
    ScheduleId
}

string_identifier! {
    /// Decision verification run identifier.
    VerificationRunId
}

string_identifier! {
    /// Decision evidence snapshot identifier.
    EvidenceId
}

impl DecisionId {
    /// Builds the deterministic identifier for a generated decision.
    ///
    /// The composite of scan id and action wire id keeps decision generation
    /// idempotent per scan.
    #[must_use]
    pub fn derived(scan_id: &ScanId, action_wire_id: &str) -> Self {
        Self(format!("{}:{action_wire_id}", scan_id.as_str()))
    }
}
