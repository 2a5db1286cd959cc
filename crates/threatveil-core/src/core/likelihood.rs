// crates/threatveil-core/src/core/likelihood.rs
// ============================================================================
// Module: ThreatVeil Breach Likelihood Estimator
// Description: Monotone mapping from severity counts to breach probabilities.
// Purpose: Provide bounded 30-day and 90-day breach likelihood estimates.
// Dependencies: crate::core::signal, serde
// ============================================================================

//! ## Overview
//! The estimator maps the signal multiset to two probabilities with a fixed
//! contract: both in `[0, 1]`, the 90-day value never below the 30-day
//! value, and both strictly non-decreasing in the number of high-severity
//! signals. The construction is intentionally simple; it is an estimate, not
//! a model.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::signal::Severity;
use crate::core::signal::Signal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Likelihood weight of a low-severity signal.
const LOW_WEIGHT: f64 = 0.05;
/// Likelihood weight of a medium-severity signal.
const MEDIUM_WEIGHT: f64 = 0.10;
/// Likelihood weight of high- and critical-severity signals.
const HIGH_WEIGHT: f64 = 0.20;
/// Additional probability mass for the 90-day horizon.
const NINETY_DAY_UPLIFT: f64 = 0.10;

// ============================================================================
// SECTION: Likelihoods
// ============================================================================

/// Breach likelihood estimates for the two reporting horizons.
///
/// # Invariants
/// - `0.0 <= thirty_day <= ninety_day <= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Likelihoods {
    /// Estimated breach likelihood within 30 days.
    #[serde(rename = "breach_likelihood_30d")]
    pub thirty_day: f64,
    /// Estimated breach likelihood within 90 days.
    #[serde(rename = "breach_likelihood_90d")]
    pub ninety_day: f64,
}

/// Estimates breach likelihoods from the signal multiset.
#[must_use]
pub fn estimate_likelihoods(signals: &[Signal]) -> Likelihoods {
    let mut score = 0.0_f64;
    for signal in signals {
        score += match signal.severity {
            Severity::Low => LOW_WEIGHT,
            Severity::Medium => MEDIUM_WEIGHT,
            Severity::High | Severity::Critical => HIGH_WEIGHT,
        };
    }
    let thirty_day = score.min(1.0);
    Likelihoods {
        thirty_day,
        ninety_day: (thirty_day + NINETY_DAY_UPLIFT).min(1.0),
    }
}
