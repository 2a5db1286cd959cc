// crates/threatveil-core/src/core/scoring.rs
// ============================================================================
// Module: ThreatVeil Risk Scoring
// Description: Severity points, category clamps, and the weighted aggregate.
// Purpose: Turn a signal multiset into deterministic category and risk scores.
// Dependencies: crate::core::{records, signal}, std::collections
// ============================================================================

//! ## Overview
//! Scoring is a pure function over the signal multiset: severity points are
//! summed per category, each category sum is clamped to 100 and labelled,
//! and the aggregate is the weighted, rounded, clamped combination. The
//! weights are a configuration struct so deployments can rebalance without
//! touching the computation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::records::CategoryScore;
use crate::core::signal::Category;
use crate::core::signal::Severity;
use crate::core::signal::Signal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum value of both category and aggregate scores.
const SCORE_CEILING: u32 = 100;
/// Clamped category sum at or above which the category label is `high`.
const HIGH_LABEL_FLOOR: u32 = 70;
/// Clamped category sum at or above which the category label is `medium`.
const MEDIUM_LABEL_FLOOR: u32 = 40;

// ============================================================================
// SECTION: Scoring Weights
// ============================================================================

/// Category weights applied when aggregating category scores.
///
/// # Invariants
/// - Weights are non-negative; callers keep the sum at or below 1.0 so the
///   aggregate stays within the 0-100 scale before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for network-category findings.
    pub network: f64,
    /// Weight for software-category findings.
    pub software: f64,
    /// Weight for data-exposure findings.
    pub data_exposure: f64,
    /// Weight for AI-integration findings.
    pub ai_integration: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            network: 0.40,
            software: 0.35,
            data_exposure: 0.20,
            ai_integration: 0.05,
        }
    }
}

impl ScoringWeights {
    /// Returns the weight for one category.
    #[must_use]
    pub const fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Network => self.network,
            Category::Software => self.software,
            Category::DataExposure => self.data_exposure,
            Category::AiIntegration => self.ai_integration,
        }
    }
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Derives the category severity label from a clamped category sum.
const fn label_from_score(score: u32) -> Severity {
    if score >= HIGH_LABEL_FLOOR {
        Severity::High
    } else if score >= MEDIUM_LABEL_FLOOR {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Scores a signal multiset into category scores and the aggregate risk.
///
/// Pure and deterministic: an identical multiset always produces identical
/// scores. Every category appears in the result map even with zero points.
#[must_use]
pub fn score_signals(
    signals: &[Signal],
    weights: &ScoringWeights,
) -> (u8, BTreeMap<Category, CategoryScore>) {
    let mut points: BTreeMap<Category, u32> = BTreeMap::new();
    for category in Category::ALL {
        points.insert(category, 0);
    }
    for signal in signals {
        if let Some(slot) = points.get_mut(&signal.category) {
            *slot += signal.severity.points();
        }
    }

    let mut categories = BTreeMap::new();
    let mut total = 0.0_f64;
    for category in Category::ALL {
        let raw = points.get(&category).copied().unwrap_or(0);
        let clamped = raw.min(SCORE_CEILING);
        let weight = weights.weight(category);
        categories.insert(
            category,
            CategoryScore {
                score: clamp_to_u8(clamped),
                weight,
                severity: label_from_score(clamped),
            },
        );
        total += f64::from(clamped) * weight;
    }

    let aggregate = total.round().min(f64::from(SCORE_CEILING)).max(0.0);
    (clamp_to_u8(float_to_u32(aggregate)), categories)
}

/// Converts a non-negative, pre-clamped float to u32.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Value is rounded and clamped to the 0-100 range before conversion."
)]
fn float_to_u32(value: f64) -> u32 {
    value as u32
}

/// Narrows a score already clamped to the 0-100 range.
#[allow(
    clippy::cast_possible_truncation,
    reason = "Scores are clamped to 100 before narrowing."
)]
fn clamp_to_u8(value: u32) -> u8 {
    value.min(SCORE_CEILING) as u8
}
