// crates/threatveil-core/src/core/confidence.rs
// ============================================================================
// Module: ThreatVeil Confidence Tiers
// Description: Closed four-value confidence ladder for impact and verification.
// Purpose: Classify after-scan recency and signal disappearance into a tier.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Impact and verification confidence is never a free-form float: it is one
//! of exactly four values. The ladder depends on whether an after-scan
//! exists, how old it is, and whether the triggering signal observably
//! disappeared. The seven-day recency boundary is inclusive.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum after-scan age, in whole days, still considered recent.
///
/// The boundary is inclusive: an after-scan exactly seven days old is recent.
pub const RECENT_AFTER_SCAN_DAYS: i64 = 7;

// ============================================================================
// SECTION: Confidence Tier
// ============================================================================

/// Closed confidence ladder for impact and verification outcomes.
///
/// # Invariants
/// - Exactly four representable values: 0.2, 0.4, 0.7, and 1.0.
/// - Ordering is ascending confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    /// No after-scan exists (0.2).
    NoAfterScan,
    /// An after-scan exists but is older than seven days (0.4).
    StaleAfterScan,
    /// A recent after-scan exists but signal presence is ambiguous (0.7).
    RecentAmbiguous,
    /// A recent after-scan exists and the triggering signal disappeared (1.0).
    RecentConfirmed,
}

impl ConfidenceTier {
    /// Returns the numeric confidence value for this tier.
    #[must_use]
    pub const fn value(self) -> f64 {
        match self {
            Self::NoAfterScan => 0.2,
            Self::StaleAfterScan => 0.4,
            Self::RecentAmbiguous => 0.7,
            Self::RecentConfirmed => 1.0,
        }
    }

    /// Maps a stored numeric value back onto the ladder.
    #[must_use]
    pub fn from_value(value: f64) -> Option<Self> {
        if (value - 0.2).abs() < f64::EPSILON {
            Some(Self::NoAfterScan)
        } else if (value - 0.4).abs() < f64::EPSILON {
            Some(Self::StaleAfterScan)
        } else if (value - 0.7).abs() < f64::EPSILON {
            Some(Self::RecentAmbiguous)
        } else if (value - 1.0).abs() < f64::EPSILON {
            Some(Self::RecentConfirmed)
        } else {
            None
        }
    }

    /// Classifies an outcome from after-scan age and signal disappearance.
    ///
    /// `after_scan_age_days` is `None` when no after-scan exists;
    /// `signal_disappeared` is `None` when presence could not be determined.
    #[must_use]
    pub fn classify(after_scan_age_days: Option<i64>, signal_disappeared: Option<bool>) -> Self {
        match after_scan_age_days {
            None => Self::NoAfterScan,
            Some(age) if age > RECENT_AFTER_SCAN_DAYS => Self::StaleAfterScan,
            Some(_) => match signal_disappeared {
                Some(true) => Self::RecentConfirmed,
                Some(false) | None => Self::RecentAmbiguous,
            },
        }
    }

    /// Explains the tier for impact notes.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::NoAfterScan => "no scan has completed since the decision was resolved",
            Self::StaleAfterScan => "the most recent scan is older than seven days",
            Self::RecentAmbiguous => {
                "a recent scan exists but the triggering signal could not be matched"
            }
            Self::RecentConfirmed => "a recent scan confirms the triggering signal is gone",
        }
    }
}
