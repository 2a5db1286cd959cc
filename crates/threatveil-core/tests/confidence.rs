// crates/threatveil-core/tests/confidence.rs
// ============================================================================
// Module: Confidence Tier Tests
// Description: Validate the closed confidence ladder and its boundaries.
// Purpose: Pin the four-value set and the inclusive seven-day boundary.
// Dependencies: threatveil-core
// ============================================================================

//! Confidence tier classification tests.

use threatveil_core::ConfidenceTier;
use threatveil_core::RECENT_AFTER_SCAN_DAYS;

#[test]
fn the_ladder_has_exactly_four_values() {
    let values = [
        ConfidenceTier::NoAfterScan.value(),
        ConfidenceTier::StaleAfterScan.value(),
        ConfidenceTier::RecentAmbiguous.value(),
        ConfidenceTier::RecentConfirmed.value(),
    ];
    assert_eq!(values, [0.2, 0.4, 0.7, 1.0]);
    for value in values {
        assert!(ConfidenceTier::from_value(value).is_some());
    }
    assert_eq!(ConfidenceTier::from_value(0.5), None);
    assert_eq!(ConfidenceTier::from_value(0.0), None);
}

#[test]
fn no_after_scan_is_lowest_confidence() {
    assert_eq!(ConfidenceTier::classify(None, None), ConfidenceTier::NoAfterScan);
    assert_eq!(ConfidenceTier::classify(None, Some(true)), ConfidenceTier::NoAfterScan);
}

#[test]
fn stale_after_scan_is_low_confidence() {
    assert_eq!(
        ConfidenceTier::classify(Some(RECENT_AFTER_SCAN_DAYS + 1), Some(true)),
        ConfidenceTier::StaleAfterScan
    );
    assert_eq!(ConfidenceTier::classify(Some(30), None), ConfidenceTier::StaleAfterScan);
}

#[test]
fn the_seven_day_boundary_is_inclusive() {
    assert_eq!(
        ConfidenceTier::classify(Some(RECENT_AFTER_SCAN_DAYS), Some(true)),
        ConfidenceTier::RecentConfirmed
    );
    assert_eq!(
        ConfidenceTier::classify(Some(RECENT_AFTER_SCAN_DAYS), None),
        ConfidenceTier::RecentAmbiguous
    );
}

#[test]
fn recent_scan_with_signal_gone_is_full_confidence() {
    assert_eq!(ConfidenceTier::classify(Some(2), Some(true)), ConfidenceTier::RecentConfirmed);
}

#[test]
fn recent_scan_with_ambiguous_signal_is_medium_confidence() {
    assert_eq!(ConfidenceTier::classify(Some(2), None), ConfidenceTier::RecentAmbiguous);
    assert_eq!(ConfidenceTier::classify(Some(2), Some(false)), ConfidenceTier::RecentAmbiguous);
}

#[test]
fn every_tier_carries_a_reason() {
    for tier in [
        ConfidenceTier::NoAfterScan,
        ConfidenceTier::StaleAfterScan,
        ConfidenceTier::RecentAmbiguous,
        ConfidenceTier::RecentConfirmed,
    ] {
        assert!(!tier.reason().is_empty());
    }
}
