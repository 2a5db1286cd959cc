// crates/threatveil-core/tests/proptest_scoring.rs
// ============================================================================
// Module: Scoring Property Tests
// Description: Property-based invariants for scoring and likelihoods.
// Purpose: Hold score bounds and horizon ordering over arbitrary multisets.
// Dependencies: threatveil-core, proptest, serde_json
// ============================================================================

//! Property tests: bounds and ordering over arbitrary signal multisets.

use proptest::prelude::Just;
use proptest::prelude::Strategy;
use proptest::prop_oneof;
use proptest::proptest;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::ScoringWeights;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use threatveil_core::estimate_likelihoods;
use threatveil_core::score_signals;

/// Strategy over severities.
fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

/// Strategy over categories.
fn category_strategy() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Network),
        Just(Category::Software),
        Just(Category::DataExposure),
        Just(Category::AiIntegration),
    ]
}

/// Strategy over signal multisets.
fn signals_strategy() -> impl Strategy<Value = Vec<Signal>> {
    proptest::collection::vec((severity_strategy(), category_strategy()), 0..64).prop_map(
        |entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(idx, (severity, category))| {
                    Signal::finding(
                        format!("finding_{idx}"),
                        SignalKind::Http,
                        "Generated Finding",
                        "generated finding detail",
                        severity,
                        category,
                        EvidenceEnvelope::rule(
                            "https",
                            Timestamp::UNIX_EPOCH.plus_days(19_000),
                            json!({}),
                        ),
                    )
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn aggregate_and_categories_stay_within_bounds(signals in signals_strategy()) {
        let (aggregate, categories) = score_signals(&signals, &ScoringWeights::default());
        proptest::prop_assert!(aggregate <= 100);
        for score in categories.values() {
            proptest::prop_assert!(score.score <= 100);
        }
    }

    #[test]
    fn scoring_is_a_pure_function(signals in signals_strategy()) {
        let weights = ScoringWeights::default();
        let first = score_signals(&signals, &weights);
        let second = score_signals(&signals, &weights);
        proptest::prop_assert_eq!(first, second);
    }

    #[test]
    fn likelihood_contract_holds(signals in signals_strategy()) {
        let likelihoods = estimate_likelihoods(&signals);
        proptest::prop_assert!(likelihoods.thirty_day >= 0.0);
        proptest::prop_assert!(likelihoods.thirty_day <= likelihoods.ninety_day);
        proptest::prop_assert!(likelihoods.ninety_day <= 1.0);
    }

    #[test]
    fn adding_a_high_signal_never_lowers_the_thirty_day_likelihood(
        signals in signals_strategy(),
    ) {
        let base = estimate_likelihoods(&signals);
        let mut extended = signals;
        extended.push(Signal::finding(
            "extra_high",
            SignalKind::Cve,
            "Extra High Finding",
            "extra high finding detail",
            Severity::High,
            Category::Software,
            EvidenceEnvelope::rule("vulndb", Timestamp::UNIX_EPOCH.plus_days(19_000), json!({})),
        ));
        let bumped = estimate_likelihoods(&extended);
        proptest::prop_assert!(bumped.thirty_day >= base.thirty_day);
    }
}
