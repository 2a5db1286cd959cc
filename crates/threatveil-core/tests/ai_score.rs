// crates/threatveil-core/tests/ai_score.rs
// ============================================================================
// Module: AI Score Tests
// Description: Validate the deterministic AI exposure score.
// Purpose: Pin tool buckets, key-leak caps, and the agent bump.
// Dependencies: threatveil-core
// ============================================================================

//! AI exposure scoring tests.

use threatveil_core::AiExposureLevel;
use threatveil_core::compute_ai_score;
use threatveil_core::has_agent_tool;

#[test]
fn no_ai_surface_scores_zero() {
    assert_eq!(compute_ai_score(0, 0, false), 0);
}

#[test]
fn tool_count_buckets() {
    assert_eq!(compute_ai_score(1, 0, false), 10);
    assert_eq!(compute_ai_score(3, 0, false), 10);
    assert_eq!(compute_ai_score(4, 0, false), 20);
    assert_eq!(compute_ai_score(12, 0, false), 20);
}

#[test]
fn one_tool_one_leak_and_an_agent_scores_fifty() {
    // One tool (10) + one key leak (30) + agent framework present (10).
    assert_eq!(compute_ai_score(1, 1, true), 50);
}

#[test]
fn key_leak_points_cap_at_sixty() {
    assert_eq!(compute_ai_score(0, 2, false), 60);
    assert_eq!(compute_ai_score(0, 5, false), 60);
}

#[test]
fn score_clamps_at_one_hundred() {
    assert_eq!(compute_ai_score(10, 10, true), 90);
    assert!(compute_ai_score(usize::MAX, usize::MAX, true) <= 100);
}

#[test]
fn agent_detection_is_case_insensitive_substring() {
    let tools = vec!["LangChain".to_string()];
    assert!(has_agent_tool(&tools));
    let tools = vec!["my-agent-framework".to_string()];
    assert!(has_agent_tool(&tools));
    let tools = vec!["openai".to_string(), "transformers".to_string()];
    assert!(!has_agent_tool(&tools));
}

#[test]
fn exposure_levels_follow_score_bands() {
    assert_eq!(AiExposureLevel::from_score(0), AiExposureLevel::Low);
    assert_eq!(AiExposureLevel::from_score(29), AiExposureLevel::Low);
    assert_eq!(AiExposureLevel::from_score(30), AiExposureLevel::Medium);
    assert_eq!(AiExposureLevel::from_score(59), AiExposureLevel::Medium);
    assert_eq!(AiExposureLevel::from_score(60), AiExposureLevel::High);
    assert_eq!(AiExposureLevel::from_score(100), AiExposureLevel::High);
}
