// crates/threatveil-core/src/core/ai.rs
// ============================================================================
// Module: ThreatVeil AI Exposure Scoring
// Description: Deterministic AI risk score from detected tools and leaks.
// Purpose: Rate an organization's AI surface on the 0-100 scale.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The AI sub-scan catalogs detected AI tools, agent frameworks, and leaked
//! AI keys. This module turns that catalog into the `ai_score`: tool count
//! buckets, capped key-leak points, and an agent-framework bump, clamped to
//! 0-100.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Keywords identifying agent frameworks among detected AI tools.
pub const AGENT_KEYWORDS: [&str; 5] = ["langchain", "crewai", "autogen", "langgraph", "agent"];

/// Points for a small tool footprint (one to three tools).
const SMALL_FOOTPRINT_POINTS: u32 = 10;
/// Points for a large tool footprint (four or more tools).
const LARGE_FOOTPRINT_POINTS: u32 = 20;
/// Points added per leaked AI key.
const KEY_LEAK_POINTS: u32 = 30;
/// Cap on total key-leak points.
const KEY_LEAK_CAP: u32 = 60;
/// Points added when any agent framework keyword is present.
const AGENT_POINTS: u32 = 10;
/// Score ceiling.
const SCORE_CEILING: u32 = 100;

// ============================================================================
// SECTION: Exposure Level
// ============================================================================

/// Coarse AI exposure level derived from the AI score.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiExposureLevel {
    /// AI score below 30.
    Low,
    /// AI score 30 to 59.
    Medium,
    /// AI score 60 and above.
    High,
}

impl AiExposureLevel {
    /// Derives the exposure level from an AI score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        if score >= 60 {
            Self::High
        } else if score >= 30 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Returns true when any detected tool matches an agent framework keyword.
///
/// Matching is case-insensitive substring containment.
#[must_use]
pub fn has_agent_tool(tools: &[String]) -> bool {
    tools.iter().any(|tool| {
        let lower = tool.to_ascii_lowercase();
        AGENT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
    })
}

/// Computes the AI exposure score.
///
/// Rule: 0 tools score 0, one to three score 10, four or more score 20;
/// plus 30 per leaked AI key capped at 60; plus 10 when any agent framework
/// keyword is present; clamped to 0-100.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "Score is clamped to 100 before narrowing."
)]
pub fn compute_ai_score(tool_count: usize, key_leak_count: usize, agent_present: bool) -> u8 {
    let mut score = match tool_count {
        0 => 0,
        1..=3 => SMALL_FOOTPRINT_POINTS,
        _ => LARGE_FOOTPRINT_POINTS,
    };
    let leak_points = u32::try_from(key_leak_count)
        .unwrap_or(u32::MAX)
        .saturating_mul(KEY_LEAK_POINTS)
        .min(KEY_LEAK_CAP);
    score += leak_points;
    if agent_present {
        score += AGENT_POINTS;
    }
    score.min(SCORE_CEILING) as u8
}
