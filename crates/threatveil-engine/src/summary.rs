// crates/threatveil-engine/src/summary.rs
// ============================================================================
// Module: Summary Capability
// Description: LLM-backed scan summaries with a deterministic fallback.
// Purpose: Produce cosmetic prose without ever influencing scores.
// Dependencies: threatveil-core, reqwest, async-trait, serde_json
// ============================================================================

//! ## Overview
//! The Gemini provider turns a scan snapshot into a short prose summary.
//! Prose is never authoritative: every failure path substitutes the
//! deterministic template from the core, and deployments without an API key
//! wire the core's null capability instead of this provider.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use serde_json::json;
use threatveil_core::SummaryError;
use threatveil_core::SummaryInput;
use threatveil_core::SummaryProvider;

use threatveil_probes::adapter::CONNECT_TIMEOUT;
use threatveil_probes::adapter::READ_TIMEOUT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default generative-language endpoint.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Model invoked for summaries.
const MODEL: &str = "gemini-1.5-pro";
/// Signals included in the prompt payload.
const PROMPT_SIGNAL_CAP: usize = 12;
/// Word budget for the returned summary.
const SUMMARY_WORD_CAP: usize = 120;

// ============================================================================
// SECTION: Gemini Provider
// ============================================================================

/// Gemini-backed summary provider.
pub struct GeminiSummary {
    /// HTTP client.
    client: Client,
    /// API base URL (overridable for tests).
    base_url: String,
    /// API key.
    api_key: String,
}

impl GeminiSummary {
    /// Creates a provider with the given API key.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryError::Provider`] when the HTTP client cannot be
    /// constructed.
    pub fn new(api_key: impl Into<String>) -> Result<Self, SummaryError> {
        threatveil_probes::adapter::ensure_crypto_provider();
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|err| SummaryError::Provider(err.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Overrides the API base URL (test hook).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Builds the grounding payload for the prompt.
    fn prompt_payload(input: &SummaryInput<'_>) -> Value {
        let signals: Vec<Value> = input
            .signals
            .iter()
            .take(PROMPT_SIGNAL_CAP)
            .map(|signal| {
                json!({
                    "id": signal.id,
                    "severity": signal.severity,
                    "category": signal.category,
                    "detail": signal.detail,
                })
            })
            .collect();
        json!({
            "risk_score": input.risk_score,
            "likelihoods": input.likelihoods,
            "signals": signals,
        })
    }
}

/// Clamps prose to the word budget by truncating whole words.
fn clamp_words(text: &str, cap: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= cap { text.trim().to_string() } else { words[..cap].join(" ") }
}

#[async_trait]
impl SummaryProvider for GeminiSummary {
    async fn summarize(&self, input: SummaryInput<'_>) -> Result<String, SummaryError> {
        let prompt = format!(
            "SYSTEM: You are Veil Analyst. Provide a summary of at most {SUMMARY_WORD_CAP} \
             words and 2 short remediation actions.\nUSER: {}",
            Self::prompt_payload(&input)
        );
        let url = format!(
            "{}/v1beta/models/{MODEL}:generateContent?key={}",
            self.base_url, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.2,
                "topK": 40,
                "topP": 0.9,
                "maxOutputTokens": 300,
            },
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| SummaryError::Provider(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SummaryError::Provider(format!(
                "summary endpoint returned {}",
                response.status()
            )));
        }
        let payload: Value = response
            .json()
            .await
            .map_err(|err| SummaryError::Provider(err.to_string()))?;
        let text = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| SummaryError::Provider("no candidates in response".to_string()))?;
        Ok(clamp_words(text, SUMMARY_WORD_CAP))
    }
}
