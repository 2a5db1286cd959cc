// crates/threatveil-probes/src/ctlog.rs
// ============================================================================
// Module: Certificate Transparency Probe
// Description: Recent CT log entries and issuance churn for a domain.
// Purpose: Flag unusually high certificate issuance activity.
// Dependencies: threatveil-core, reqwest, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Queries the certificate-transparency aggregator for recent entries,
//! deduplicates by entry id, and emits a medium `ct_high_churn` finding when
//! the unique count exceeds the churn threshold.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;

use crate::adapter::CONNECT_TIMEOUT;
use crate::adapter::Probe;
use crate::adapter::ProbeContext;
use crate::adapter::ProbeError;
use crate::adapter::ProbeOutcome;
use crate::adapter::READ_TIMEOUT;
use crate::adapter::with_backoff;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default CT aggregator endpoint.
const DEFAULT_BASE_URL: &str = "https://crt.sh";
/// Unique-entry count above which issuance churn is flagged.
const HIGH_CHURN_THRESHOLD: usize = 50;

// ============================================================================
// SECTION: CT Log Probe
// ============================================================================

/// Certificate-transparency log probe.
pub struct CtLogProbe {
    /// HTTP client.
    client: Client,
    /// Aggregator base URL (overridable for tests).
    base_url: String,
}

impl CtLogProbe {
    /// Creates a probe against the default aggregator.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(user_agent: &str) -> Result<Self, ProbeError> {
        crate::adapter::ensure_crypto_provider();
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()
            .map_err(|err| ProbeError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Overrides the aggregator base URL (test hook).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Probe for CtLogProbe {
    fn name(&self) -> &'static str {
        "ct"
    }

    fn display_name(&self) -> &'static str {
        "CT"
    }

    fn failure_category(&self) -> Category {
        Category::Network
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError> {
        let url = format!("{}/?q={}&output=json", self.base_url, ctx.domain);
        let response = with_backoff(|| async {
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|err| ProbeError::Transport(err.to_string()))
        })
        .await?;
        if !response.status().is_success() {
            return Err(ProbeError::InvalidResponse(format!(
                "aggregator returned {}",
                response.status()
            )));
        }
        // An empty or non-JSON body means no recent entries.
        let entries: Vec<Value> = response.json().await.unwrap_or_default();

        let mut unique: BTreeMap<i64, Value> = BTreeMap::new();
        for entry in entries {
            if let Some(id) = entry.get("id").and_then(Value::as_i64) {
                unique.insert(id, entry);
            }
        }
        let count = unique.len();
        let metadata = json!({
            "count": count,
            "entries": unique.values().collect::<Vec<_>>(),
        });

        let mut signals = Vec::new();
        if count > HIGH_CHURN_THRESHOLD {
            signals.push(Signal::finding(
                "ct_high_churn",
                SignalKind::Ct,
                "High Certificate Issuance Churn",
                "High number of recent CT log entries",
                Severity::Medium,
                Category::Network,
                EvidenceEnvelope::rule("ctlog", ctx.observed_at, json!({ "count": count }))
                    .with_url(url),
            ));
        }
        Ok(ProbeOutcome::new(metadata, signals))
    }
}
