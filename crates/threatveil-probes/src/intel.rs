// crates/threatveil-probes/src/intel.rs
// ============================================================================
// Module: Threat Intelligence Probe
// Description: Domain-indicator pulse lookups against the OTX feed.
// Purpose: Surface whether the domain already appears in threat reporting.
// Dependencies: threatveil-core, reqwest, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Queries the threat-intelligence feed's domain indicator endpoint. A
//! domain appearing in more than five pulses is a medium finding, one to
//! five a low finding. A missing API key is an absent capability and
//! surfaces as a service-error signal via the shield.

// ============================================================================
// SECTION: Imports
// ============================================================================

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

/// Default feed base URL.
const DEFAULT_BASE_URL: &str = "https://otx.alienvault.com";
/// Pulse count above which the finding is medium.
const MEDIUM_PULSE_THRESHOLD: u64 = 5;
/// API key header name.
const API_KEY_HEADER: &str = "X-OTX-API-KEY";

// ============================================================================
// SECTION: Threat Intel Probe
// ============================================================================

/// Threat-intelligence feed probe.
pub struct ThreatIntelProbe {
    /// HTTP client.
    client: Client,
    /// Feed base URL (overridable for tests).
    base_url: String,
    /// Feed API key; absent means the capability is off.
    api_key: Option<String>,
}

impl ThreatIntelProbe {
    /// Creates a probe for the default feed.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Transport`] when the HTTP client cannot be
    /// constructed.
    pub fn new(user_agent: &str, api_key: Option<String>) -> Result<Self, ProbeError> {
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
            api_key,
        })
    }

    /// Overrides the feed base URL (test hook).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Probe for ThreatIntelProbe {
    fn name(&self) -> &'static str {
        "threat_intel"
    }

    fn display_name(&self) -> &'static str {
        "ThreatIntel"
    }

    fn failure_category(&self) -> Category {
        Category::Network
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProbeError::MissingCredential("THREAT_INTEL_API_KEY"));
        };
        let url =
            format!("{}/api/v1/indicators/domain/{}/general", self.base_url, ctx.domain);
        let response = with_backoff(|| async {
            self.client
                .get(&url)
                .header(API_KEY_HEADER, api_key)
                .send()
                .await
                .map_err(|err| ProbeError::Transport(err.to_string()))
        })
        .await?;
        if !response.status().is_success() {
            return Err(ProbeError::InvalidResponse(format!(
                "feed returned {}",
                response.status()
            )));
        }
        let metadata: Value = response
            .json()
            .await
            .map_err(|err| ProbeError::InvalidResponse(err.to_string()))?;

        let pulse_info = metadata.get("pulse_info").cloned().unwrap_or_else(|| json!({}));
        let pulse_count =
            pulse_info.get("count").and_then(Value::as_u64).unwrap_or_default();

        let mut signals = Vec::new();
        if pulse_count > 0 {
            let severity = if pulse_count > MEDIUM_PULSE_THRESHOLD {
                Severity::Medium
            } else {
                Severity::Low
            };
            let sample: Vec<Value> = pulse_info
                .get("pulses")
                .and_then(Value::as_array)
                .map(|pulses| pulses.iter().take(3).cloned().collect())
                .unwrap_or_default();
            signals.push(Signal::finding(
                "threat_intel_pulse_match",
                SignalKind::ThreatIntel,
                "Domain Seen In Threat Reporting",
                format!("Domain seen in {pulse_count} threat intelligence pulse(s)"),
                severity,
                Category::Network,
                EvidenceEnvelope::rule(
                    "threat_intel",
                    ctx.observed_at,
                    json!({ "pulse_count": pulse_count, "pulses": sample }),
                )
                .with_url(url),
            ));
        }
        Ok(ProbeOutcome::new(metadata, signals))
    }
}
