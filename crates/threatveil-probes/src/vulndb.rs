// crates/threatveil-probes/src/vulndb.rs
// ============================================================================
// Module: Vulnerability Database Probe
// Description: Keyword CVE search over the tech fingerprint tokens.
// Purpose: Map published CVEs onto the technologies a domain advertises.
// Dependencies: threatveil-core, reqwest, async-trait, serde_json, tokio
// ============================================================================

//! ## Overview
//! Stage-B probe: takes up to three tech-fingerprint tokens extracted from
//! the HTTP probe and runs one keyword search per token, paced to respect
//! the source's rate limits. Each unique CVE id becomes one signal with its
//! best CVSS score (v3.1 preferred over v3.0 over v2.0) mapped onto the
//! severity ladder.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;

use crate::adapter::CONNECT_TIMEOUT;
use crate::adapter::ProbeError;
use crate::adapter::ProbeOutcome;
use crate::adapter::READ_TIMEOUT;
use crate::adapter::with_backoff;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default vulnerability database endpoint.
const DEFAULT_BASE_URL: &str = "https://vulners.com";
/// API key header name.
const API_KEY_HEADER: &str = "X-Vulners-Api-Key";
/// Maximum fingerprint tokens searched per scan.
const MAX_TOKENS: usize = 3;
/// Results requested per token query.
const RESULTS_PER_TOKEN: usize = 10;
/// Pause between token queries to respect source rate limits.
const QUERY_PACING: Duration = Duration::from_millis(600);

// ============================================================================
// SECTION: CVSS Handling
// ============================================================================

/// Extracts the best available CVSS score from a search hit.
///
/// Preference order: v3.1, then v3.0, then v2.0, then the source's generic
/// `cvss.score` field.
#[must_use]
pub fn best_cvss(source: &Value) -> f64 {
    let versioned = [
        source.pointer("/cvss3_1/score"),
        source.pointer("/cvss3/score"),
        source.pointer("/cvss2/score"),
        source.pointer("/cvss/score"),
    ];
    for candidate in versioned {
        if let Some(score) = candidate.and_then(Value::as_f64) {
            return score;
        }
    }
    0.0
}

/// Maps a CVSS score onto the severity ladder.
#[must_use]
pub fn severity_from_cvss(score: f64) -> Severity {
    if score >= 9.0 {
        Severity::Critical
    } else if score >= 7.0 {
        Severity::High
    } else if score >= 4.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

// ============================================================================
// SECTION: Vulnerability Probe
// ============================================================================

/// Vulnerability database probe over fingerprint tokens.
pub struct VulnDbProbe {
    /// HTTP client.
    client: Client,
    /// Database base URL (overridable for tests).
    base_url: String,
    /// Database API key; absent means the capability is off.
    api_key: Option<String>,
    /// Pause between token queries.
    pacing: Duration,
}

impl VulnDbProbe {
    /// Creates a probe for the default database.
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
            pacing: QUERY_PACING,
        })
    }

    /// Overrides the database base URL (test hook).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the inter-query pacing (test hook).
    #[must_use]
    pub const fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Runs one keyword query and returns the raw search hits.
    async fn search_token(&self, api_key: &str, token: &str) -> Result<Vec<Value>, ProbeError> {
        let url = format!("{}/api/v3/search/lucene/", self.base_url);
        let payload = json!({
            "query": format!("\"{token}\" AND type:cve"),
            "size": RESULTS_PER_TOKEN,
        });
        let response = with_backoff(|| async {
            self.client
                .post(&url)
                .header(API_KEY_HEADER, api_key)
                .json(&payload)
                .send()
                .await
                .map_err(|err| ProbeError::Transport(err.to_string()))
        })
        .await?;
        if !response.status().is_success() {
            return Err(ProbeError::InvalidResponse(format!(
                "database returned {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| ProbeError::InvalidResponse(err.to_string()))?;
        Ok(body
            .pointer("/data/search")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }
}

impl VulnDbProbe {
    /// Probe name used as the `raw_payload` key.
    pub const NAME: &'static str = "vulndb";
    /// Display name used in service-error signal titles.
    pub const DISPLAY_NAME: &'static str = "VulnDB";
    /// Category a service-error signal for this probe lands in.
    pub const FAILURE_CATEGORY: Category = Category::Software;

    /// Searches the database over the fingerprint tokens.
    ///
    /// The caller skips this probe entirely when `tokens` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the database could not be queried; the
    /// orchestrator's shield converts this into a service-error signal.
    pub async fn search(
        &self,
        tokens: &[String],
        observed_at: Timestamp,
    ) -> Result<ProbeOutcome, ProbeError> {
        if tokens.is_empty() {
            return Ok(ProbeOutcome::new(json!({ "cves": [] }), Vec::new()));
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProbeError::MissingCredential("VULNDB_API_KEY"));
        };

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut cves: Vec<Value> = Vec::new();
        let mut signals: Vec<Signal> = Vec::new();
        for (index, token) in tokens.iter().take(MAX_TOKENS).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let hits = self.search_token(api_key, token).await?;
            for hit in hits {
                let source = hit.get("_source").cloned().unwrap_or(hit);
                let Some(cve_id) = source.get("id").and_then(Value::as_str) else {
                    continue;
                };
                if !seen.insert(cve_id.to_string()) {
                    continue;
                }
                let score = best_cvss(&source);
                let severity = severity_from_cvss(score);
                let title =
                    source.get("title").and_then(Value::as_str).unwrap_or("Unknown vulnerability");
                let href =
                    source.get("href").and_then(Value::as_str).unwrap_or_default().to_string();
                let cve = json!({
                    "id": cve_id,
                    "title": title,
                    "score": score,
                    "severity": severity,
                    "href": href,
                    "token": token,
                });
                cves.push(cve.clone());
                let mut evidence = EvidenceEnvelope::rule("vulndb", observed_at, cve.clone());
                if !href.is_empty() {
                    evidence =
                        evidence.with_url(href.clone()).with_external_refs(vec![href.clone()]);
                }
                signals.push(Signal::finding(
                    format!("cve_{cve_id}"),
                    SignalKind::Cve,
                    format!("{cve_id} Applies To Detected Stack"),
                    format!("{cve_id}: {title} (CVSS {score:.1})"),
                    severity,
                    Category::Software,
                    evidence,
                ));
            }
        }
        Ok(ProbeOutcome::new(json!({ "cves": cves }), signals))
    }
}
