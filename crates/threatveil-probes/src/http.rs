// crates/threatveil-probes/src/http.rs
// ============================================================================
// Module: HTTP Probe
// Description: HTTPS reachability, redirect enforcement, and header hygiene.
// Purpose: Surface transport and security-header findings plus tech tokens.
// Dependencies: threatveil-core, reqwest, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Two requests per scan: `https://<domain>` following redirects, and
//! `http://<domain>` without redirects to check HTTPS enforcement. Response
//! headers feed the required-header check and the tech fingerprint used by
//! the dependent vulnerability probe. The HTTPS endpoint being unreachable
//! is itself a high finding, not a probe failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
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
use crate::fingerprint::tech_fingerprint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Security headers every HTTPS endpoint is expected to serve.
const REQUIRED_HEADERS: [&str; 6] = [
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
    "referrer-policy",
    "permissions-policy",
];

/// Headers whose absence is a high finding rather than medium.
const HIGH_SEVERITY_HEADERS: [&str; 2] =
    ["strict-transport-security", "content-security-policy"];

// ============================================================================
// SECTION: HTTP Probe
// ============================================================================

/// HTTPS and HTTP response probe.
pub struct HttpProbe {
    /// Client that follows redirects (HTTPS fetch).
    follow_client: Client,
    /// Client that never follows redirects (HTTP enforcement check).
    direct_client: Client,
    /// Base scheme override used by tests to point at a local listener.
    base_override: Option<String>,
}

impl HttpProbe {
    /// Creates a probe with the given user agent.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Transport`] when the HTTP clients cannot be
    /// constructed.
    pub fn new(user_agent: &str) -> Result<Self, ProbeError> {
        crate::adapter::ensure_crypto_provider();
        let follow_client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .redirect(Policy::limited(5))
            .build()
            .map_err(|err| ProbeError::Transport(err.to_string()))?;
        let direct_client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .map_err(|err| ProbeError::Transport(err.to_string()))?;
        Ok(Self {
            follow_client,
            direct_client,
            base_override: None,
        })
    }

    /// Points both requests at an explicit base URL instead of the domain.
    ///
    /// Test hook for local listeners; production scans always derive URLs
    /// from the scan domain.
    #[must_use]
    pub fn with_base_override(mut self, base: impl Into<String>) -> Self {
        self.base_override = Some(base.into());
        self
    }

    /// Returns the HTTPS URL probed for this context.
    fn https_url(&self, domain: &str) -> String {
        self.base_override.clone().unwrap_or_else(|| format!("https://{domain}"))
    }

    /// Returns the HTTP URL probed for this context.
    fn http_url(&self, domain: &str) -> String {
        self.base_override.clone().unwrap_or_else(|| format!("http://{domain}"))
    }

    /// Fetches the HTTPS endpoint and collects lowercase headers.
    async fn fetch_https(
        &self,
        url: &str,
    ) -> Result<(StatusCode, BTreeMap<String, String>), ProbeError> {
        let response = with_backoff(|| async {
            self.follow_client
                .get(url)
                .send()
                .await
                .map_err(|err| ProbeError::Transport(err.to_string()))
        })
        .await?;
        let status = response.status();
        let headers = lower_headers(response.headers());
        Ok((status, headers))
    }

    /// Fetches the HTTP endpoint without following redirects.
    async fn fetch_http(
        &self,
        url: &str,
    ) -> Result<(StatusCode, BTreeMap<String, String>), ProbeError> {
        let response = with_backoff(|| async {
            self.direct_client
                .get(url)
                .send()
                .await
                .map_err(|err| ProbeError::Transport(err.to_string()))
        })
        .await?;
        let status = response.status();
        let headers = lower_headers(response.headers());
        Ok((status, headers))
    }
}

/// Lowercases response headers into an ordered map.
fn lower_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &'static str {
        "http"
    }

    fn display_name(&self) -> &'static str {
        "HTTP"
    }

    fn failure_category(&self) -> Category {
        Category::Network
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError> {
        let domain = ctx.domain.as_str();
        let https_url = self.https_url(domain);
        let http_url = self.http_url(domain);
        let mut signals = Vec::new();
        let mut headers_lower = BTreeMap::new();
        let mut https_meta = Value::Null;
        let mut http_meta = Value::Null;
        let mut redirect_to_https = false;

        match self.fetch_https(&https_url).await {
            Ok((status, headers)) => {
                https_meta = json!({ "status": status.as_u16(), "headers": headers });
                headers_lower = headers;
            }
            Err(_) => {
                signals.push(Signal::finding(
                    "http_https_unreachable",
                    SignalKind::Http,
                    "HTTPS Endpoint Unreachable",
                    "HTTPS endpoint unreachable",
                    Severity::High,
                    Category::Network,
                    EvidenceEnvelope::rule("https", ctx.observed_at, json!({}))
                        .with_url(https_url.clone()),
                ));
            }
        }

        match self.fetch_http(&http_url).await {
            Ok((status, headers)) => {
                http_meta = json!({ "status": status.as_u16(), "headers": headers });
                let location = headers.get("location").map(String::as_str).unwrap_or_default();
                if status.is_redirection() && location.starts_with("https://") {
                    redirect_to_https = true;
                } else {
                    signals.push(Signal::finding(
                        "http_no_https_redirect",
                        SignalKind::Http,
                        "HTTP Does Not Enforce HTTPS",
                        "HTTP endpoint does not enforce HTTPS redirect",
                        Severity::High,
                        Category::Network,
                        EvidenceEnvelope::rule(
                            "http",
                            ctx.observed_at,
                            json!({ "status": status.as_u16() }),
                        )
                        .with_url(http_url.clone()),
                    ));
                }
            }
            // A dead cleartext listener is not a finding; HTTPS carries the
            // reachability signal.
            Err(_) => {}
        }

        if !headers_lower.is_empty() {
            let present: Vec<&String> = headers_lower.keys().collect();
            for header in REQUIRED_HEADERS {
                if !headers_lower.contains_key(header) {
                    let severity = if HIGH_SEVERITY_HEADERS.contains(&header) {
                        Severity::High
                    } else {
                        Severity::Medium
                    };
                    signals.push(Signal::finding(
                        format!("http_header_{}_missing", header.replace('-', "_")),
                        SignalKind::Http,
                        format!("Missing {header} Header"),
                        format!("Missing {header} header"),
                        severity,
                        Category::Software,
                        EvidenceEnvelope::rule(
                            "https",
                            ctx.observed_at,
                            json!({ "headers": present }),
                        )
                        .with_url(https_url.clone()),
                    ));
                }
            }
        }

        let tech_tokens = tech_fingerprint(&headers_lower);
        let metadata = json!({
            "https": https_meta,
            "http": http_meta,
            "headers": headers_lower,
            "redirect_to_https": redirect_to_https,
            "tech_tokens": tech_tokens,
        });
        Ok(ProbeOutcome::new(metadata, signals))
    }
}
