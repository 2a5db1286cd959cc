// crates/threatveil-core/src/core/signal.rs
// ============================================================================
// Module: ThreatVeil Signal Model
// Description: Normalized findings with their evidence envelopes.
// Purpose: Provide the single Signal schema every probe output collapses into.
// Dependencies: crate::core::time, serde, serde_json
// ============================================================================

//! ## Overview
//! Every probe result, however heterogeneous at the source, is normalized
//! into a [`Signal`] carrying an [`EvidenceEnvelope`]. The envelope is the
//! contract for downstream scoring, decision derivation, verification, and
//! AI grounding; it is mandatory and never empty. Service failures become
//! ordinary low-severity signals via [`Signal::service_error`], which is how
//! partial probe failure stays visible without failing a scan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Finding severity.
///
/// # Invariants
/// - Variants are stable for serialization and rule matching.
/// - Ordering is ascending: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational or hygiene finding.
    Low,
    /// Finding that should be scheduled for remediation.
    Medium,
    /// Finding with a plausible exploitation path.
    High,
    /// Finding with an active or imminent exploitation path.
    Critical,
}

impl Severity {
    /// Returns the scoring points contributed by a signal of this severity.
    #[must_use]
    pub const fn points(self) -> u32 {
        match self {
            Self::Low => 5,
            Self::Medium => 15,
            Self::High => 30,
            Self::Critical => 50,
        }
    }

    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

// ============================================================================
// SECTION: Category
// ============================================================================

/// Risk category a signal contributes to.
///
/// # Invariants
/// - Variants are stable for serialization and score weighting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Network exposure (DNS, TLS, reachability).
    Network,
    /// Software weaknesses (missing headers, CVEs).
    Software,
    /// Data exposure (leaked secrets, missing DMARC).
    DataExposure,
    /// AI integration surface (leaked AI keys, agent frameworks).
    AiIntegration,
}

impl Category {
    /// All categories in weighting order.
    pub const ALL: [Self; 4] =
        [Self::Network, Self::Software, Self::DataExposure, Self::AiIntegration];

    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Software => "software",
            Self::DataExposure => "data_exposure",
            Self::AiIntegration => "ai_integration",
        }
    }
}

// ============================================================================
// SECTION: Signal Kind
// ============================================================================

/// Source family of a signal.
///
/// # Invariants
/// - Variants are stable for serialization and verification rule matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// DNS record findings.
    Dns,
    /// HTTP response and security-header findings.
    Http,
    /// TLS certificate findings.
    Tls,
    /// Certificate-transparency log findings.
    Ct,
    /// Vulnerability-database findings.
    Cve,
    /// Code-search findings (leaked secrets, AI indicators).
    CodeSearch,
    /// Threat-intelligence feed findings.
    ThreatIntel,
    /// Synthetic or guard signals (service errors, clean-scan markers).
    AiGuard,
}

// ============================================================================
// SECTION: Detection Method
// ============================================================================

/// How a finding was detected.
///
/// # Invariants
/// - Variants are stable; `Error` marks service-error signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Deterministic rule evaluation.
    Rule,
    /// Statistical or model-derived detection.
    Ml,
    /// Probe failure converted to a visible signal.
    Error,
    /// Manually entered finding.
    Manual,
}

// ============================================================================
// SECTION: Evidence Envelope
// ============================================================================

/// Standardized evidence attached to every signal.
///
/// # Invariants
/// - `observed_at` is UTC and monotonic per probe within one scan.
/// - `confidence` is within `[0.0, 1.0]`.
/// - `raw` preserves the probe payload for audit; it is opaque to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEnvelope {
    /// Service that produced the evidence (probe name).
    #[serde(rename = "source")]
    pub source_service: String,
    /// Moment the evidence was observed.
    pub observed_at: Timestamp,
    /// Optional reference URL for the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Raw probe payload fragment backing the finding.
    pub raw: Value,
    /// External references (CVE URLs, repository links).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_refs: Vec<String>,
    /// Detection method classification.
    pub detection_method: DetectionMethod,
    /// Detection confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Optional grounding notes for non-authoritative prose generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_for_ai: Option<String>,
}

impl EvidenceEnvelope {
    /// Builds a rule-derived envelope with the default confidence.
    #[must_use]
    pub fn rule(source_service: impl Into<String>, observed_at: Timestamp, raw: Value) -> Self {
        Self {
            source_service: source_service.into(),
            observed_at,
            url: None,
            raw,
            external_refs: Vec::new(),
            detection_method: DetectionMethod::Rule,
            confidence: 0.8,
            notes_for_ai: None,
        }
    }

    /// Attaches a reference URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attaches external references.
    #[must_use]
    pub fn with_external_refs(mut self, refs: Vec<String>) -> Self {
        self.external_refs = refs;
        self
    }

    /// Overrides the detection confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Normalized security finding.
///
/// # Invariants
/// - `evidence` is always present and non-empty.
/// - `id` is stable per finding kind so repeated scans produce comparable
///   signal sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Stable finding identifier (for example `dns_missing_dmarc`).
    pub id: String,
    /// Source family.
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Short human title.
    pub title: String,
    /// Detailed description of the finding.
    pub detail: String,
    /// Severity level.
    pub severity: Severity,
    /// Risk category.
    pub category: Category,
    /// Mandatory evidence envelope.
    pub evidence: EvidenceEnvelope,
}

impl Signal {
    /// Prefix shared by all service-error signal identifiers.
    pub const SERVICE_ERROR_PREFIX: &'static str = "service_";
    /// Suffix shared by all service-error signal identifiers.
    pub const SERVICE_ERROR_SUFFIX: &'static str = "_failure";

    /// Builds a finding signal.
    #[must_use]
    pub fn finding(
        id: impl Into<String>,
        kind: SignalKind,
        title: impl Into<String>,
        detail: impl Into<String>,
        severity: Severity,
        category: Category,
        evidence: EvidenceEnvelope,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            detail: detail.into(),
            severity,
            category,
            evidence,
        }
    }

    /// Builds the standardized service-error signal for a failed probe.
    ///
    /// Probe failure is absorbed into a visible low-severity signal so a scan
    /// with partial failures still completes with an honest result set.
    #[must_use]
    pub fn service_error(
        service: &str,
        error_type: &str,
        error_text: &str,
        category: Category,
        observed_at: Timestamp,
    ) -> Self {
        let service_lower = service.to_ascii_lowercase();
        let raw = json!({
            "error": error_text,
            "error_type": error_type,
            "service": service,
        });
        Self {
            id: format!("{}{service_lower}{}", Self::SERVICE_ERROR_PREFIX, Self::SERVICE_ERROR_SUFFIX),
            kind: SignalKind::AiGuard,
            title: format!("{service} Unavailable"),
            detail: format!("{service} check failed, results may be incomplete."),
            severity: Severity::Low,
            category,
            evidence: EvidenceEnvelope {
                source_service: service_lower,
                observed_at,
                url: None,
                raw,
                external_refs: Vec::new(),
                detection_method: DetectionMethod::Error,
                confidence: 1.0,
                notes_for_ai: None,
            },
        }
    }

    /// Builds the synthetic marker signal appended when a scan found nothing.
    ///
    /// Downstream consumers never see an empty signal set.
    #[must_use]
    pub fn no_findings(observed_at: Timestamp) -> Self {
        Self {
            id: "scan_completed_no_findings".to_string(),
            kind: SignalKind::AiGuard,
            title: "Scan Completed".to_string(),
            detail: "Scan completed with no critical findings".to_string(),
            severity: Severity::Low,
            category: Category::Software,
            evidence: EvidenceEnvelope::rule("system", observed_at, json!({})),
        }
    }

    /// Returns true when this signal records a probe failure.
    #[must_use]
    pub fn is_service_error(&self) -> bool {
        self.evidence.detection_method == DetectionMethod::Error
            && self.id.starts_with(Self::SERVICE_ERROR_PREFIX)
            && self.id.ends_with(Self::SERVICE_ERROR_SUFFIX)
    }
}
