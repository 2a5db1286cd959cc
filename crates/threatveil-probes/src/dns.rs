// crates/threatveil-probes/src/dns.rs
// ============================================================================
// Module: DNS Probe
// Description: Record lookups plus DMARC and SPF hygiene findings.
// Purpose: Surface mail-spoofing exposure from public DNS records.
// Dependencies: threatveil-core, hickory-resolver, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Resolves A, AAAA, MX, and TXT records for the target plus the
//! `_dmarc.<domain>` TXT record. Missing DMARC and missing SPF each emit a
//! medium finding. Individual lookup failures are treated as empty record
//! sets; only resolver-level failures escape to the shield.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::config::ResolverOpts;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;

use crate::adapter::Probe;
use crate::adapter::ProbeContext;
use crate::adapter::ProbeError;
use crate::adapter::ProbeOutcome;

// ============================================================================
// SECTION: DNS Probe
// ============================================================================

/// DNS record probe.
pub struct DnsProbe {
    /// Shared tokio resolver.
    resolver: TokioAsyncResolver,
}

impl DnsProbe {
    /// Creates a probe with the system-default resolver configuration.
    #[must_use]
    #[allow(
        clippy::field_reassign_with_default,
        reason = "ResolverOpts is non-exhaustive; fields are set after default construction."
    )]
    pub fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = std::time::Duration::from_secs(5);
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }

    /// Looks up A records, returning an empty set on failure.
    async fn lookup_a(&self, domain: &str) -> Vec<String> {
        match self.resolver.ipv4_lookup(domain).await {
            Ok(lookup) => lookup.iter().map(ToString::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Looks up AAAA records, returning an empty set on failure.
    async fn lookup_aaaa(&self, domain: &str) -> Vec<String> {
        match self.resolver.ipv6_lookup(domain).await {
            Ok(lookup) => lookup.iter().map(ToString::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Looks up MX records, returning an empty set on failure.
    async fn lookup_mx(&self, domain: &str) -> Vec<String> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => lookup.iter().map(ToString::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Looks up TXT records, returning an empty set on failure.
    async fn lookup_txt(&self, domain: &str) -> Vec<String> {
        match self.resolver.txt_lookup(domain).await {
            Ok(lookup) => lookup.iter().map(ToString::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for DnsProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for DnsProbe {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn display_name(&self) -> &'static str {
        "DNS"
    }

    fn failure_category(&self) -> Category {
        Category::Network
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError> {
        let domain = ctx.domain.as_str();
        let a = self.lookup_a(domain).await;
        let aaaa = self.lookup_aaaa(domain).await;
        let mx = self.lookup_mx(domain).await;
        let txt = self.lookup_txt(domain).await;
        let dmarc = self.lookup_txt(&format!("_dmarc.{domain}")).await;

        let metadata = json!({
            "A": a,
            "AAAA": aaaa,
            "MX": mx,
            "TXT": txt,
            "DMARC": dmarc,
        });

        let mut signals = Vec::new();
        if dmarc.is_empty() {
            signals.push(Signal::finding(
                "dns_missing_dmarc",
                SignalKind::Dns,
                "Missing DMARC Record",
                "Missing DMARC record",
                Severity::Medium,
                Category::DataExposure,
                EvidenceEnvelope::rule("dns", ctx.observed_at, json!({ "records": metadata })),
            ));
        }
        let spf_present = txt.iter().any(|record| record.to_ascii_lowercase().contains("v=spf"));
        if !spf_present {
            signals.push(Signal::finding(
                "dns_missing_spf",
                SignalKind::Dns,
                "Missing SPF Record",
                "No SPF record detected",
                Severity::Medium,
                Category::Network,
                EvidenceEnvelope::rule("dns", ctx.observed_at, json!({ "records": txt })),
            ));
        }

        Ok(ProbeOutcome::new(metadata, signals))
    }
}
