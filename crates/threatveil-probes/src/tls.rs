// crates/threatveil-probes/src/tls.rs
// ============================================================================
// Module: TLS Probe
// Description: Certificate handshake and expiry-runway findings.
// Purpose: Surface expired and expiring certificates before they break trust.
// Dependencies: threatveil-core, rustls, rustls-pki-types, webpki-roots, x509-parser
// ============================================================================

//! ## Overview
//! Opens a TLS connection to port 443, captures the peer's leaf certificate,
//! and computes `days_to_expiry` from its `notAfter` field. The severity
//! ladder: expired is critical, seven days or less is high, thirty days or
//! less is medium; healthy certificates record metadata only. Connection
//! failure is a high `tls_unreachable` finding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;

use async_trait::async_trait;
use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls_pki_types::ServerName;
use serde_json::json;
use threatveil_core::Category;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use x509_parser::prelude::FromDer;
use x509_parser::prelude::X509Certificate;

use crate::adapter::CONNECT_TIMEOUT;
use crate::adapter::Probe;
use crate::adapter::ProbeContext;
use crate::adapter::ProbeError;
use crate::adapter::ProbeOutcome;
use crate::adapter::READ_TIMEOUT;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// TLS port probed.
const TLS_PORT: u16 = 443;
/// Days of runway at or below which expiry is a high finding.
const HIGH_RUNWAY_DAYS: i64 = 7;
/// Days of runway at or below which expiry is a medium finding.
pub const MEDIUM_RUNWAY_DAYS: i64 = 30;

// ============================================================================
// SECTION: Certificate Summary
// ============================================================================

/// Parsed facts about the peer certificate.
#[derive(Debug, Clone)]
pub struct CertificateSummary {
    /// Certificate subject.
    pub subject: String,
    /// Certificate issuer.
    pub issuer: String,
    /// `notAfter` as unix seconds.
    pub not_after: i64,
}

impl CertificateSummary {
    /// Returns the whole days of validity remaining at `now`.
    #[must_use]
    pub fn days_to_expiry(&self, now: Timestamp) -> i64 {
        let expiry = Timestamp::from_unix_seconds(self.not_after).unwrap_or(Timestamp::UNIX_EPOCH);
        expiry.whole_days_since(now)
    }
}

// ============================================================================
// SECTION: TLS Probe
// ============================================================================

/// TLS certificate probe.
pub struct TlsProbe {
    /// Shared client configuration with the webpki root set.
    config: Arc<ClientConfig>,
}

impl TlsProbe {
    /// Creates a probe using the bundled webpki trust anchors.
    #[must_use]
    pub fn new() -> Self {
        crate::adapter::ensure_crypto_provider();
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        Self {
            config: Arc::new(config),
        }
    }

    /// Performs the blocking handshake and certificate capture.
    fn fetch_certificate(
        config: &Arc<ClientConfig>,
        domain: &str,
    ) -> Result<CertificateSummary, ProbeError> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|err| ProbeError::InvalidResponse(err.to_string()))?;
        let connection = ClientConnection::new(Arc::clone(config), server_name)
            .map_err(|err| ProbeError::Transport(err.to_string()))?;
        let address = (domain, TLS_PORT);
        let tcp = connect_with_timeout(address)?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))
            .and_then(|()| tcp.set_write_timeout(Some(READ_TIMEOUT)))
            .map_err(|err| ProbeError::Transport(err.to_string()))?;
        let mut stream = StreamOwned::new(connection, tcp);
        // A minimal request drives the handshake to completion; the response
        // body is irrelevant.
        stream
            .write_all(format!("HEAD / HTTP/1.0\r\nHost: {domain}\r\n\r\n").as_bytes())
            .map_err(|err| ProbeError::Transport(err.to_string()))?;
        let mut scratch = [0_u8; 1];
        let _ = stream.read(&mut scratch);
        let certificates = stream
            .conn
            .peer_certificates()
            .ok_or_else(|| ProbeError::InvalidResponse("no peer certificate".to_string()))?;
        let leaf = certificates
            .first()
            .ok_or_else(|| ProbeError::InvalidResponse("empty certificate chain".to_string()))?;
        let (_, parsed) = X509Certificate::from_der(leaf.as_ref())
            .map_err(|err| ProbeError::InvalidResponse(err.to_string()))?;
        Ok(CertificateSummary {
            subject: parsed.subject().to_string(),
            issuer: parsed.issuer().to_string(),
            not_after: parsed.validity().not_after.timestamp(),
        })
    }
}

impl Default for TlsProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Connects to the TLS endpoint with the probe's connect timeout.
fn connect_with_timeout(address: (&str, u16)) -> Result<TcpStream, ProbeError> {
    use std::net::ToSocketAddrs;
    let mut last_err = None;
    let resolved = address.to_socket_addrs().map_err(|err| ProbeError::Transport(err.to_string()))?;
    for addr in resolved {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(ProbeError::Transport(
        last_err.map_or_else(|| "no resolved addresses".to_string(), |err| err.to_string()),
    ))
}

/// Maps days of remaining validity onto the expiry severity ladder.
///
/// Returns `None` when the certificate has enough runway to skip a finding.
#[must_use]
pub const fn expiry_severity(days_to_expiry: i64) -> Option<Severity> {
    if days_to_expiry < 0 {
        Some(Severity::Critical)
    } else if days_to_expiry <= HIGH_RUNWAY_DAYS {
        Some(Severity::High)
    } else if days_to_expiry <= MEDIUM_RUNWAY_DAYS {
        Some(Severity::Medium)
    } else {
        None
    }
}

#[async_trait]
impl Probe for TlsProbe {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn display_name(&self) -> &'static str {
        "TLS"
    }

    fn failure_category(&self) -> Category {
        Category::Network
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError> {
        let domain = ctx.domain.clone();
        let config = Arc::clone(&self.config);
        let handshake =
            tokio::task::spawn_blocking(move || Self::fetch_certificate(&config, &domain))
                .await
                .map_err(|err| ProbeError::Transport(err.to_string()))?;

        let url = format!("https://{}", ctx.domain);
        match handshake {
            Ok(summary) => {
                let days = summary.days_to_expiry(ctx.observed_at);
                let metadata = json!({
                    "subject": summary.subject,
                    "issuer": summary.issuer,
                    "not_after": summary.not_after,
                    "days_to_expiry": days,
                });
                let mut signals = Vec::new();
                if let Some(severity) = expiry_severity(days) {
                    let (id, detail) = if days < 0 {
                        ("tls_expired", "TLS certificate has expired".to_string())
                    } else {
                        (
                            "tls_expiring_soon",
                            format!("TLS certificate expires within {MEDIUM_RUNWAY_DAYS} days"),
                        )
                    };
                    signals.push(Signal::finding(
                        id,
                        SignalKind::Tls,
                        "Certificate Expiry Risk",
                        detail,
                        severity,
                        Category::Network,
                        EvidenceEnvelope::rule(
                            "tls",
                            ctx.observed_at,
                            json!({ "days_remaining": days }),
                        )
                        .with_url(url),
                    ));
                }
                Ok(ProbeOutcome::new(metadata, signals))
            }
            Err(_) => Ok(ProbeOutcome::new(
                json!({}),
                vec![Signal::finding(
                    "tls_unreachable",
                    SignalKind::Tls,
                    "TLS Endpoint Unreachable",
                    "Unable to obtain TLS certificate",
                    Severity::High,
                    Category::Network,
                    EvidenceEnvelope::rule("tls", ctx.observed_at, json!({})).with_url(url),
                )],
            )),
        }
    }
}
