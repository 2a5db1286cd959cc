// crates/threatveil-probes/src/adapter.rs
// ============================================================================
// Module: Probe Adapter Contract
// Description: Shared probe trait, error shield, and bounded backoff.
// Purpose: Make partial probe failure a visible, non-blocking outcome.
// Dependencies: threatveil-core, async-trait, rand, tokio, tracing
// ============================================================================

//! ## Overview
//! A [`Probe`] queries one external source and returns `(metadata, signals)`.
//! Probes may fail internally, but the orchestrator only ever calls them
//! through [`shielded`], which applies the per-probe timeout and converts
//! any error into the standardized service-error signal. Transient failures
//! inside adapters are retried with [`with_backoff`] before they surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use threatveil_core::Category;
use threatveil_core::Signal;
use threatveil_core::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Per-probe wall-clock budget applied by the shield.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(20);
/// Connect timeout for outbound probe requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout for outbound probe requests.
pub const READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Installs `aws-lc-rs` as the process-wide rustls crypto provider.
///
/// Both TLS-backed probes depend on this running once before any client
/// construction; a second call is a no-op since the provider is already
/// installed.
pub fn ensure_crypto_provider() {
    let _: Result<(), _> = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Default retry attempts for transient failures.
const BACKOFF_ATTEMPTS: u32 = 3;
/// Base backoff delay in seconds.
const BACKOFF_BASE_SECS: f64 = 0.2;
/// Backoff delay cap in seconds.
const BACKOFF_CAP_SECS: f64 = 2.5;
/// Upper bound of the backoff jitter in seconds.
const BACKOFF_JITTER_SECS: f64 = 0.2;

// ============================================================================
// SECTION: Probe Errors
// ============================================================================

/// Errors a probe may fail with before the shield absorbs them.
///
/// # Invariants
/// - Variants are stable for error-type labelling in service-error signals.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Network transport failed.
    #[error("transport failure: {0}")]
    Transport(String),
    /// Remote service answered with an unusable payload.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// Required credential is not configured.
    #[error("{0} is not configured")]
    MissingCredential(&'static str),
    /// Probe exceeded its wall-clock budget.
    #[error("probe timed out")]
    Timeout,
}

impl ProbeError {
    /// Returns the stable error-type label recorded in evidence.
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::InvalidResponse(_) => "invalid_response",
            Self::MissingCredential(_) => "missing_credential",
            Self::Timeout => "timeout",
        }
    }
}

// ============================================================================
// SECTION: Probe Contract
// ============================================================================

/// Inputs shared by every probe in one scan.
///
/// # Invariants
/// - `domain` has passed validation before any probe runs.
/// - `observed_at` is the scan's start time; adapters stamp evidence with it.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    /// Validated scan target domain.
    pub domain: String,
    /// Optional validated code organization.
    pub code_org: Option<String>,
    /// Scan start time used for evidence stamping.
    pub observed_at: Timestamp,
}

/// Result of one probe run.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    /// Raw metadata persisted under the scan's `raw_payload`.
    pub metadata: Value,
    /// Normalized signals the probe produced.
    pub signals: Vec<Signal>,
}

impl ProbeOutcome {
    /// Builds an outcome from parts.
    #[must_use]
    pub const fn new(metadata: Value, signals: Vec<Signal>) -> Self {
        Self {
            metadata,
            signals,
        }
    }
}

/// One external posture source.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable probe name used as the `raw_payload` key and log label.
    fn name(&self) -> &'static str;

    /// Display name used in service-error signal titles.
    fn display_name(&self) -> &'static str;

    /// Category a service-error signal for this probe lands in.
    fn failure_category(&self) -> Category;

    /// Runs the probe against the scan context.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the source could not be queried; the
    /// orchestrator's shield converts this into a service-error signal.
    async fn run(&self, ctx: &ProbeContext) -> Result<ProbeOutcome, ProbeError>;
}

// ============================================================================
// SECTION: Error Shield
// ============================================================================

/// Runs a probe under its timeout and absorbs every failure.
///
/// On success the probe's outcome passes through unchanged. On error or
/// timeout the outcome carries the error metadata and exactly one
/// service-error signal, so partial failure is visible but never blocking.
pub async fn shielded(probe: &dyn Probe, ctx: &ProbeContext) -> ProbeOutcome {
    shield_future(
        probe.name(),
        probe.display_name(),
        probe.failure_category(),
        ctx.observed_at,
        probe.run(ctx),
    )
    .await
}

/// Future-based shield used for dependent-stage adapters.
///
/// Applies the shared probe timeout and converts any error into exactly one
/// service-error signal, exactly like [`shielded`].
pub async fn shield_future<F>(
    name: &'static str,
    display_name: &'static str,
    failure_category: Category,
    observed_at: Timestamp,
    future: F,
) -> ProbeOutcome
where
    F: Future<Output = Result<ProbeOutcome, ProbeError>> + Send,
{
    let started = std::time::Instant::now();
    let outcome =
        tokio::time::timeout(PROBE_TIMEOUT, future).await.unwrap_or(Err(ProbeError::Timeout));
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match outcome {
        Ok(outcome) => {
            tracing::info!(service = name, latency_ms, success = true, "external_call");
            outcome
        }
        Err(err) => {
            tracing::warn!(
                service = name,
                latency_ms,
                success = false,
                error = %err,
                "external_call"
            );
            ProbeOutcome {
                metadata: json!({ "error": err.to_string() }),
                signals: vec![Signal::service_error(
                    display_name,
                    err.error_type(),
                    &err.to_string(),
                    failure_category,
                    observed_at,
                )],
            }
        }
    }
}

// ============================================================================
// SECTION: Bounded Backoff
// ============================================================================

/// Retries a transient operation with bounded exponential backoff and jitter.
///
/// Three attempts by default: base 0.2s doubling per attempt, capped at 2.5s,
/// plus up to 0.2s of jitter.
///
/// # Errors
///
/// Returns the final error once the retry budget is exhausted.
pub async fn with_backoff<T, F, Fut>(mut operation: F) -> Result<T, ProbeError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T, ProbeError>> + Send,
{
    let mut last_err = None;
    for attempt in 0..BACKOFF_ATTEMPTS {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                // Missing credentials never heal by retrying.
                if matches!(err, ProbeError::MissingCredential(_)) {
                    return Err(err);
                }
                last_err = Some(err);
                if attempt + 1 < BACKOFF_ATTEMPTS {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or(ProbeError::Timeout))
}

/// Computes the delay before the next retry attempt.
fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_SECS * f64::from(2_u32.saturating_pow(attempt));
    let jitter = rand::thread_rng().gen_range(0.0..BACKOFF_JITTER_SECS);
    Duration::from_secs_f64(exp.min(BACKOFF_CAP_SECS) + jitter)
}
