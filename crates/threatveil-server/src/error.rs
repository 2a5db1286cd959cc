// crates/threatveil-server/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: The server's error taxonomy and status mapping.
// Purpose: One conversion point from engine errors to HTTP responses.
// Dependencies: axum, serde_json, threatveil-core, threatveil-engine
// ============================================================================

//! ## Overview
//! Every handler returns [`ApiError`] on failure. The taxonomy mirrors the
//! published contract: validation 400, auth 401, quota 402, missing rows
//! 404, illegal transitions 409, rate limiting 429, and internal failures
//! 500 with the detail withheld from clients.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::json;
use thiserror::Error;
use threatveil_core::StoreError;
use threatveil_engine::GenerateError;
use threatveil_engine::LifecycleError;
use threatveil_engine::ScanError;
use threatveil_engine::verification::VerifyError;

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Errors surfaced at the API boundary.
///
/// # Invariants
/// - Internal detail never reaches the response body on 5xx.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Input failed validation.
    #[error("{0}")]
    BadRequest(String),
    /// Missing or invalid authentication.
    #[error("invalid or missing token")]
    Unauthorized,
    /// Plan quota exhausted.
    #[error("{0}")]
    PaymentRequired(String),
    /// Requested row does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Request conflicts with current state.
    #[error("{0}")]
    Conflict(String),
    /// Caller exceeded the rate limit.
    #[error("rate limit exceeded; try again in 1 minute")]
    RateLimited,
    /// Internal failure.
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    /// Returns the response status for this error.
    const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed internally");
        }
        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound("resource"),
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Serialization(detail) | StoreError::Backend(detail) => {
                Self::Internal(detail)
            }
        }
    }
}

impl From<ScanError> for ApiError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Validation(inner) => Self::BadRequest(inner.to_string()),
            ScanError::RateLimited => Self::RateLimited,
            ScanError::QuotaExceeded {
                ..
            } => Self::PaymentRequired(err.to_string()),
            ScanError::Store(inner) => inner.into(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(_) => Self::NotFound("decision"),
            LifecycleError::Transition(inner) => Self::Conflict(inner.to_string()),
            LifecycleError::Store(inner) => inner.into(),
        }
    }
}

impl From<GenerateError> for ApiError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::ScanNotFound(_) => Self::NotFound("scan"),
            GenerateError::Store(inner) => inner.into(),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::NotFound(_) => Self::NotFound("decision"),
            VerifyError::Store(inner) => inner.into(),
        }
    }
}
