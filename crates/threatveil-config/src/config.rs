// crates/threatveil-config/src/config.rs
// ============================================================================
// Module: ThreatVeil Configuration Model
// Description: Recognized environment options and their validation.
// Purpose: Fail closed on unsafe settings, degrade gracefully on absent keys.
// Dependencies: base64, thiserror
// ============================================================================

//! ## Overview
//! One struct per process. Every recognized option is read from the
//! environment with an explicit default; validation happens once at load
//! time. API keys are optional capabilities; the signing secret and the
//! encryption key are security-critical and validated strictly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bind port.
const DEFAULT_PORT: u16 = 8000;
/// Default per-IP rate limit per minute.
const DEFAULT_RATE_LIMIT: u32 = 60;
/// Default scheduler tick interval in minutes.
const DEFAULT_SCHEDULER_INTERVAL_MINUTES: u64 = 5;
/// Default embedded database path.
const DEFAULT_SQLITE_PATH: &str = "./threatveil.db";
/// Default outbound user agent.
const DEFAULT_USER_AGENT: &str = "ThreatVeilScanner/0.1 (+https://threatveil.example)";
/// Signing secret placeholder that must never reach production.
const PLACEHOLDER_SECRET: &str = "change_me";
/// Required byte length of an explicit encryption key.
const ENCRYPTION_KEY_LEN: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration validation errors.
///
/// # Invariants
/// - Messages never include secret values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A numeric option failed to parse.
    #[error("{name} must be a positive integer")]
    InvalidNumber {
        /// Option name.
        name: &'static str,
    },
    /// The signing secret is missing or still the placeholder in production.
    #[error("JWT_SECRET must be set to a non-default value in production")]
    PlaceholderSecret,
    /// The encryption key is present but not 32 bytes of hex or base64.
    #[error("ENCRYPTION_KEY must decode to exactly 32 bytes (hex or base64)")]
    InvalidEncryptionKey,
}

// ============================================================================
// SECTION: Environment Tier
// ============================================================================

/// Deployment environment tier.
///
/// # Invariants
/// - Anything other than `production` is treated as development.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local or staging deployment.
    #[default]
    Development,
    /// Production deployment with strict secret validation.
    Production,
}

impl Environment {
    /// Parses the `ENVIRONMENT` value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("production") { Self::Production } else { Self::Development }
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Complete deployment configuration.
///
/// # Invariants
/// - `encryption_key`, when present, is exactly 32 bytes.
/// - In production, `jwt_secret` is never the placeholder.
#[derive(Debug, Clone)]
pub struct ThreatVeilConfig {
    /// Optional external database URL; the embedded file is used otherwise.
    pub database_url: Option<String>,
    /// Embedded database path.
    pub sqlite_path: String,
    /// Allowed CORS origins.
    pub allowed_origins: Vec<String>,
    /// Outbound user agent.
    pub user_agent: String,
    /// Code-hosting API token.
    pub github_token: Option<String>,
    /// Vulnerability-database API key.
    pub vulndb_api_key: Option<String>,
    /// Threat-intelligence API key.
    pub threat_intel_api_key: Option<String>,
    /// LLM API key for summary prose.
    pub llm_api_key: Option<String>,
    /// Mailer API key (external rendering collaborator).
    pub mailer_api_key: Option<String>,
    /// Chat-guard API key (external collaborator).
    pub chat_guard_api_key: Option<String>,
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Per-IP requests per minute.
    pub rate_limit_per_minute: u32,
    /// Explicit encryption key bytes, when configured.
    pub encryption_key: Option<[u8; ENCRYPTION_KEY_LEN]>,
    /// Bind port.
    pub port: u16,
    /// Deployment environment tier.
    pub environment: Environment,
    /// Log filter directive.
    pub log_level: String,
    /// Whether the continuous-monitoring scheduler starts.
    pub scheduler_enabled: bool,
    /// Scheduler tick interval in minutes.
    pub scheduler_interval_minutes: u64,
}

impl ThreatVeilConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails; absent API keys are
    /// not errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Loads configuration from an explicit variable map (test hook).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(String::as_str).map(str::trim);
        let non_empty =
            |name: &str| get(name).filter(|value| !value.is_empty()).map(ToString::to_string);

        let environment = Environment::parse(get("ENVIRONMENT").unwrap_or("development"));
        let jwt_secret = non_empty("JWT_SECRET").unwrap_or_else(|| PLACEHOLDER_SECRET.to_string());
        if environment == Environment::Production && jwt_secret == PLACEHOLDER_SECRET {
            return Err(ConfigError::PlaceholderSecret);
        }

        let rate_limit_per_minute = parse_number(get("RATE_LIMIT_PER_MINUTE"), DEFAULT_RATE_LIMIT, "RATE_LIMIT_PER_MINUTE")?;
        let port = parse_number(get("PORT"), DEFAULT_PORT, "PORT")?;
        let scheduler_interval_minutes = parse_number(
            get("SCHEDULER_INTERVAL_MINUTES"),
            DEFAULT_SCHEDULER_INTERVAL_MINUTES,
            "SCHEDULER_INTERVAL_MINUTES",
        )?;

        let allowed_origins = get("ALLOWED_ORIGINS")
            .unwrap_or("http://localhost:3000")
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(ToString::to_string)
            .collect();

        let encryption_key = match non_empty("ENCRYPTION_KEY") {
            None => None,
            Some(raw) => Some(decode_encryption_key(&raw)?),
        };

        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            sqlite_path: non_empty("SQLITE_PATH")
                .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            allowed_origins,
            user_agent: non_empty("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            github_token: non_empty("GITHUB_TOKEN"),
            vulndb_api_key: non_empty("VULNDB_API_KEY"),
            threat_intel_api_key: non_empty("THREAT_INTEL_API_KEY"),
            llm_api_key: non_empty("LLM_API_KEY"),
            mailer_api_key: non_empty("MAILER_API_KEY"),
            chat_guard_api_key: non_empty("CHAT_GUARD_API_KEY"),
            jwt_secret,
            rate_limit_per_minute,
            encryption_key,
            port,
            environment,
            log_level: non_empty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            scheduler_enabled: get("SCHEDULER_ENABLED")
                .is_none_or(|raw| matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            scheduler_interval_minutes,
        })
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Parses an optional numeric option with a default.
fn parse_number<T: std::str::FromStr>(
    raw: Option<&str>,
    default: T,
    name: &'static str,
) -> Result<T, ConfigError> {
    match raw.filter(|value| !value.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
            name,
        }),
    }
}

/// Decodes an encryption key given as hex or base64.
fn decode_encryption_key(raw: &str) -> Result<[u8; ENCRYPTION_KEY_LEN], ConfigError> {
    let decoded = decode_hex(raw)
        .or_else(|| BASE64.decode(raw).ok())
        .ok_or(ConfigError::InvalidEncryptionKey)?;
    decoded.try_into().map_err(|_| ConfigError::InvalidEncryptionKey)
}

/// Decodes a lowercase or uppercase hex string.
fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    if raw.len() % 2 != 0 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = Vec::with_capacity(raw.len() / 2);
    let bytes = raw.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let hi = hex_value(pair[0])?;
        let lo = hex_value(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

/// Returns a nibble's value.
const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
