// crates/threatveil-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Tests
// Description: Validate environment parsing, defaults, and fail-closed rules.
// Purpose: Pin the recognized option set and its validation behavior.
// Dependencies: threatveil-config
// ============================================================================

//! Configuration loading and validation tests.

use std::collections::HashMap;

use threatveil_config::ConfigError;
use threatveil_config::Environment;
use threatveil_config::ThreatVeilConfig;

/// Builds a variable map from pairs.
fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

#[test]
fn defaults_apply_when_the_environment_is_empty() -> Result<(), ConfigError> {
    let config = ThreatVeilConfig::from_vars(&HashMap::new())?;
    assert_eq!(config.port, 8000);
    assert_eq!(config.rate_limit_per_minute, 60);
    assert_eq!(config.scheduler_interval_minutes, 5);
    assert!(config.scheduler_enabled);
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.allowed_origins, vec!["http://localhost:3000".to_string()]);
    assert!(config.database_url.is_none());
    assert!(config.github_token.is_none());
    assert!(config.encryption_key.is_none());
    assert_eq!(config.log_level, "info");
    Ok(())
}

#[test]
fn production_refuses_the_placeholder_secret() {
    let outcome = ThreatVeilConfig::from_vars(&vars(&[("ENVIRONMENT", "production")]));
    assert_eq!(outcome.err(), Some(ConfigError::PlaceholderSecret));

    let ok = ThreatVeilConfig::from_vars(&vars(&[
        ("ENVIRONMENT", "production"),
        ("JWT_SECRET", "a-real-secret"),
    ]));
    assert!(ok.is_ok());
}

#[test]
fn development_tolerates_the_placeholder_secret() -> Result<(), ConfigError> {
    let config = ThreatVeilConfig::from_vars(&vars(&[("ENVIRONMENT", "development")]))?;
    assert_eq!(config.jwt_secret, "change_me");
    Ok(())
}

#[test]
fn origins_are_split_and_trimmed() -> Result<(), ConfigError> {
    let config = ThreatVeilConfig::from_vars(&vars(&[(
        "ALLOWED_ORIGINS",
        "https://app.example.com, https://admin.example.com ,",
    )]))?;
    assert_eq!(
        config.allowed_origins,
        vec![
            "https://app.example.com".to_string(),
            "https://admin.example.com".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn bad_numbers_fail_with_the_option_name() {
    let outcome = ThreatVeilConfig::from_vars(&vars(&[("RATE_LIMIT_PER_MINUTE", "lots")]));
    assert_eq!(
        outcome.err(),
        Some(ConfigError::InvalidNumber {
            name: "RATE_LIMIT_PER_MINUTE",
        })
    );
}

#[test]
fn encryption_keys_accept_hex_and_base64() -> Result<(), ConfigError> {
    let hex_key = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
    let config = ThreatVeilConfig::from_vars(&vars(&[("ENCRYPTION_KEY", hex_key)]))?;
    assert!(config.encryption_key.is_some());

    // 32 bytes of zeros, base64-encoded.
    let b64_key = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";
    let config = ThreatVeilConfig::from_vars(&vars(&[("ENCRYPTION_KEY", b64_key)]))?;
    assert_eq!(config.encryption_key, Some([0_u8; 32]));
    Ok(())
}

#[test]
fn short_encryption_keys_are_rejected() {
    let outcome = ThreatVeilConfig::from_vars(&vars(&[("ENCRYPTION_KEY", "deadbeef")]));
    assert_eq!(outcome.err(), Some(ConfigError::InvalidEncryptionKey));
}

#[test]
fn scheduler_toggle_parses_common_forms() -> Result<(), ConfigError> {
    for raw in ["0", "false", "no", "off"] {
        let config = ThreatVeilConfig::from_vars(&vars(&[("SCHEDULER_ENABLED", raw)]))?;
        assert!(!config.scheduler_enabled, "{raw} must disable the scheduler");
    }
    for raw in ["1", "true", "yes"] {
        let config = ThreatVeilConfig::from_vars(&vars(&[("SCHEDULER_ENABLED", raw)]))?;
        assert!(config.scheduler_enabled, "{raw} must enable the scheduler");
    }
    Ok(())
}
