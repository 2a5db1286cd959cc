// crates/threatveil-core/tests/decision_rules.rs
// ============================================================================
// Module: Decision Rule Tests
// Description: Validate deterministic decision generation from snapshots.
// Purpose: Pin rule triggers, priority order, the cap, and idempotency.
// Dependencies: threatveil-core, serde_json
// ============================================================================

//! Decision generation tests over the fixed rule table.

use serde_json::json;
use threatveil_core::ActionId;
use threatveil_core::Category;
use threatveil_core::DecisionInputs;
use threatveil_core::EvidenceEnvelope;
use threatveil_core::MAX_DECISIONS_PER_SCAN;
use threatveil_core::Severity;
use threatveil_core::Signal;
use threatveil_core::SignalKind;
use threatveil_core::Timestamp;
use threatveil_core::generate_decisions;

/// Fixed observation time for deterministic fixtures.
fn observed() -> Timestamp {
    Timestamp::UNIX_EPOCH.plus_days(19_000)
}

/// Builds a finding signal for rule-trigger fixtures.
fn signal(id: &str, kind: SignalKind, severity: Severity, category: Category, source: &str) -> Signal {
    Signal::finding(
        id,
        kind,
        "Test Finding",
        "test finding detail",
        severity,
        category,
        EvidenceEnvelope::rule(source, observed(), json!({})),
    )
}

#[test]
fn clean_snapshot_generates_no_decisions() {
    let inputs = DecisionInputs {
        signals: &[],
        ai_tools: &[],
        ai_key_leaks: 0,
    };
    assert!(generate_decisions(&inputs).is_empty());
}

#[test]
fn missing_security_headers_alone_generate_no_decisions() {
    let signals = vec![
        signal(
            "http_header_strict_transport_security_missing",
            SignalKind::Http,
            Severity::High,
            Category::Software,
            "https",
        ),
        signal(
            "http_header_content_security_policy_missing",
            SignalKind::Http,
            Severity::High,
            Category::Software,
            "https",
        ),
    ];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &[],
        ai_key_leaks: 0,
    };
    assert!(generate_decisions(&inputs).is_empty());
}

#[test]
fn key_leak_and_agent_framework_generate_exactly_two_decisions() {
    let tools = vec!["langchain".to_string()];
    let signals = vec![signal(
        "ai_leak_openai_key",
        SignalKind::CodeSearch,
        Severity::High,
        Category::AiIntegration,
        "code_search",
    )];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &tools,
        ai_key_leaks: 1,
    };
    let decisions = generate_decisions(&inputs);
    let actions: Vec<ActionId> = decisions.iter().map(|d| d.action).collect();
    assert_eq!(actions, vec![ActionId::KeyRotation, ActionId::ReviewAgents]);
    assert_eq!(decisions[0].priority, 1);
    assert_eq!(decisions[1].priority, 3);
}

#[test]
fn generation_caps_at_three_in_priority_order() {
    let tools = vec!["langchain".to_string(), "openai".to_string()];
    let signals = vec![
        signal("cve_CVE-2024-0001", SignalKind::Cve, Severity::High, Category::Software, "vulndb"),
        signal("github_leak_env", SignalKind::CodeSearch, Severity::High, Category::DataExposure, "code_search"),
        signal("tls_expiring_soon", SignalKind::Tls, Severity::Medium, Category::Network, "tls"),
        signal("dns_missing_spf", SignalKind::Dns, Severity::Medium, Category::Network, "dns"),
    ];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &tools,
        ai_key_leaks: 2,
    };
    let decisions = generate_decisions(&inputs);
    assert_eq!(decisions.len(), MAX_DECISIONS_PER_SCAN);
    let actions: Vec<ActionId> = decisions.iter().map(|d| d.action).collect();
    assert_eq!(actions, vec![ActionId::KeyRotation, ActionId::PatchCves, ActionId::ReviewAgents]);
}

#[test]
fn cve_rule_requires_cve_tagged_signals() {
    // High software findings that are not CVE-tagged must not fire patch-cves.
    let signals = vec![signal(
        "http_header_strict_transport_security_missing",
        SignalKind::Http,
        Severity::High,
        Category::Software,
        "https",
    )];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &[],
        ai_key_leaks: 0,
    };
    assert!(generate_decisions(&inputs).iter().all(|d| d.action != ActionId::PatchCves));

    let signals = vec![signal(
        "cve_CVE-2024-0001",
        SignalKind::Cve,
        Severity::Critical,
        Category::Software,
        "vulndb",
    )];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &[],
        ai_key_leaks: 0,
    };
    let actions: Vec<ActionId> = generate_decisions(&inputs).iter().map(|d| d.action).collect();
    assert_eq!(actions, vec![ActionId::PatchCves]);
}

#[test]
fn plain_ai_tools_without_agents_fire_the_audit_rule() {
    let tools = vec!["openai".to_string(), "transformers".to_string()];
    let inputs = DecisionInputs {
        signals: &[],
        ai_tools: &tools,
        ai_key_leaks: 0,
    };
    let actions: Vec<ActionId> = generate_decisions(&inputs).iter().map(|d| d.action).collect();
    assert_eq!(actions, vec![ActionId::AuditAiTools]);
}

#[test]
fn tls_rule_matches_on_evidence_source() {
    let signals = vec![signal(
        "tls_expiring_soon",
        SignalKind::Tls,
        Severity::Medium,
        Category::Network,
        "tls",
    )];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &[],
        ai_key_leaks: 0,
    };
    let decisions = generate_decisions(&inputs);
    let actions: Vec<ActionId> = decisions.iter().map(|d| d.action).collect();
    // The TLS signal also counts as a non-low network finding.
    assert_eq!(actions, vec![ActionId::UpdateTls, ActionId::ReviewNetwork]);
}

#[test]
fn generation_is_idempotent() {
    let tools = vec!["langchain".to_string()];
    let signals = vec![signal(
        "cve_CVE-2024-0001",
        SignalKind::Cve,
        Severity::High,
        Category::Software,
        "vulndb",
    )];
    let inputs = DecisionInputs {
        signals: &signals,
        ai_tools: &tools,
        ai_key_leaks: 1,
    };
    let first = generate_decisions(&inputs);
    let second = generate_decisions(&inputs);
    assert_eq!(first, second);
}

#[test]
fn rule_table_metadata_is_stable() {
    assert_eq!(ActionId::KeyRotation.reduction_percent(), 25);
    assert_eq!(ActionId::PatchCves.reduction_percent(), 20);
    assert_eq!(ActionId::ReviewAgents.reduction_percent(), 15);
    assert_eq!(ActionId::AuditData.reduction_percent(), 15);
    assert_eq!(ActionId::UpdateTls.reduction_percent(), 10);
    assert_eq!(ActionId::ReviewNetwork.reduction_percent(), 10);
    assert_eq!(ActionId::AuditAiTools.reduction_percent(), 5);
    for (index, action) in ActionId::ALL.into_iter().enumerate() {
        assert_eq!(usize::from(action.priority()), index + 1);
        assert_eq!(ActionId::parse(action.as_str()), Some(action));
    }
}
