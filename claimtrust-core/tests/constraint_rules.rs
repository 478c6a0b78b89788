//! Built-in rules, dynamic claims and the time window through the engine,
//! corroborated by an HTTP registry.

mod common;

use claimtrust::policy::{Clock, FixedClock, POLICY_EVALUATION_TIME};
use claimtrust::registry::HttpRegistryClient;
use claimtrust::{Constraint, ConstraintEngine, Operator, ParticipantAgent, Protocol, RegistryClient};
use common::{unreachable_url, MockRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const EDC: &str = "https://w3id.org/edc/v0.0.1/ns/";
const CONSUMER: &str = "did:web:consumer";
const PROTOCOLS: [Protocol; 2] = [Protocol::Bundle, Protocol::PerKey];

struct Setup {
    registry: MockRegistry,
    agent: ParticipantAgent,
}

fn setup(claims: Value) -> Setup {
    let registry = MockRegistry::start();
    let agent = registry.enroll(CONSUMER, claims).agent_token();
    Setup { registry, agent }
}

fn engine(registry: &MockRegistry, protocol: Protocol) -> ConstraintEngine {
    let client: Arc<dyn RegistryClient> =
        Arc::new(HttpRegistryClient::new(&registry.base_url, Duration::from_secs(5)).unwrap());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at("2024-06-01T12:00:00Z").unwrap());
    ConstraintEngine::standard(client, protocol, clock)
}

fn check(engine: &ConstraintEngine, agent: &ParticipantAgent, key: &str, op: Operator, right: Value) -> bool {
    engine.evaluate(&Constraint::new(format!("{EDC}{key}"), op, right), agent)
}

// ============================================================================
// Built-in rules
// ============================================================================

#[test]
fn test_location() {
    let s = setup(json!({"location": "eu"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &s.agent, "location", Operator::Eq, json!("eu")));
        assert!(!check(&e, &s.agent, "location", Operator::Eq, json!("EU")));
        assert!(!check(&e, &s.agent, "location", Operator::Eq, json!("us")));
        assert!(!check(&e, &s.agent, "location", Operator::In, json!("eu,us")));
    }
}

#[test]
fn test_country_ignores_case() {
    let s = setup(json!({"country": "ES"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &s.agent, "country", Operator::Eq, json!("es")));
        assert!(check(&e, &s.agent, "country", Operator::Eq, json!("ES")));
        assert!(!check(&e, &s.agent, "country", Operator::Eq, json!("FR")));
        assert!(!check(&e, &s.agent, "country", Operator::Neq, json!("FR")));
    }
}

#[test]
fn test_entity_type_requires_string_operand() {
    let s = setup(json!({"entity_type": "Research"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &s.agent, "entity_type", Operator::Eq, json!("research")));
        assert!(!check(&e, &s.agent, "entity_type", Operator::Eq, json!("company")));
        assert!(!check(&e, &s.agent, "entity_type", Operator::Eq, json!(["research"])));
    }
}

#[test]
fn test_legal_name() {
    let s = setup(json!({"legal_name": "ACME Research"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &s.agent, "legal_name", Operator::Eq, json!("ACME Research")));
        assert!(!check(&e, &s.agent, "legal_name", Operator::Eq, json!("acme research")));
        assert!(check(&e, &s.agent, "legal_name", Operator::In, json!("Globex, ACME Research")));
        assert!(check(&e, &s.agent, "legal_name", Operator::In, json!(["Globex", "ACME Research"])));
        assert!(!check(&e, &s.agent, "legal_name", Operator::In, json!("ACME")));
    }
}

#[test]
fn test_participant_id() {
    let s = setup(json!({"location": "eu"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &s.agent, "participant_id", Operator::Eq, json!(CONSUMER)));
        assert!(check(&e, &s.agent, "participant_id", Operator::In, json!([CONSUMER, "did:web:x"])));
        assert!(!check(&e, &s.agent, "participant_id", Operator::Eq, json!("did:web:x")));
    }
}

#[test]
fn test_participant_id_of_unregistered_requester() {
    let s = setup(json!({"location": "eu"}));
    let outsider = ParticipantAgent::from_identity(
        "did:web:outsider",
        &claimtrust::ClaimSet::from_json(json!({"location": "eu"})).unwrap(),
        s.agent.signed_claims().unwrap(),
    );
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(!check(&e, &outsider, "participant_id", Operator::Eq, json!("did:web:outsider")));
    }
}

#[test]
fn test_ip_connector() {
    let s = setup(json!({"ip_connector": "10.1.2.3"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &s.agent, "ip_connector", Operator::Eq, json!("10.1.2.3")));
        assert!(check(&e, &s.agent, "ip_connector", Operator::In, json!("192.168.0.0/16, 10.0.0.0/8")));
        assert!(!check(&e, &s.agent, "ip_connector", Operator::In, json!("192.168.0.0/16")));
        assert!(!check(&e, &s.agent, "ip_connector", Operator::In, json!("10.0.0.0/33")));
        assert!(!check(&e, &s.agent, "ip_connector", Operator::Eq, json!("10.0.0.0/8")));
    }
}

#[test]
fn test_unsupported_operator_makes_no_registry_call() {
    let s = setup(json!({"location": "eu"}));
    let e = engine(&s.registry, Protocol::PerKey);

    assert!(!check(&e, &s.agent, "location", Operator::Gt, json!("eu")));
    assert!(!check(&e, &s.agent, "country", Operator::IsA, json!("ES")));
    assert_eq!(s.registry.hits(), 0);
}

// ============================================================================
// Corroboration gating
// ============================================================================

#[test]
fn test_uncorroborated_claim_never_satisfies() {
    let s = setup(json!({"location": "eu", "country": "ES"}));
    s.registry.set_claims(CONSUMER, json!({"location": "us", "country": "ES"}));

    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(!check(&e, &s.agent, "location", Operator::Eq, json!("eu")));
        assert!(!check(&e, &s.agent, "location", Operator::Eq, json!("us")));
    }
    // Per-key still vouches for the untouched claim
    let e = engine(&s.registry, Protocol::PerKey);
    assert!(check(&e, &s.agent, "country", Operator::Eq, json!("ES")));
}

#[test]
fn test_registry_outage_fails_closed() {
    let s = setup(json!({"location": "eu"}));
    s.registry.fail_with(500);
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(!check(&e, &s.agent, "location", Operator::Eq, json!("eu")));
        assert!(!check(&e, &s.agent, "participant_id", Operator::Eq, json!(CONSUMER)));
    }

    let client: Arc<dyn RegistryClient> =
        Arc::new(HttpRegistryClient::new(unreachable_url(), Duration::from_secs(2)).unwrap());
    let e = ConstraintEngine::standard(client, Protocol::Bundle, Arc::new(claimtrust::policy::SystemClock));
    assert!(!check(&e, &s.agent, "location", Operator::Eq, json!("eu")));
}

#[test]
fn test_bundle_requires_signed_claims() {
    let s = setup(json!({"location": "eu"}));
    let unsigned = ParticipantAgent::new()
        .with_attribute("client_id", CONSUMER)
        .with_attribute("claims", json!({"location": "eu"}));

    let e = engine(&s.registry, Protocol::Bundle);
    assert!(!check(&e, &unsigned, "location", Operator::Eq, json!("eu")));

    let e = engine(&s.registry, Protocol::PerKey);
    assert!(check(&e, &unsigned, "location", Operator::Eq, json!("eu")));
}

#[test]
fn test_claims_as_json_string() {
    let s = setup(json!({"location": "eu"}));
    let agent = ParticipantAgent::new()
        .with_attribute("client_id", CONSUMER)
        .with_attribute("claims", r#"{"location":"eu"}"#)
        .with_attribute("signedClaims", s.agent.signed_claims().unwrap());

    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(check(&e, &agent, "location", Operator::Eq, json!("eu")));
    }
}

// ============================================================================
// Dynamic claims and time
// ============================================================================

#[test]
fn test_dynamic_claims() {
    let s = setup(json!({"membership_tier": "3", "sector": "health"}));
    for protocol in PROTOCOLS {
        let e = engine(&s.registry, protocol);
        assert!(!e.is_registered("membership_tier"));
        assert!(check(&e, &s.agent, "membership_tier", Operator::Geq, json!(3)));
        assert!(check(&e, &s.agent, "membership_tier", Operator::Lt, json!("10")));
        assert!(!check(&e, &s.agent, "membership_tier", Operator::Gt, json!("3")));
        assert!(check(&e, &s.agent, "sector", Operator::Eq, json!("health")));
        assert!(check(&e, &s.agent, "sector", Operator::Neq, json!("energy")));
        assert!(check(&e, &s.agent, "sector", Operator::In, json!("energy,health")));
        assert!(!check(&e, &s.agent, "sector", Operator::Gt, json!("1")));
        assert!(!check(&e, &s.agent, "not_asserted", Operator::Eq, json!("x")));
    }
}

#[test]
fn test_time_window_needs_no_registry() {
    let s = setup(json!({"location": "eu"}));
    s.registry.fail_with(500);
    let e = engine(&s.registry, Protocol::Bundle);

    assert!(check(&e, &s.agent, POLICY_EVALUATION_TIME, Operator::Gt, json!("2024-01-01T00:00:00Z")));
    assert!(check(&e, &s.agent, POLICY_EVALUATION_TIME, Operator::Lt, json!("2024-12-31T23:59:59Z")));
    assert!(!check(&e, &s.agent, POLICY_EVALUATION_TIME, Operator::Gt, json!("2025-01-01T00:00:00Z")));
    assert_eq!(s.registry.hits(), 0);
}

#[test]
fn test_policy_with_several_constraints() {
    let s = setup(json!({"location": "eu", "country": "ES", "membership_tier": "2"}));
    let e = engine(&s.registry, Protocol::Bundle);

    let policy = vec![
        Constraint::new(format!("{EDC}location"), Operator::Eq, "eu"),
        Constraint::new(format!("{EDC}country"), Operator::Eq, "es"),
        Constraint::new(format!("{EDC}membership_tier"), Operator::Geq, json!(2)),
        Constraint::new(format!("{EDC}{POLICY_EVALUATION_TIME}"), Operator::Lt, "2030-01-01T00:00:00Z"),
    ];
    assert!(e.evaluate_all(&policy, &s.agent));

    s.registry.set_claims(CONSUMER, json!({"location": "eu", "country": "FR", "membership_tier": "2"}));
    assert!(!e.evaluate_all(&policy, &s.agent));
}
