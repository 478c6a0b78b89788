//! Constraint evaluation.
//!
//! Every function here answers a single question with a `bool`: can the
//! constraint be *proven* true for this requester? Anything that prevents
//! a proof (missing context, an unregistered or drifted claim, an
//! unreachable registry, an unsupported operator, a malformed operand) is
//! logged and answered with `false`. Errors never reach the policy engine.

use super::clock::{parse_timestamp, Clock};
use super::constraint::{operand_list, operand_string, parse_number, Constraint};
use super::context::{ParticipantAgent, SIGNED_CLAIMS};
use super::rules::{ClaimRule, ValueSource, BUILTIN_RULES};
use super::Operator;
use crate::claims::ClaimSet;
use crate::error::{Error, Result};
use crate::registry::{Protocol, RegistryClient};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Claim key of the time-window constraint.
pub const POLICY_EVALUATION_TIME: &str = "policy_evaluation_time";

/// Anything that can decide a constraint.
pub trait ConstraintFunction: Send + Sync {
    fn evaluate(&self, constraint: &Constraint, agent: &ParticipantAgent) -> bool;
}

// ============================================================================
// Corroboration
// ============================================================================

/// The requester's identity as read from the context.
struct Requester {
    participant_id: String,
    claims: ClaimSet,
}

impl Requester {
    fn from_agent(agent: &ParticipantAgent) -> Result<Self> {
        Ok(Self {
            participant_id: agent.client_id()?.to_string(),
            claims: agent.claims()?,
        })
    }
}

/// Registry corroboration shared by every claim-based function.
#[derive(Clone)]
struct Corroborator {
    registry: Arc<dyn RegistryClient>,
    protocol: Protocol,
}

impl Corroborator {
    /// Succeeds only if the registry vouches for `value` under `claim_key`.
    ///
    /// `registration_only` is used where the value is the participant id
    /// itself: under the per-key protocol the participant merely has to be
    /// registered.
    fn corroborate(
        &self,
        agent: &ParticipantAgent,
        requester: &Requester,
        claim_key: &str,
        value: &str,
        registration_only: bool,
    ) -> Result<()> {
        let corroborated = match self.protocol {
            Protocol::Bundle => {
                let signed = agent
                    .signed_claims()
                    .ok_or_else(|| Error::MissingAttribute(SIGNED_CLAIMS.to_string()))?;
                self.registry
                    .corroborate_bundle(&requester.participant_id, signed, &requester.claims)
                    .success()
            }
            Protocol::PerKey if registration_only => {
                self.registry.fetch_claims(&requester.participant_id)?;
                true
            }
            Protocol::PerKey => {
                self.registry
                    .corroborate_by_key(claim_key, value, &requester.participant_id)
            }
        };

        if corroborated {
            Ok(())
        } else {
            Err(Error::NotCorroborated {
                participant_id: requester.participant_id.clone(),
                claim_key: claim_key.to_string(),
            })
        }
    }
}

fn log_rejection(claim_key: &str, operator: Operator, agent: &ParticipantAgent, error: &Error) {
    let participant_id = agent.client_id().unwrap_or("<unknown>");
    warn!(
        claim_key = %claim_key,
        operator = %operator,
        participant_id = %participant_id,
        error = %error,
        "constraint not satisfied"
    );
}

// ============================================================================
// Claim rules
// ============================================================================

/// Evaluates one row of the rule table.
#[derive(Clone)]
pub struct ClaimConstraintFunction {
    rule: ClaimRule,
    corroborator: Corroborator,
}

impl ClaimConstraintFunction {
    pub fn new(rule: ClaimRule, registry: Arc<dyn RegistryClient>, protocol: Protocol) -> Self {
        Self {
            rule,
            corroborator: Corroborator { registry, protocol },
        }
    }

    pub fn rule(&self) -> &ClaimRule {
        &self.rule
    }

    /// Decide `claim <operator> right` for the requester in `agent`.
    pub fn evaluate_operands(&self, operator: Operator, right: &Value, agent: &ParticipantAgent) -> bool {
        match self.try_evaluate(operator, right, agent) {
            Ok(result) => {
                debug!(
                    claim_key = self.rule.claim_key,
                    operator = %operator,
                    result,
                    "claim constraint evaluated"
                );
                result
            }
            Err(e) => {
                log_rejection(self.rule.claim_key, operator, agent, &e);
                false
            }
        }
    }

    fn try_evaluate(&self, operator: Operator, right: &Value, agent: &ParticipantAgent) -> Result<bool> {
        // Unsupported operators fail before any registry round trip
        self.rule.check_operator(operator)?;

        let requester = Requester::from_agent(agent)?;
        let value = match self.rule.source {
            ValueSource::ClientId => requester.participant_id.clone(),
            ValueSource::Claim => requester
                .claims
                .get_str(self.rule.claim_key)
                .ok_or_else(|| Error::ClaimUnavailable(self.rule.claim_key.to_string()))?
                .to_string(),
        };

        self.corroborator.corroborate(
            agent,
            &requester,
            self.rule.claim_key,
            &value,
            self.rule.source == ValueSource::ClientId,
        )?;

        self.rule.compare(operator, &value, right)
    }
}

impl ConstraintFunction for ClaimConstraintFunction {
    fn evaluate(&self, constraint: &Constraint, agent: &ParticipantAgent) -> bool {
        self.evaluate_operands(constraint.operator, &constraint.right_operand, agent)
    }
}

// ============================================================================
// Dynamic claims
// ============================================================================

/// Evaluates constraints on arbitrary claim keys.
///
/// The claim key is the last path segment of the left operand. Ordering
/// operators compare numerically; `EQ`/`NEQ` compare strings; `IN` is list
/// membership.
#[derive(Clone)]
pub struct DynamicClaimFunction {
    corroborator: Corroborator,
}

impl DynamicClaimFunction {
    pub fn new(registry: Arc<dyn RegistryClient>, protocol: Protocol) -> Self {
        Self {
            corroborator: Corroborator { registry, protocol },
        }
    }

    fn try_evaluate(&self, constraint: &Constraint, agent: &ParticipantAgent) -> Result<bool> {
        let claim_key = constraint.claim_key();
        let operator = constraint.operator;
        if !matches!(
            operator,
            Operator::Eq | Operator::Neq | Operator::Gt | Operator::Geq | Operator::Lt | Operator::Leq | Operator::In
        ) {
            return Err(Error::UnsupportedOperator {
                rule: claim_key.to_string(),
                operator: operator.to_string(),
            });
        }

        let requester = Requester::from_agent(agent)?;
        let value = requester
            .claims
            .get_str(claim_key)
            .ok_or_else(|| Error::ClaimUnavailable(claim_key.to_string()))?
            .to_string();

        self.corroborator
            .corroborate(agent, &requester, claim_key, &value, false)?;

        compare_dynamic(claim_key, operator, &value, &constraint.right_operand)
    }
}

/// Compare a dynamic claim value with a right operand.
pub fn compare_dynamic(claim_key: &str, operator: Operator, value: &str, right: &Value) -> Result<bool> {
    let invalid_operand = || Error::InvalidRightOperand {
        rule: claim_key.to_string(),
        reason: format!("expected a scalar, got {}", right),
    };

    match operator {
        op if op.is_numeric() => {
            let left = parse_number(value)?;
            let right = parse_number(&operand_string(right).ok_or_else(invalid_operand)?)?;
            Ok(left
                .partial_cmp(&right)
                .and_then(|ord| op.test_ordering(ord))
                .unwrap_or(false))
        }
        Operator::Eq => Ok(value == operand_string(right).ok_or_else(invalid_operand)?),
        Operator::Neq => Ok(value != operand_string(right).ok_or_else(invalid_operand)?),
        Operator::In => Ok(operand_list(claim_key, right)?.iter().any(|e| e == value)),
        op => Err(Error::UnsupportedOperator {
            rule: claim_key.to_string(),
            operator: op.to_string(),
        }),
    }
}

impl ConstraintFunction for DynamicClaimFunction {
    fn evaluate(&self, constraint: &Constraint, agent: &ParticipantAgent) -> bool {
        match self.try_evaluate(constraint, agent) {
            Ok(result) => result,
            Err(e) => {
                log_rejection(constraint.claim_key(), constraint.operator, agent, &e);
                false
            }
        }
    }
}

// ============================================================================
// Time window
// ============================================================================

/// Compares the evaluation time with an RFC 3339 right operand.
///
/// Uses neither claims nor the registry.
#[derive(Clone)]
pub struct TimeIntervalFunction {
    clock: Arc<dyn Clock>,
}

impl TimeIntervalFunction {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Decide `now <operator> right`.
    pub fn evaluate_operands(&self, operator: Operator, right: &Value) -> bool {
        match self.try_evaluate(operator, right) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    claim_key = POLICY_EVALUATION_TIME,
                    operator = %operator,
                    error = %e,
                    "time constraint not satisfied"
                );
                false
            }
        }
    }

    fn try_evaluate(&self, operator: Operator, right: &Value) -> Result<bool> {
        let unsupported = || Error::UnsupportedOperator {
            rule: POLICY_EVALUATION_TIME.to_string(),
            operator: operator.to_string(),
        };
        // Reject before parsing so IN with a list is reported as an operator problem
        if operator.test_ordering(std::cmp::Ordering::Equal).is_none() {
            return Err(unsupported());
        }

        let bound = right.as_str().ok_or_else(|| Error::InvalidRightOperand {
            rule: POLICY_EVALUATION_TIME.to_string(),
            reason: format!("expected an RFC 3339 string, got {}", right),
        })?;
        let bound = parse_timestamp(bound)?;
        let now = self.clock.now();

        operator.test_ordering(now.cmp(&bound)).ok_or_else(unsupported)
    }
}

impl ConstraintFunction for TimeIntervalFunction {
    fn evaluate(&self, constraint: &Constraint, _agent: &ParticipantAgent) -> bool {
        self.evaluate_operands(constraint.operator, &constraint.right_operand)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Dispatches constraints to functions by claim key.
#[derive(Clone, Default)]
pub struct ConstraintEngine {
    functions: HashMap<String, Arc<dyn ConstraintFunction>>,
    fallback: Option<Arc<dyn ConstraintFunction>>,
}

impl ConstraintEngine {
    /// An engine with no functions; every constraint evaluates to `false`.
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in rules, the time window and dynamic fallback, sharing one
    /// registry client.
    pub fn standard(registry: Arc<dyn RegistryClient>, protocol: Protocol, clock: Arc<dyn Clock>) -> Self {
        let mut engine = Self::new();
        for rule in BUILTIN_RULES {
            engine.register(
                rule.claim_key,
                ClaimConstraintFunction::new(*rule, registry.clone(), protocol),
            );
        }
        engine.register(POLICY_EVALUATION_TIME, TimeIntervalFunction::new(clock));
        engine.with_fallback(DynamicClaimFunction::new(registry, protocol))
    }

    /// Bind `function` to constraints whose claim key is `claim_key`.
    pub fn register(&mut self, claim_key: impl Into<String>, function: impl ConstraintFunction + 'static) {
        self.functions.insert(claim_key.into(), Arc::new(function));
    }

    /// Use `function` for claim keys with no registered function.
    pub fn with_fallback(mut self, function: impl ConstraintFunction + 'static) -> Self {
        self.fallback = Some(Arc::new(function));
        self
    }

    pub fn is_registered(&self, claim_key: &str) -> bool {
        self.functions.contains_key(claim_key)
    }

    pub fn evaluate(&self, constraint: &Constraint, agent: &ParticipantAgent) -> bool {
        let claim_key = constraint.claim_key();
        match self.functions.get(claim_key).or(self.fallback.as_ref()) {
            Some(function) => function.evaluate(constraint, agent),
            None => {
                warn!(claim_key = %claim_key, "no constraint function bound");
                false
            }
        }
    }

    /// Whether every constraint holds. An empty slice holds.
    pub fn evaluate_all(&self, constraints: &[Constraint], agent: &ParticipantAgent) -> bool {
        constraints.iter().all(|c| self.evaluate(c, agent))
    }
}
