//! The claim rule table.
//!
//! Every claim-based constraint follows the same pipeline (read the claim,
//! corroborate it, compare it). Rules differ only in which claim they read,
//! which operators they accept and how values are compared, so each rule is
//! a row in a table rather than its own type.

use super::constraint::{operand_list, operand_string};
use super::Operator;
use crate::error::{Error, Result};
use ipnetwork::IpNetwork;
use serde_json::Value;
use std::net::IpAddr;
use tracing::debug;

/// How a claim value is compared with the right operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Byte-for-byte equality
    Exact,
    /// Equality ignoring case
    CaseInsensitive,
    /// Exact equality, or containment when a list entry is a CIDR block
    Network,
}

/// Where the compared value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// The claim named by `claim_key`
    Claim,
    /// The requester's `client_id` attribute
    ClientId,
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRule {
    /// Claim key, also the left-operand suffix that selects the rule
    pub claim_key: &'static str,
    pub operators: &'static [Operator],
    pub comparison: Comparison,
    pub source: ValueSource,
    /// Reject non-string right operands instead of coercing them
    pub string_operand: bool,
}

pub const LOCATION: ClaimRule = ClaimRule {
    claim_key: "location",
    operators: &[Operator::Eq],
    comparison: Comparison::Exact,
    source: ValueSource::Claim,
    string_operand: false,
};

pub const COUNTRY: ClaimRule = ClaimRule {
    claim_key: "country",
    operators: &[Operator::Eq],
    comparison: Comparison::CaseInsensitive,
    source: ValueSource::Claim,
    string_operand: false,
};

pub const ENTITY_TYPE: ClaimRule = ClaimRule {
    claim_key: "entity_type",
    operators: &[Operator::Eq],
    comparison: Comparison::CaseInsensitive,
    source: ValueSource::Claim,
    string_operand: true,
};

pub const LEGAL_NAME: ClaimRule = ClaimRule {
    claim_key: "legal_name",
    operators: &[Operator::Eq, Operator::In],
    comparison: Comparison::Exact,
    source: ValueSource::Claim,
    string_operand: false,
};

pub const PARTICIPANT_ID: ClaimRule = ClaimRule {
    claim_key: "participant_id",
    operators: &[Operator::Eq, Operator::In],
    comparison: Comparison::Exact,
    source: ValueSource::ClientId,
    string_operand: false,
};

pub const IP_CONNECTOR: ClaimRule = ClaimRule {
    claim_key: "ip_connector",
    operators: &[Operator::Eq, Operator::In],
    comparison: Comparison::Network,
    source: ValueSource::Claim,
    string_operand: false,
};

/// All built-in claim rules.
pub const BUILTIN_RULES: &[ClaimRule] = &[
    LOCATION,
    COUNTRY,
    ENTITY_TYPE,
    LEGAL_NAME,
    PARTICIPANT_ID,
    IP_CONNECTOR,
];

impl ClaimRule {
    pub fn allows(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }

    /// Fail unless `operator` is allowed by this rule.
    pub fn check_operator(&self, operator: Operator) -> Result<()> {
        if self.allows(operator) {
            Ok(())
        } else {
            Err(Error::UnsupportedOperator {
                rule: self.claim_key.to_string(),
                operator: operator.to_string(),
            })
        }
    }

    /// Compare a (corroborated) claim value with the right operand.
    pub fn compare(&self, operator: Operator, value: &str, right: &Value) -> Result<bool> {
        self.check_operator(operator)?;

        match operator {
            Operator::Eq => {
                let expected = self.scalar_operand(right)?;
                Ok(self.equals(value, &expected))
            }
            Operator::In => {
                let entries = operand_list(self.claim_key, right)?;
                Ok(entries.iter().any(|entry| self.entry_matches(value, entry)))
            }
            _ => Err(Error::UnsupportedOperator {
                rule: self.claim_key.to_string(),
                operator: operator.to_string(),
            }),
        }
    }

    fn scalar_operand(&self, right: &Value) -> Result<String> {
        let operand = if self.string_operand {
            right.as_str().map(str::to_string)
        } else {
            operand_string(right)
        };
        operand.ok_or_else(|| Error::InvalidRightOperand {
            rule: self.claim_key.to_string(),
            reason: format!("expected a string, got {}", right),
        })
    }

    fn equals(&self, value: &str, expected: &str) -> bool {
        match self.comparison {
            Comparison::Exact | Comparison::Network => value == expected,
            Comparison::CaseInsensitive => value.to_lowercase() == expected.to_lowercase(),
        }
    }

    fn entry_matches(&self, value: &str, entry: &str) -> bool {
        if self.equals(value, entry) {
            return true;
        }
        if self.comparison != Comparison::Network || !entry.contains('/') {
            return false;
        }
        match Cidr::new(entry) {
            Some(cidr) => cidr.contains_ip(value),
            None => {
                debug!(rule = self.claim_key, entry = %entry, "ignoring malformed CIDR entry");
                false
            }
        }
    }
}

/// Look up a built-in rule by claim key.
pub fn builtin_rule(claim_key: &str) -> Option<&'static ClaimRule> {
    BUILTIN_RULES.iter().find(|r| r.claim_key == claim_key)
}

/// An IPv4 or IPv6 network block.
#[derive(Debug, Clone, PartialEq)]
struct Cidr {
    network: IpNetwork,
}

impl Cidr {
    fn new(cidr: &str) -> Option<Self> {
        cidr.trim().parse::<IpNetwork>().ok().map(|network| Self { network })
    }

    /// Whether `ip` lies inside the block. Unparseable addresses do not.
    fn contains_ip(&self, ip: &str) -> bool {
        ip.trim()
            .parse::<IpAddr>()
            .map(|ip| self.network.contains(ip))
            .unwrap_or(false)
    }
}
