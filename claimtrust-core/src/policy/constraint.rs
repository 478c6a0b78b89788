//! Policy constraints and operand helpers.

use super::Operator;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single `left operator right` constraint from a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// Usually a namespaced IRI such as `https://w3id.org/edc/v0.0.1/ns/location`
    pub left_operand: String,
    pub operator: Operator,
    pub right_operand: Value,
}

impl Constraint {
    pub fn new(left_operand: impl Into<String>, operator: Operator, right_operand: impl Into<Value>) -> Self {
        Self {
            left_operand: left_operand.into(),
            operator,
            right_operand: right_operand.into(),
        }
    }

    /// The claim key this constraint addresses.
    pub fn claim_key(&self) -> &str {
        claim_key(&self.left_operand)
    }
}

/// Reduce a left operand to its last path segment.
///
/// `https://w3id.org/edc/v0.0.1/ns/location` becomes `location`. Without a
/// slash, or with a trailing one, the operand is returned whole.
///
/// ```
/// use claimtrust::policy::claim_key;
///
/// assert_eq!(claim_key("https://w3id.org/edc/v0.0.1/ns/location"), "location");
/// assert_eq!(claim_key("location"), "location");
/// assert_eq!(claim_key("https://example.org/"), "https://example.org/");
/// ```
pub fn claim_key(left_operand: &str) -> &str {
    match left_operand.rfind('/') {
        Some(idx) if idx + 1 < left_operand.len() => &left_operand[idx + 1..],
        _ => left_operand,
    }
}

/// String form of a scalar right operand.
///
/// Strings are returned as-is; numbers and booleans in their JSON spelling.
/// Arrays, objects and null have no string form.
pub fn operand_string(right: &Value) -> Option<String> {
    match right {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a right operand as a list for `IN`.
///
/// Accepts a JSON array of scalars or a comma-separated string. Entries are
/// trimmed and empty entries dropped.
pub fn operand_list(rule: &str, right: &Value) -> Result<Vec<String>> {
    let entries: Vec<String> = match right {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                operand_string(item).ok_or_else(|| Error::InvalidRightOperand {
                    rule: rule.to_string(),
                    reason: format!("list entry {} is not a scalar", item),
                })
            })
            .collect::<Result<_>>()?,
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Number(_) | Value::Bool(_) => vec![operand_string(right).unwrap_or_default()],
        _ => {
            return Err(Error::InvalidRightOperand {
                rule: rule.to_string(),
                reason: "expected a list or comma-separated string".to_string(),
            })
        }
    };

    Ok(entries
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect())
}

/// Parse a decimal number as `f64`.
pub fn parse_number(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::NotNumeric(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claim_key_normalisation() {
        assert_eq!(claim_key("https://w3id.org/edc/v0.0.1/ns/entity_type"), "entity_type");
        assert_eq!(claim_key("ns/membership_tier"), "membership_tier");
        assert_eq!(claim_key("plain"), "plain");
        assert_eq!(claim_key("trailing/"), "trailing/");
        assert_eq!(claim_key(""), "");
    }

    #[test]
    fn test_operand_list_forms() {
        assert_eq!(
            operand_list("r", &json!("a, b ,c,,")).unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            operand_list("r", &json!(["a", " b ", 3])).unwrap(),
            vec!["a", "b", "3"]
        );
        assert_eq!(operand_list("r", &json!(7)).unwrap(), vec!["7"]);
        assert!(operand_list("r", &json!({"a": 1})).is_err());
        assert!(operand_list("r", &json!([["nested"]])).is_err());
    }

    #[test]
    fn test_operand_string() {
        assert_eq!(operand_string(&json!("eu")).as_deref(), Some("eu"));
        assert_eq!(operand_string(&json!(42)).as_deref(), Some("42"));
        assert_eq!(operand_string(&json!(null)), None);
        assert_eq!(operand_string(&json!(["eu"])), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("42").unwrap(), 42.0);
        assert_eq!(parse_number(" 4.5 ").unwrap(), 4.5);
        assert!(matches!(parse_number("abc"), Err(Error::NotNumeric(_))));
    }

    #[test]
    fn test_constraint_wire_form() {
        let constraint: Constraint = serde_json::from_value(json!({
            "leftOperand": "https://w3id.org/edc/v0.0.1/ns/location",
            "operator": "odrl:eq",
            "rightOperand": "eu"
        }))
        .unwrap();
        assert_eq!(constraint.claim_key(), "location");
        assert_eq!(constraint.operator, Operator::Eq);
        assert_eq!(constraint.right_operand, json!("eu"));
    }
}
