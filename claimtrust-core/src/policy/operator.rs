//! Constraint operators.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An ODRL-style comparison operator.
///
/// `HasPart`, `IsA`, `IsAllOf`, `IsAnyOf` and `IsNoneOf` are parsed so that
/// policies using them are recognised, but no rule supports them and they
/// always evaluate to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Geq,
    Lt,
    Leq,
    In,
    HasPart,
    IsA,
    IsAllOf,
    IsAnyOf,
    IsNoneOf,
}

impl Operator {
    /// Canonical upper-case name.
    pub fn name(self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Neq => "NEQ",
            Operator::Gt => "GT",
            Operator::Geq => "GEQ",
            Operator::Lt => "LT",
            Operator::Leq => "LEQ",
            Operator::In => "IN",
            Operator::HasPart => "HAS_PART",
            Operator::IsA => "IS_A",
            Operator::IsAllOf => "IS_ALL_OF",
            Operator::IsAnyOf => "IS_ANY_OF",
            Operator::IsNoneOf => "IS_NONE_OF",
        }
    }

    /// `GT`, `GEQ`, `LT` or `LEQ`.
    pub fn is_numeric(self) -> bool {
        matches!(self, Operator::Gt | Operator::Geq | Operator::Lt | Operator::Leq)
    }

    /// Apply an ordering-based operator to the result of comparing the left
    /// value with the right one. `None` for operators that are not ordering
    /// comparisons.
    pub fn test_ordering(self, ordering: Ordering) -> Option<bool> {
        match self {
            Operator::Eq => Some(ordering == Ordering::Equal),
            Operator::Neq => Some(ordering != Ordering::Equal),
            Operator::Gt => Some(ordering == Ordering::Greater),
            Operator::Geq => Some(ordering != Ordering::Less),
            Operator::Lt => Some(ordering == Ordering::Less),
            Operator::Leq => Some(ordering != Ordering::Greater),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts `EQ`, `eq`, `odrl:eq`, `http://www.w3.org/ns/odrl/2/eq`,
/// `gteq`/`lteq` and camel or snake case for the set operators.
impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let local = s
            .trim()
            .rsplit(|c: char| c == '/' || c == '#' || c == ':')
            .next()
            .unwrap_or_default();
        let normalized: String = local
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let op = match normalized.as_str() {
            "EQ" => Operator::Eq,
            "NEQ" => Operator::Neq,
            "GT" => Operator::Gt,
            "GEQ" | "GTEQ" => Operator::Geq,
            "LT" => Operator::Lt,
            "LEQ" | "LTEQ" => Operator::Leq,
            "IN" => Operator::In,
            "HASPART" => Operator::HasPart,
            "ISA" => Operator::IsA,
            "ISALLOF" => Operator::IsAllOf,
            "ISANYOF" => Operator::IsAnyOf,
            "ISNONEOF" => Operator::IsNoneOf,
            _ => return Err(Error::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
