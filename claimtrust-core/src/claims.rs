//! Participant claims.
//!
//! A [`ClaimSet`] is the set of attribute assertions a participant makes about
//! itself (`location`, `entity_type`, membership tier, ...). It is loaded once
//! from a JSON file at startup and never mutated afterwards.
//!
//! Keys are held in a `BTreeMap`, so iteration and serialization order is
//! always sorted. The canonical signing form in [`crate::codec`] relies on it.

use crate::crypto::{self, PublicKey, SigningKey};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// A single claim value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    String(String),
    Bool(bool),
    Number(serde_json::Number),
    Object(ClaimSet),
}

impl ClaimValue {
    /// Get as string if this is a String variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a nested claim set if this is an Object variant.
    pub fn as_object(&self) -> Option<&ClaimSet> {
        match self {
            ClaimValue::Object(o) => Some(o),
            _ => None,
        }
    }
}

/// String coercion used when comparing a registry value with a locally
/// asserted one: strings as-is, scalars in their JSON spelling, objects as
/// canonical JSON.
impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::String(s) => f.write_str(s),
            ClaimValue::Bool(b) => write!(f, "{}", b),
            ClaimValue::Number(n) => write!(f, "{}", n),
            ClaimValue::Object(o) => {
                let json = serde_json::to_string(o).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        ClaimValue::String(s.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self {
        ClaimValue::String(s)
    }
}

impl From<i64> for ClaimValue {
    fn from(n: i64) -> Self {
        ClaimValue::Number(n.into())
    }
}

impl From<bool> for ClaimValue {
    fn from(b: bool) -> Self {
        ClaimValue::Bool(b)
    }
}

impl From<ClaimSet> for ClaimValue {
    fn from(set: ClaimSet) -> Self {
        ClaimValue::Object(set)
    }
}

/// An unordered mapping from claim key to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    /// Create an empty claim set.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Insert a claim, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ClaimValue>) -> Option<ClaimValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.0.get(key)
    }

    /// Get a claim only if it is a plain, non-blank string.
    ///
    /// This is the shape every claim-based constraint requires; numbers,
    /// booleans and nested objects are not evaluated.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(ClaimValue::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }

    /// Build a claim set from an arbitrary JSON value.
    ///
    /// Fails unless the value is an object whose leaves are strings,
    /// numbers, booleans or nested objects.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidClaims {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Convert into a JSON value (object).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    /// Load a claim set from a JSON file.
    ///
    /// Unlike request-time failures, an unreadable or malformed claims file
    /// is a configuration error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::InvalidClaims {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl<K: Into<String>, V: Into<ClaimValue>> FromIterator<(K, V)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A claim set together with its detached signature.
///
/// The signature is standard base64 of the Ed25519 signature over
/// [`crate::codec::canonicalize`] of `claims`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedClaims {
    pub claims: ClaimSet,
    pub signature: String,
}

impl SignedClaims {
    /// Sign `claims` with `key`.
    pub fn sign(claims: ClaimSet, key: &SigningKey) -> Result<Self> {
        let signature = crypto::sign_claims(&claims, key)?;
        Ok(Self { claims, signature })
    }

    /// Check the signature locally against `public_key`.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        crypto::verify_signature(public_key, &self.signature, &self.claims)
    }
}
