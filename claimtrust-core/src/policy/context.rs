//! Per-request participant context.

use crate::claims::ClaimSet;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute holding the requester's participant id.
pub const CLIENT_ID: &str = "client_id";
/// Attribute holding the requester's asserted claim set.
pub const CLAIMS: &str = "claims";
/// Attribute holding the base64 signature over the claims.
pub const SIGNED_CLAIMS: &str = "signedClaims";

/// The attributes a counterparty presented with its request.
///
/// Serializes as a flat JSON object, which is also the form in which a
/// participant hands its identity to a counterparty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantAgent {
    attributes: Map<String, Value>,
}

impl ParticipantAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    /// Build the standard three-attribute context.
    pub fn from_identity(client_id: &str, claims: &ClaimSet, signed_claims: &str) -> Self {
        Self::new()
            .with_attribute(CLIENT_ID, client_id)
            .with_attribute(CLAIMS, claims.to_json())
            .with_attribute(SIGNED_CLAIMS, signed_claims)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// The requester's participant id.
    pub fn client_id(&self) -> Result<&str> {
        self.attributes
            .get(CLIENT_ID)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::MissingAttribute(CLIENT_ID.to_string()))
    }

    /// The requester's asserted claims.
    ///
    /// Accepts a JSON object, or a string containing one.
    pub fn claims(&self) -> Result<ClaimSet> {
        match self.attributes.get(CLAIMS) {
            Some(Value::Object(map)) => ClaimSet::from_json(Value::Object(map.clone())),
            Some(Value::String(s)) => {
                let value: Value = serde_json::from_str(s)
                    .map_err(|_| Error::MissingAttribute(CLAIMS.to_string()))?;
                ClaimSet::from_json(value)
            }
            _ => Err(Error::MissingAttribute(CLAIMS.to_string())),
        }
    }

    /// The signature over the claims, if presented.
    pub fn signed_claims(&self) -> Option<&str> {
        self.attributes
            .get(SIGNED_CLAIMS)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}
