//! Outcome of a registry verification.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Result of checking a participant's signed claims against the registry.
///
/// `success` is always `signature_result && claims_result`; the fields are
/// private so it cannot drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawVerificationResult")]
pub struct VerificationResult {
    signature_result: bool,
    claims_result: bool,
    success: bool,
    message: String,
}

// Incoming `success` is recomputed, never trusted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerificationResult {
    signature_result: bool,
    claims_result: bool,
    #[serde(default)]
    message: String,
}

impl From<RawVerificationResult> for VerificationResult {
    fn from(raw: RawVerificationResult) -> Self {
        Self::new(raw.signature_result, raw.claims_result, raw.message)
    }
}

impl VerificationResult {
    pub fn new(signature_result: bool, claims_result: bool, message: impl Into<String>) -> Self {
        Self {
            signature_result,
            claims_result,
            success: signature_result && claims_result,
            message: message.into(),
        }
    }

    /// A result with every flag false.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(false, false, message)
    }

    pub fn signature_result(&self) -> bool {
        self.signature_result
    }

    pub fn claims_result(&self) -> bool {
        self.claims_result
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Namespaced JSON form: every key is prefixed with `namespace`.
    ///
    /// ```
    /// use claimtrust::VerificationResult;
    ///
    /// let json = VerificationResult::new(true, true, "ok").to_namespaced_json("https://ex.org/ns/");
    /// assert_eq!(json["https://ex.org/ns/success"], true);
    /// ```
    pub fn to_namespaced_json(&self, namespace: &str) -> Value {
        let mut map = Map::new();
        map.insert(format!("{namespace}signatureResult"), json!(self.signature_result));
        map.insert(format!("{namespace}claimsResult"), json!(self.claims_result));
        map.insert(format!("{namespace}success"), json!(self.success));
        map.insert(format!("{namespace}message"), json!(self.message));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_RESULT_NAMESPACE;

    #[test]
    fn test_success_is_conjunction() {
        assert!(VerificationResult::new(true, true, "").success());
        assert!(!VerificationResult::new(true, false, "").success());
        assert!(!VerificationResult::new(false, true, "").success());
        assert!(!VerificationResult::failed("down").success());
    }

    #[test]
    fn test_deserialize_recomputes_success() {
        let result: VerificationResult = serde_json::from_value(json!({
            "signatureResult": true,
            "claimsResult": false,
            "success": true,
            "message": "lying"
        }))
        .unwrap();
        assert!(!result.success());
        assert_eq!(result.message(), "lying");
    }

    #[test]
    fn test_camel_case_serialization() {
        let json = serde_json::to_value(VerificationResult::new(true, false, "claims differ")).unwrap();
        assert_eq!(
            json,
            json!({
                "signatureResult": true,
                "claimsResult": false,
                "success": false,
                "message": "claims differ"
            })
        );
    }

    #[test]
    fn test_namespaced_json() {
        let json = VerificationResult::new(true, true, "ok").to_namespaced_json(DEFAULT_RESULT_NAMESPACE);
        assert_eq!(json["https://w3id.org/edc/v0.0.1/ns/signatureResult"], true);
        assert_eq!(json["https://w3id.org/edc/v0.0.1/ns/claimsResult"], true);
        assert_eq!(json["https://w3id.org/edc/v0.0.1/ns/success"], true);
        assert_eq!(json["https://w3id.org/edc/v0.0.1/ns/message"], "ok");
    }
}
