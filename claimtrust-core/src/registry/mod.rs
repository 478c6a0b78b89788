//! Participant registry corroboration.
//!
//! A claim is only trusted when the participant registry vouches for it. Two
//! registry protocols exist in the field:
//!
//! - **Bundle**: `POST {base}/verification` with the whole signed claim set;
//!   the registry checks both the signature and the claim values in one call.
//! - **Per-key**: `GET {base}/{participant_id}` returns the registered claim
//!   set and the caller compares a single key.
//!
//! Both live behind [`RegistryClient`]. Corroboration never returns an error
//! to policy code: any failure means "not corroborated".

mod directory;
mod http;

pub use directory::{InMemoryDirectory, ParticipantDirectory, ParticipantRecord, RegistryVerifier};
pub use http::HttpRegistryClient;

use crate::claims::ClaimSet;
use crate::error::{Error, Result};
use crate::result::VerificationResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Which registry protocol claim rules corroborate with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    #[default]
    Bundle,
    PerKey,
}

/// A source of truth for participant claims.
///
/// Implementations must be shareable across threads; one client instance is
/// injected into every rule through `Arc<dyn RegistryClient>`.
pub trait RegistryClient: Send + Sync {
    /// Ask the registry to verify a whole signed claim set.
    ///
    /// Transport errors, bad statuses and unparseable bodies all produce a
    /// failed [`VerificationResult`] with a diagnostic message.
    fn corroborate_bundle(
        &self,
        participant_id: &str,
        signed_claims: &str,
        claims: &ClaimSet,
    ) -> VerificationResult;

    /// Fetch the claim set registered for `participant_id`.
    fn fetch_claims(&self, participant_id: &str) -> Result<ClaimSet>;

    /// Whether the registry holds `asserted` under `claim_key` for the
    /// participant.
    ///
    /// Registry values are compared through their string form, so a
    /// registered number `42` corroborates an asserted `"42"`.
    fn corroborate_by_key(&self, claim_key: &str, asserted: &str, participant_id: &str) -> bool {
        matches_registered(self.fetch_claims(participant_id), claim_key, asserted, participant_id)
    }
}

/// Compare an asserted value with the outcome of a registry lookup.
pub(crate) fn matches_registered(
    registered: Result<ClaimSet>,
    claim_key: &str,
    asserted: &str,
    participant_id: &str,
) -> bool {
    let registered = match registered {
        Ok(claims) => claims,
        Err(e) => {
            warn!(
                participant_id = %participant_id,
                claim_key = %claim_key,
                error = %e,
                "registry lookup failed"
            );
            return false;
        }
    };

    match registered.get(claim_key) {
        Some(value) if value.to_string() == asserted => true,
        Some(_) => {
            debug!(
                participant_id = %participant_id,
                claim_key = %claim_key,
                "registered value differs from asserted value"
            );
            false
        }
        None => {
            debug!(
                participant_id = %participant_id,
                claim_key = %claim_key,
                "claim not registered"
            );
            false
        }
    }
}

/// Body of a bundle verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    pub participant_id: String,
    pub signed_claims: String,
    pub claims: ClaimSet,
}

/// Body of a bundle verification response.
///
/// ```json
/// { "verifySignatureSuccess": { "valueType": "true" },
///   "verifyClaimsSuccess":   { "valueType": "false" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResponse {
    pub verify_signature_success: TypedFlag,
    pub verify_claims_success: TypedFlag,
}

/// A boolean carried as a string in `valueType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedFlag {
    #[serde(rename = "valueType")]
    pub value_type: String,
}

impl TypedFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value_type: value.to_string(),
        }
    }

    /// Parse the flag. Only `true`/`false` (any case) are accepted.
    pub fn value(&self) -> Result<bool> {
        let v = self.value_type.trim();
        if v.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if v.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(Error::MalformedResponse(format!(
                "valueType '{}' is not a boolean",
                self.value_type
            )))
        }
    }
}

impl BundleResponse {
    pub fn from_result(result: &VerificationResult) -> Self {
        Self {
            verify_signature_success: TypedFlag::new(result.signature_result()),
            verify_claims_success: TypedFlag::new(result.claims_result()),
        }
    }

    /// Interpret the response as a verification result.
    pub fn into_result(self) -> Result<VerificationResult> {
        let signature = self.verify_signature_success.value()?;
        let claims = self.verify_claims_success.value()?;
        let message = match (signature, claims) {
            (true, true) => "Participant claims verified by registry",
            (false, _) => "Registry rejected the claim signature",
            (true, false) => "Registry claims differ from asserted claims",
        };
        Ok(VerificationResult::new(signature, claims, message))
    }
}

/// Registered-claims body of the per-key endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsResponse {
    pub claims: ClaimSet,
}
