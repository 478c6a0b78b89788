//! A participant's own identity.
//!
//! Loaded once at startup from an [`IdentityConfig`]. Every failure here is a
//! configuration error: a participant that cannot present signed claims must
//! not start.

use crate::claims::{ClaimSet, SignedClaims};
use crate::config::IdentityConfig;
use crate::crypto::KeyPair;
use crate::error::{Error, Result};
use crate::policy::ParticipantAgent;
use crate::registry::RegistryClient;
use crate::result::VerificationResult;
use tracing::info;

/// Signed claims plus the key pair that signed them.
#[derive(Debug, Clone)]
pub struct ParticipantIdentity {
    participant_id: String,
    key_pair: KeyPair,
    signed: SignedClaims,
}

impl ParticipantIdentity {
    /// Load claims and keys from the configured paths and sign the claims.
    ///
    /// Missing configuration is reported (all fields at once) before any file
    /// is opened. A public key that does not match the private key is fatal.
    pub fn load(participant_id: impl Into<String>, config: &IdentityConfig) -> Result<Self> {
        config.validate()?;

        let (Some(claims_path), Some(private_key_path), Some(public_key_path)) = (
            config.claims_path.as_ref(),
            config.private_key_path.as_ref(),
            config.public_key_path.as_ref(),
        ) else {
            return Err(Error::ConfigurationError(
                "identity paths disappeared after validation".to_string(),
            ));
        };

        let claims = ClaimSet::from_file(claims_path)?;
        let key_pair = KeyPair::load(private_key_path, public_key_path)?;
        Self::from_parts(participant_id, claims, key_pair)
    }

    /// Build an identity from already loaded parts.
    pub fn from_parts(participant_id: impl Into<String>, claims: ClaimSet, key_pair: KeyPair) -> Result<Self> {
        let participant_id = participant_id.into();
        if participant_id.trim().is_empty() {
            return Err(Error::MissingConfiguration(vec!["participant_id".to_string()]));
        }

        let signed = SignedClaims::sign(claims, key_pair.signing_key())?;
        info!(
            participant_id = %participant_id,
            claim_count = signed.claims.len(),
            fingerprint = %key_pair.public_key().fingerprint(),
            "participant identity loaded"
        );

        Ok(Self {
            participant_id,
            key_pair,
            signed,
        })
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.signed.claims
    }

    /// Base64 signature over the canonical claims.
    pub fn signature(&self) -> &str {
        &self.signed.signature
    }

    pub fn signed_claims(&self) -> &SignedClaims {
        &self.signed
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// The attributes a counterparty receives with each request.
    pub fn agent_token(&self) -> ParticipantAgent {
        ParticipantAgent::from_identity(&self.participant_id, &self.signed.claims, &self.signed.signature)
    }

    /// Ask the registry whether it agrees with this identity.
    pub fn verify_with_registry(&self, registry: &dyn RegistryClient) -> VerificationResult {
        registry.corroborate_bundle(&self.participant_id, &self.signed.signature, &self.signed.claims)
    }
}
