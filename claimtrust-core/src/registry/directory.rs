//! Registry side of corroboration.
//!
//! [`RegistryVerifier`] answers the bundle protocol from a
//! [`ParticipantDirectory`]: the signature is checked against the
//! participant's registered public key, and the asserted claims must equal
//! the registered ones exactly. It also implements [`RegistryClient`], so a
//! process that embeds the registry can corroborate without HTTP.

use super::{BundleRequest, RegistryClient};
use crate::claims::ClaimSet;
use crate::crypto;
use crate::error::{Error, Result};
use crate::result::VerificationResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// What the registry knows about one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    /// SubjectPublicKeyInfo PEM
    pub public_key_pem: String,
    pub claims: ClaimSet,
}

/// Lookup of registered participants.
pub trait ParticipantDirectory: Send + Sync {
    fn lookup(&self, participant_id: &str) -> Option<ParticipantRecord>;
}

impl<D: ParticipantDirectory + ?Sized> ParticipantDirectory for Arc<D> {
    fn lookup(&self, participant_id: &str) -> Option<ParticipantRecord> {
        (**self).lookup(participant_id)
    }
}

/// A mutable, thread-safe directory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: RwLock<HashMap<String, ParticipantRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a participant.
    pub fn register(&self, participant_id: impl Into<String>, record: ParticipantRecord) {
        let participant_id = participant_id.into();
        info!(participant_id = %participant_id, "participant registered");
        self.write().insert(participant_id, record);
    }

    /// Replace the registered claims of an existing participant.
    ///
    /// Returns `false` if the participant is unknown.
    pub fn update_claims(&self, participant_id: &str, claims: ClaimSet) -> bool {
        match self.write().get_mut(participant_id) {
            Some(record) => {
                record.claims = claims;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, participant_id: &str) -> Option<ParticipantRecord> {
        self.write().remove(participant_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A poisoned lock only means a writer panicked mid-insert; the map is
    // still structurally valid.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ParticipantRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ParticipantRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ParticipantDirectory for InMemoryDirectory {
    fn lookup(&self, participant_id: &str) -> Option<ParticipantRecord> {
        self.read().get(participant_id).cloned()
    }
}

/// Verifies bundle requests against a directory.
#[derive(Debug, Clone)]
pub struct RegistryVerifier<D> {
    directory: D,
}

impl<D: ParticipantDirectory> RegistryVerifier<D> {
    pub fn new(directory: D) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Check a bundle request.
    pub fn verify(&self, request: &BundleRequest) -> VerificationResult {
        let Some(record) = self.directory.lookup(&request.participant_id) else {
            debug!(participant_id = %request.participant_id, "verification for unknown participant");
            return VerificationResult::failed(format!(
                "Participant not registered with id: {}",
                request.participant_id
            ));
        };

        let signature_ok = crypto::verify_signature_pem(
            &record.public_key_pem,
            &request.signed_claims,
            &request.claims,
        );
        let claims_ok = record.claims == request.claims;

        let message = match (signature_ok, claims_ok) {
            (true, true) => "Signature and claims verified",
            (false, true) => "Signature does not match the registered public key",
            (true, false) => "Claims differ from the registered claims",
            (false, false) => "Signature and claims verification failed",
        };
        debug!(
            participant_id = %request.participant_id,
            signature_result = signature_ok,
            claims_result = claims_ok,
            "bundle verified"
        );
        VerificationResult::new(signature_ok, claims_ok, message)
    }

    /// Registered claims for the per-key endpoint.
    pub fn registered_claims(&self, participant_id: &str) -> Option<ClaimSet> {
        self.directory.lookup(participant_id).map(|r| r.claims)
    }
}

impl<D: ParticipantDirectory> RegistryClient for RegistryVerifier<D> {
    fn corroborate_bundle(
        &self,
        participant_id: &str,
        signed_claims: &str,
        claims: &ClaimSet,
    ) -> VerificationResult {
        self.verify(&BundleRequest {
            participant_id: participant_id.to_string(),
            signed_claims: signed_claims.to_string(),
            claims: claims.clone(),
        })
    }

    fn fetch_claims(&self, participant_id: &str) -> Result<ClaimSet> {
        self.registered_claims(participant_id)
            .ok_or_else(|| Error::UnknownParticipant(participant_id.to_string()))
    }
}
