//! Cryptographic primitives for claimtrust.
//!
//! Ed25519 over the canonical JSON of a claim set.
//!
//! ## Wire compatibility
//!
//! Signatures are made over the raw canonical bytes with no domain-separation
//! prefix. Registries verify them with stock Ed25519 against the participant's
//! stored PEM, so any prefix would break corroboration.
//!
//! Signatures travel as standard (padded) base64.

use crate::claims::ClaimSet;
use crate::codec::{self, KeyKind};
use crate::error::{Error, Result};
use crate::PROBE_MESSAGE;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey as Ed25519SigningKey, Verifier, VerifyingKey,
};
use pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rand::rngs::OsRng;
use secrecy::{CloneableSecret, ExposeSecret, Secret, Zeroize};
use std::path::Path;
use tracing::debug;

/// A participant's private signing key.
///
/// Contains an Ed25519 private key wrapped in `Secret` for:
/// 1. Guaranteed zeroization on drop
/// 2. Prevention of accidental logging (Debug is redacted)
#[derive(Clone)]
pub struct SigningKey {
    signing_key: Secret<Ed25519SigningKeyWrapper>,
}

// ed25519-dalek 2.x zeroizes SigningKey on Drop, so Zeroize is a no-op here.
struct Ed25519SigningKeyWrapper(Ed25519SigningKey);

impl Clone for Ed25519SigningKeyWrapper {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl Zeroize for Ed25519SigningKeyWrapper {
    fn zeroize(&mut self) {}
}

impl CloneableSecret for Ed25519SigningKeyWrapper {}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("signing_key", &"***SECRET***")
            .finish()
    }
}

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        Self::wrap(Ed25519SigningKey::generate(&mut OsRng))
    }

    /// Create a signing key from secret key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self::wrap(Ed25519SigningKey::from_bytes(bytes))
    }

    fn wrap(key: Ed25519SigningKey) -> Self {
        Self {
            signing_key: Secret::new(Ed25519SigningKeyWrapper(key)),
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.expose_secret().0.verifying_key(),
        }
    }

    /// Sign raw bytes.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            inner: self.signing_key.expose_secret().0.sign(message),
        }
    }

    /// Parse a PKCS#8 private key from PEM text.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = codec::decode_pem_key(pem, KeyKind::Private)?;
        let key = Ed25519SigningKey::from_pkcs8_der(&der)
            .map_err(|e| Error::CryptoError(format!("invalid PKCS#8 private key: {}", e)))?;
        Ok(Self::wrap(key))
    }

    /// Encode as a PKCS#8 PEM document.
    pub fn to_pem(&self) -> Result<String> {
        let doc = self
            .signing_key
            .expose_secret()
            .0
            .to_pkcs8_der()
            .map_err(|e| Error::CryptoError(format!("pkcs8 encoding failed: {}", e)))?;
        Ok(codec::encode_pem(doc.as_bytes(), KeyKind::Private))
    }
}

/// A participant's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    verifying_key: VerifyingKey,
}

impl PublicKey {
    /// Create a public key from bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let verifying_key =
            VerifyingKey::from_bytes(bytes).map_err(|e| Error::CryptoError(e.to_string()))?;
        Ok(Self { verifying_key })
    }

    /// Get the public key as bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Short fingerprint (first 16 hex chars) for log lines.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.to_bytes()[..8])
    }

    /// Verify a signature over raw bytes.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.verifying_key
            .verify(message, &signature.inner)
            .map_err(|e| Error::SignatureInvalid(e.to_string()))
    }

    /// Parse a SubjectPublicKeyInfo public key from PEM text.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = codec::decode_pem_key(pem, KeyKind::Public)?;
        let verifying_key = VerifyingKey::from_public_key_der(&der)
            .map_err(|e| Error::CryptoError(format!("invalid public key: {}", e)))?;
        Ok(Self { verifying_key })
    }

    /// Encode as a SubjectPublicKeyInfo PEM document.
    pub fn to_pem(&self) -> Result<String> {
        let doc = self
            .verifying_key
            .to_public_key_der()
            .map_err(|e| Error::CryptoError(format!("spki encoding failed: {}", e)))?;
        Ok(codec::encode_pem(doc.as_bytes(), KeyKind::Public))
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

/// An Ed25519 signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    inner: DalekSignature,
}

impl Signature {
    /// Create a signature from bytes.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self {
            inner: DalekSignature::from_bytes(bytes),
        }
    }

    /// Get the signature as bytes.
    pub fn to_bytes(&self) -> [u8; 64] {
        self.inner.to_bytes()
    }

    /// Decode from standard base64. Surrounding whitespace is ignored.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::SignatureInvalid(format!("invalid base64: {}", e)))?;
        let arr: [u8; 64] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::SignatureInvalid(format!("expected 64 bytes, got {}", b.len()))
        })?;
        Ok(Self::from_bytes(&arr))
    }

    /// Encode as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }
}

/// A private key together with the public key registered for it.
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a fresh, matching key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate();
        let public_key = signing_key.public_key();
        Self {
            signing_key,
            public_key,
        }
    }

    /// Pair a private key with an independently configured public key.
    ///
    /// Fails with [`Error::KeyMismatch`] unless the public key verifies
    /// signatures made by the private key.
    pub fn from_parts(signing_key: SigningKey, public_key: PublicKey) -> Result<Self> {
        if !keys_match(&public_key, &signing_key) {
            return Err(Error::KeyMismatch(format!(
                "public key {} does not verify signatures of the configured private key",
                public_key.fingerprint()
            )));
        }
        Ok(Self {
            signing_key,
            public_key,
        })
    }

    /// Load both halves from PEM files and check that they match.
    ///
    /// Every failure is a configuration error: an unreadable file is
    /// [`Error::Io`], a file without a usable key is [`Error::InvalidKeyFile`].
    pub fn load(private_key_path: impl AsRef<Path>, public_key_path: impl AsRef<Path>) -> Result<Self> {
        let private_key_path = private_key_path.as_ref();
        let public_key_path = public_key_path.as_ref();

        let private_pem = std::fs::read_to_string(private_key_path)
            .map_err(|e| Error::io(private_key_path, e))?;
        let public_pem = std::fs::read_to_string(public_key_path)
            .map_err(|e| Error::io(public_key_path, e))?;

        let signing_key =
            SigningKey::from_pem(&private_pem).map_err(|e| invalid_key_file(private_key_path, e))?;
        let public_key =
            PublicKey::from_pem(&public_pem).map_err(|e| invalid_key_file(public_key_path, e))?;
        debug!(fingerprint = %public_key.fingerprint(), "loaded key pair");

        Self::from_parts(signing_key, public_key)
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Sign a claim set, returning the base64 signature.
pub fn sign_claims(claims: &ClaimSet, signing_key: &SigningKey) -> Result<String> {
    let message = codec::canonicalize(claims)?;
    Ok(signing_key.sign(&message).to_base64())
}

/// Check a base64 signature over `claims`.
///
/// Never fails: malformed base64, a wrong-length signature and a signature
/// that does not verify all yield `false`.
pub fn verify_signature(public_key: &PublicKey, signature_b64: &str, claims: &ClaimSet) -> bool {
    match try_verify(public_key, signature_b64, claims) {
        Ok(()) => true,
        Err(e) => {
            debug!(fingerprint = %public_key.fingerprint(), error = %e, "claim signature rejected");
            false
        }
    }
}

/// Like [`verify_signature`], for callers holding only the PEM text of the
/// public key (registry records). An unparseable PEM is `false`.
pub fn verify_signature_pem(public_key_pem: &str, signature_b64: &str, claims: &ClaimSet) -> bool {
    match PublicKey::from_pem(public_key_pem) {
        Ok(public_key) => verify_signature(&public_key, signature_b64, claims),
        Err(e) => {
            debug!(error = %e, "stored public key is unusable");
            false
        }
    }
}

/// Whether `public_key` verifies signatures made with `signing_key`.
pub fn keys_match(public_key: &PublicKey, signing_key: &SigningKey) -> bool {
    let signature = signing_key.sign(PROBE_MESSAGE);
    public_key.verify(PROBE_MESSAGE, &signature).is_ok()
}

fn invalid_key_file(path: &Path, err: Error) -> Error {
    Error::InvalidKeyFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn try_verify(public_key: &PublicKey, signature_b64: &str, claims: &ClaimSet) -> Result<()> {
    let signature = Signature::from_base64(signature_b64)?;
    let message = codec::canonicalize(claims)?;
    public_key.verify(&message, &signature)
}
