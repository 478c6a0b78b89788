//! # claimtrust
//!
//! Attribute-based trust verification for data-exchange participants.
//!
//! A participant asserts a signed set of claims about itself (where it is
//! located, what kind of entity it is, ...). When a counterparty evaluates an
//! access policy, a claim only counts if the participant registry
//! corroborates it. Self-assertion alone never satisfies a constraint.
//!
//! ## Key Concepts
//!
//! - **Claims**: a JSON object of attribute assertions, signed with Ed25519
//!   over its canonical form
//! - **Registry**: the trusted source that corroborates claims, either the
//!   whole signed bundle or one key at a time
//! - **Constraints**: `left operator right` policy terms, evaluated by a
//!   table of claim rules that fail closed
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimtrust::{ConstraintEngine, HttpRegistryClient, IdentityConfig, ParticipantIdentity};
//! use claimtrust::policy::{Constraint, Operator, SystemClock};
//! use std::sync::Arc;
//!
//! let config = IdentityConfig::from_file("identity.yaml")?;
//! let identity = ParticipantIdentity::load("did:web:provider", &config)?;
//!
//! let registry = Arc::new(HttpRegistryClient::from_config(&config.registry)?);
//! let engine = ConstraintEngine::standard(registry, config.registry.protocol, Arc::new(SystemClock));
//!
//! let allowed = engine.evaluate(
//!     &Constraint::new("https://w3id.org/edc/v0.0.1/ns/location", Operator::Eq, "eu"),
//!     &identity.agent_token(),
//! );
//! ```

pub mod claims;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod policy;
pub mod registry;
pub mod result;

// Re-exports for convenience
pub use claims::{ClaimSet, ClaimValue, SignedClaims};
pub use config::{IdentityConfig, RegistryConfig};
pub use crypto::{keys_match, sign_claims, verify_signature, KeyPair, PublicKey, Signature, SigningKey};
pub use error::{Error, ErrorKind, Result};
pub use identity::ParticipantIdentity;
pub use policy::{Constraint, ConstraintEngine, Operator, ParticipantAgent};
pub use registry::{HttpRegistryClient, Protocol, RegistryClient, RegistryVerifier};
pub use result::VerificationResult;

/// Message signed and verified to check that a public key belongs to a
/// private key.
pub const PROBE_MESSAGE: &[u8] = b"key-validation";

/// Namespace prefix of the namespaced [`VerificationResult`] form.
pub const DEFAULT_RESULT_NAMESPACE: &str = "https://w3id.org/edc/v0.0.1/ns/";
