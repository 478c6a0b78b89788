//! Error types for claimtrust.
//!
//! Errors fall into four kinds. Configuration errors are raised while loading
//! identity material and abort startup, including key files that exist but
//! hold no usable key. Crypto errors come from in-memory PEM, base64 and
//! signature handling. Corroboration and evaluation errors are produced
//! while a policy is being evaluated; the policy framework logs them and
//! collapses them to `false`, so they never reach the policy engine.

use thiserror::Error;

/// Result type alias for claimtrust operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or unreadable configuration, claims or key files. Fatal.
    Configuration,
    /// PEM, base64 or signature failures.
    Crypto,
    /// The participant registry could not confirm a claim.
    Corroboration,
    /// A constraint could not be proven true.
    Evaluation,
}

impl ErrorKind {
    /// Machine-readable name (kebab-case).
    pub fn name(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Crypto => "crypto",
            Self::Corroboration => "corroboration",
            Self::Evaluation => "evaluation",
        }
    }

    /// Whether an error of this kind must abort initialization.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Configuration)
    }
}

/// Errors that can occur in claimtrust operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// One or more required configuration values are absent.
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    /// A configuration, claims or key file could not be read.
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    /// A configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    ConfigurationError(String),

    /// The claims file is not a JSON object of claims.
    #[error("invalid claims in {path}: {reason}")]
    InvalidClaims { path: String, reason: String },

    /// The configured public key does not verify the private key's signatures.
    #[error("key pair mismatch: {0}")]
    KeyMismatch(String),

    /// A configured key file was read but does not hold a usable key.
    #[error("invalid key file {path}: {reason}")]
    InvalidKeyFile { path: String, reason: String },

    // =========================================================================
    // Codec & Cryptographic Errors
    // =========================================================================
    /// PEM armor or base64 body is malformed.
    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    /// Key parsing or signing failed.
    #[error("cryptographic error: {0}")]
    CryptoError(String),

    /// Signature did not verify.
    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    /// Claims could not be serialized to their canonical form.
    #[error("serialization error: {0}")]
    SerializationError(String),

    // =========================================================================
    // Corroboration Errors
    // =========================================================================
    /// Transport-level failure talking to the registry.
    #[error("registry unreachable: {0}")]
    RegistryUnavailable(String),

    /// Registry answered with a non-success status.
    #[error("registry returned HTTP {status} for {url}")]
    RegistryStatus { status: u16, url: String },

    /// Registry body could not be interpreted.
    #[error("malformed registry response: {0}")]
    MalformedResponse(String),

    /// The registry has no record of the participant.
    #[error("participant '{0}' is not registered")]
    UnknownParticipant(String),

    /// Registry answered but did not vouch for the claim.
    #[error("registry did not corroborate '{claim_key}' for participant '{participant_id}'")]
    NotCorroborated {
        participant_id: String,
        claim_key: String,
    },

    // =========================================================================
    // Evaluation Errors
    // =========================================================================
    /// A required attribute is missing from the participant agent context.
    #[error("participant context has no '{0}' attribute")]
    MissingAttribute(String),

    /// The claim is absent, blank, or not a plain string.
    #[error("claim '{0}' is absent, blank or not a string")]
    ClaimUnavailable(String),

    /// The operator is not allowed for this rule.
    #[error("unsupported operator '{operator}' for {rule} constraint")]
    UnsupportedOperator { rule: String, operator: String },

    /// The right operand has the wrong type or shape.
    #[error("invalid right operand for {rule} constraint: {reason}")]
    InvalidRightOperand { rule: String, reason: String },

    /// A value required for numeric comparison is not a number.
    #[error("value '{0}' is not numeric")]
    NotNumeric(String),

    /// The right operand of a time constraint is not an RFC 3339 timestamp.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// An operator string could not be parsed.
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
}

impl Error {
    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingConfiguration(_)
            | Error::Io { .. }
            | Error::ConfigurationError(_)
            | Error::InvalidClaims { .. }
            | Error::KeyMismatch(_)
            | Error::InvalidKeyFile { .. } => ErrorKind::Configuration,

            Error::InvalidPem(_)
            | Error::CryptoError(_)
            | Error::SignatureInvalid(_)
            | Error::SerializationError(_) => ErrorKind::Crypto,

            Error::RegistryUnavailable(_)
            | Error::RegistryStatus { .. }
            | Error::MalformedResponse(_)
            | Error::UnknownParticipant(_)
            | Error::NotCorroborated { .. } => ErrorKind::Corroboration,

            Error::MissingAttribute(_)
            | Error::ClaimUnavailable(_)
            | Error::UnsupportedOperator { .. }
            | Error::InvalidRightOperand { .. }
            | Error::NotNumeric(_)
            | Error::InvalidTimestamp { .. }
            | Error::UnknownOperator(_) => ErrorKind::Evaluation,
        }
    }

    /// Get the machine-readable kind name.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = Error::MissingConfiguration(vec!["claims_path".into()]);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.kind().is_fatal());

        let err = Error::RegistryStatus {
            status: 503,
            url: "http://registry/verification".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Corroboration);
        assert!(!err.kind().is_fatal());

        let err = Error::UnsupportedOperator {
            rule: "location".into(),
            operator: "GT".into(),
        };
        assert_eq!(err.name(), "evaluation");

        let err = Error::InvalidKeyFile {
            path: "deployment/ed25519_private.pem".into(),
            reason: "invalid PEM: empty key body".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.kind().is_fatal());
    }

    #[test]
    fn test_missing_configuration_lists_every_field() {
        let err = Error::MissingConfiguration(vec![
            "claims_path".into(),
            "registry.url".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "missing required configuration: claims_path, registry.url"
        );
    }

    #[test]
    fn test_all_error_variants_map() {
        let test_errors = vec![
            Error::MissingConfiguration(vec![]),
            Error::Io {
                path: "a".into(),
                reason: "b".into(),
            },
            Error::ConfigurationError("test".into()),
            Error::InvalidClaims {
                path: "a".into(),
                reason: "b".into(),
            },
            Error::KeyMismatch("test".into()),
            Error::InvalidKeyFile {
                path: "a".into(),
                reason: "b".into(),
            },
            Error::InvalidPem("test".into()),
            Error::CryptoError("test".into()),
            Error::SignatureInvalid("test".into()),
            Error::SerializationError("test".into()),
            Error::RegistryUnavailable("test".into()),
            Error::RegistryStatus {
                status: 500,
                url: "u".into(),
            },
            Error::MalformedResponse("test".into()),
            Error::UnknownParticipant("p".into()),
            Error::NotCorroborated {
                participant_id: "p".into(),
                claim_key: "k".into(),
            },
            Error::MissingAttribute("claims".into()),
            Error::ClaimUnavailable("location".into()),
            Error::UnsupportedOperator {
                rule: "r".into(),
                operator: "o".into(),
            },
            Error::InvalidRightOperand {
                rule: "r".into(),
                reason: "x".into(),
            },
            Error::NotNumeric("abc".into()),
            Error::InvalidTimestamp {
                value: "v".into(),
                reason: "x".into(),
            },
            Error::UnknownOperator("??".into()),
        ];

        for error in test_errors {
            let name = error.name();
            assert!(
                name.chars().all(|c| c.is_lowercase() || c == '-'),
                "kind name '{}' is not kebab-case",
                name
            );
        }
    }
}
