//! Identity configuration.
//!
//! Parses the YAML file that tells a participant where its claims and key
//! material live and how to reach the participant registry.
//!
//! # Configuration File Format
//!
//! ```yaml
//! claims_path: deployment/creds.json
//! private_key_path: deployment/ed25519_private.pem
//! public_key_path: deployment/ed25519_public.pem
//!
//! registry:
//!   url: http://registry:8181/api/participants
//!   api_key: s3cr3t          # optional, sent as x-api-key
//!   timeout_secs: 15
//!   cache_ttl_secs: 0        # 0 disables the per-key cache
//!   protocol: bundle         # or per_key
//! ```
//!
//! Every path and the registry URL can be overridden from the environment
//! (`CLAIMTRUST_CLAIMS_PATH`, `CLAIMTRUST_PRIVATE_KEY_PATH`,
//! `CLAIMTRUST_PUBLIC_KEY_PATH`, `CLAIMTRUST_REGISTRY_URL`,
//! `CLAIMTRUST_REGISTRY_API_KEY`).

use crate::error::{Error, Result};
use crate::registry::Protocol;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const ENV_CLAIMS_PATH: &str = "CLAIMTRUST_CLAIMS_PATH";
pub const ENV_PRIVATE_KEY_PATH: &str = "CLAIMTRUST_PRIVATE_KEY_PATH";
pub const ENV_PUBLIC_KEY_PATH: &str = "CLAIMTRUST_PUBLIC_KEY_PATH";
pub const ENV_REGISTRY_URL: &str = "CLAIMTRUST_REGISTRY_URL";
pub const ENV_REGISTRY_API_KEY: &str = "CLAIMTRUST_REGISTRY_API_KEY";

/// Where a participant's identity material lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// JSON file holding the participant's claim set
    #[serde(default)]
    pub claims_path: Option<PathBuf>,
    /// PKCS#8 PEM private key
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// SubjectPublicKeyInfo PEM public key
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
    /// Participant registry connection
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Participant registry connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL; `verification` or the participant id is appended
    #[serde(default)]
    pub url: Option<String>,
    /// Sent as `x-api-key` on per-key lookups
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Time-to-live of positive per-key answers; 0 disables caching
    #[serde(default)]
    pub cache_ttl_secs: u64,
    /// Upper bound on cached per-key answers
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Corroboration protocol used by claim rules
    #[serde(default)]
    pub protocol: Protocol,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            cache_ttl_secs: 0,
            cache_capacity: default_cache_capacity(),
            protocol: Protocol::default(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Cache TTL, or `None` when caching is disabled.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }
}

impl IdentityConfig {
    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Configuration from the environment alone.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_CLAIMS_PATH) {
            self.claims_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_PRIVATE_KEY_PATH) {
            self.private_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_PUBLIC_KEY_PATH) {
            self.public_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get(ENV_REGISTRY_URL) {
            self.registry.url = Some(v);
        }
        if let Some(v) = get(ENV_REGISTRY_API_KEY) {
            self.registry.api_key = Some(v);
        }
    }

    /// Check that every required value is present and usable.
    ///
    /// All missing fields are logged and reported together in a single
    /// [`Error::MissingConfiguration`]. A zero registry timeout would make
    /// every registry call fail, so it is rejected as
    /// [`Error::ConfigurationError`].
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.claims_path.is_none() {
            missing.push("claims_path");
        }
        if self.private_key_path.is_none() {
            missing.push("private_key_path");
        }
        if self.public_key_path.is_none() {
            missing.push("public_key_path");
        }
        if self.registry.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            missing.push("registry.url");
        }

        if !missing.is_empty() {
            for field in &missing {
                warn!(field = %field, "required configuration value is not set");
            }
            return Err(Error::MissingConfiguration(
                missing.into_iter().map(String::from).collect(),
            ));
        }

        if self.registry.timeout_secs == 0 {
            warn!(field = "registry.timeout_secs", "registry timeout must be positive");
            return Err(Error::ConfigurationError(
                "registry.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
