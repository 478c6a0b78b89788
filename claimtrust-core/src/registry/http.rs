//! HTTP registry client.

use super::{matches_registered, BundleRequest, BundleResponse, ClaimsResponse, RegistryClient};
use crate::claims::ClaimSet;
use crate::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::result::VerificationResult;
use moka::sync::Cache;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-api-key";

/// Blocking registry client speaking both protocols.
///
/// One instance (and so one connection pool) is meant to be shared by every
/// rule. Each call is a single attempt bounded by the configured timeout.
///
/// The client is built on `reqwest::blocking`, which panics when created,
/// used or dropped on a tokio runtime thread. Async callers must run
/// evaluations through `tokio::task::spawn_blocking`.
#[derive(Clone)]
pub struct HttpRegistryClient {
    base_url: Url,
    api_key: Option<String>,
    http_client: reqwest::blocking::Client,
    /// Positive per-key answers, keyed by (participant_id, claim_key)
    cache: Option<Cache<(String, String), String>>,
}

impl std::fmt::Debug for HttpRegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRegistryClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl HttpRegistryClient {
    /// Create a client for `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::MissingConfiguration(vec!["registry.url".to_string()]));
        }
        let base_url = Url::parse(trimmed)
            .map_err(|e| Error::ConfigurationError(format!("invalid registry url '{}': {}", trimmed, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigurationError(format!(
                "registry url '{}' cannot carry a path",
                trimmed
            )));
        }

        let http_client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ConfigurationError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            api_key: None,
            http_client,
            cache: None,
        })
    }

    /// Build a client from the `registry` configuration section.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::MissingConfiguration(vec!["registry.url".to_string()]))?;

        let mut client = Self::new(url, config.timeout())?;
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            client = client.with_api_key(key);
        }
        if let Some(ttl) = config.cache_ttl() {
            client = client.with_cache(ttl, config.cache_capacity);
        }
        Ok(client)
    }

    /// Send `x-api-key` on per-key lookups.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Cache positive per-key answers for `ttl`.
    pub fn with_cache(mut self, ttl: Duration, max_capacity: u64) -> Self {
        self.cache = Some(
            Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        );
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn verification_url(&self) -> Url {
        self.join_segment("verification")
    }

    /// `{base}/{participant_id}` with the id percent-encoded as one path
    /// segment, so `/`, `?` and `#` cannot address another resource.
    fn participant_url(&self, participant_id: &str) -> Url {
        self.join_segment(participant_id)
    }

    fn join_segment(&self, segment: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base can carry path segments
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    fn try_corroborate_bundle(
        &self,
        participant_id: &str,
        signed_claims: &str,
        claims: &ClaimSet,
    ) -> Result<VerificationResult> {
        let url = self.verification_url();
        let request = BundleRequest {
            participant_id: participant_id.to_string(),
            signed_claims: signed_claims.to_string(),
            claims: claims.clone(),
        };

        let response = self
            .http_client
            .post(url.clone())
            .json(&request)
            .send()
            .map_err(|e| Error::RegistryUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RegistryStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: BundleResponse = response
            .json()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        body.into_result()
    }
}

impl RegistryClient for HttpRegistryClient {
    fn corroborate_bundle(
        &self,
        participant_id: &str,
        signed_claims: &str,
        claims: &ClaimSet,
    ) -> VerificationResult {
        match self.try_corroborate_bundle(participant_id, signed_claims, claims) {
            Ok(result) => {
                debug!(
                    participant_id = %participant_id,
                    signature_result = result.signature_result(),
                    claims_result = result.claims_result(),
                    "registry bundle verification"
                );
                result
            }
            Err(e) => {
                warn!(
                    participant_id = %participant_id,
                    error = %e,
                    "registry bundle verification failed"
                );
                VerificationResult::failed(e.to_string())
            }
        }
    }

    fn fetch_claims(&self, participant_id: &str) -> Result<ClaimSet> {
        let url = self.participant_url(participant_id);
        let mut request = self.http_client.get(url.clone());
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .map_err(|e| Error::RegistryUnavailable(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::RegistryStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: ClaimsResponse = response
            .json()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;
        Ok(body.claims)
    }

    fn corroborate_by_key(&self, claim_key: &str, asserted: &str, participant_id: &str) -> bool {
        let Some(cache) = &self.cache else {
            return matches_registered(self.fetch_claims(participant_id), claim_key, asserted, participant_id);
        };

        let key = (participant_id.to_string(), claim_key.to_string());
        if cache.get(&key).as_deref() == Some(asserted) {
            debug!(participant_id = %participant_id, claim_key = %claim_key, "corroboration cache hit");
            return true;
        }

        let corroborated =
            matches_registered(self.fetch_claims(participant_id), claim_key, asserted, participant_id);
        if corroborated {
            cache.insert(key, asserted.to_string());
        }
        corroborated
    }
}
