//! JWKS (JSON Web Key Set) fetching and caching.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::config::ProviderConfig;
use crate::error::AuthError;

/// Smallest RSA modulus accepted, in bytes (2048 bits).
const MIN_RSA_MODULUS_BYTES: usize = 256;

/// Key set document published by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Find a key by its kid.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// Individual JSON Web Key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC)
    pub kty: String,
    /// Key ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent (base64url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    /// Convert to an RS256 verification key.
    ///
    /// Only RSA signing keys are usable; anything else is refused so a key
    /// set entry can never widen the accepted algorithm family.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, String> {
        if self.kty != "RSA" {
            return Err(format!("Unsupported key type: {}", self.kty));
        }
        if let Some(ref alg) = self.alg {
            if alg != "RS256" {
                return Err(format!("Unsupported key algorithm: {}", alg));
            }
        }
        if let Some(ref key_use) = self.key_use {
            if key_use != "sig" {
                return Err(format!("Key is not a signing key (use={})", key_use));
            }
        }

        let n = self.n.as_deref().ok_or("RSA key missing 'n'")?;
        let e = self.e.as_deref().ok_or("RSA key missing 'e'")?;

        let modulus = URL_SAFE_NO_PAD
            .decode(n)
            .map_err(|err| format!("Invalid modulus encoding: {}", err))?;
        let significant = modulus.iter().skip_while(|b| **b == 0).count();
        if significant < MIN_RSA_MODULUS_BYTES {
            return Err(format!("RSA modulus too short: {} bits", significant * 8));
        }
        URL_SAFE_NO_PAD
            .decode(e)
            .map_err(|err| format!("Invalid exponent encoding: {}", err))?;

        DecodingKey::from_rsa_components(n, e)
            .map_err(|err| format!("Failed to create RSA DecodingKey: {}", err))
    }
}

/// A key set together with the time it was fetched.
struct CachedKeySet {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Time-bounded cache of the provider's key set.
///
/// A fresh entry is served without I/O. Once the TTL has elapsed the next
/// caller fetches synchronously; a failed fetch leaves the old entry in place
/// but the old entry is never served past its TTL. Concurrent refreshes may
/// both fetch, and the last writer wins; readers always observe a complete
/// `(keys, fetched_at)` pair.
pub struct KeySetCache {
    entry: RwLock<Option<CachedKeySet>>,
    ttl: Duration,
    /// Key set endpoint; `None` when the provider is not configured.
    jwks_url: Option<String>,
    http_client: reqwest::Client,
    fetches: AtomicU64,
}

impl KeySetCache {
    /// Create an empty cache. Nothing is fetched until the first `get_keys`.
    pub fn new(
        jwks_url: Option<String>,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            entry: RwLock::new(None),
            ttl,
            jwks_url,
            http_client,
            fetches: AtomicU64::new(0),
        })
    }

    /// Create a cache for the configured user pool.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, AuthError> {
        Self::new(
            config.jwks_url(),
            Duration::from_secs(config.jwks_cache_ttl_secs),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Return the current key set, fetching it if absent or expired.
    pub async fn get_keys(&self) -> Result<Arc<JwkSet>, AuthError> {
        if let Some(keys) = self.fresh_entry()? {
            return Ok(keys);
        }

        let url = self.jwks_url.as_deref().ok_or_else(|| {
            error!("Key set requested but no user pool is configured");
            AuthError::Configuration("Authentication not configured".to_string())
        })?;

        let keys = Arc::new(self.fetch(url).await.map_err(|e| {
            error!(url = %url, error = %e, "Failed to fetch JWKS");
            AuthError::KeySourceUnavailable(e)
        })?);

        {
            let mut entry = self
                .entry
                .write()
                .map_err(|_| AuthError::KeySourceUnavailable("JWKS cache lock poisoned".into()))?;
            *entry = Some(CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            });
        }

        info!(url = %url, key_count = keys.keys.len(), "JWKS cache refreshed");

        Ok(keys)
    }

    /// Drop the cached entry so the next call refetches.
    pub fn invalidate(&self) {
        if let Ok(mut entry) = self.entry.write() {
            *entry = None;
        }
    }

    /// Number of fetches that returned a usable key set.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn fresh_entry(&self) -> Result<Option<Arc<JwkSet>>, AuthError> {
        let entry = self
            .entry
            .read()
            .map_err(|_| AuthError::KeySourceUnavailable("JWKS cache lock poisoned".into()))?;

        Ok(entry
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| Arc::clone(&cached.keys)))
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, String> {
        debug!(url = %url, "Fetching JWKS");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("endpoint returned status {}", response.status()));
        }

        let key_set = response
            .json::<JwkSet>()
            .await
            .map_err(|e| format!("malformed key set: {}", e))?;

        self.fetches.fetch_add(1, Ordering::Relaxed);

        Ok(key_set)
    }
}
