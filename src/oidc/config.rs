//! Identity provider configuration.

use serde::{Deserialize, Serialize};

/// Identity provider (user pool) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// User pool identifier. Example: "us-east-1_AbCdEf123"
    #[serde(default)]
    pub user_pool_id: Option<String>,

    /// App client id. Tokens must be issued for this client.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Provider region. Example: "eu-west-1"
    #[serde(default = "default_region")]
    pub region: String,

    /// How long a fetched key set is trusted, in seconds.
    #[serde(default = "default_jwks_cache_ttl")]
    pub jwks_cache_ttl_secs: u64,

    /// Timeout for the key set fetch, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Clock skew tolerance in seconds for exp/nbf validation.
    #[serde(default)]
    pub clock_skew_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_jwks_cache_ttl() -> u64 {
    3600 // 1 hour
}

fn default_http_timeout() -> u64 {
    5
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            user_pool_id: None,
            client_id: None,
            region: default_region(),
            jwks_cache_ttl_secs: default_jwks_cache_ttl(),
            http_timeout_secs: default_http_timeout(),
            clock_skew_secs: 0,
        }
    }
}

impl ProviderConfig {
    /// Whether real token verification is possible.
    pub fn auth_enabled(&self) -> bool {
        self.user_pool_id.as_deref().is_some_and(|p| !p.is_empty())
            && self.client_id.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Expected `iss` claim, if a user pool is configured.
    pub fn issuer(&self) -> Option<String> {
        let pool_id = self.user_pool_id.as_deref().filter(|p| !p.is_empty())?;
        Some(format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, pool_id
        ))
    }

    /// Well-known key set endpoint, if a user pool is configured.
    pub fn jwks_url(&self) -> Option<String> {
        self.issuer()
            .map(|issuer| format!("{}/.well-known/jwks.json", issuer))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.region.is_empty() || !is_url_segment(&self.region) {
            return Err(format!("Invalid provider region: '{}'", self.region));
        }

        if let Some(ref pool_id) = self.user_pool_id {
            if !is_url_segment(pool_id) {
                return Err(format!("Invalid user pool id: '{}'", pool_id));
            }
        }

        if self.jwks_cache_ttl_secs == 0 {
            return Err("jwks_cache_ttl_secs must be greater than zero".to_string());
        }

        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be greater than zero".to_string());
        }

        Ok(())
    }
}

fn is_url_segment(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// JSON overlay for provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfigJson {
    pub user_pool_id: Option<String>,
    pub client_id: Option<String>,
    pub region: Option<String>,
    pub jwks_cache_ttl_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub clock_skew_secs: Option<u64>,
}

impl ProviderConfigJson {
    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut ProviderConfig) {
        if let Some(ref pool_id) = self.user_pool_id {
            config.user_pool_id = Some(pool_id.clone());
        }
        if let Some(ref client_id) = self.client_id {
            config.client_id = Some(client_id.clone());
        }
        if let Some(ref region) = self.region {
            config.region = region.clone();
        }
        if let Some(ttl) = self.jwks_cache_ttl_secs {
            config.jwks_cache_ttl_secs = ttl;
        }
        if let Some(timeout) = self.http_timeout_secs {
            config.http_timeout_secs = timeout;
        }
        if let Some(skew) = self.clock_skew_secs {
            config.clock_skew_secs = skew;
        }
    }
}
