//! Access token validation.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::ProviderConfig;
use super::jwks::KeySetCache;
use crate::error::AuthError;

/// Algorithms never accepted, whatever the key set contains.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Algorithms accepted in the token header.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256"];

/// Required `token_use` claim value.
pub const ACCESS_TOKEN_USE: &str = "access";

/// Signature-verified claim set of an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedClaims {
    /// Subject (user identifier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Issuer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Audience (can be string or array)
    #[serde(default, skip_serializing_if = "Audience::is_none")]
    pub aud: Audience,
    /// Expiration time
    pub exp: u64,
    /// Not before
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Token kind tag (access, id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,
    /// App client the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Additional claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TrustedClaims {
    /// Subject identifier, if present and non-empty.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.is_empty())
    }

    /// Email claim, falling back to username, falling back to empty.
    pub fn best_effort_email(&self) -> &str {
        self.email
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("")
    }
}

/// Audience can be a single string or array of strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::None => false,
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Audience::None)
    }
}

/// Turns a raw bearer token into a trusted claim set.
#[async_trait]
pub trait ClaimsVerifier: Send + Sync {
    async fn verify(&self, raw_token: &str) -> Result<TrustedClaims, AuthError>;
}

/// RS256 access token verifier backed by the provider's key set.
pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    issuer: Option<String>,
    audience: Option<String>,
    leeway_secs: u64,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeySetCache>, config: &ProviderConfig) -> Self {
        Self {
            keys,
            issuer: config.issuer(),
            audience: config.client_id.clone().filter(|c| !c.is_empty()),
            leeway_secs: config.clock_skew_secs,
        }
    }

    /// Verify a raw token and return its claims.
    ///
    /// Every verification failure collapses into [`AuthError::InvalidToken`]
    /// after the cause is logged. Key set failures keep their own
    /// infrastructure variants.
    pub async fn verify(&self, raw_token: &str) -> Result<TrustedClaims, AuthError> {
        let (issuer, audience) = match (self.issuer.as_deref(), self.audience.as_deref()) {
            (Some(issuer), Some(audience)) => (issuer, audience),
            _ => {
                return Err(AuthError::Configuration(
                    "Authentication not configured".to_string(),
                ))
            }
        };

        let kid = match inspect_header(raw_token) {
            Ok(kid) => kid,
            Err(reason) => return Err(reject(&reason)),
        };

        let key_set = self.keys.get_keys().await?;

        let jwk = match key_set.find(&kid) {
            Some(jwk) => jwk,
            None => return Err(reject(&format!("Key '{}' not found in JWKS", kid))),
        };

        let decoding_key = match jwk.to_decoding_key() {
            Ok(key) => key,
            Err(reason) => return Err(reject(&format!("Unusable key '{}': {}", kid, reason))),
        };

        // The algorithm is fixed here and never taken from the token header.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = self.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims = match decode::<TrustedClaims>(raw_token, &decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => return Err(reject(&format!("Token validation failed: {}", e))),
        };

        if !audience_matches(&claims, audience) {
            return Err(reject("Audience mismatch"));
        }

        if claims.token_use.as_deref() != Some(ACCESS_TOKEN_USE) {
            return Err(reject(&format!(
                "Invalid token type: {:?}",
                claims.token_use.as_deref().unwrap_or("<missing>")
            )));
        }

        debug!(kid = %kid, sub = ?claims.sub, "Access token validated");

        Ok(claims)
    }
}

#[async_trait]
impl ClaimsVerifier for TokenVerifier {
    async fn verify(&self, raw_token: &str) -> Result<TrustedClaims, AuthError> {
        TokenVerifier::verify(self, raw_token).await
    }
}

/// Check the header algorithm against the allow-list and extract the kid.
fn inspect_header(raw_token: &str) -> Result<String, String> {
    // decode_header cannot represent "none", so check the raw segment first.
    let alg = raw_header_algorithm(raw_token)?;
    validate_algorithm(&alg)?;

    let header =
        decode_header(raw_token).map_err(|e| format!("Failed to decode token header: {}", e))?;

    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| "Token header has no kid".to_string())
}

fn raw_header_algorithm(raw_token: &str) -> Result<String, String> {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let segment = raw_token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "Malformed token".to_string())?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| format!("Malformed token header encoding: {}", e))?;
    let header: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("Malformed token header: {}", e))?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| "Token header has no alg".to_string())
}

/// Validate a header algorithm against the allow-list.
pub fn validate_algorithm(alg: &str) -> Result<(), String> {
    if FORBIDDEN_ALGORITHMS.iter().any(|f| f.eq_ignore_ascii_case(alg)) {
        return Err(format!("Algorithm '{}' is not allowed", alg));
    }
    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(format!("Algorithm '{}' is not in accepted list", alg));
    }
    Ok(())
}

/// Provider access tokens carry `client_id` instead of `aud`.
fn audience_matches(claims: &TrustedClaims, expected: &str) -> bool {
    if claims.aud.is_none() {
        claims.client_id.as_deref() == Some(expected)
    } else {
        claims.aud.contains(expected)
    }
}

fn reject(reason: &str) -> AuthError {
    warn!(reason = %reason, "Access token rejected");
    AuthError::InvalidToken
}
