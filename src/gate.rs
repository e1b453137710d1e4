//! Authentication entry point for request handlers.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::GateConfig;
use crate::error::AuthError;
use crate::identity::{Identity, IdentityResolver, IdentityStore, Organization};
use crate::oidc::{KeySetCache, TokenVerifier};

/// Wires the key set cache, token verifier and identity resolver together.
pub struct AuthGate {
    resolver: IdentityResolver,
    keys: Arc<KeySetCache>,
}

impl AuthGate {
    /// Build a gate for the configured user pool.
    pub fn new(config: &GateConfig, store: Arc<dyn IdentityStore>) -> Result<Self, AuthError> {
        let keys = Arc::new(KeySetCache::from_config(&config.provider)?);
        Self::with_key_cache(config, keys, store)
    }

    /// Build a gate around an existing key set cache.
    pub fn with_key_cache(
        config: &GateConfig,
        keys: Arc<KeySetCache>,
        store: Arc<dyn IdentityStore>,
    ) -> Result<Self, AuthError> {
        validate(config)?;

        let verifier = Arc::new(TokenVerifier::new(Arc::clone(&keys), &config.provider));
        let resolver =
            IdentityResolver::new(verifier, store).with_test_mode(config.e2e_test_mode);

        if config.e2e_test_mode {
            warn!(environment = %config.environment, "E2E test mode enabled, synthetic tokens accepted");
        }
        if !config.provider.auth_enabled() {
            warn!("No user pool configured, token verification will fail");
        }
        info!(
            environment = %config.environment,
            issuer = ?config.provider.issuer(),
            "Authentication gate initialized"
        );

        Ok(Self { resolver, keys })
    }

    /// Authenticate a request from its raw bearer token.
    pub async fn authenticate(&self, raw_token: Option<&str>) -> Result<Identity, AuthError> {
        match self.resolver.resolve(raw_token).await {
            Ok(identity) => {
                debug!(sub = %identity.subject, id = %identity.id, "Request authenticated");
                Ok(identity)
            }
            Err(err) => {
                match &err {
                    AuthError::Unauthenticated => debug!("No credential presented"),
                    e if e.is_infrastructure() => error!(error = %e, "Authentication failed"),
                    // The verifier or resolver already warned with the cause.
                    e => debug!(error = %e, "Authentication rejected"),
                }
                Err(err)
            }
        }
    }

    /// The organization an authenticated identity belongs to, if any.
    pub async fn organization_of(
        &self,
        identity: &Identity,
    ) -> Result<Option<Organization>, AuthError> {
        self.resolver.organization_of(identity).await
    }

    /// The gate's key set cache.
    pub fn key_cache(&self) -> &Arc<KeySetCache> {
        &self.keys
    }
}

fn validate(config: &GateConfig) -> Result<(), AuthError> {
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid gate configuration");
        AuthError::Configuration(e)
    })
}

/// Extract the raw token from an `Authorization` header value.
///
/// The `Bearer` scheme is matched case-insensitively. A missing header, a
/// different scheme, or an empty token all yield `None`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
