//! Resolves a bearer token to a persisted identity, provisioning on first sight.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::IdentityStore;
use super::types::{Identity, NewIdentity, Organization, Role};
use crate::error::AuthError;
use crate::oidc::ClaimsVerifier;

/// Prefix of synthetic tokens accepted in test mode.
pub const E2E_TOKEN_PREFIX: &str = "e2e-test:";

const E2E_EMAIL_DOMAIN: &str = "e2e-test.local";
const E2E_DISPLAY_NAME: &str = "E2E Test User";

/// Verifies tokens and maps their subject onto a local identity record.
pub struct IdentityResolver {
    verifier: Arc<dyn ClaimsVerifier>,
    store: Arc<dyn IdentityStore>,
    test_mode: bool,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn ClaimsVerifier>, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            verifier,
            store,
            test_mode: false,
        }
    }

    /// Accept `e2e-test:<subject>` tokens without verification.
    ///
    /// Configuration validation refuses this outside development.
    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Resolve a raw bearer token to its identity record.
    ///
    /// The first successful resolve for a subject creates the record. Later
    /// resolves reuse it and sync the stored email when the token reports a
    /// different, non-empty one.
    pub async fn resolve(&self, raw_token: Option<&str>) -> Result<Identity, AuthError> {
        let raw_token = raw_token.ok_or(AuthError::Unauthenticated)?;

        if self.test_mode {
            if let Some(subject) = raw_token.strip_prefix(E2E_TOKEN_PREFIX) {
                return self.resolve_test_subject(subject).await;
            }
        }

        let claims = self.verifier.verify(raw_token).await?;

        let subject = match claims.subject() {
            Some(subject) => subject,
            None => {
                warn!("Verified token carries no subject");
                return Err(AuthError::MissingSubject);
            }
        };
        let email = claims.best_effort_email();

        let upserted = self
            .store
            .upsert(NewIdentity::from_token(subject, email))
            .await?;
        if upserted.created {
            info!(sub = %subject, id = %upserted.identity.id, "Provisioned identity");
        }

        let identity = upserted.identity;
        if !email.is_empty() && identity.email != email {
            debug!(sub = %subject, "Syncing email from identity provider");
            return Ok(self.store.update_email(subject, email).await?);
        }

        Ok(identity)
    }

    async fn resolve_test_subject(&self, subject: &str) -> Result<Identity, AuthError> {
        if subject.is_empty() {
            warn!("Test token carries no subject");
            return Err(AuthError::MissingSubject);
        }

        let new = NewIdentity {
            subject: subject.to_string(),
            email: format!("{}@{}", subject, E2E_EMAIL_DOMAIN),
            display_name: Some(E2E_DISPLAY_NAME.to_string()),
            role: Role::Member,
        };
        let upserted = self.store.upsert(new).await?;
        if upserted.created {
            info!(sub = %subject, "Provisioned test identity");
        }

        Ok(upserted.identity)
    }

    /// The organization the identity references, if any.
    pub async fn organization_of(
        &self,
        identity: &Identity,
    ) -> Result<Option<Organization>, AuthError> {
        match identity.organization_id {
            Some(id) => Ok(self.store.get_organization(id).await?),
            None => Ok(None),
        }
    }
}
