//! Identity Gate
//!
//! Authenticates requests carrying provider-issued access tokens and maps
//! them onto local identity records:
//!
//! - RS256 signature verification against the user pool's published key set,
//!   cached with a bounded lifetime
//! - issuer, audience, expiry and token-use checks
//! - first-login provisioning through an atomic upsert, with email sync on
//!   later logins
//! - ownership checks for resources scoped to an identity or organization

pub mod config;
pub mod error;
pub mod gate;
pub mod health;
pub mod identity;
pub mod oidc;

pub use config::{Environment, GateConfig, GateConfigJson};
pub use error::{AuthError, StoreError};
pub use gate::{bearer_token, AuthGate};
pub use health::BuildInfo;
pub use identity::{
    check_ownership, Identity, IdentityResolver, IdentityStore, Organization, Owned,
    RedbIdentityStore, Role,
};
pub use oidc::{ClaimsVerifier, KeySetCache, ProviderConfig, TokenVerifier, TrustedClaims};
