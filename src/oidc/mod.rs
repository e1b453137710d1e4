//! Access token verification against the identity provider's published keys.
//!
//! Provides RS256 token validation using a time-cached JSON Web Key Set
//! (JWKS) fetched from the user pool's well-known endpoint.

pub mod config;
pub mod jwks;
pub mod validator;

pub use config::{ProviderConfig, ProviderConfigJson};
pub use jwks::{Jwk, JwkSet, KeySetCache};
pub use validator::{Audience, ClaimsVerifier, TokenVerifier, TrustedClaims};
