//! Local identity records keyed by the provider's subject identifier.
//!
//! A verified access token is mapped onto an [`Identity`] by the
//! [`IdentityResolver`], which provisions the record the first time a subject
//! is seen through the store's atomic [`IdentityStore::upsert`].

pub mod ownership;
pub mod resolver;
pub mod store;
pub mod types;

pub use ownership::{check_ownership, Owned};
pub use resolver::{IdentityResolver, E2E_TOKEN_PREFIX};
pub use store::{IdentityStore, RedbIdentityStore, Upserted};
pub use types::{display_name_for, Identity, NewIdentity, Organization, Role};
