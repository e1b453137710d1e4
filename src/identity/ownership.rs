//! Resource ownership checks.

use uuid::Uuid;

use super::types::Identity;

/// A resource that may be owned by an identity, an organization, or both.
///
/// Both accessors default to `None`; a resource implements the ones it has.
pub trait Owned {
    /// Identity that directly owns the resource.
    fn owner_id(&self) -> Option<Uuid> {
        None
    }

    /// Organization the resource is scoped to.
    fn organization_id(&self) -> Option<Uuid> {
        None
    }
}

/// Whether `identity` may access `resource`.
///
/// Access is granted to the direct owner, or to any identity in the
/// resource's organization. An identity without an organization never
/// matches an organization-scoped resource.
pub fn check_ownership(resource: &impl Owned, identity: &Identity) -> bool {
    if resource.owner_id() == Some(identity.id) {
        return true;
    }

    match (resource.organization_id(), identity.organization_id) {
        (Some(resource_org), Some(identity_org)) => resource_org == identity_org,
        _ => false,
    }
}

impl Owned for Identity {
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.id)
    }

    fn organization_id(&self) -> Option<Uuid> {
        self.organization_id
    }
}
