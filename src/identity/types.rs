//! Identity and organization records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an identity within its organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
    Owner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Member => write!(f, "member"),
            Role::Admin => write!(f, "admin"),
            Role::Owner => write!(f, "owner"),
        }
    }
}

/// A persisted identity, keyed by the provider's subject identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Local identifier.
    pub id: Uuid,
    /// Provider-issued subject identifier. Unique and immutable.
    pub subject: String,
    /// Email as last reported by the provider.
    pub email: String,
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Organization this identity belongs to, if any.
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values used to provision an identity seen for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIdentity {
    pub subject: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}

impl NewIdentity {
    /// Defaults derived from a verified token: display name from the email's
    /// local part, member role, no organization.
    pub fn from_token(subject: &str, email: &str) -> Self {
        Self {
            subject: subject.to_string(),
            email: email.to_string(),
            display_name: Some(display_name_for(email)),
            role: Role::Member,
        }
    }

    /// Build the full record, assigning a fresh id and timestamps.
    pub fn into_identity(self) -> Identity {
        let now = Utc::now();
        Identity {
            id: Uuid::new_v4(),
            subject: self.subject,
            email: self.email,
            display_name: self.display_name,
            role: self.role,
            organization_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Local part of the email, or "User" when there is none.
pub fn display_name_for(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "User".to_string(),
    }
}

/// A tenant grouping identities may belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
