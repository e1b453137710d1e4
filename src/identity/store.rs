//! Identity store backed by redb embedded database.
//!
//! Identities are keyed by provider subject identifier, organizations by id.
//! Records are stored as MessagePack. redb allows a single writer at a time,
//! so a check-then-insert inside one write transaction is atomic with respect
//! to every other writer.

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::types::{Identity, NewIdentity, Organization};
use crate::error::StoreError;

/// Identity table: subject -> MessagePack<Identity>.
const IDENTITIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("identities");
/// Organization table: UUID -> MessagePack<Organization>.
const ORGANIZATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("organizations");

/// Outcome of an [`IdentityStore::upsert`].
#[derive(Debug, Clone)]
pub struct Upserted {
    /// The stored record, whichever caller created it.
    pub identity: Identity,
    /// Whether this call inserted the record.
    pub created: bool,
}

/// Storage boundary for identity records.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert the identity unless one with the same subject exists, then
    /// return the stored record. One atomic operation: concurrent callers
    /// for the same subject observe exactly one creation.
    async fn upsert(&self, new: NewIdentity) -> Result<Upserted, StoreError>;

    /// Look up an identity by subject identifier.
    async fn get(&self, subject: &str) -> Result<Option<Identity>, StoreError>;

    /// Replace the stored email, leaving every other field but `updated_at` untouched.
    async fn update_email(&self, subject: &str, email: &str) -> Result<Identity, StoreError>;

    /// Set or clear the organization an identity belongs to.
    async fn assign_organization(
        &self,
        subject: &str,
        organization_id: Option<Uuid>,
    ) -> Result<Identity, StoreError>;

    /// Look up an organization by id.
    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, StoreError>;

    /// Insert or replace an organization.
    async fn put_organization(&self, organization: Organization) -> Result<(), StoreError>;

    /// Number of stored identities.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// redb-backed [`IdentityStore`].
pub struct RedbIdentityStore {
    db: Arc<Database>,
}

impl RedbIdentityStore {
    /// Open or create an identity store at the given path.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;

        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(IDENTITIES_TABLE)?;
            let _ = write_txn.open_table(ORGANIZATIONS_TABLE)?;
        }
        write_txn.commit()?;

        debug!(path = ?path, "Opened identity store");

        Ok(Self { db: Arc::new(db) })
    }

    /// Run blocking database work off the async executor.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

fn upsert_blocking(db: &Database, new: NewIdentity) -> Result<Upserted, StoreError> {
    let write_txn = db.begin_write()?;
    let outcome = {
        let mut table = write_txn.open_table(IDENTITIES_TABLE)?;
        let existing = table
            .get(new.subject.as_str())?
            .map(|value| value.value().to_vec());

        match existing {
            Some(bytes) => Upserted {
                identity: rmp_serde::from_slice(&bytes)?,
                created: false,
            },
            None => {
                let identity = new.into_identity();
                let data = rmp_serde::to_vec_named(&identity)?;
                table.insert(identity.subject.as_str(), data.as_slice())?;
                Upserted {
                    identity,
                    created: true,
                }
            }
        }
    };
    write_txn.commit()?;

    Ok(outcome)
}

/// Read-modify-write of one identity inside a single write transaction.
fn modify_blocking(
    db: &Database,
    subject: &str,
    apply: impl FnOnce(&mut Identity),
) -> Result<Identity, StoreError> {
    let write_txn = db.begin_write()?;
    let identity = {
        let mut table = write_txn.open_table(IDENTITIES_TABLE)?;
        let bytes = table
            .get(subject)?
            .map(|value| value.value().to_vec())
            .ok_or_else(|| StoreError::NotFound(subject.to_string()))?;

        let mut identity: Identity = rmp_serde::from_slice(&bytes)?;
        apply(&mut identity);
        identity.updated_at = Utc::now();

        let data = rmp_serde::to_vec_named(&identity)?;
        table.insert(subject, data.as_slice())?;
        identity
    };
    write_txn.commit()?;

    Ok(identity)
}

#[async_trait]
impl IdentityStore for RedbIdentityStore {
    async fn upsert(&self, new: NewIdentity) -> Result<Upserted, StoreError> {
        self.blocking(move |db| upsert_blocking(db, new)).await
    }

    async fn get(&self, subject: &str) -> Result<Option<Identity>, StoreError> {
        let subject = subject.to_string();
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(IDENTITIES_TABLE)?;
            let identity = match table.get(subject.as_str())? {
                Some(value) => Some(rmp_serde::from_slice::<Identity>(value.value())?),
                None => None,
            };
            Ok(identity)
        })
        .await
    }

    async fn update_email(&self, subject: &str, email: &str) -> Result<Identity, StoreError> {
        let subject = subject.to_string();
        let email = email.to_string();
        self.blocking(move |db| {
            modify_blocking(db, &subject, |identity| identity.email = email)
        })
        .await
    }

    async fn assign_organization(
        &self,
        subject: &str,
        organization_id: Option<Uuid>,
    ) -> Result<Identity, StoreError> {
        let subject = subject.to_string();
        self.blocking(move |db| {
            modify_blocking(db, &subject, |identity| {
                identity.organization_id = organization_id
            })
        })
        .await
    }

    async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>, StoreError> {
        self.blocking(move |db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(ORGANIZATIONS_TABLE)?;
            let key = id.to_string();
            let organization = match table.get(key.as_str())? {
                Some(value) => Some(rmp_serde::from_slice::<Organization>(value.value())?),
                None => None,
            };
            Ok(organization)
        })
        .await
    }

    async fn put_organization(&self, organization: Organization) -> Result<(), StoreError> {
        self.blocking(move |db| {
            let data = rmp_serde::to_vec_named(&organization)?;
            let key = organization.id.to_string();
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(ORGANIZATIONS_TABLE)?;
                table.insert(key.as_str(), data.as_slice())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.blocking(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(IDENTITIES_TABLE)?;
            Ok(table.len()? as usize)
        })
        .await
    }
}
