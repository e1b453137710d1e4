//! Authentication error types.
//!
//! Every failure the gate can produce is classified either as
//! client-attributable (the presented credential is absent or bad) or as an
//! infrastructure fault (the gate could not do its job). Callers map the two
//! classes to different responses; neither class carries internal detail to
//! the caller.

use thiserror::Error;

/// Authentication failures returned by the gate.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A credential was presented but failed verification.
    ///
    /// The underlying cause is logged where it is detected and is
    /// deliberately not carried here.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// The verifier was invoked without the identity provider configured,
    /// or the gate was built from an invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The identity provider's key set could not be fetched.
    #[error("Key source unavailable: {0}")]
    KeySourceUnavailable(String),

    /// A verified token carries no subject identifier.
    #[error("Token is missing the subject claim")]
    MissingSubject,

    /// The identity store failed.
    #[error("Identity store error: {0}")]
    Store(
        /// The underlying store failure.
        #[source]
        StoreError,
    ),
}

impl AuthError {
    /// Whether this failure is a server-side fault rather than a bad credential.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::Configuration(_) | AuthError::KeySourceUnavailable(_) | AuthError::Store(_)
        )
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        if self.is_infrastructure() {
            500
        } else {
            401
        }
    }

    /// Fixed rejection text, safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "Not authenticated",
            AuthError::InvalidToken => "Invalid or expired token",
            AuthError::MissingSubject => "Invalid token: missing user ID",
            AuthError::Configuration(_) => "Authentication not configured",
            AuthError::KeySourceUnavailable(_) | AuthError::Store(_) => {
                "Authentication temporarily unavailable"
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err)
    }
}

/// Identity store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The embedded database failed.
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    /// The store's directory could not be prepared.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The record to update does not exist.
    #[error("Identity not found: {0}")]
    NotFound(String),

    /// The blocking storage task did not complete.
    #[error("Storage task failed: {0}")]
    Task(String),
}

// redb reports each stage with its own error type; fold them into `redb::Error`.
macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(err: $ty) -> Self {
                    StoreError::Database(redb::Error::from(err))
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, AuthError>;
