//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store and catalog operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Sealing or opening a value failed.
    #[error(transparent)]
    Crypto(#[from] disco_core::CoreError),

    /// A persisted record could not be turned back into a model value.
    #[error(transparent)]
    Identity(#[from] disco_identity::IdentityError),

    /// Namespace fails validation or is reserved.
    #[error("invalid namespace '{0}'")]
    InvalidNamespace(String),

    /// Keys must be non-empty.
    #[error("key not provided")]
    EmptyKey,

    /// Invalid data in storage or in a lookup argument.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Record not found.
    #[error("{0}")]
    NotFound(String),

    /// A unique name is already taken.
    #[error("{0}")]
    AlreadyExists(String),

    /// A lookup matched more than one record.
    #[error("{0}")]
    Ambiguous(String),

    /// The record is still referenced.
    #[error("{message}")]
    ReferentialConflict { message: String, count: usize },

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The blocking task failed or a lock was poisoned.
    #[error("task error: {0}")]
    Task(String),

    /// The store has been closed.
    #[error("store is closed")]
    Closed,
}

impl StoreError {
    /// Whether this error means a looked-up record doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
