//! Error types for the identity model.

use thiserror::Error;

/// Errors that can occur while building identity records.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A permission string or value violates the permission grammar.
    #[error("invalid permission '{input}': {reason}")]
    InvalidPermission { input: String, reason: String },

    /// Unknown action name or code.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Unknown resource name.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Unknown persisted user type code.
    #[error("invalid user type: {0}")]
    InvalidUserType(i64),
}

impl IdentityError {
    pub(crate) fn permission(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPermission {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
