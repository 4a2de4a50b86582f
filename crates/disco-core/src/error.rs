//! Error types for Disco Core.

use thiserror::Error;

/// Errors produced by the cryptographic primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Key material has the wrong length or is otherwise unusable.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// An invitation token could not be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Authentication failed while opening a ciphertext.
    ///
    /// Deliberately carries no detail: a wrong key and corrupted data look the same.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Certificate generation or parsing failed.
    #[error("certificate error: {0}")]
    CertificateError(String),

    /// Text was not valid base58.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The operation was cancelled at a chunk boundary.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
