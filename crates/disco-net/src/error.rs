//! Error types for the network layer.

use thiserror::Error;

use disco_pair::PairError;
use disco_store::StoreError;

/// Errors that can occur serving or calling the HTTP API.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS configuration or certificate material is unusable.
    #[error("TLS error: {0}")]
    Tls(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Pair(#[from] PairError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The remote node answered with an error status.
    #[error("remote returned {status}: {message}")]
    Remote { status: u16, message: String },
}

impl From<rustls::Error> for NetError {
    fn from(e: rustls::Error) -> Self {
        NetError::Tls(e.to_string())
    }
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
