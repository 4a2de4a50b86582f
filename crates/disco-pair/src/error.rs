//! Error types for the pairing handshake.

use thiserror::Error;

use disco_core::CoreError;
use disco_identity::IdentityError;
use disco_store::StoreError;

/// Errors that can occur while issuing or redeeming an invitation.
#[derive(Debug, Error)]
pub enum PairError {
    /// The token is unknown, expired or already redeemed.
    ///
    /// Carries no detail on purpose; the server logs the reason.
    #[error("unauthorized")]
    Unauthorized,

    /// The join request is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The join request could not be delivered.
    #[error("transport error: {0}")]
    Transport(String),

    /// The peer answered with something that is not a valid join response.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Result type for pairing operations.
pub type Result<T> = std::result::Result<T, PairError>;
