//! Error types for node lifecycle operations.

use std::path::PathBuf;

use disco_core::CoreError;
use disco_net::NetError;
use disco_pair::PairError;
use disco_store::StoreError;
use thiserror::Error;

/// Errors that can occur while initializing, opening or driving a node.
#[derive(Debug, Error)]
pub enum DiscoError {
    /// The catalog has no local user.
    #[error("local user not found")]
    NotInitialized,

    /// `init` on a node that already has a local user.
    #[error("node already initialized")]
    AlreadyInitialized,

    /// The operation doesn't apply to the node's own user.
    #[error("the local user can't be {0}")]
    LocalUser(&'static str),

    /// No root key was supplied.
    #[error("encryption key not provided")]
    MissingKey,

    /// The supplied root key is not a valid base58 32-byte key.
    #[error("invalid encryption key: {0}")]
    InvalidKey(#[source] CoreError),

    /// The supplied root key is not the one this node was initialized with.
    #[error("encryption key doesn't match the local user")]
    KeyMismatch,

    /// The configuration file could not be parsed.
    #[error("failed reading config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("failed writing config file: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pair(#[from] PairError),

    #[error(transparent)]
    Net(#[from] NetError),
}

impl DiscoError {
    /// A suggestion for the operator, if there is an obvious fix.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DiscoError::NotInitialized => Some("Did you forget to run 'disco init'?"),
            DiscoError::MissingKey => Some("set DISCO_ENCRYPTION_KEY to the key printed by 'disco init'"),
            DiscoError::KeyMismatch => Some("use the key printed when this node was initialized"),
            DiscoError::AlreadyInitialized => Some("pass a different --data-dir to create another node"),
            DiscoError::Store(StoreError::ReferentialConflict { .. }) => {
                Some("remove all assignments first or pass --force to delete anyway")
            }
            _ => None,
        }
    }
}

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, DiscoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints() {
        assert_eq!(
            DiscoError::NotInitialized.hint(),
            Some("Did you forget to run 'disco init'?")
        );
        assert!(DiscoError::Store(StoreError::EmptyKey).hint().is_none());

        let conflict = DiscoError::Store(StoreError::ReferentialConflict {
            message: "1 user has this role".to_string(),
            count: 1,
        });
        assert_eq!(conflict.to_string(), "1 user has this role");
        assert!(conflict.hint().unwrap().contains("--force"));
    }

    #[test]
    fn test_transparent_messages() {
        let err = DiscoError::from(StoreError::NotFound("user with name 'x' doesn't exist".into()));
        assert_eq!(err.to_string(), "user with name 'x' doesn't exist");
    }
}
