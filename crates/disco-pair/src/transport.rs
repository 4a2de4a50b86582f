//! Transport abstraction for the join request.
//!
//! The HTTP implementation lives with the rest of the network code; the
//! in-memory one here routes requests straight to a [`JoinService`].

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::{JoinRequest, JoinResponse};

/// Delivers a join request to the node listening at `address`.
#[async_trait]
pub trait JoinTransport: Send + Sync {
    /// Send `request` and wait for the issuer's answer.
    async fn join(&self, address: &str, request: JoinRequest) -> Result<JoinResponse>;
}

/// A simple in-memory transport for testing.
///
/// Addresses are plain names registered with [`MemoryJoinTransport::register`].
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use crate::error::PairError;
    use crate::join::JoinService;

    /// In-memory transport implementation.
    #[derive(Default)]
    pub struct MemoryJoinTransport {
        services: RwLock<HashMap<String, Arc<JoinService>>>,
    }

    impl MemoryJoinTransport {
        /// Create a transport with no nodes.
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `service` reachable at `address`.
        pub async fn register(&self, address: impl Into<String>, service: Arc<JoinService>) {
            self.services.write().await.insert(address.into(), service);
        }
    }

    #[async_trait]
    impl JoinTransport for MemoryJoinTransport {
        async fn join(&self, address: &str, request: JoinRequest) -> Result<JoinResponse> {
            let service = self
                .services
                .read()
                .await
                .get(address)
                .cloned()
                .ok_or_else(|| PairError::Transport(format!("no node at '{}'", address)))?;
            service.handle_join(&request).await
        }
    }
}
