//! Remotes: nodes this node has joined as a client.

use serde::{Deserialize, Serialize};

/// Everything needed to reach a remote node over mutual TLS.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    /// Catalog-assigned identifier; 0 until persisted.
    pub id: i64,
    /// Creation time (Unix ms).
    pub created_at: i64,
    /// Unique local alias.
    pub name: String,
    /// `host:port` of the remote node.
    pub address: String,
    /// PEM CA certificate the remote's server certificate chains to.
    pub tls_ca_cert: String,
    /// Name the remote's server certificate is verified against.
    pub tls_server_san: String,
    /// Client certificate PEM, sealed with the local root key.
    pub tls_client_cert_enc: Vec<u8>,
    /// Client private key PEM, sealed with the local root key.
    pub tls_client_key_enc: Vec<u8>,
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("address", &self.address)
            .field("tls_server_san", &self.tls_server_san)
            .finish_non_exhaustive()
    }
}
