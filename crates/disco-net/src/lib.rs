//! # Disco Net
//!
//! The network face of a Disco node: one listener that speaks TLS and
//! plaintext HTTP on the same port, the HTTP API behind it, and the clients
//! that call it.
//!
//! ## Overview
//!
//! Plaintext is only useful for `/api/v1/join`, which a node without
//! credentials needs to reach. Store routes require TLS with a client
//! certificate signed by the node CA; its subject names the catalog user
//! whose roles decide every request.
//!
//! ## Key Types
//!
//! - [`Server`]: binds a [`HybridListener`] and serves the API
//! - [`ConnInfo`]: per-connection facts visible to handlers
//! - [`HttpJoinTransport`]: [`JoinTransport`](disco_pair::JoinTransport) over HTTP
//! - [`RemoteClient`]: store operations against a joined remote
//!
//! ## Usage
//!
//! ```rust,no_run
//! use disco_net::{ApiState, Server, ServerConfig};
//! use disco_pair::CertificateAuthority;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example(state: ApiState, authority: &CertificateAuthority) -> disco_net::Result<()> {
//!     let server = Server::bind(&ServerConfig::default(), authority, state).await?;
//!     let shutdown = CancellationToken::new();
//!     server.serve(shutdown).await
//! }
//! ```
//!
//! ## Routes
//!
//! ```text
//! POST   /api/v1/join                 plaintext or TLS
//! GET    /api/v1/ping                 plaintext or TLS
//! GET    /api/v1/store/value/*key     TLS + client certificate
//! POST   /api/v1/store/value/*key     TLS + client certificate
//! DELETE /api/v1/store/value/*key     TLS + client certificate
//! GET    /api/v1/store/keys[/*prefix] TLS + client certificate
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod error;
pub mod hybrid;
pub mod server;
pub mod tls;

pub use api::{router, ApiError, ApiState, API_PREFIX};
pub use client::{HttpJoinTransport, RemoteClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{NetError, Result};
pub use hybrid::{is_tls_handshake, ConnInfo, HybridListener, HybridStream};
pub use server::{Server, ServerConfig, DEFAULT_LISTEN_ADDR};
