//! # Disco
//!
//! An encrypted key-value store that grants other nodes scoped, remote
//! access through single-use invitations.
//!
//! ## Overview
//!
//! A node keeps its values in an encrypted, namespaced store. An
//! administrator creates users and roles, then hands an invitation token to
//! the operator of another node. Redeeming the token over the network gives
//! that node a TLS client certificate naming the invited user, and every
//! later request it makes is checked against the user's roles.
//!
//! ## Key Types
//!
//! - [`NodeIdentity`] - The root key every secret of the node derives from
//! - [`Node`] - An initialized node: catalog, store, CA and services
//! - [`NodeConfig`] - Settings read from `disco.toml`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use disco::{Node, NodeConfig, NodeIdentity};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example() {
//!     let identity = NodeIdentity::generate();
//!     let node = Node::init_dir("/tmp/disco".as_ref(), identity, NodeConfig::default())
//!         .await
//!         .unwrap();
//!
//!     node.add_user("bob", &["user".to_string()]).await.unwrap();
//!     let issued = node.invite("bob", None).await.unwrap();
//!     println!("Token: {}", issued.token);
//!
//!     let server = node.bind(None).await.unwrap();
//!     server.serve(CancellationToken::new()).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `disco::core` - Keys, sealing, certificates
//! - `disco::identity` - Users, roles, permissions, invitations, remotes
//! - `disco::store` - Store and catalog backends
//! - `disco::pair` - The invite/join handshake
//! - `disco::net` - Server, API and clients

pub mod config;
pub mod error;
pub mod logging;
pub mod node;

// Re-export component crates
pub use disco_core as core;
pub use disco_identity as identity;
pub use disco_net as net;
pub use disco_pair as pair;
pub use disco_store as store;

// Re-export main types for convenience
pub use config::{default_data_dir, NodeConfig};
pub use error::{DiscoError, Result};
pub use node::{Node, NodeIdentity, VERSION};
