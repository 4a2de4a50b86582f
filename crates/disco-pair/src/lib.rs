//! # Disco Pair
//!
//! Invitation and join handshake that gives a new node a scoped network
//! identity on an existing one.
//!
//! ## Overview
//!
//! Two nodes share no secret up front. The administrator of the issuing node
//! creates an invitation for a user and hands the resulting composite token
//! to the joining operator out of band. Redeeming the token runs an X25519
//! exchange against the invitation's ephemeral key, and the issuer answers
//! with a TLS client certificate for that user, sealed with the shared
//! secret.
//!
//! ## Key Types
//!
//! - [`CompositeToken`]: the text handed to the joining operator
//! - [`CertificateAuthority`]: the node CA that signs client certificates
//! - [`JoinService`]: server side, redeems invitations
//! - [`JoinTransport`]: how a join request reaches the issuer
//! - [`redeem_invite`]: joining side, stores the new [`Remote`](disco_identity::Remote)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use disco_core::SymmetricKey;
//! use disco_pair::{issue_invite, redeem_invite, JoinTransport};
//! use disco_store::Catalog;
//!
//! async fn example(
//!     issuer: &dyn Catalog,
//!     joiner: &dyn Catalog,
//!     transport: &dyn JoinTransport,
//!     issuer_key: &SymmetricKey,
//!     joiner_key: &SymmetricKey,
//! ) -> disco_pair::Result<()> {
//!     let issued = issue_invite(issuer, issuer_key, "bob", Duration::from_secs(3600)).await?;
//!     let token = issued.token.to_string();
//!
//!     let remote = redeem_invite(transport, joiner, joiner_key, "home", "10.0.0.2:2020", &token).await?;
//!     println!("joined {}", remote.name);
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Issuer                                  Joiner
//!   | issue_invite                          |
//!   |====== composite token (manual) =====>|
//!   |                                       | decode, DH(own eph, issuer eph)
//!   |<------ POST /join (token, own eph) ---|
//!   | claim, DH(issuer eph, own eph)        |
//!   | sign client cert for invited user     |
//!   |------- sealed cert + key, CA, SAN -->|
//!   |                                       | unseal, reseal with root key
//! ```

pub mod authority;
pub mod error;
pub mod issue;
pub mod join;
pub mod messages;
pub mod redeem;
pub mod token;
pub mod transport;

pub use authority::{CertificateAuthority, CA_COMMON_NAME, CLIENT_SAN, SERVER_COMMON_NAME};
pub use error::{PairError, Result};
pub use issue::{extend_invite, issue_invite, IssuedInvite};
pub use join::{JoinConfig, JoinService};
pub use messages::{JoinRequest, JoinResponse};
pub use redeem::{redeem_invite, RemoteCredentials};
pub use token::{CompositeToken, COMPOSITE_LEN, TOKEN_LEN};
pub use transport::{memory::MemoryJoinTransport, JoinTransport};
