//! # Disco Identity
//!
//! The identity and permission model: who may do what to which namespace.
//!
//! ## Key Types
//!
//! - [`Permission`] - Actions on a [`Target`] across a set of namespaces
//! - [`Role`] - A named set of permissions
//! - [`User`] - An identity holding roles
//! - [`Invite`] - A single-use, expiring grant of a user to a new node
//! - [`Remote`] - A node this node has joined
//!
//! ## Checking access
//!
//! ```rust
//! use disco_identity::{Role, User};
//!
//! let reader = Role::new("reader", vec!["r:dev:store:myapp/*".parse().unwrap()]);
//! let bob = User::remote("bob", vec![reader]);
//!
//! assert!(bob.can("read", "dev:store:myapp/config"));
//! assert!(!bob.can("write", "dev:store:myapp/config"));
//! ```
//!
//! ## Design Notes
//!
//! Action and namespace matching are set membership. Only the object segment
//! of a target is matched with a glob, see [`glob`].

pub mod error;
pub mod glob;
pub mod invite;
pub mod permission;
pub mod remote;
pub mod role;
pub mod user;

pub use error::{IdentityError, Result};
pub use invite::{generate_invite_uuid, is_valid_uuid_prefix, now_millis, Invite, INVITE_UUID_LEN};
pub use permission::{split_target, Action, Permission, Resource, Target, WILDCARD};
pub use remote::Remote;
pub use role::Role;
pub use user::{User, UserKind};
