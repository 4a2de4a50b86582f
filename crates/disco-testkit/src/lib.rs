//! # Disco Testkit
//!
//! Testing utilities for Disco.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory node (root key, catalog, store) with helpers
//!   for seeding roles, users and invitations
//! - **Generators**: Proptest strategies for permissions, namespaces and
//!   store entries
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use disco_testkit::generators::permission;
//!
//! proptest! {
//!     #[test]
//!     fn text_form_is_canonical(perm in permission()) {
//!         let text = perm.to_string();
//!         prop_assert_eq!(text.parse::<disco_identity::Permission>().unwrap().to_string(), text);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use disco_testkit::TestNode;
//!
//! # async fn example() {
//! let fixture = TestNode::new();
//! fixture.role("reader", &["r:default:store:*"]).await;
//! let bob = fixture.user("bob", &["reader"]).await;
//! assert!(bob.can("read", "default:store:app/config"));
//! # }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{invite_for, multi_node_fixtures, perm, TestNode};
pub use generators::{namespace, permission, store_key};
