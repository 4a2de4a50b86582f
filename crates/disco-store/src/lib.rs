//! # Disco Store
//!
//! Persistence for Disco: the encrypted, namespaced key-value [`Store`] and the
//! identity [`Catalog`].
//!
//! ## Overview
//!
//! Values are sealed with a store key before they are written and opened on
//! read. Each namespace maps to one table, created on first write. The
//! catalog holds users, roles, invitations, remotes and node metadata.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for key-value operations
//! - [`SqliteStore`] / [`MemoryStore`] - Store backends
//! - [`Catalog`] - The async trait for identity records
//! - [`SqliteCatalog`] / [`MemoryCatalog`] - Catalog backends
//!
//! ## Usage
//!
//! ```rust,no_run
//! use disco_core::SymmetricKey;
//! use disco_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("store.db", SymmetricKey::generate()).unwrap();
//!
//!     store.set("default", "greeting", b"hello").await.unwrap();
//!     let value = store.get("default", "greeting").await.unwrap();
//!     assert_eq!(value.as_deref(), Some(&b"hello"[..]));
//!
//!     let keys = store.list("*", "").await.unwrap();
//!     assert_eq!(keys["default"], vec!["greeting".to_string()]);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Namespace validation**: namespaces become table names and are checked
//!   against a restrictive pattern before any SQL is built
//! - **Cancellation**: dropping an in-flight call stops sealing at the next chunk
//! - **Atomic claims**: [`Catalog::claim_invite`] looks up and deletes in one transaction

mod blocking;
pub mod catalog;
pub mod error;
pub mod memory;
pub mod migration;
pub mod namespace;
pub mod sqlite;
pub mod traits;

pub use catalog::{MemoryCatalog, SqliteCatalog};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use namespace::{is_valid_namespace, validate_namespace, ALL_NAMESPACES, DEFAULT_NAMESPACE};
pub use sqlite::SqliteStore;
pub use traits::{Catalog, Keys, NodeMeta, Store};
