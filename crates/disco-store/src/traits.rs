//! Store and Catalog traits: the abstract interfaces for persistence.
//!
//! [`Store`] holds encrypted user data. [`Catalog`] holds the identity model
//! (users, roles, invitations, remotes) and node metadata. Both have SQLite
//! and in-memory implementations chosen at construction time.

use std::collections::BTreeMap;

use async_trait::async_trait;

use disco_identity::{Invite, Permission, Remote, Role, User};

use crate::error::Result;

/// Keys grouped by namespace, each list ascending.
pub type Keys = BTreeMap<String, Vec<String>>;

/// The encrypted, namespaced key-value contract.
///
/// Values are sealed with the store key before they are written and opened
/// on read. Namespaces are created on first write.
#[async_trait]
pub trait Store: Send + Sync {
    /// Get the value of `key`, or `None` if the key or namespace doesn't exist.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set `key` to `value`, creating the namespace if needed.
    async fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Delete `key`. Fails with `NotFound` if it doesn't exist.
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// List keys starting with `prefix`.
    ///
    /// `namespace` may be `*` to list across all namespaces. A namespace that
    /// doesn't exist yet yields an empty map.
    async fn list(&self, namespace: &str, prefix: &str) -> Result<Keys>;

    /// Release the underlying resources. Later calls fail with `Closed`.
    async fn close(&self) -> Result<()>;
}

/// Metadata written once when a node is initialized.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeMeta {
    /// Application version the node was initialized with.
    pub version: String,
    /// PEM CA certificate of this node.
    pub ca_cert_pem: String,
    /// CA private key PEM, sealed with the root key.
    pub ca_key_enc: Vec<u8>,
    /// Name peers verify this node's server certificate against.
    pub server_san: String,
}

impl std::fmt::Debug for NodeMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeMeta")
            .field("version", &self.version)
            .field("server_san", &self.server_san)
            .finish_non_exhaustive()
    }
}

/// The identity catalog.
///
/// Names are unique per record kind. Lookups of missing records fail with
/// `NotFound`; duplicates fail with `AlreadyExists`.
#[async_trait]
pub trait Catalog: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Node Metadata
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist node metadata. Fails with `AlreadyExists` if already set.
    async fn init_meta(&self, meta: &NodeMeta) -> Result<()>;

    /// Load node metadata, `None` before initialization.
    async fn meta(&self) -> Result<Option<NodeMeta>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_role(&self, role: &Role) -> Result<Role>;

    /// Replace the permissions of the role named `name`.
    async fn update_role(&self, name: &str, permissions: &[Permission]) -> Result<Role>;

    async fn role(&self, name: &str) -> Result<Role>;

    /// All roles, ordered by name.
    async fn roles(&self) -> Result<Vec<Role>>;

    /// Delete a role.
    ///
    /// Unless `force` is set, fails with `ReferentialConflict` while any user
    /// holds it. Forced deletion drops the assignments too.
    async fn delete_role(&self, name: &str, force: bool) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a user holding the roles named in `user.roles`, which must exist.
    async fn create_user(&self, user: &User) -> Result<User>;

    /// Replace the roles of the user named `name`.
    async fn update_user_roles(&self, name: &str, roles: &[String]) -> Result<User>;

    async fn user(&self, name: &str) -> Result<User>;

    /// The node's local user, `None` before initialization.
    async fn local_user(&self) -> Result<Option<User>>;

    /// All users, ordered by name.
    async fn users(&self) -> Result<Vec<User>>;

    /// Delete a user along with its role assignments and invitations.
    async fn delete_user(&self, name: &str) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Invitations
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist an invitation for `invite.user`, which must exist.
    async fn create_invite(&self, invite: &Invite) -> Result<Invite>;

    /// Invitations ordered by creation time, optionally including expired ones.
    async fn invites(&self, include_expired: bool) -> Result<Vec<Invite>>;

    /// Look up an invitation by UUID or unique UUID prefix.
    ///
    /// A prefix matching several invitations fails with `Ambiguous`.
    async fn invite(&self, uuid: &str) -> Result<Invite>;

    async fn update_invite_expiry(&self, uuid: &str, expires: i64) -> Result<Invite>;

    async fn delete_invite(&self, uuid: &str) -> Result<()>;

    /// Atomically look up an unexpired invitation by token and delete it.
    ///
    /// Returns `None` when no such invitation exists, so of any number of
    /// concurrent claims for one token at most one succeeds.
    async fn claim_invite(&self, token: &[u8; 32]) -> Result<Option<Invite>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Remotes
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_remote(&self, remote: &Remote) -> Result<Remote>;

    async fn remote(&self, name: &str) -> Result<Remote>;

    /// All remotes, ordered by name.
    async fn remotes(&self) -> Result<Vec<Remote>>;

    async fn delete_remote(&self, name: &str) -> Result<()>;
}

/// Message for a user/role/remote that doesn't exist.
pub(crate) fn missing(kind: &str, name: &str) -> crate::StoreError {
    crate::StoreError::NotFound(format!("{} with name '{}' doesn't exist", kind, name))
}

/// Message for a role still held by `count` users.
pub(crate) fn role_in_use(count: usize) -> crate::StoreError {
    let message = if count == 1 {
        "1 user has this role".to_string()
    } else {
        format!("{} users have this role", count)
    };
    crate::StoreError::ReferentialConflict { message, count }
}

/// Message for an invitation UUID filter that matched several records.
pub(crate) fn ambiguous_invite(prefix: &str, count: usize) -> crate::StoreError {
    crate::StoreError::Ambiguous(format!(
        "filter UUID '{}*' returns {} results; make the filter more specific",
        prefix, count
    ))
}

/// Message for an invitation UUID that matched nothing.
pub(crate) fn missing_invite(uuid: &str) -> crate::StoreError {
    crate::StoreError::NotFound(format!("invite with UUID '{}' doesn't exist", uuid))
}
