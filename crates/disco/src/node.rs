//! A node: its root key, its catalog and store, and the services built on them.
//!
//! The root key never touches disk. The catalog keeps only its fingerprint
//! on the local user, which [`Node::open`] checks before doing anything else.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use disco_core::{SymmetricKey, X25519PublicKey, X25519StaticSecret};
use disco_identity::{Remote, Role, User};
use disco_net::{ApiState, HttpJoinTransport, RemoteClient, Server};
use disco_pair::{
    extend_invite, issue_invite, redeem_invite, CertificateAuthority, IssuedInvite, JoinService,
};
use disco_store::{Catalog, SqliteCatalog, SqliteStore, Store};

use crate::config::{NodeConfig, CATALOG_FILE_NAME, STORE_FILE_NAME};
use crate::error::{DiscoError, Result};

/// Version recorded in node metadata at `init`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const STORE_KEY_LABEL: &str = "disco 2024 store key";

/// Name of the role the local user holds.
pub const ADMIN_ROLE: &str = "admin";

/// The root of trust of a node.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    root_key: SymmetricKey,
}

impl NodeIdentity {
    pub fn generate() -> Self {
        Self::new(SymmetricKey::generate())
    }

    pub fn new(root_key: SymmetricKey) -> Self {
        Self { root_key }
    }

    /// Parse a base58 root key as printed by `init`.
    pub fn decode(text: &str) -> Result<Self> {
        SymmetricKey::decode(text.trim())
            .map(Self::new)
            .map_err(DiscoError::InvalidKey)
    }

    pub fn encode(&self) -> String {
        self.root_key.encode()
    }

    pub fn root_key(&self) -> &SymmetricKey {
        &self.root_key
    }

    /// Key values in the store are sealed with.
    pub fn store_key(&self) -> SymmetricKey {
        self.root_key.derive(STORE_KEY_LABEL)
    }

    /// X25519 public key of the root key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519StaticSecret::from_bytes(*self.root_key.as_bytes()).public_key()
    }

    /// Fingerprint persisted on the local user.
    pub fn key_hash(&self) -> String {
        self.root_key.fingerprint()
    }
}

/// Open the SQLite catalog and store under `data_dir`.
pub fn open_backends(
    data_dir: &Path,
    identity: &NodeIdentity,
) -> Result<(Arc<dyn Catalog>, Arc<dyn Store>)> {
    let catalog = SqliteCatalog::open(data_dir.join(CATALOG_FILE_NAME))?;
    let store = SqliteStore::open(data_dir.join(STORE_FILE_NAME), identity.store_key())?;
    Ok((Arc::new(catalog), Arc::new(store)))
}

/// An initialized node.
pub struct Node {
    identity: NodeIdentity,
    config: NodeConfig,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn Store>,
    authority: Arc<CertificateAuthority>,
    user: User,
}

impl Node {
    /// Initialize a fresh catalog: default roles, the local user with the
    /// admin role, and a new CA for `config.server_san`.
    pub async fn init(
        identity: NodeIdentity,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn Store>,
        config: NodeConfig,
    ) -> Result<Self> {
        if catalog.local_user().await?.is_some() {
            return Err(DiscoError::AlreadyInitialized);
        }

        for role in Role::defaults() {
            catalog.create_role(&role).await?;
        }
        let admin = catalog.role(ADMIN_ROLE).await?;
        let user = catalog
            .create_user(&User::local(
                identity.public_key(),
                identity.key_hash(),
                vec![admin],
            ))
            .await?;

        let authority = CertificateAuthority::generate(config.server_san.clone())?;
        catalog
            .init_meta(&authority.to_meta(VERSION, identity.root_key())?)
            .await?;

        tracing::info!(user = %user.name, san = %authority.server_san(), "node initialized");
        Ok(Self {
            identity,
            config,
            catalog,
            store,
            authority: Arc::new(authority),
            user,
        })
    }

    /// Open an initialized catalog with the root key it was initialized with.
    pub async fn open(
        identity: NodeIdentity,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn Store>,
        config: NodeConfig,
    ) -> Result<Self> {
        let user = catalog
            .local_user()
            .await?
            .ok_or(DiscoError::NotInitialized)?;
        if user.private_key_hash.as_deref() != Some(identity.key_hash().as_str()) {
            tracing::warn!(user = %user.name, "root key fingerprint mismatch");
            return Err(DiscoError::KeyMismatch);
        }

        let meta = catalog.meta().await?.ok_or(DiscoError::NotInitialized)?;
        if meta.version != VERSION {
            tracing::debug!(initialized = %meta.version, running = VERSION, "node version differs");
        }
        let authority = CertificateAuthority::from_meta(&meta, identity.root_key())?;

        Ok(Self {
            identity,
            config,
            catalog,
            store,
            authority: Arc::new(authority),
            user,
        })
    }

    /// Initialize a node whose databases live in `data_dir`.
    pub async fn init_dir(data_dir: &Path, identity: NodeIdentity, config: NodeConfig) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let (catalog, store) = open_backends(data_dir, &identity)?;
        Self::init(identity, catalog, store, config).await
    }

    /// Open the node in `data_dir` without creating anything there.
    pub async fn open_dir(data_dir: &Path, identity: NodeIdentity, config: NodeConfig) -> Result<Self> {
        if !data_dir.join(CATALOG_FILE_NAME).exists() {
            return Err(DiscoError::NotInitialized);
        }
        let (catalog, store) = open_backends(data_dir, &identity)?;
        Self::open(identity, catalog, store, config).await
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn authority(&self) -> &CertificateAuthority {
        &self.authority
    }

    /// The node's own user.
    pub fn local_user(&self) -> &User {
        &self.user
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serving
    // ─────────────────────────────────────────────────────────────────────────

    pub fn api_state(&self) -> ApiState {
        let join = JoinService::new(
            self.catalog.clone(),
            self.identity.root_key().clone(),
            self.authority.clone(),
            self.config.join_config(),
        );
        ApiState {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
            join: Arc::new(join),
        }
    }

    /// Bind the server to `listen_addr`, or the configured address.
    pub async fn bind(&self, listen_addr: Option<&str>) -> Result<Server> {
        let config = self.config.server_config(listen_addr);
        Ok(Server::bind(&config, &self.authority, self.api_state()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a remote user holding the existing roles `roles`.
    pub async fn add_user(&self, name: &str, roles: &[String]) -> Result<User> {
        let roles = roles.iter().map(|r| Role::new(r.clone(), vec![])).collect();
        let user = self.catalog.create_user(&User::remote(name, roles)).await?;
        warn_if_roleless(&user);
        tracing::info!(user = %user.name, roles = ?user.role_names(), "user added");
        Ok(user)
    }

    /// Replace the roles of remote user `name`.
    pub async fn update_user(&self, name: &str, roles: &[String]) -> Result<User> {
        self.remote_user(name, "updated").await?;
        let user = self.catalog.update_user_roles(name, roles).await?;
        warn_if_roleless(&user);
        Ok(user)
    }

    /// Delete remote user `name` and its invitations.
    pub async fn remove_user(&self, name: &str) -> Result<()> {
        self.remote_user(name, "removed").await?;
        self.catalog.delete_user(name).await?;
        tracing::info!(user = %name, "user removed");
        Ok(())
    }

    /// Remote users, ordered by name. The local user is not listed.
    pub async fn users(&self) -> Result<Vec<User>> {
        let mut users = self.catalog.users().await?;
        users.retain(|u| !u.is_local());
        Ok(users)
    }

    async fn remote_user(&self, name: &str, verb: &'static str) -> Result<User> {
        let user = self.catalog.user(name).await?;
        if user.is_local() {
            return Err(DiscoError::LocalUser(verb));
        }
        Ok(user)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pairing
    // ─────────────────────────────────────────────────────────────────────────

    /// Invite a node to join as remote user `user_name`.
    ///
    /// `ttl` defaults to the configured invite TTL.
    pub async fn invite(&self, user_name: &str, ttl: Option<Duration>) -> Result<IssuedInvite> {
        self.remote_user(user_name, "invited").await?;
        let ttl = ttl.unwrap_or(self.config.invite_ttl);
        Ok(issue_invite(self.catalog.as_ref(), self.identity.root_key(), user_name, ttl).await?)
    }

    /// Extend invitation `uuid` (or a unique prefix) to expire `ttl` from now.
    pub async fn extend_invite(&self, uuid: &str, ttl: Duration) -> Result<()> {
        extend_invite(self.catalog.as_ref(), uuid, ttl).await?;
        Ok(())
    }

    /// Redeem a composite token against the node at `address`, saving the
    /// result as remote `name`.
    pub async fn join(&self, name: &str, address: &str, token: &str) -> Result<Remote> {
        let transport = HttpJoinTransport::new(self.config.request_timeout)?;
        Ok(redeem_invite(
            &transport,
            self.catalog.as_ref(),
            self.identity.root_key(),
            name,
            address,
            token,
        )
        .await?)
    }

    /// A store client for remote `name`.
    pub async fn remote_client(&self, name: &str) -> Result<RemoteClient> {
        let remote = self.catalog.remote(name).await?;
        Ok(RemoteClient::connect(&remote, self.identity.root_key(), self.config.request_timeout).await?)
    }

    /// Release the store.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;
        Ok(())
    }
}

fn warn_if_roleless(user: &User) {
    if user.roles.is_empty() {
        tracing::warn!(
            user = %user.name,
            "user has no assigned roles and won't be able to access any resources"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_store::{MemoryCatalog, MemoryStore};

    fn backends(identity: &NodeIdentity) -> (Arc<dyn Catalog>, Arc<dyn Store>) {
        (
            Arc::new(MemoryCatalog::new()),
            Arc::new(MemoryStore::new(identity.store_key())),
        )
    }

    #[test]
    fn test_identity_encoding() {
        let identity = NodeIdentity::generate();
        let parsed = NodeIdentity::decode(&format!("{}\n", identity.encode())).unwrap();
        assert_eq!(parsed.key_hash(), identity.key_hash());
        assert_ne!(identity.store_key(), *identity.root_key());
        assert!(matches!(
            NodeIdentity::decode("not a key"),
            Err(DiscoError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_init_creates_local_admin() {
        let identity = NodeIdentity::generate();
        let (catalog, store) = backends(&identity);
        let node = Node::init(identity.clone(), catalog.clone(), store, NodeConfig::default())
            .await
            .unwrap();

        let user = node.local_user();
        assert!(user.is_local());
        assert_eq!(user.name, User::local_name(&identity.public_key()));
        assert_eq!(user.role_names(), vec!["admin"]);
        assert!(user.can("delete", "prod:role:anything"));

        let roles: Vec<String> = catalog.roles().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(roles, vec!["admin", "node", "user"]);
        assert_eq!(catalog.meta().await.unwrap().unwrap().server_san, "localhost");
    }

    #[tokio::test]
    async fn test_init_twice_fails() {
        let identity = NodeIdentity::generate();
        let (catalog, store) = backends(&identity);
        Node::init(identity.clone(), catalog.clone(), store.clone(), NodeConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            Node::init(identity, catalog, store, NodeConfig::default()).await,
            Err(DiscoError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn test_open_checks_key() {
        let identity = NodeIdentity::generate();
        let (catalog, store) = backends(&identity);
        let first = Node::init(identity.clone(), catalog.clone(), store.clone(), NodeConfig::default())
            .await
            .unwrap();

        let reopened = Node::open(identity, catalog.clone(), store.clone(), NodeConfig::default())
            .await
            .unwrap();
        assert_eq!(reopened.authority().cert_pem(), first.authority().cert_pem());

        let wrong = Node::open(NodeIdentity::generate(), catalog, store, NodeConfig::default()).await;
        assert!(matches!(wrong, Err(DiscoError::KeyMismatch)));
    }

    #[tokio::test]
    async fn test_open_uninitialized() {
        let identity = NodeIdentity::generate();
        let (catalog, store) = backends(&identity);
        let err = Node::open(identity, catalog, store, NodeConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DiscoError::NotInitialized));
        assert_eq!(err.hint(), Some("Did you forget to run 'disco init'?"));
    }

    #[tokio::test]
    async fn test_local_user_is_protected() {
        let identity = NodeIdentity::generate();
        let (catalog, store) = backends(&identity);
        let node = Node::init(identity, catalog, store, NodeConfig::default())
            .await
            .unwrap();
        let local = node.local_user().name.clone();

        assert!(matches!(node.remove_user(&local).await, Err(DiscoError::LocalUser(_))));
        assert!(matches!(node.invite(&local, None).await, Err(DiscoError::LocalUser(_))));
        assert!(node.users().await.unwrap().is_empty());

        node.add_user("bob", &["user".to_string()]).await.unwrap();
        let users = node.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "bob");
    }

    #[tokio::test]
    async fn test_invite_uses_configured_ttl() {
        let identity = NodeIdentity::generate();
        let (catalog, store) = backends(&identity);
        let config = NodeConfig {
            invite_ttl: Duration::from_secs(120),
            ..NodeConfig::default()
        };
        let node = Node::init(identity, catalog, store, config).await.unwrap();
        node.add_user("bob", &[]).await.unwrap();

        let issued = node.invite("bob", None).await.unwrap();
        let lifetime = issued.invite.expires - issued.invite.created_at;
        assert!((119_000..=121_000).contains(&lifetime));
    }

    #[tokio::test]
    async fn test_dir_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let identity = NodeIdentity::generate();
        assert!(matches!(
            Node::open_dir(dir.path(), identity.clone(), NodeConfig::default()).await,
            Err(DiscoError::NotInitialized)
        ));

        let node = Node::init_dir(dir.path(), identity.clone(), NodeConfig::default())
            .await
            .unwrap();
        node.store().set("default", "k", b"v").await.unwrap();
        node.close().await.unwrap();
        drop(node);

        let node = Node::open_dir(dir.path(), identity, NodeConfig::default())
            .await
            .unwrap();
        assert_eq!(
            node.store().get("default", "k").await.unwrap().as_deref(),
            Some(&b"v"[..])
        );
    }
}
