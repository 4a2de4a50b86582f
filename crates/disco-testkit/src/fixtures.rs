//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use disco_core::{encrypt_symmetric, SymmetricKey, X25519PublicKey, X25519StaticSecret};
use disco_identity::{generate_invite_uuid, now_millis, Invite, Permission, Role, User};
use disco_store::{Catalog, MemoryCatalog, MemoryStore};

/// Parse a permission string, panicking on malformed input.
pub fn perm(s: &str) -> Permission {
    s.parse()
        .unwrap_or_else(|e| panic!("bad permission {:?}: {}", s, e))
}

/// An unsealed invitation for `user` expiring at `expires` (Unix ms).
///
/// The token and public key are filled with `seed`, so two invites built
/// from different seeds never collide on the token.
pub fn invite_for(user: &str, seed: u8, expires: i64) -> Invite {
    Invite {
        id: 0,
        uuid: generate_invite_uuid(),
        created_at: now_millis(),
        expires,
        user: User::remote(user, vec![]),
        token: [seed; 32],
        public_key: X25519PublicKey::from_bytes([seed; 32]),
        private_key_enc: vec![seed],
    }
}

/// A node's state held entirely in memory.
pub struct TestNode {
    pub root_key: SymmetricKey,
    pub catalog: Arc<MemoryCatalog>,
    pub store: Arc<MemoryStore>,
}

impl TestNode {
    /// Create a fixture with a random root key.
    pub fn new() -> Self {
        Self::with_root_key(SymmetricKey::generate())
    }

    /// Create with a deterministic root key from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self::with_root_key(SymmetricKey::from_bytes(seed))
    }

    fn with_root_key(root_key: SymmetricKey) -> Self {
        let store = MemoryStore::new(root_key.derive("disco 2024 store key"));
        Self {
            root_key,
            catalog: Arc::new(MemoryCatalog::new()),
            store: Arc::new(store),
        }
    }

    /// The catalog as a trait object, the way services take it.
    pub fn catalog(&self) -> Arc<dyn Catalog> {
        self.catalog.clone()
    }

    /// Create role `name` holding `permissions`.
    pub async fn role(&self, name: &str, permissions: &[&str]) -> Role {
        let permissions = permissions.iter().map(|p| perm(p)).collect();
        self.catalog
            .create_role(&Role::new(name, permissions))
            .await
            .unwrap()
    }

    /// Create remote user `name` holding the existing roles `roles`.
    pub async fn user(&self, name: &str, roles: &[&str]) -> User {
        let roles = roles.iter().map(|r| Role::new(*r, vec![])).collect();
        self.catalog
            .create_user(&User::remote(name, roles))
            .await
            .unwrap()
    }

    /// Persist an invitation for the existing user `name`, valid for `ttl_ms`.
    ///
    /// Unlike [`invite_for`] the ephemeral key is real and sealed with the
    /// root key. Returns the stored invite and the ephemeral secret.
    pub async fn invite(&self, name: &str, ttl_ms: i64) -> (Invite, X25519StaticSecret) {
        let user = self.catalog.user(name).await.unwrap();
        let ephemeral = X25519StaticSecret::generate();
        let mut token = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut token);
        let invite = Invite {
            id: 0,
            uuid: generate_invite_uuid(),
            created_at: now_millis(),
            expires: now_millis() + ttl_ms,
            user,
            token,
            public_key: ephemeral.public_key(),
            private_key_enc: encrypt_symmetric(&ephemeral.to_bytes(), &self.root_key).unwrap(),
        };
        let stored = self.catalog.create_invite(&invite).await.unwrap();
        (stored, ephemeral)
    }
}

impl Default for TestNode {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of fixtures for scenarios with several nodes.
pub fn multi_node_fixtures(count: usize) -> Vec<TestNode> {
    (0..count).map(|_| TestNode::new()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use disco_store::Store;

    #[test]
    fn test_seeded_fixtures_share_store_key() {
        let a = TestNode::with_seed([7; 32]);
        let b = TestNode::with_seed([7; 32]);
        assert_eq!(a.root_key.as_bytes(), b.root_key.as_bytes());
    }

    #[tokio::test]
    async fn test_seeding_helpers() {
        let fixture = TestNode::new();
        fixture.role("reader", &["r:default:store:*"]).await;
        let bob = fixture.user("bob", &["reader"]).await;
        assert_eq!(bob.role_names(), vec!["reader"]);
        assert!(bob.can("read", "default:store:app/config"));
        assert!(!bob.can("write", "default:store:app/config"));

        let (invite, secret) = fixture.invite("bob", 60_000).await;
        assert_eq!(invite.public_key, secret.public_key());
        assert_eq!(fixture.catalog.invites(false).await.unwrap().len(), 1);

        fixture.store.set("default", "k", b"v").await.unwrap();
        assert_eq!(
            fixture.store.get("default", "k").await.unwrap().as_deref(),
            Some(&b"v"[..])
        );
    }

    #[test]
    fn test_invite_for_is_unsealed() {
        let invite = invite_for("bob", 3, 10);
        assert_eq!(invite.token, [3; 32]);
        assert!(invite.is_expired(10));
    }
}
