//! Users: the identities requests are made on behalf of.

use serde::{Deserialize, Serialize};

use disco_core::{encode, hash, X25519PublicKey};

use crate::error::IdentityError;
use crate::role::Role;

const LOCAL_NAME_LABEL: &str = "disco 2024 local user name";

/// Whether a user is this node's owner or a remote identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserKind {
    /// The node owner. Exactly one exists per node.
    Local,
    /// An identity created by an administrator for another node.
    Remote,
}

impl UserKind {
    /// Persisted type code.
    pub const fn code(self) -> i64 {
        match self {
            UserKind::Local => 1,
            UserKind::Remote => 2,
        }
    }
}

impl TryFrom<i64> for UserKind {
    type Error = IdentityError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(UserKind::Local),
            2 => Ok(UserKind::Remote),
            other => Err(IdentityError::InvalidUserType(other)),
        }
    }
}

/// A user and the roles granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Catalog-assigned identifier; 0 until persisted.
    pub id: i64,
    /// Unique name. For remote users this is also the client certificate CN.
    pub name: String,
    pub kind: UserKind,
    pub roles: Vec<Role>,
    pub public_key: Option<X25519PublicKey>,
    /// Base58 fingerprint of the user's private key; set for the local user.
    pub private_key_hash: Option<String>,
}

impl User {
    /// A remote user that has not been persisted yet.
    pub fn remote(name: impl Into<String>, roles: Vec<Role>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            kind: UserKind::Remote,
            roles,
            public_key: None,
            private_key_hash: None,
        }
    }

    /// The local user for a node whose root key has `public_key` and `private_key_hash`.
    pub fn local(public_key: X25519PublicKey, private_key_hash: String, roles: Vec<Role>) -> Self {
        Self {
            id: 0,
            name: Self::local_name(&public_key),
            kind: UserKind::Local,
            roles,
            public_key: Some(public_key),
            private_key_hash: Some(private_key_hash),
        }
    }

    /// Name of the local user owning `public_key`.
    pub fn local_name(public_key: &X25519PublicKey) -> String {
        let digest = hash(LOCAL_NAME_LABEL, public_key.as_bytes());
        encode(&digest[..8])
    }

    pub fn is_local(&self) -> bool {
        self.kind == UserKind::Local
    }

    /// Check whether any of the user's roles allows `action` on `target`.
    ///
    /// A user without roles can do nothing.
    pub fn can(&self, action: &str, target: &str) -> bool {
        self.roles.iter().any(|role| role.can(action, target))
    }

    /// Names of the user's roles, sorted.
    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.iter().map(|r| r.name.clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> Role {
        Role::new("reader", vec!["r:default:store:*".parse().unwrap()])
    }

    #[test]
    fn test_no_roles_can_nothing() {
        let user = User::remote("bob", vec![]);
        assert!(!user.can("read", "default:store:k"));
        assert!(!user.can("*", "default:store:k"));
    }

    #[test]
    fn test_union_of_roles() {
        let writer = Role::new("writer", vec!["w:dev:store:*".parse().unwrap()]);
        let user = User::remote("bob", vec![reader(), writer]);
        assert!(user.can("read", "default:store:k"));
        assert!(user.can("write", "dev:store:k"));
        assert!(!user.can("write", "default:store:k"));
    }

    #[test]
    fn test_local_name_is_stable() {
        let pk = X25519PublicKey::from_bytes([3u8; 32]);
        let a = User::local_name(&pk);
        assert_eq!(a, User::local_name(&pk));
        assert_ne!(a, User::local_name(&X25519PublicKey::from_bytes([4u8; 32])));
        assert!(!a.is_empty() && a.len() <= 11);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(UserKind::try_from(1).unwrap(), UserKind::Local);
        assert_eq!(UserKind::try_from(UserKind::Remote.code()).unwrap(), UserKind::Remote);
        assert!(matches!(
            UserKind::try_from(7),
            Err(IdentityError::InvalidUserType(7))
        ));
    }
}
