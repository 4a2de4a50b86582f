//! Roles: named sets of permissions.

use serde::{Deserialize, Serialize};

use crate::permission::{split_target, Action, Permission};

/// A named set of permissions that can be assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Catalog-assigned identifier; 0 until persisted.
    pub id: i64,
    /// Unique, immutable name.
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl Role {
    /// A role that has not been persisted yet.
    pub fn new(name: impl Into<String>, permissions: Vec<Permission>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            permissions,
        }
    }

    /// Check whether this role allows `action` on `target`.
    ///
    /// `target` has the form `namespace:resource:object`. Malformed targets
    /// and unknown resources never match.
    pub fn can(&self, action: &str, target: &str) -> bool {
        let Some((namespace, resource, object)) = split_target(target) else {
            return false;
        };
        let action = action.parse::<Action>().ok();
        self.permissions
            .iter()
            .any(|p| p.allows(action, namespace, resource, object))
    }

    /// The roles every node starts with.
    pub fn defaults() -> Vec<Role> {
        [
            ("admin", "*:*:*"),
            ("node", "r:*:store:*"),
            ("user", "*:*:store:*"),
        ]
        .into_iter()
        .filter_map(|(name, perm)| {
            perm.parse::<Permission>()
                .ok()
                .map(|p| Role::new(name, vec![p]))
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(perms: &[&str]) -> Role {
        Role::new(
            "test",
            perms.iter().map(|p| p.parse().unwrap()).collect(),
        )
    }

    #[test]
    fn test_scoped_read_role() {
        let r = role(&["r:dev:store:myapp/*"]);
        assert!(r.can("read", "dev:store:myapp/config"));
        assert!(!r.can("write", "dev:store:myapp/config"));
        assert!(!r.can("read", "prod:store:myapp/config"));
    }

    #[test]
    fn test_wildcard_resource_ignores_object() {
        let r = role(&["rw:dev:*"]);
        assert!(r.can("read", "dev:store:anything/at:all"));
        assert!(r.can("write", "dev:user:bob"));
        assert!(r.can("read", "dev:role:admin"));
        assert!(!r.can("delete", "dev:store:k"));
        assert!(!r.can("read", "prod:store:k"));
    }

    #[test]
    fn test_any_permission_of_role_suffices() {
        let r = role(&["r:dev:store:a/*", "w:prod:store:b/*"]);
        assert!(r.can("read", "dev:store:a/1"));
        assert!(r.can("write", "prod:store:b/1"));
        assert!(!r.can("write", "dev:store:a/1"));
    }

    #[test]
    fn test_malformed_target_never_matches() {
        let r = role(&["*:*:*"]);
        assert!(!r.can("read", "dev:store"));
        assert!(!r.can("read", "dev"));
        assert!(!r.can("read", "dev:blob:k"));
        assert!(r.can("read", "dev:store:"));
    }

    #[test]
    fn test_unknown_action() {
        assert!(!role(&["rwd:*:*"]).can("launch", "dev:store:k"));
        assert!(role(&["*:*:*"]).can("launch", "dev:store:k"));
    }

    #[test]
    fn test_defaults() {
        let roles = Role::defaults();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["admin", "node", "user"]);

        let node = &roles[1];
        assert!(node.can("read", "any:store:key"));
        assert!(!node.can("write", "any:store:key"));

        let user = &roles[2];
        assert!(user.can("delete", "any:store:key"));
        assert!(!user.can("read", "any:user:bob"));

        assert!(roles[0].can("write", "x:role:admin"));
    }
}
