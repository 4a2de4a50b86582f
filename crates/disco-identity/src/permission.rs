//! Permissions: which actions may be applied to which targets in which namespaces.
//!
//! The textual form is `<action-codes>:<namespaces>:<resource>:<patterns>`,
//! for example `rwd:dev,prod:store:myapp/*`. The short form `<codes>:<ns>:*`
//! stands for the wildcard resource with the wildcard pattern.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};
use crate::glob::glob_match;

/// Wildcard for namespaces, resources, patterns and actions.
pub const WILDCARD: &str = "*";

/// An operation a user may perform.
///
/// Variant order matches the byte order of the single-character codes, so
/// a `BTreeSet<Action>` iterates in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    /// Any action (`*`).
    Any,
    /// Delete (`d`).
    Delete,
    /// Read (`r`).
    Read,
    /// Write (`w`).
    Write,
}

impl Action {
    /// Single-character code used in permission strings.
    pub const fn code(self) -> char {
        match self {
            Action::Any => '*',
            Action::Delete => 'd',
            Action::Read => 'r',
            Action::Write => 'w',
        }
    }

    /// Parse a single-character code.
    pub fn from_code(code: char) -> Result<Self> {
        match code {
            '*' => Ok(Action::Any),
            'd' => Ok(Action::Delete),
            'r' => Ok(Action::Read),
            'w' => Ok(Action::Write),
            other => Err(IdentityError::InvalidAction(other.to_string())),
        }
    }

    /// Full name used when asking whether an action is allowed.
    pub const fn name(self) -> &'static str {
        match self {
            Action::Any => WILDCARD,
            Action::Delete => "delete",
            Action::Read => "read",
            Action::Write => "write",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "*" => Ok(Action::Any),
            "delete" => Ok(Action::Delete),
            "read" => Ok(Action::Read),
            "write" => Ok(Action::Write),
            other => Err(IdentityError::InvalidAction(other.to_string())),
        }
    }
}

/// The kind of object a permission applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    /// Any resource (`*`).
    Any,
    /// Store keys.
    Store,
    /// User records.
    User,
    /// Role records.
    Role,
}

impl Resource {
    /// Name used in permission strings and targets.
    pub const fn name(self) -> &'static str {
        match self {
            Resource::Any => WILDCARD,
            Resource::Store => "store",
            Resource::User => "user",
            Resource::Role => "role",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "*" => Ok(Resource::Any),
            "store" => Ok(Resource::Store),
            "user" => Ok(Resource::User),
            "role" => Ok(Resource::Role),
            other => Err(IdentityError::InvalidResource(other.to_string())),
        }
    }
}

/// A resource plus the glob patterns of objects within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    resource: Resource,
    patterns: Vec<String>,
}

impl Target {
    /// Every object of every resource.
    pub fn any() -> Self {
        Self {
            resource: Resource::Any,
            patterns: vec![WILDCARD.to_string()],
        }
    }

    /// Objects of `resource` matching any of `patterns`.
    ///
    /// The wildcard resource only accepts the single pattern `*`.
    pub fn new(resource: Resource, patterns: Vec<String>) -> Result<Self> {
        let describe = || format!("{}:{}", resource, patterns.join(","));
        if patterns.is_empty() || patterns.iter().any(|p| p.is_empty()) {
            return Err(IdentityError::permission(&describe(), "empty target pattern"));
        }
        if resource == Resource::Any && (patterns.len() != 1 || patterns[0] != WILDCARD) {
            return Err(IdentityError::permission(
                &describe(),
                "a wildcard resource requires the wildcard target",
            ));
        }
        Ok(Self { resource, patterns })
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn matches(&self, resource: Resource, object: &str) -> bool {
        match self.resource {
            Resource::Any => true,
            own if own == resource => self.patterns.iter().any(|p| glob_match(p, object)),
            _ => false,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.patterns.join(","))
    }
}

/// A grant of actions on a target across a set of namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission {
    actions: BTreeSet<Action>,
    namespaces: BTreeSet<String>,
    target: Target,
}

impl Permission {
    /// Build a permission, rejecting empty action or namespace sets.
    pub fn new(
        actions: impl IntoIterator<Item = Action>,
        namespaces: impl IntoIterator<Item = impl Into<String>>,
        target: Target,
    ) -> Result<Self> {
        let actions: BTreeSet<Action> = actions.into_iter().collect();
        let namespaces: BTreeSet<String> = namespaces.into_iter().map(Into::into).collect();
        if actions.is_empty() {
            return Err(IdentityError::permission(&target.to_string(), "no actions"));
        }
        if namespaces.is_empty() || namespaces.iter().any(|ns| ns.is_empty()) {
            return Err(IdentityError::permission(&target.to_string(), "empty namespace"));
        }
        Ok(Self {
            actions,
            namespaces,
            target,
        })
    }

    pub fn actions(&self) -> &BTreeSet<Action> {
        &self.actions
    }

    pub fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Check whether this permission allows `action` on `object` of `resource` in `namespace`.
    ///
    /// `None` is an action the model doesn't know; only the any-action wildcard covers it.
    pub fn allows(
        &self,
        action: Option<Action>,
        namespace: &str,
        resource: Resource,
        object: &str,
    ) -> bool {
        let action_ok = self.actions.contains(&Action::Any)
            || action.is_some_and(|a| self.actions.contains(&a));
        let namespace_ok =
            self.namespaces.contains(WILDCARD) || self.namespaces.contains(namespace);
        action_ok && namespace_ok && self.target.matches(resource, object)
    }

    /// Sorted action codes, as persisted.
    pub fn action_codes(&self) -> String {
        self.actions.iter().map(|a| a.code()).collect()
    }

    /// Sorted, comma-joined namespaces, as persisted.
    pub fn namespace_list(&self) -> String {
        self.namespaces.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Persisted form of the target: `*` or `resource:pat1,pat2`.
    pub fn target_column(&self) -> String {
        if self.target.resource == Resource::Any {
            WILDCARD.to_string()
        } else {
            self.target.to_string()
        }
    }

    /// Rebuild a permission from its persisted columns.
    pub fn from_columns(namespaces: &str, actions: &str, target: &str) -> Result<Self> {
        format!("{}:{}:{}", actions, namespaces, target).parse()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.action_codes(),
            self.namespace_list(),
            self.target
        )
    }
}

impl FromStr for Permission {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(IdentityError::permission(
                s,
                format!("expected 3 or 4 components, got {}", parts.len()),
            ));
        }

        if parts[0].is_empty() {
            return Err(IdentityError::permission(s, "no actions"));
        }
        let actions = parts[0]
            .chars()
            .map(Action::from_code)
            .collect::<Result<BTreeSet<_>>>()
            .map_err(|e| IdentityError::permission(s, e.to_string()))?;

        let namespaces: Vec<&str> = parts[1].split(',').collect();
        if namespaces.iter().any(|ns| ns.is_empty()) {
            return Err(IdentityError::permission(s, "empty namespace"));
        }

        let target = if parts.len() == 3 {
            if parts[2] != WILDCARD {
                return Err(IdentityError::permission(
                    s,
                    "the short form requires the wildcard resource",
                ));
            }
            Target::any()
        } else {
            let resource: Resource = parts[2]
                .parse()
                .map_err(|e: IdentityError| IdentityError::permission(s, e.to_string()))?;
            if parts[3].is_empty() {
                return Err(IdentityError::permission(s, "empty target"));
            }
            let patterns = parts[3].split(',').map(str::to_string).collect();
            Target::new(resource, patterns)
                .map_err(|_| IdentityError::permission(s, "invalid target"))?
        };

        Permission::new(actions, namespaces, target)
            .map_err(|_| IdentityError::permission(s, "invalid permission"))
    }
}

impl TryFrom<String> for Permission {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

/// A request target split into `(namespace, resource, object)`.
///
/// Returns `None` unless it has at least three `:`-separated components and a
/// known, concrete resource. The object keeps any further `:` characters.
pub fn split_target(target: &str) -> Option<(&str, Resource, &str)> {
    let mut parts = target.splitn(3, ':');
    let namespace = parts.next()?;
    let resource: Resource = parts.next()?.parse().ok()?;
    let object = parts.next()?;
    if resource == Resource::Any {
        return None;
    }
    Some((namespace, resource, object))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(s: &str) -> Permission {
        s.parse().unwrap()
    }

    #[test]
    fn test_canonical_display() {
        assert_eq!(
            perm("wrd:prod,dev:store:myapp/*").to_string(),
            "drw:dev,prod:store:myapp/*"
        );
        assert_eq!(perm("r:*:*").to_string(), "r:*:*:*");
        assert_eq!(perm("*:*:*:*").to_string(), "*:*:*:*");
        // Pattern order is preserved.
        assert_eq!(perm("r:a:store:z,a").to_string(), "r:a:store:z,a");
    }

    #[test]
    fn test_display_is_fixed_point() {
        for s in [
            "rwd:dev,prod:store:myapp/*",
            "r:*:*",
            "w:default:user:bob,alice",
            "*:x:role:*",
        ] {
            let once = perm(s).to_string();
            assert_eq!(perm(&once).to_string(), once);
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "r",
            "r:ns",
            "r:ns:store:a:b",
            ":ns:store:*",
            "x:ns:store:*",
            "rx:ns:store:*",
            "r::store:*",
            "r:a,,b:store:*",
            "r:ns:store",
            "r:ns:blob:*",
            "r:ns:store:",
            "r:ns:store:a,,b",
            "r:ns:*:myapp/*",
            "r:ns:*:*,*",
        ] {
            assert!(bad.parse::<Permission>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_allows_scoped_read() {
        let p = perm("r:dev:store:myapp/*");
        assert!(p.allows(Some(Action::Read), "dev", Resource::Store, "myapp/config"));
        assert!(!p.allows(Some(Action::Write), "dev", Resource::Store, "myapp/config"));
        assert!(!p.allows(Some(Action::Read), "prod", Resource::Store, "myapp/config"));
        assert!(!p.allows(Some(Action::Read), "dev", Resource::User, "myapp/config"));
        assert!(!p.allows(Some(Action::Read), "dev", Resource::Store, "other"));
    }

    #[test]
    fn test_namespace_is_membership_not_glob() {
        let p = perm("r:de*:store:*");
        assert!(!p.allows(Some(Action::Read), "dev", Resource::Store, "k"));
        assert!(p.allows(Some(Action::Read), "de*", Resource::Store, "k"));
    }

    #[test]
    fn test_unknown_action_needs_wildcard() {
        assert!(!perm("rwd:*:*").allows(None, "ns", Resource::Store, "k"));
        assert!(perm("*:*:*").allows(None, "ns", Resource::Store, "k"));
    }

    #[test]
    fn test_columns_roundtrip() {
        let p = perm("wr:prod,dev:store:a,b");
        assert_eq!(p.action_codes(), "rw");
        assert_eq!(p.namespace_list(), "dev,prod");
        assert_eq!(p.target_column(), "store:a,b");
        let back = Permission::from_columns(&p.namespace_list(), &p.action_codes(), &p.target_column())
            .unwrap();
        assert_eq!(back, p);

        let any = perm("*:*:*");
        assert_eq!(any.target_column(), "*");
        let back =
            Permission::from_columns(&any.namespace_list(), &any.action_codes(), &any.target_column())
                .unwrap();
        assert_eq!(back, any);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(
            split_target("dev:store:a:b"),
            Some(("dev", Resource::Store, "a:b"))
        );
        assert_eq!(split_target("dev:store"), None);
        assert_eq!(split_target("dev:blob:k"), None);
        assert_eq!(split_target("dev:*:k"), None);
    }

    #[test]
    fn test_serde_as_string() {
        let p = perm("r:dev:store:*");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"r:dev:store:*\"");
        let back: Permission = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<Permission>("\"nope\"").is_err());
    }
}
