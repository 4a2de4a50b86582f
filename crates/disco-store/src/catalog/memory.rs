//! In-memory implementation of the Catalog trait.
//!
//! This is primarily for testing. It mirrors the SQLite catalog's semantics,
//! including cascading deletes and atomic invitation claims.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use disco_identity::{
    is_valid_uuid_prefix, now_millis, Invite, Permission, Remote, Role, User, UserKind,
};

use crate::error::{Result, StoreError};
use crate::traits::{
    ambiguous_invite, missing, missing_invite, role_in_use, Catalog, NodeMeta,
};

/// In-memory catalog. Thread-safe via Mutex.
pub struct MemoryCatalog {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    meta: Option<NodeMeta>,
    next_id: i64,
    roles: BTreeMap<String, Role>,
    /// Users keyed by name; `roles` holds only names and is resolved on read.
    users: BTreeMap<String, User>,
    invites: Vec<StoredInvite>,
    remotes: BTreeMap<String, Remote>,
}

/// An invitation referencing its user by name.
#[derive(Clone)]
struct StoredInvite {
    invite: Invite,
    user: String,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn resolve_user(&self, stored: &User) -> User {
        let roles = stored
            .roles
            .iter()
            .filter_map(|r| self.roles.get(&r.name).cloned())
            .collect();
        User {
            roles,
            ..stored.clone()
        }
    }

    fn user(&self, name: &str) -> Result<User> {
        self.users
            .get(name)
            .map(|u| self.resolve_user(u))
            .ok_or_else(|| missing("user", name))
    }

    fn role_refs(&self, names: &[String]) -> Result<Vec<Role>> {
        let mut refs: Vec<Role> = names
            .iter()
            .map(|name| {
                self.roles
                    .get(name)
                    .map(|r| Role::new(r.name.clone(), Vec::new()))
                    .ok_or_else(|| missing("role", name))
            })
            .collect::<Result<_>>()?;
        refs.sort_by(|a, b| a.name.cmp(&b.name));
        refs.dedup_by(|a, b| a.name == b.name);
        Ok(refs)
    }

    fn invite(&self, stored: &StoredInvite) -> Result<Invite> {
        Ok(Invite {
            user: self.user(&stored.user)?,
            ..stored.invite.clone()
        })
    }

    fn resolve_invite_index(&self, uuid: &str) -> Result<usize> {
        if !is_valid_uuid_prefix(uuid) {
            return Err(StoreError::InvalidData(format!("invalid invite UUID '{}'", uuid)));
        }
        let matches: Vec<usize> = self
            .invites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.invite.uuid.starts_with(uuid))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [] => Err(missing_invite(uuid)),
            [index] => Ok(*index),
            many => Err(ambiguous_invite(uuid, many.len())),
        }
    }
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn init_meta(&self, meta: &NodeMeta) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.meta.is_some() {
            return Err(StoreError::AlreadyExists(
                "node is already initialized".to_string(),
            ));
        }
        inner.meta = Some(meta.clone());
        Ok(())
    }

    async fn meta(&self) -> Result<Option<NodeMeta>> {
        Ok(self.lock()?.meta.clone())
    }

    async fn create_role(&self, role: &Role) -> Result<Role> {
        let mut inner = self.lock()?;
        if inner.roles.contains_key(&role.name) {
            return Err(StoreError::AlreadyExists(format!(
                "role '{}' already exists",
                role.name
            )));
        }
        let created = Role {
            id: inner.next_id(),
            ..role.clone()
        };
        inner.roles.insert(role.name.clone(), created.clone());
        Ok(created)
    }

    async fn update_role(&self, name: &str, permissions: &[Permission]) -> Result<Role> {
        let mut inner = self.lock()?;
        let role = inner.roles.get_mut(name).ok_or_else(|| missing("role", name))?;
        role.permissions = permissions.to_vec();
        Ok(role.clone())
    }

    async fn role(&self, name: &str) -> Result<Role> {
        self.lock()?
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| missing("role", name))
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        Ok(self.lock()?.roles.values().cloned().collect())
    }

    async fn delete_role(&self, name: &str, force: bool) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.roles.contains_key(name) {
            return Err(missing("role", name));
        }
        let holders = inner
            .users
            .values()
            .filter(|u| u.roles.iter().any(|r| r.name == name))
            .count();
        if holders > 0 && !force {
            return Err(role_in_use(holders));
        }
        inner.roles.remove(name);
        for user in inner.users.values_mut() {
            user.roles.retain(|r| r.name != name);
        }
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut inner = self.lock()?;
        if user.kind == UserKind::Local && inner.users.values().any(User::is_local) {
            return Err(StoreError::AlreadyExists(
                "a local user already exists".to_string(),
            ));
        }
        let names: Vec<String> = user.roles.iter().map(|r| r.name.clone()).collect();
        let roles = inner.role_refs(&names)?;
        if inner.users.contains_key(&user.name) {
            return Err(StoreError::AlreadyExists(format!(
                "user '{}' already exists",
                user.name
            )));
        }
        let stored = User {
            id: inner.next_id(),
            roles,
            ..user.clone()
        };
        inner.users.insert(user.name.clone(), stored);
        inner.user(&user.name)
    }

    async fn update_user_roles(&self, name: &str, roles: &[String]) -> Result<User> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(name) {
            return Err(missing("user", name));
        }
        let refs = inner.role_refs(roles)?;
        if let Some(user) = inner.users.get_mut(name) {
            user.roles = refs;
        }
        inner.user(name)
    }

    async fn user(&self, name: &str) -> Result<User> {
        self.lock()?.user(name)
    }

    async fn local_user(&self) -> Result<Option<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.is_local())
            .map(|u| inner.resolve_user(u)))
    }

    async fn users(&self) -> Result<Vec<User>> {
        let inner = self.lock()?;
        Ok(inner.users.values().map(|u| inner.resolve_user(u)).collect())
    }

    async fn delete_user(&self, name: &str) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.users.remove(name).is_none() {
            return Err(missing("user", name));
        }
        inner.invites.retain(|s| s.user != name);
        Ok(())
    }

    async fn create_invite(&self, invite: &Invite) -> Result<Invite> {
        let mut inner = self.lock()?;
        inner.user(&invite.user.name)?;
        if inner
            .invites
            .iter()
            .any(|s| s.invite.uuid == invite.uuid || s.invite.token == invite.token)
        {
            return Err(StoreError::AlreadyExists(format!(
                "invite '{}' already exists",
                invite.uuid
            )));
        }
        let stored = StoredInvite {
            invite: Invite {
                id: inner.next_id(),
                ..invite.clone()
            },
            user: invite.user.name.clone(),
        };
        let created = inner.invite(&stored)?;
        inner.invites.push(stored);
        Ok(created)
    }

    async fn invites(&self, include_expired: bool) -> Result<Vec<Invite>> {
        let inner = self.lock()?;
        let now = now_millis();
        let mut invites = inner
            .invites
            .iter()
            .filter(|s| include_expired || !s.invite.is_expired(now))
            .map(|s| inner.invite(s))
            .collect::<Result<Vec<_>>>()?;
        invites.sort_by_key(|i| (i.created_at, i.id));
        Ok(invites)
    }

    async fn invite(&self, uuid: &str) -> Result<Invite> {
        let inner = self.lock()?;
        let index = inner.resolve_invite_index(uuid)?;
        inner.invite(&inner.invites[index])
    }

    async fn update_invite_expiry(&self, uuid: &str, expires: i64) -> Result<Invite> {
        let mut inner = self.lock()?;
        let index = inner.resolve_invite_index(uuid)?;
        inner.invites[index].invite.expires = expires;
        let stored = inner.invites[index].clone();
        inner.invite(&stored)
    }

    async fn delete_invite(&self, uuid: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let index = inner.resolve_invite_index(uuid)?;
        inner.invites.remove(index);
        Ok(())
    }

    async fn claim_invite(&self, token: &[u8; 32]) -> Result<Option<Invite>> {
        let mut inner = self.lock()?;
        let now = now_millis();
        let Some(index) = inner
            .invites
            .iter()
            .position(|s| &s.invite.token == token && !s.invite.is_expired(now))
        else {
            return Ok(None);
        };
        let stored = inner.invites.remove(index);
        inner.invite(&stored).map(Some)
    }

    async fn create_remote(&self, remote: &Remote) -> Result<Remote> {
        let mut inner = self.lock()?;
        if inner.remotes.contains_key(&remote.name) {
            return Err(StoreError::AlreadyExists(format!(
                "remote '{}' already exists",
                remote.name
            )));
        }
        let created = Remote {
            id: inner.next_id(),
            ..remote.clone()
        };
        inner.remotes.insert(remote.name.clone(), created.clone());
        Ok(created)
    }

    async fn remote(&self, name: &str) -> Result<Remote> {
        self.lock()?
            .remotes
            .get(name)
            .cloned()
            .ok_or_else(|| missing("remote", name))
    }

    async fn remotes(&self) -> Result<Vec<Remote>> {
        Ok(self.lock()?.remotes.values().cloned().collect())
    }

    async fn delete_remote(&self, name: &str) -> Result<()> {
        self.lock()?
            .remotes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| missing("remote", name))
    }
}
