//! SQLite implementation of the Catalog trait.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use disco_core::X25519PublicKey;
use disco_identity::{
    is_valid_uuid_prefix, now_millis, Invite, Permission, Remote, Role, User, UserKind,
    INVITE_UUID_LEN,
};

use crate::blocking::{self, is_unique_violation, SharedConnection};
use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    ambiguous_invite, missing, missing_invite, role_in_use, Catalog, NodeMeta,
};

const META_VERSION: &str = "version";
const META_CA_CERT: &str = "server_tls_cert";
const META_CA_KEY: &str = "server_tls_key_enc";
const META_SAN: &str = "server_tls_san";

/// SQLite-backed identity catalog.
///
/// Foreign keys are enforced, so deleting a user or role cascades to its
/// assignments and a user's deletion cascades to its invitations.
pub struct SqliteCatalog {
    conn: SharedConnection,
}

impl SqliteCatalog {
    /// Open a catalog database at the given path, migrating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory catalog.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: blocking::shared(conn),
        })
    }

    /// Release the connection.
    pub async fn close(&self) -> Result<()> {
        blocking::close(&self.conn).await
    }
}

fn unique_or(err: rusqlite::Error, message: String) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::AlreadyExists(message)
    } else {
        StoreError::Database(err)
    }
}

fn text_column(value: Vec<u8>, key: &str) -> Result<String> {
    String::from_utf8(value).map_err(|_| StoreError::InvalidData(format!("meta '{}' is not UTF-8", key)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

fn load_permissions(conn: &Connection, role_id: i64) -> Result<Vec<Permission>> {
    let mut stmt = conn.prepare(
        "SELECT namespaces, actions, target FROM role_permissions WHERE role_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![role_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.iter()
        .map(|(ns, actions, target)| Ok(Permission::from_columns(ns, actions, target)?))
        .collect()
}

fn insert_permissions(conn: &Connection, role_id: i64, permissions: &[Permission]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO role_permissions (role_id, namespaces, actions, target) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for perm in permissions {
        stmt.execute(params![
            role_id,
            perm.namespace_list(),
            perm.action_codes(),
            perm.target_column()
        ])?;
    }
    Ok(())
}

fn finish_role(conn: &Connection, id: i64, name: String) -> Result<Role> {
    Ok(Role {
        id,
        name,
        permissions: load_permissions(conn, id)?,
    })
}

fn find_role(conn: &Connection, name: &str) -> Result<Option<Role>> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, name FROM roles WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(id, name)| finish_role(conn, id, name)).transpose()
}

fn get_role(conn: &Connection, name: &str) -> Result<Role> {
    find_role(conn, name)?.ok_or_else(|| missing("role", name))
}

fn all_roles(conn: &Connection) -> Result<Vec<Role>> {
    let mut stmt = conn.prepare("SELECT id, name FROM roles ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, name)| finish_role(conn, id, name))
        .collect()
}

fn roles_of_user(conn: &Connection, user_id: i64) -> Result<Vec<Role>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.name FROM roles r
         INNER JOIN users_roles ur ON ur.role_id = r.id
         WHERE ur.user_id = ?1
         ORDER BY r.name",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, name)| finish_role(conn, id, name))
        .collect()
}

fn role_ids(conn: &Connection, names: &[String]) -> Result<Vec<i64>> {
    names
        .iter()
        .map(|name| {
            conn.query_row("SELECT id FROM roles WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| missing("role", name))
        })
        .collect()
}

fn assign_roles(conn: &Connection, user_id: i64, role_ids: &[i64]) -> Result<()> {
    conn.execute("DELETE FROM users_roles WHERE user_id = ?1", params![user_id])?;
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO users_roles (user_id, role_id) VALUES (?1, ?2)")?;
    for role_id in role_ids {
        stmt.execute(params![user_id, role_id])?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, name, type, public_key, private_key_hash";

struct UserRow {
    id: i64,
    name: String,
    kind: i64,
    public_key: Option<Vec<u8>>,
    private_key_hash: Option<String>,
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: row.get(2)?,
        public_key: row.get(3)?,
        private_key_hash: row.get(4)?,
    })
}

fn finish_user(conn: &Connection, row: UserRow) -> Result<User> {
    let public_key = row
        .public_key
        .map(|pk| X25519PublicKey::from_slice(&pk))
        .transpose()?;
    Ok(User {
        id: row.id,
        name: row.name,
        kind: UserKind::try_from(row.kind)?,
        roles: roles_of_user(conn, row.id)?,
        public_key,
        private_key_hash: row.private_key_hash,
    })
}

fn find_user_where(conn: &Connection, clause: &str, arg: &dyn rusqlite::ToSql) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
    let row = conn.query_row(&sql, [arg], user_row).optional()?;
    row.map(|row| finish_user(conn, row)).transpose()
}

fn get_user(conn: &Connection, name: &str) -> Result<User> {
    find_user_where(conn, "name = ?1", &name)?.ok_or_else(|| missing("user", name))
}

fn user_by_id(conn: &Connection, id: i64) -> Result<User> {
    find_user_where(conn, "id = ?1", &id)?
        .ok_or_else(|| StoreError::InvalidData(format!("dangling user reference {}", id)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Invitations
// ─────────────────────────────────────────────────────────────────────────────

const INVITE_COLUMNS: &str = "id, uuid, created_at, expires, user_id, token, public_key, privkey_enc";

struct InviteRow {
    id: i64,
    uuid: String,
    created_at: i64,
    expires: i64,
    user_id: i64,
    token: Vec<u8>,
    public_key: Vec<u8>,
    private_key_enc: Vec<u8>,
}

fn invite_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InviteRow> {
    Ok(InviteRow {
        id: row.get(0)?,
        uuid: row.get(1)?,
        created_at: row.get(2)?,
        expires: row.get(3)?,
        user_id: row.get(4)?,
        token: row.get(5)?,
        public_key: row.get(6)?,
        private_key_enc: row.get(7)?,
    })
}

fn finish_invite(conn: &Connection, row: InviteRow) -> Result<Invite> {
    let token: [u8; 32] = row
        .token
        .try_into()
        .map_err(|_| StoreError::InvalidData(format!("invite {} has a malformed token", row.uuid)))?;
    Ok(Invite {
        id: row.id,
        created_at: row.created_at,
        expires: row.expires,
        user: user_by_id(conn, row.user_id)?,
        token,
        public_key: X25519PublicKey::from_slice(&row.public_key)?,
        private_key_enc: row.private_key_enc,
        uuid: row.uuid,
    })
}

/// Resolve a UUID or UUID prefix to exactly one invitation.
fn resolve_invite(conn: &Connection, uuid: &str) -> Result<Invite> {
    if !is_valid_uuid_prefix(uuid) {
        return Err(StoreError::InvalidData(format!("invalid invite UUID '{}'", uuid)));
    }

    let rows = if uuid.len() == INVITE_UUID_LEN {
        let sql = format!("SELECT {} FROM invites WHERE uuid = ?1", INVITE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![uuid], invite_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    } else {
        // The prefix alphabet excludes LIKE wildcards.
        let sql = format!(
            "SELECT {} FROM invites WHERE uuid LIKE ?1 || '%' ORDER BY created_at, id",
            INVITE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![uuid], invite_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    match rows.len() {
        0 => Err(missing_invite(uuid)),
        1 => {
            let row = rows.into_iter().next().ok_or_else(|| missing_invite(uuid))?;
            finish_invite(conn, row)
        }
        n => Err(ambiguous_invite(uuid, n)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Remotes
// ─────────────────────────────────────────────────────────────────────────────

const REMOTE_COLUMNS: &str = "id, created_at, name, address, tls_ca_cert, tls_server_san, \
                              tls_client_cert_enc, tls_client_key_enc";

fn remote_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Remote> {
    Ok(Remote {
        id: row.get(0)?,
        created_at: row.get(1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        tls_ca_cert: row.get(4)?,
        tls_server_san: row.get(5)?,
        tls_client_cert_enc: row.get(6)?,
        tls_client_key_enc: row.get(7)?,
    })
}

fn get_remote(conn: &Connection, name: &str) -> Result<Remote> {
    let sql = format!("SELECT {} FROM remotes WHERE name = ?1", REMOTE_COLUMNS);
    conn.query_row(&sql, params![name], remote_row)
        .optional()?
        .ok_or_else(|| missing("remote", name))
}

#[async_trait]
impl Catalog for SqliteCatalog {
    // ─────────────────────────────────────────────────────────────────────────
    // Node Metadata
    // ─────────────────────────────────────────────────────────────────────────

    async fn init_meta(&self, meta: &NodeMeta) -> Result<()> {
        let meta = meta.clone();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM _meta", [], |row| row.get(0))?;
            if existing > 0 {
                return Err(StoreError::AlreadyExists(
                    "node is already initialized".to_string(),
                ));
            }
            {
                let mut stmt = tx.prepare("INSERT INTO _meta (key, value) VALUES (?1, ?2)")?;
                stmt.execute(params![META_VERSION, meta.version.as_bytes()])?;
                stmt.execute(params![META_CA_CERT, meta.ca_cert_pem.as_bytes()])?;
                stmt.execute(params![META_CA_KEY, meta.ca_key_enc])?;
                stmt.execute(params![META_SAN, meta.server_san.as_bytes()])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn meta(&self) -> Result<Option<NodeMeta>> {
        blocking::run(&self.conn, |conn, _| {
            let mut stmt = conn.prepare("SELECT key, value FROM _meta")?;
            let mut values: BTreeMap<String, Vec<u8>> = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<_, _>>()?;
            if values.is_empty() {
                return Ok(None);
            }
            let mut take = |key: &str| {
                values
                    .remove(key)
                    .ok_or_else(|| StoreError::InvalidData(format!("meta '{}' is missing", key)))
            };
            Ok(Some(NodeMeta {
                version: text_column(take(META_VERSION)?, META_VERSION)?,
                ca_cert_pem: text_column(take(META_CA_CERT)?, META_CA_CERT)?,
                ca_key_enc: take(META_CA_KEY)?,
                server_san: text_column(take(META_SAN)?, META_SAN)?,
            }))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_role(&self, role: &Role) -> Result<Role> {
        let role = role.clone();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            tx.execute("INSERT INTO roles (name) VALUES (?1)", params![role.name])
                .map_err(|e| unique_or(e, format!("role '{}' already exists", role.name)))?;
            let id = tx.last_insert_rowid();
            insert_permissions(&tx, id, &role.permissions)?;
            let created = finish_role(&tx, id, role.name)?;
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn update_role(&self, name: &str, permissions: &[Permission]) -> Result<Role> {
        let (name, permissions) = (name.to_string(), permissions.to_vec());
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let role = get_role(&tx, &name)?;
            tx.execute("DELETE FROM role_permissions WHERE role_id = ?1", params![role.id])?;
            insert_permissions(&tx, role.id, &permissions)?;
            let updated = finish_role(&tx, role.id, role.name)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    async fn role(&self, name: &str) -> Result<Role> {
        let name = name.to_string();
        blocking::run(&self.conn, move |conn, _| get_role(conn, &name)).await
    }

    async fn roles(&self) -> Result<Vec<Role>> {
        blocking::run(&self.conn, |conn, _| all_roles(conn)).await
    }

    async fn delete_role(&self, name: &str, force: bool) -> Result<()> {
        let name = name.to_string();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let role = get_role(&tx, &name)?;
            let holders: i64 = tx.query_row(
                "SELECT COUNT(*) FROM users_roles WHERE role_id = ?1",
                params![role.id],
                |row| row.get(0),
            )?;
            if holders > 0 && !force {
                return Err(role_in_use(holders as usize));
            }
            tx.execute("DELETE FROM roles WHERE id = ?1", params![role.id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<User> {
        let user = user.clone();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            if user.kind == UserKind::Local
                && find_user_where(&tx, "type = ?1", &UserKind::Local.code())?.is_some()
            {
                return Err(StoreError::AlreadyExists(
                    "a local user already exists".to_string(),
                ));
            }
            let names: Vec<String> = user.roles.iter().map(|r| r.name.clone()).collect();
            let ids = role_ids(&tx, &names)?;
            tx.execute(
                "INSERT INTO users (name, type, public_key, private_key_hash) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.name,
                    user.kind.code(),
                    user.public_key.map(|pk| pk.as_bytes().to_vec()),
                    user.private_key_hash
                ],
            )
            .map_err(|e| unique_or(e, format!("user '{}' already exists", user.name)))?;
            let id = tx.last_insert_rowid();
            assign_roles(&tx, id, &ids)?;
            let created = user_by_id(&tx, id)?;
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn update_user_roles(&self, name: &str, roles: &[String]) -> Result<User> {
        let (name, roles) = (name.to_string(), roles.to_vec());
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let user = get_user(&tx, &name)?;
            let ids = role_ids(&tx, &roles)?;
            assign_roles(&tx, user.id, &ids)?;
            let updated = user_by_id(&tx, user.id)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    async fn user(&self, name: &str) -> Result<User> {
        let name = name.to_string();
        blocking::run(&self.conn, move |conn, _| get_user(conn, &name)).await
    }

    async fn local_user(&self) -> Result<Option<User>> {
        blocking::run(&self.conn, |conn, _| {
            find_user_where(conn, "type = ?1", &UserKind::Local.code())
        })
        .await
    }

    async fn users(&self) -> Result<Vec<User>> {
        blocking::run(&self.conn, |conn, _| {
            let sql = format!("SELECT {} FROM users ORDER BY name", USER_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(|row| finish_user(conn, row)).collect()
        })
        .await
    }

    async fn delete_user(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        blocking::run(&self.conn, move |conn, _| {
            if conn.execute("DELETE FROM users WHERE name = ?1", params![name])? == 0 {
                return Err(missing("user", &name));
            }
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invitations
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_invite(&self, invite: &Invite) -> Result<Invite> {
        let invite = invite.clone();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let user = get_user(&tx, &invite.user.name)?;
            tx.execute(
                "INSERT INTO invites (uuid, created_at, expires, user_id, token, public_key, privkey_enc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    invite.uuid,
                    invite.created_at,
                    invite.expires,
                    user.id,
                    invite.token.as_slice(),
                    invite.public_key.as_bytes().as_slice(),
                    invite.private_key_enc
                ],
            )
            .map_err(|e| unique_or(e, format!("invite '{}' already exists", invite.uuid)))?;
            let created = resolve_invite(&tx, &invite.uuid)?;
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn invites(&self, include_expired: bool) -> Result<Vec<Invite>> {
        blocking::run(&self.conn, move |conn, _| {
            let sql = format!(
                "SELECT {} FROM invites WHERE ?1 OR expires > ?2 ORDER BY created_at, id",
                INVITE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![include_expired, now_millis()], invite_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(|row| finish_invite(conn, row)).collect()
        })
        .await
    }

    async fn invite(&self, uuid: &str) -> Result<Invite> {
        let uuid = uuid.to_string();
        blocking::run(&self.conn, move |conn, _| resolve_invite(conn, &uuid)).await
    }

    async fn update_invite_expiry(&self, uuid: &str, expires: i64) -> Result<Invite> {
        let uuid = uuid.to_string();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let invite = resolve_invite(&tx, &uuid)?;
            tx.execute(
                "UPDATE invites SET expires = ?1 WHERE id = ?2",
                params![expires, invite.id],
            )?;
            tx.commit()?;
            Ok(Invite { expires, ..invite })
        })
        .await
    }

    async fn delete_invite(&self, uuid: &str) -> Result<()> {
        let uuid = uuid.to_string();
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let invite = resolve_invite(&tx, &uuid)?;
            tx.execute("DELETE FROM invites WHERE id = ?1", params![invite.id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn claim_invite(&self, token: &[u8; 32]) -> Result<Option<Invite>> {
        let token = *token;
        blocking::run(&self.conn, move |conn, _| {
            let tx = conn.transaction()?;
            let sql = format!(
                "SELECT {} FROM invites WHERE token = ?1 AND expires > ?2",
                INVITE_COLUMNS
            );
            let row = tx
                .query_row(&sql, params![token.as_slice(), now_millis()], invite_row)
                .optional()?;
            let Some(row) = row else {
                return Ok(None);
            };
            let invite = finish_invite(&tx, row)?;
            tx.execute("DELETE FROM invites WHERE id = ?1", params![invite.id])?;
            tx.commit()?;
            Ok(Some(invite))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Remotes
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_remote(&self, remote: &Remote) -> Result<Remote> {
        let remote = remote.clone();
        blocking::run(&self.conn, move |conn, _| {
            conn.execute(
                "INSERT INTO remotes (created_at, name, address, tls_ca_cert, tls_server_san,
                                      tls_client_cert_enc, tls_client_key_enc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    remote.created_at,
                    remote.name,
                    remote.address,
                    remote.tls_ca_cert,
                    remote.tls_server_san,
                    remote.tls_client_cert_enc,
                    remote.tls_client_key_enc
                ],
            )
            .map_err(|e| unique_or(e, format!("remote '{}' already exists", remote.name)))?;
            get_remote(conn, &remote.name)
        })
        .await
    }

    async fn remote(&self, name: &str) -> Result<Remote> {
        let name = name.to_string();
        blocking::run(&self.conn, move |conn, _| get_remote(conn, &name)).await
    }

    async fn remotes(&self) -> Result<Vec<Remote>> {
        blocking::run(&self.conn, |conn, _| {
            let sql = format!("SELECT {} FROM remotes ORDER BY name", REMOTE_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let remotes = stmt
                .query_map([], remote_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(remotes)
        })
        .await
    }

    async fn delete_remote(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        blocking::run(&self.conn, move |conn, _| {
            if conn.execute("DELETE FROM remotes WHERE name = ?1", params![name])? == 0 {
                return Err(missing("remote", &name));
            }
            Ok(())
        })
        .await
    }
}
