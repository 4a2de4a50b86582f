//! Catalog schema migrations for SQLite.
//!
//! Each migration transforms the schema from version N to N+1. Applied
//! versions are recorded in `schema_migrations`.

use rusqlite::Connection;

use disco_identity::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the catalog schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied catalog migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: node metadata, users and roles.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Node metadata: version, CA certificate, sealed CA key, server SAN
        CREATE TABLE _meta (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL
        );

        CREATE TABLE roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        );

        -- One row per permission; columns hold the canonical text segments
        CREATE TABLE role_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            namespaces TEXT NOT NULL,     -- sorted, comma-joined
            actions TEXT NOT NULL,        -- sorted action codes
            target TEXT NOT NULL          -- '*' or 'resource:pat1,pat2'
        );

        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            type INTEGER NOT NULL,        -- 1=local, 2=remote
            public_key BLOB,              -- 32 bytes, X25519
            private_key_hash TEXT         -- base58 fingerprint, local user only
        );

        -- At most one local user per node
        CREATE UNIQUE INDEX idx_users_local ON users(type) WHERE type = 1;

        CREATE TABLE users_roles (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, role_id)
        );

        CREATE INDEX idx_role_permissions_role ON role_permissions(role_id);
        CREATE INDEX idx_users_roles_role ON users_roles(role_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: invitations and remotes.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE invites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT UNIQUE NOT NULL,
            created_at INTEGER NOT NULL,  -- Unix ms
            expires INTEGER NOT NULL,     -- Unix ms
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token BLOB UNIQUE NOT NULL,   -- 32 bytes
            public_key BLOB NOT NULL,     -- 32 bytes, ephemeral X25519
            privkey_enc BLOB NOT NULL     -- ephemeral secret sealed with the root key
        );

        CREATE TABLE remotes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at INTEGER NOT NULL,
            name TEXT UNIQUE NOT NULL,
            address TEXT NOT NULL,
            tls_ca_cert TEXT NOT NULL,
            tls_server_san TEXT NOT NULL,
            tls_client_cert_enc BLOB NOT NULL,
            tls_client_key_enc BLOB NOT NULL
        );

        CREATE INDEX idx_invites_expires ON invites(expires);
        CREATE INDEX idx_invites_user ON invites(user_id);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "_meta",
            "invites",
            "remotes",
            "role_permissions",
            "roles",
            "schema_migrations",
            "users",
            "users_roles",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrates_from_v1() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL)",
            [],
        )
        .unwrap();
        apply_v1(&conn).unwrap();
        conn.execute("INSERT INTO schema_migrations VALUES (1, 0)", [])
            .unwrap();
        conn.execute("INSERT INTO roles (name) VALUES ('kept')", [])
            .unwrap();

        migrate(&mut conn).unwrap();

        let kept: String = conn
            .query_row("SELECT name FROM roles", [], |row| row.get(0))
            .unwrap();
        assert_eq!(kept, "kept");
        let invites: i64 = conn
            .query_row("SELECT COUNT(*) FROM invites", [], |row| row.get(0))
            .unwrap();
        assert_eq!(invites, 0);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute("INSERT INTO schema_migrations VALUES (99, 0)", [])
            .unwrap();
        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
