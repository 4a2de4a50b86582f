//! SQLite implementation of the Store trait.
//!
//! Each namespace is its own table, created on first write and named after
//! the hex encoding of the namespace. Values are sealed
//! before they leave the blocking task and opened inside it, so plaintext
//! never reaches the database.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;

use disco_core::{decrypt_symmetric_cancellable, encrypt_symmetric_cancellable, SymmetricKey};

use crate::blocking::{self, SharedConnection};
use crate::error::{Result, StoreError};
use crate::namespace::{namespace_of, table_ident, table_name, validate_namespace, ALL_NAMESPACES};
use crate::traits::{Keys, Store};

/// SQLite-based encrypted store.
///
/// Thread-safe via an internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: SharedConnection,
    key: Arc<SymmetricKey>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path, sealing values with `key`.
    pub fn open(path: impl AsRef<Path>, key: SymmetricKey) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self::with_connection(conn, key))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory(key: SymmetricKey) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::with_connection(conn, key))
    }

    fn with_connection(conn: Connection, key: SymmetricKey) -> Self {
        Self {
            conn: blocking::shared(conn),
            key: Arc::new(key),
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(StoreError::EmptyKey)
    } else {
        Ok(())
    }
}

fn missing_key(namespace: &str, key: &str) -> StoreError {
    StoreError::NotFound(format!(
        "key '{}' doesn't exist in the '{}' namespace",
        key, namespace
    ))
}

fn table_exists(conn: &Connection, namespace: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table_name(namespace)?],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Namespaces that exist, in name order.
fn namespaces(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut namespaces: Vec<String> = names.iter().filter_map(|n| namespace_of(n)).collect();
    namespaces.sort();
    Ok(namespaces)
}

fn keys_with_prefix(conn: &Connection, namespace: &str, prefix: &str) -> Result<Vec<String>> {
    let table = table_ident(namespace)?;
    // substr() compares literally; LIKE would treat % and _ in the prefix as wildcards.
    let sql = format!(
        "SELECT key FROM {} WHERE substr(key, 1, ?2) = ?1 ORDER BY key",
        table
    );
    let mut stmt = conn.prepare(&sql)?;
    let keys = stmt
        .query_map(params![prefix, prefix.chars().count() as i64], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(keys)
}

fn get_blocking(
    conn: &Connection,
    key: &SymmetricKey,
    namespace: &str,
    k: &str,
    cancel: &CancellationToken,
) -> Result<Option<Vec<u8>>> {
    if !table_exists(conn, namespace)? {
        return Ok(None);
    }
    let sql = format!("SELECT value FROM {} WHERE key = ?1", table_ident(namespace)?);
    let sealed: Option<Vec<u8>> = conn
        .query_row(&sql, params![k], |row| row.get(0))
        .optional()?;
    match sealed {
        Some(sealed) => Ok(Some(decrypt_symmetric_cancellable(&sealed, key, cancel)?)),
        None => Ok(None),
    }
}

fn set_blocking(
    conn: &Connection,
    key: &SymmetricKey,
    namespace: &str,
    k: &str,
    value: &[u8],
    cancel: &CancellationToken,
) -> Result<()> {
    let table = table_ident(namespace)?;
    let sealed = encrypt_symmetric_cancellable(value, key, cancel)?;
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (key TEXT UNIQUE NOT NULL, value BLOB)",
        table
    ))?;
    conn.execute(
        &format!(
            "INSERT INTO {} (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            table
        ),
        params![k, sealed],
    )?;
    Ok(())
}

fn delete_blocking(conn: &Connection, namespace: &str, k: &str) -> Result<()> {
    if !table_exists(conn, namespace)? {
        return Err(missing_key(namespace, k));
    }
    let sql = format!("DELETE FROM {} WHERE key = ?1", table_ident(namespace)?);
    if conn.execute(&sql, params![k])? == 0 {
        return Err(missing_key(namespace, k));
    }
    Ok(())
}

fn list_blocking(conn: &Connection, namespace: &str, prefix: &str) -> Result<Keys> {
    let selected = if namespace == ALL_NAMESPACES {
        namespaces(conn)?
    } else if table_exists(conn, namespace)? {
        vec![namespace.to_string()]
    } else {
        Vec::new()
    };

    let mut out = Keys::new();
    for ns in selected {
        let keys = keys_with_prefix(conn, &ns, prefix)?;
        if !keys.is_empty() {
            out.insert(ns, keys);
        }
    }
    Ok(out)
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (namespace, k) = (namespace.to_string(), key.to_string());
        let key = self.key.clone();

        blocking::run(&self.conn, move |conn, cancel| {
            get_blocking(conn, &key, &namespace, &k, cancel)
        })
        .await
    }

    async fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (namespace, k, value) = (namespace.to_string(), key.to_string(), value.to_vec());
        let key = self.key.clone();

        blocking::run(&self.conn, move |conn, cancel| {
            set_blocking(conn, &key, &namespace, &k, &value, cancel)
        })
        .await?;
        tracing::debug!("wrote key to store");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let (namespace, k) = (namespace.to_string(), key.to_string());

        blocking::run(&self.conn, move |conn, _| delete_blocking(conn, &namespace, &k)).await
    }

    async fn list(&self, namespace: &str, prefix: &str) -> Result<Keys> {
        if namespace != ALL_NAMESPACES {
            validate_namespace(namespace)?;
        }
        let (namespace, prefix) = (namespace.to_string(), prefix.to_string());

        blocking::run(&self.conn, move |conn, _| list_blocking(conn, &namespace, &prefix)).await
    }

    async fn close(&self) -> Result<()> {
        blocking::close(&self.conn).await
    }
}
