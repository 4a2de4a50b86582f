//! Running SQLite work off the async runtime.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, StoreError};

/// A connection shared between blocking tasks. `None` once closed.
pub(crate) type SharedConnection = Arc<Mutex<Option<Connection>>>;

pub(crate) fn shared(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(Some(conn)))
}

/// Run `f` against the connection on the blocking pool.
///
/// `f` receives a token that is cancelled if the calling future is dropped
/// before the work finishes.
pub(crate) async fn run<T, F>(conn: &SharedConnection, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection, &CancellationToken) -> Result<T> + Send + 'static,
{
    let conn = conn.clone();
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    tokio::task::spawn_blocking(move || {
        let mut conn = conn.lock().map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                Some(format!("mutex poisoned: {}", e)),
            ))
        })?;
        let conn = conn.as_mut().ok_or(StoreError::Closed)?;
        f(conn, &cancel)
    })
    .await
    .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
}

/// Close the connection. Idempotent.
pub(crate) async fn close(conn: &SharedConnection) -> Result<()> {
    let conn = conn.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = conn
            .lock()
            .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
        match conn.take() {
            Some(c) => c.close().map_err(|(_, e)| StoreError::Database(e)),
            None => Ok(()),
        }
    })
    .await
    .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
}

/// Whether `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
