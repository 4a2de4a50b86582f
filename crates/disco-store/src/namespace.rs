//! Namespace validation.
//!
//! Each namespace is stored in its own table, and SQLite can't bind table
//! names as parameters. A namespace must pass [`validate_namespace`] before it
//! reaches any SQL.
//!
//! SQLite compares identifiers without regard to case while namespaces are
//! case-sensitive, so the table name is `ns_` plus the lowercase hex of the
//! namespace rather than the namespace itself.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, StoreError};

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Selects every namespace in [`Store::list`](crate::Store::list).
pub const ALL_NAMESPACES: &str = "*";

fn namespace_rx() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_/.\-]+$").expect("namespace pattern is valid"))
}

/// Check whether `namespace` is usable as a table name.
pub fn is_valid_namespace(namespace: &str) -> bool {
    namespace_rx().is_match(namespace)
        && !namespace.starts_with('_')
        && !namespace.to_ascii_lowercase().starts_with("sqlite_")
}

/// Validate `namespace`, failing with [`StoreError::InvalidNamespace`].
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if is_valid_namespace(namespace) {
        Ok(())
    } else {
        Err(StoreError::InvalidNamespace(namespace.to_string()))
    }
}

const TABLE_PREFIX: &str = "ns_";

/// Name of the table holding `namespace`.
pub(crate) fn table_name(namespace: &str) -> Result<String> {
    validate_namespace(namespace)?;
    Ok(format!("{}{}", TABLE_PREFIX, hex::encode(namespace)))
}

/// [`table_name`] quoted as an SQL identifier.
pub(crate) fn table_ident(namespace: &str) -> Result<String> {
    Ok(format!("\"{}\"", table_name(namespace)?))
}

/// The namespace stored in `table`, or `None` for any other table.
pub(crate) fn namespace_of(table: &str) -> Option<String> {
    let encoded = table.strip_prefix(TABLE_PREFIX)?;
    if encoded.bytes().any(|b| b.is_ascii_uppercase()) {
        return None;
    }
    let namespace = String::from_utf8(hex::decode(encoded).ok()?).ok()?;
    is_valid_namespace(&namespace).then_some(namespace)
}
