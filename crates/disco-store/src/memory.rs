//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite, values sealed the same way, nothing persisted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use disco_core::{decrypt_symmetric, encrypt_symmetric, SymmetricKey};

use crate::error::{Result, StoreError};
use crate::namespace::{validate_namespace, ALL_NAMESPACES};
use crate::traits::{Keys, Store};

type Namespaces = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// In-memory store implementation. Thread-safe via RwLock.
pub struct MemoryStore {
    namespaces: RwLock<Namespaces>,
    key: SymmetricKey,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store sealing values with `key`.
    pub fn new(key: SymmetricKey) -> Self {
        Self {
            namespaces: RwLock::new(BTreeMap::new()),
            key,
            closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Namespaces>> {
        self.check_open()?;
        self.namespaces
            .read()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Namespaces>> {
        self.check_open()?;
        self.namespaces
            .write()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        Err(StoreError::EmptyKey)
    } else {
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        check_key(key)?;
        let sealed = self
            .read()?
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned();
        match sealed {
            Some(sealed) => Ok(Some(decrypt_symmetric(&sealed, &self.key)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        validate_namespace(namespace)?;
        check_key(key)?;
        let sealed = encrypt_symmetric(value, &self.key)?;
        self.write()?
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), sealed);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        validate_namespace(namespace)?;
        check_key(key)?;
        let removed = self
            .write()?
            .get_mut(namespace)
            .and_then(|ns| ns.remove(key));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(format!(
                "key '{}' doesn't exist in the '{}' namespace",
                key, namespace
            ))),
        }
    }

    async fn list(&self, namespace: &str, prefix: &str) -> Result<Keys> {
        if namespace != ALL_NAMESPACES {
            validate_namespace(namespace)?;
        }
        let namespaces = self.read()?;
        let mut out = Keys::new();
        for (ns, entries) in namespaces.iter() {
            if namespace != ALL_NAMESPACES && ns != namespace {
                continue;
            }
            let keys: Vec<String> = entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect();
            if !keys.is_empty() {
                out.insert(ns.clone(), keys);
            }
        }
        Ok(out)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_matches_sqlite_semantics() {
        let store = MemoryStore::new(SymmetricKey::generate());

        store.set("ns1", "k", b"v1").await.unwrap();
        store.set("ns2", "k", b"v2").await.unwrap();
        store.set("ns2", "j", b"v3").await.unwrap();

        assert_eq!(store.get("ns1", "k").await.unwrap().as_deref(), Some(&b"v1"[..]));
        assert_eq!(store.get("ns3", "k").await.unwrap(), None);

        let all = store.list("*", "").await.unwrap();
        assert_eq!(all["ns2"], vec!["j", "k"]);
        assert!(store.list("ns3", "").await.unwrap().is_empty());

        store.delete("ns2", "j").await.unwrap();
        assert!(store.delete("ns2", "j").await.unwrap_err().is_not_found());
        assert!(matches!(
            store.set("_meta", "k", b"v").await,
            Err(StoreError::InvalidNamespace(_))
        ));
    }

    #[tokio::test]
    async fn test_values_are_sealed() {
        let store = MemoryStore::new(SymmetricKey::generate());
        store.set("default", "k", b"plaintext").await.unwrap();
        let raw = store.read().unwrap()["default"]["k"].clone();
        assert_ne!(raw, b"plaintext");
    }

    #[tokio::test]
    async fn test_close() {
        let store = MemoryStore::new(SymmetricKey::generate());
        store.close().await.unwrap();
        assert!(matches!(store.list("*", "").await, Err(StoreError::Closed)));
    }
}
