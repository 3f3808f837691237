//! Key-value persistence
//!
//! The narrow byte-level interface every schema store and the archive sit on.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Byte-level key-value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value, replacing any existing one
    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Write a value only if the key is absent
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] when the key is taken. The existing value
    /// is left untouched.
    async fn put_new(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// All keys starting with `prefix`, sorted
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Check key presence
    async fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

/// In-memory backend
///
/// Backs tests and ephemeral sessions. `put_new` is atomic through the map's
/// entry API.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn put_new(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
