//! Write-once archive of pre-migration legacy snapshots
//!
//! Keys are `<prefix>legacy-<millis>` with `-<n>` appended on collision.
//! Existing keys are never overwritten. A separate marker under the prefix
//! names the snapshot the active privacy-first data was migrated from.

use crate::error::ArchiveError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vaultshift_model::LegacyRecord;
use vaultshift_store::{KeyValueStore, StoreError};

/// Archive of legacy snapshots over a key-value backend
#[derive(Clone)]
pub struct ArchiveStore {
    kv: Arc<dyn KeyValueStore>,
    prefix: String,
    max_suffix: u32,
}

impl ArchiveStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, prefix: impl Into<String>, max_suffix: u32) -> Self {
        Self {
            kv,
            prefix: prefix.into(),
            max_suffix,
        }
    }

    /// Base key for a timestamp
    #[must_use]
    pub fn base_key(&self, at: DateTime<Utc>) -> String {
        format!("{}legacy-{:013}", self.prefix, at.timestamp_millis().max(0))
    }

    /// Append a snapshot, returning the key it was stored under
    ///
    /// # Errors
    /// Encoding failure, backend failure, or every suffix up to the
    /// configured maximum already taken.
    pub async fn archive(
        &self,
        record: &LegacyRecord,
        at: DateTime<Utc>,
    ) -> Result<String, ArchiveError> {
        let bytes =
            serde_json::to_vec_pretty(record).map_err(|e| ArchiveError::Serialization(e.to_string()))?;
        let base = self.base_key(at);

        for attempt in 0..=self.max_suffix {
            let key = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };

            match self.kv.put_new(&key, bytes.clone()).await {
                Ok(()) => {
                    tracing::info!(key = %key, "archived legacy snapshot");
                    return Ok(key);
                }
                Err(StoreError::AlreadyExists(_)) => {
                    tracing::debug!(key = %key, "archive key taken, trying next suffix");
                }
                Err(e) => return Err(ArchiveError::Store(e)),
            }
        }

        Err(ArchiveError::KeySpaceExhausted {
            base,
            attempts: self.max_suffix + 1,
        })
    }

    /// Archive keys, oldest first
    ///
    /// # Errors
    /// Backend failure.
    pub async fn list(&self) -> Result<Vec<String>, ArchiveError> {
        let mut keys = self.kv.keys_with_prefix(&self.prefix).await?;
        keys.retain(|k| self.parse_key(k).is_some());
        keys.sort_by_key(|k| self.parse_key(k));
        Ok(keys)
    }

    /// Load one snapshot
    ///
    /// # Errors
    /// Backend failure or undecodable snapshot.
    pub async fn load(&self, key: &str) -> Result<Option<LegacyRecord>, ArchiveError> {
        match self.kv.get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ArchiveError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Record which snapshot the active migration came from, or clear it
    ///
    /// # Errors
    /// Backend failure.
    pub async fn pin_source(&self, key: Option<&str>) -> Result<(), ArchiveError> {
        let marker = self.source_marker();
        match key {
            Some(key) => self.kv.put(&marker, key.as_bytes().to_vec()).await?,
            None => self.kv.delete(&marker).await?,
        }
        Ok(())
    }

    /// Snapshot key recorded by [`Self::pin_source`]
    ///
    /// # Errors
    /// Backend failure or a marker that is not UTF-8.
    pub async fn pinned_source(&self) -> Result<Option<String>, ArchiveError> {
        match self.kv.get(&self.source_marker()).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| ArchiveError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn source_marker(&self) -> String {
        format!("{}current-source", self.prefix)
    }

    /// `(millis, suffix)` ordering for an archive key
    fn parse_key(&self, key: &str) -> Option<(i64, u32)> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix("legacy-")?;
        match rest.split_once('-') {
            Some((millis, suffix)) => Some((millis.parse().ok()?, suffix.parse().ok()?)),
            None => Some((rest.parse().ok()?, 0)),
        }
    }
}

impl std::fmt::Debug for ArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStore")
            .field("prefix", &self.prefix)
            .field("max_suffix", &self.max_suffix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vaultshift_store::MemoryStore;

    fn store(max_suffix: u32) -> ArchiveStore {
        ArchiveStore::new(Arc::new(MemoryStore::new()), "archive/", max_suffix)
    }

    fn at(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[tokio::test]
    async fn same_tick_collisions_get_suffixes() {
        let archive = store(8);
        let record = LegacyRecord::new("Ada", "ada@example.com", "EUR");

        let first = archive.archive(&record, at(1_700_000_000_000)).await.unwrap();
        let second = archive.archive(&record, at(1_700_000_000_000)).await.unwrap();
        let third = archive.archive(&record, at(1_700_000_000_000)).await.unwrap();

        assert_eq!(first, "archive/legacy-1700000000000");
        assert_eq!(second, "archive/legacy-1700000000000-1");
        assert_eq!(third, "archive/legacy-1700000000000-2");
    }

    #[tokio::test]
    async fn exhausted_suffixes_fail_without_overwriting() {
        let archive = store(1);
        let old = LegacyRecord::new("Old", "old@example.com", "EUR");
        let new = LegacyRecord::new("New", "new@example.com", "EUR");

        archive.archive(&old, at(5)).await.unwrap();
        archive.archive(&old, at(5)).await.unwrap();
        let err = archive.archive(&new, at(5)).await.unwrap_err();

        assert!(matches!(err, ArchiveError::KeySpaceExhausted { attempts: 2, .. }));
        let kept = archive.load("archive/legacy-0000000000005").await.unwrap().unwrap();
        assert_eq!(kept.name, "Old");
    }

    #[tokio::test]
    async fn list_orders_by_time_then_suffix() {
        let archive = store(8);
        let mut record = LegacyRecord::new("Ada", "ada@example.com", "EUR");

        for (millis, balance) in [(2_000, 1.0), (2_000, 2.0), (1_000, 3.0)] {
            record.balance = balance;
            archive.archive(&record, at(millis)).await.unwrap();
        }

        let keys = archive.list().await.unwrap();
        assert_eq!(
            keys,
            vec![
                "archive/legacy-0000000001000",
                "archive/legacy-0000000002000",
                "archive/legacy-0000000002000-1",
            ]
        );
        let newest = archive.load(&keys[2]).await.unwrap().unwrap();
        assert_eq!(newest.balance, 2.0);
    }

    #[tokio::test]
    async fn pinned_source_is_not_listed_and_can_be_cleared() {
        let archive = store(4);
        let record = LegacyRecord::new("Ada", "ada@example.com", "EUR");
        let key = archive.archive(&record, at(7)).await.unwrap();

        archive.pin_source(Some(&key)).await.unwrap();
        assert_eq!(archive.pinned_source().await.unwrap(), Some(key.clone()));
        assert_eq!(archive.list().await.unwrap(), vec![key]);

        archive.pin_source(None).await.unwrap();
        assert!(archive.pinned_source().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_archive_lists_nothing() {
        let archive = store(4);
        assert!(archive.list().await.unwrap().is_empty());
        assert!(archive.pinned_source().await.unwrap().is_none());
    }
}
