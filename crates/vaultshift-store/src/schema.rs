//! Schema stores
//!
//! [`LegacyStore`] and [`PrivacyStore`] are the collaborators the migration
//! core talks to. The JSON implementations encode records with `serde_json`
//! over any [`KeyValueStore`].

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vaultshift_model::{FinancialData, LegacyRecord, UserProfile};

/// Storage keys for both schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    /// Legacy aggregate record
    pub legacy: String,
    /// Privacy-first profile record
    pub profile: String,
    /// Privacy-first financial record
    pub financial: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            legacy: "legacy.userData".to_string(),
            profile: "privacy.userProfile".to_string(),
            financial: "privacy.financialData".to_string(),
        }
    }
}

/// Legacy aggregate persistence
#[async_trait]
pub trait LegacyStore: Send + Sync {
    async fn load(&self) -> StoreResult<Option<LegacyRecord>>;
    async fn save(&self, record: &LegacyRecord) -> StoreResult<()>;
    async fn clear(&self) -> StoreResult<()>;
}

/// Privacy-first split persistence
///
/// The two records are independent keys; callers that need both-or-neither
/// semantics compensate themselves.
#[async_trait]
pub trait PrivacyStore: Send + Sync {
    async fn load_profile(&self) -> StoreResult<Option<UserProfile>>;
    async fn load_financial(&self) -> StoreResult<Option<FinancialData>>;
    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()>;
    async fn save_financial(&self, data: &FinancialData) -> StoreResult<()>;
    async fn delete_profile(&self) -> StoreResult<()>;
    async fn delete_financial(&self) -> StoreResult<()>;

    /// Whether any privacy-first record is present
    async fn exists(&self) -> StoreResult<bool> {
        Ok(self.load_profile().await?.is_some() || self.load_financial().await?.is_some())
    }
}

async fn read_json<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match kv.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::serialization(key, &e)),
        None => Ok(None),
    }
}

async fn write_json<T: Serialize + Sync>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::serialization(key, &e))?;
    kv.put(key, bytes).await
}

/// [`LegacyStore`] over a key-value backend
#[derive(Clone)]
pub struct JsonLegacyStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl JsonLegacyStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }
}

impl std::fmt::Debug for JsonLegacyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLegacyStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LegacyStore for JsonLegacyStore {
    async fn load(&self) -> StoreResult<Option<LegacyRecord>> {
        read_json(self.kv.as_ref(), &self.key).await
    }

    async fn save(&self, record: &LegacyRecord) -> StoreResult<()> {
        write_json(self.kv.as_ref(), &self.key, record).await
    }

    async fn clear(&self) -> StoreResult<()> {
        self.kv.delete(&self.key).await
    }
}

/// [`PrivacyStore`] over a key-value backend
#[derive(Clone)]
pub struct JsonPrivacyStore {
    kv: Arc<dyn KeyValueStore>,
    profile_key: String,
    financial_key: String,
}

impl JsonPrivacyStore {
    #[must_use]
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        profile_key: impl Into<String>,
        financial_key: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            profile_key: profile_key.into(),
            financial_key: financial_key.into(),
        }
    }
}

impl std::fmt::Debug for JsonPrivacyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonPrivacyStore")
            .field("profile_key", &self.profile_key)
            .field("financial_key", &self.financial_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PrivacyStore for JsonPrivacyStore {
    async fn load_profile(&self) -> StoreResult<Option<UserProfile>> {
        read_json(self.kv.as_ref(), &self.profile_key).await
    }

    async fn load_financial(&self) -> StoreResult<Option<FinancialData>> {
        read_json(self.kv.as_ref(), &self.financial_key).await
    }

    async fn save_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        write_json(self.kv.as_ref(), &self.profile_key, profile).await
    }

    async fn save_financial(&self, data: &FinancialData) -> StoreResult<()> {
        write_json(self.kv.as_ref(), &self.financial_key, data).await
    }

    async fn delete_profile(&self) -> StoreResult<()> {
        self.kv.delete(&self.profile_key).await
    }

    async fn delete_financial(&self) -> StoreResult<()> {
        self.kv.delete(&self.financial_key).await
    }

    async fn exists(&self) -> StoreResult<bool> {
        Ok(self.kv.contains(&self.profile_key).await?
            || self.kv.contains(&self.financial_key).await?)
    }
}

/// Build both schema stores over one backend
#[must_use]
pub fn json_stores(
    kv: Arc<dyn KeyValueStore>,
    keys: &StorageKeys,
) -> (JsonLegacyStore, JsonPrivacyStore) {
    (
        JsonLegacyStore::new(Arc::clone(&kv), keys.legacy.clone()),
        JsonPrivacyStore::new(kv, keys.profile.clone(), keys.financial.clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use pretty_assertions::assert_eq;
    use vaultshift_model::{Account, Transaction};

    fn stores() -> (Arc<MemoryStore>, JsonLegacyStore, JsonPrivacyStore) {
        let kv = Arc::new(MemoryStore::new());
        let (legacy, privacy) = json_stores(kv.clone(), &StorageKeys::default());
        (kv, legacy, privacy)
    }

    #[tokio::test]
    async fn legacy_round_trip() {
        let (_, legacy, _) = stores();
        assert!(legacy.load().await.unwrap().is_none());

        let record = LegacyRecord::new("Ada", "ada@example.com", "EUR")
            .with_balance(5.0)
            .with_account(Account::new("acc-1", "Main", 5.0))
            .with_transaction(Transaction::new("t-1", 5.0, "gift").in_account("acc-1"));
        legacy.save(&record).await.unwrap();

        assert_eq!(legacy.load().await.unwrap(), Some(record));

        legacy.clear().await.unwrap();
        assert!(legacy.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn privacy_exists_tracks_either_record() {
        let (_, _, privacy) = stores();
        assert!(!privacy.exists().await.unwrap());

        privacy
            .save_financial(&FinancialData::new("EUR"))
            .await
            .unwrap();
        assert!(privacy.exists().await.unwrap());

        privacy.delete_financial().await.unwrap();
        assert!(!privacy.exists().await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_bytes_surface_as_serialization_error() {
        let (kv, legacy, _) = stores();
        kv.put(&StorageKeys::default().legacy, b"{not json".to_vec())
            .await
            .unwrap();

        let err = legacy.load().await.unwrap_err();
        assert!(err.is_serialization());
    }
}
