//! Data-mode router
//!
//! Sends reads and writes to whichever schema the mode names. Both schemas
//! implement [`LedgerBook`], so a mutation means the same thing in either
//! mode. While migrating, reads see an empty ledger and writes are refused.

use crate::error::RouterError;
use crate::types::{DataMode, UnifiedUserData};
use std::sync::Arc;
use tokio::sync::Mutex;
use vaultshift_model::{Account, LedgerBook, Transaction};
use vaultshift_store::{LegacyStore, PrivacyStore};

/// Mode-keyed access to the active schema
pub struct DataModeRouter {
    legacy: Arc<dyn LegacyStore>,
    privacy: Arc<dyn PrivacyStore>,
    /// Serializes load-modify-save cycles
    write_lock: Mutex<()>,
}

impl DataModeRouter {
    #[must_use]
    pub fn new(legacy: Arc<dyn LegacyStore>, privacy: Arc<dyn PrivacyStore>) -> Self {
        Self {
            legacy,
            privacy,
            write_lock: Mutex::new(()),
        }
    }

    /// Unified projection of the active record, `None` if there is none
    ///
    /// # Errors
    /// Store read failure.
    pub async fn user_data(&self, mode: DataMode) -> Result<Option<UnifiedUserData>, RouterError> {
        match mode {
            DataMode::Legacy => Ok(self.legacy.load().await?.map(|record| UnifiedUserData {
                mode,
                total_balance: record.balance(),
                transaction_count: record.transaction_count(),
                account_count: record.account_count(),
                name: record.name,
                email: record.email,
            })),
            DataMode::PrivacyFirst => {
                let Some(financial) = self.privacy.load_financial().await? else {
                    return Ok(None);
                };
                let profile = self.privacy.load_profile().await?.unwrap_or_default();
                Ok(Some(UnifiedUserData {
                    mode,
                    name: profile.name,
                    email: profile.email,
                    total_balance: financial.balance(),
                    transaction_count: financial.transaction_count(),
                    account_count: financial.account_count(),
                }))
            }
            DataMode::Migrating => Ok(None),
        }
    }

    /// # Errors
    /// Store read failure.
    pub async fn total_balance(&self, mode: DataMode) -> Result<f64, RouterError> {
        Ok(match mode {
            DataMode::Legacy => self.legacy.load().await?.map_or(0.0, |r| r.balance()),
            DataMode::PrivacyFirst => self
                .privacy
                .load_financial()
                .await?
                .map_or(0.0, |f| f.balance()),
            DataMode::Migrating => 0.0,
        })
    }

    /// # Errors
    /// Store read failure.
    pub async fn transactions(&self, mode: DataMode) -> Result<Vec<Transaction>, RouterError> {
        Ok(match mode {
            DataMode::Legacy => self
                .legacy
                .load()
                .await?
                .map(|r| r.transactions)
                .unwrap_or_default(),
            DataMode::PrivacyFirst => self
                .privacy
                .load_financial()
                .await?
                .map(|f| f.transactions)
                .unwrap_or_default(),
            DataMode::Migrating => Vec::new(),
        })
    }

    /// # Errors
    /// Store read failure.
    pub async fn accounts(&self, mode: DataMode) -> Result<Vec<Account>, RouterError> {
        Ok(match mode {
            DataMode::Legacy => self
                .legacy
                .load()
                .await?
                .map(|r| r.accounts)
                .unwrap_or_default(),
            DataMode::PrivacyFirst => self
                .privacy
                .load_financial()
                .await?
                .map(|f| f.accounts)
                .unwrap_or_default(),
            DataMode::Migrating => Vec::new(),
        })
    }

    /// Append a transaction and post its amount
    ///
    /// # Errors
    /// `MigrationInProgress` while migrating, `NoRecord` if the active schema
    /// is empty, a ledger rule violation, or a store failure.
    pub async fn add_transaction(
        &self,
        mode: DataMode,
        transaction: Transaction,
    ) -> Result<(), RouterError> {
        self.mutate(mode, move |book| book.add_transaction(transaction))
            .await
    }

    /// Replace a transaction by id and repost the difference
    ///
    /// # Errors
    /// As [`Self::add_transaction`], plus an unknown id.
    pub async fn update_transaction(
        &self,
        mode: DataMode,
        transaction: Transaction,
    ) -> Result<(), RouterError> {
        self.mutate(mode, move |book| book.update_transaction(transaction))
            .await
    }

    /// Remove a transaction by id and reverse its amount
    ///
    /// # Errors
    /// As [`Self::add_transaction`], plus an unknown id.
    pub async fn remove_transaction(
        &self,
        mode: DataMode,
        id: &str,
    ) -> Result<Transaction, RouterError> {
        self.mutate(mode, |book| book.remove_transaction(id)).await
    }

    /// Load, apply, save under the write lock
    ///
    /// Nothing is saved when `op` fails.
    async fn mutate<T, F>(&self, mode: DataMode, op: F) -> Result<T, RouterError>
    where
        F: FnOnce(&mut dyn LedgerBook) -> Result<T, vaultshift_model::LedgerError>,
    {
        let _guard = self.write_lock.lock().await;

        match mode {
            DataMode::Legacy => {
                let mut record = self
                    .legacy
                    .load()
                    .await?
                    .ok_or(RouterError::NoRecord(mode))?;
                let out = op(&mut record)?;
                self.legacy.save(&record).await?;
                Ok(out)
            }
            DataMode::PrivacyFirst => {
                let mut financial = self
                    .privacy
                    .load_financial()
                    .await?
                    .ok_or(RouterError::NoRecord(mode))?;
                let out = op(&mut financial)?;
                self.privacy.save_financial(&financial).await?;
                Ok(out)
            }
            DataMode::Migrating => Err(RouterError::MigrationInProgress),
        }
    }
}

impl std::fmt::Debug for DataModeRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModeRouter").finish_non_exhaustive()
    }
}
