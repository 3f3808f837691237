//! Migration executor
//!
//! Forward: split the legacy aggregate into a profile and a financial record
//! and commit both, or neither. Inverse: rebuild a legacy aggregate from the
//! privacy-first records, write it back and retire the split records.
//!
//! The stores have no multi-key transactions, so both directions snapshot
//! what they are about to replace and put it back if a later write fails.

use crate::error::ExecutorError;
use std::sync::Arc;
use vaultshift_model::{FinancialData, LedgerBook, LegacyRecord, UserProfile};
use vaultshift_store::{LegacyStore, PrivacyStore, StoreError};

/// Receives progress from the executor
pub trait ProgressSink: Send + Sync {
    fn report(&self, step: &str, fraction: f64);
}

/// Sink that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _step: &str, _fraction: f64) {}
}

/// Records committed by a forward migration
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationCommit {
    /// Legacy record the split was built from
    pub source: LegacyRecord,
    pub profile: UserProfile,
    pub financial: FinancialData,
}

/// Split a legacy aggregate into its privacy-first records
///
/// `extra` has no counterpart and is dropped; validation reports it first.
#[must_use]
pub fn split(record: &LegacyRecord) -> (UserProfile, FinancialData) {
    let profile = UserProfile {
        name: record.name.clone(),
        email: record.email.clone(),
        created_at: record.created_at,
    };
    let financial = FinancialData {
        currency: record.currency.clone(),
        balance: record.balance,
        transactions: record.transactions.clone(),
        accounts: record.accounts.clone(),
    };
    (profile, financial)
}

/// Rebuild a legacy aggregate from privacy-first records
///
/// Ledger data comes from `financial`. Fields the split dropped are taken
/// from `archived` when a snapshot is available.
#[must_use]
pub fn reassemble(
    profile: &UserProfile,
    financial: &FinancialData,
    archived: Option<&LegacyRecord>,
) -> LegacyRecord {
    LegacyRecord {
        name: profile.name.clone(),
        email: profile.email.clone(),
        currency: financial.currency.clone(),
        balance: financial.balance,
        transactions: financial.transactions.clone(),
        accounts: financial.accounts.clone(),
        created_at: profile
            .created_at
            .or_else(|| archived.and_then(|a| a.created_at)),
        extra: archived.map(|a| a.extra.clone()).unwrap_or_default(),
    }
}

/// Performs the schema transformation and its inverse
#[derive(Clone)]
pub struct MigrationExecutor {
    legacy: Arc<dyn LegacyStore>,
    privacy: Arc<dyn PrivacyStore>,
}

impl MigrationExecutor {
    #[must_use]
    pub fn new(legacy: Arc<dyn LegacyStore>, privacy: Arc<dyn PrivacyStore>) -> Self {
        Self { legacy, privacy }
    }

    /// Load the legacy aggregate to migrate
    ///
    /// # Errors
    /// [`ExecutorError::NoSourceData`] if there is none.
    pub async fn load_source(&self) -> Result<LegacyRecord, ExecutorError> {
        self.legacy
            .load()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?
            .ok_or_else(|| ExecutorError::NoSourceData("no legacy record to migrate".to_string()))
    }

    /// Forward migration
    ///
    /// # Errors
    /// Missing source, read or write failure, or a read-back mismatch. On
    /// error the privacy-first records are as they were before the call.
    pub async fn migrate(&self, progress: &dyn ProgressSink) -> Result<MigrationCommit, ExecutorError> {
        progress.report("Loading legacy data", 0.1);
        let source = self.load_source().await?;

        progress.report("Building privacy-first records", 0.3);
        let (profile, financial) = split(&source);

        let previous_profile = self
            .privacy
            .load_profile()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?;
        let previous_financial = self
            .privacy
            .load_financial()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?;

        progress.report("Writing profile", 0.5);
        if let Err(e) = self.privacy.save_profile(&profile).await {
            tracing::error!(error = %e, "profile write failed");
            self.restore_privacy(previous_profile.as_ref(), None).await;
            return Err(ExecutorError::from_write(&e));
        }

        progress.report("Writing financial data", 0.7);
        if let Err(e) = self.privacy.save_financial(&financial).await {
            tracing::error!(error = %e, "financial data write failed");
            self.restore_privacy(previous_profile.as_ref(), Some(previous_financial.as_ref()))
                .await;
            return Err(ExecutorError::from_write(&e));
        }

        progress.report("Verifying", 0.9);
        if let Err(e) = self.verify(&financial).await {
            self.restore_privacy(previous_profile.as_ref(), Some(previous_financial.as_ref()))
                .await;
            return Err(e);
        }

        Ok(MigrationCommit {
            source,
            profile,
            financial,
        })
    }

    /// Inverse migration
    ///
    /// Rebuilds the legacy record, writes it, then deletes the privacy-first
    /// records. Returns the legacy record now in place.
    ///
    /// # Errors
    /// [`ExecutorError::NoSourceData`] when there is no financial record, or
    /// when there is no profile and no archived snapshot to take identity
    /// from. On any error both schemas are as they were before the call.
    pub async fn rollback(
        &self,
        archived: Option<&LegacyRecord>,
    ) -> Result<LegacyRecord, ExecutorError> {
        let financial = self
            .privacy
            .load_financial()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?
            .ok_or_else(|| {
                ExecutorError::NoSourceData("no privacy-first financial data to roll back".into())
            })?;
        let profile = match self
            .privacy
            .load_profile()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?
        {
            Some(profile) => profile,
            None => archived.map(|a| split(a).0).ok_or_else(|| {
                ExecutorError::NoSourceData("no profile and no archived snapshot".into())
            })?,
        };

        let rebuilt = reassemble(&profile, &financial, archived);
        let previous_legacy = self
            .legacy
            .load()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?;

        self.legacy
            .save(&rebuilt)
            .await
            .map_err(|e| ExecutorError::from_write(&e))?;

        if let Err(e) = self.privacy.delete_financial().await {
            self.restore_legacy(previous_legacy.as_ref()).await;
            return Err(ExecutorError::from_write(&e));
        }
        if let Err(e) = self.privacy.delete_profile().await {
            if let Err(restore) = self.privacy.save_financial(&financial).await {
                tracing::error!(error = %restore, "could not restore financial data after failed rollback");
            }
            self.restore_legacy(previous_legacy.as_ref()).await;
            return Err(ExecutorError::from_write(&e));
        }

        tracing::info!(
            transactions = rebuilt.transaction_count(),
            accounts = rebuilt.account_count(),
            restored_fields = rebuilt.extra.len(),
            "rebuilt legacy record"
        );
        Ok(rebuilt)
    }

    async fn verify(&self, expected: &FinancialData) -> Result<(), ExecutorError> {
        let stored = self
            .privacy
            .load_financial()
            .await
            .map_err(|e| ExecutorError::from_read(&e))?;
        match stored {
            Some(stored) if &stored == expected => Ok(()),
            Some(stored) => Err(ExecutorError::WriteFailure(format!(
                "read-back mismatch: wrote {} transactions / balance {}, found {} / {}",
                expected.transaction_count(),
                expected.balance,
                stored.transaction_count(),
                stored.balance
            ))),
            None => Err(ExecutorError::WriteFailure(
                "financial data missing after write".to_string(),
            )),
        }
    }

    /// Put privacy-first records back to their pre-call state
    ///
    /// `financial` is `None` when the financial record was never touched.
    async fn restore_privacy(
        &self,
        profile: Option<&UserProfile>,
        financial: Option<Option<&FinancialData>>,
    ) {
        let profile_result = match profile {
            Some(p) => self.privacy.save_profile(p).await,
            None => self.privacy.delete_profile().await,
        };
        log_restore("profile", profile_result);

        if let Some(financial) = financial {
            let financial_result = match financial {
                Some(f) => self.privacy.save_financial(f).await,
                None => self.privacy.delete_financial().await,
            };
            log_restore("financial data", financial_result);
        }
    }

    async fn restore_legacy(&self, previous: Option<&LegacyRecord>) {
        let result = match previous {
            Some(record) => self.legacy.save(record).await,
            None => self.legacy.clear().await,
        };
        log_restore("legacy record", result);
    }
}

fn log_restore(what: &str, result: Result<(), StoreError>) {
    match result {
        Ok(()) => tracing::warn!(record = what, "restored after failed write"),
        Err(e) => tracing::error!(record = what, error = %e, "restore after failed write also failed"),
    }
}

impl std::fmt::Debug for MigrationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationExecutor").finish_non_exhaustive()
    }
}
