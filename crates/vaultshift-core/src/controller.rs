//! Integration controller
//!
//! Owns the migration state machine and is the only entry point the rest of
//! the application uses:
//! - Startup detection of which schema holds data
//! - Readiness assessment through the [`ValidationEngine`]
//! - Big-bang migration on a background task, with archiving
//! - Emergency rollback to the legacy schema
//! - A mode-agnostic CRUD facade over the [`DataModeRouter`]
//!
//! # Concurrency
//!
//! State lives in one [`IntegrationSnapshot`] behind a `watch` channel, so
//! mode, status and progress are always read together. Assessment, migration
//! and rollback share an operation lock that is tried, never waited on. CRUD
//! holds the read side of a transition barrier; entering `Migrating` and the
//! rollback switch take the write side.

use crate::archive::ArchiveStore;
use crate::clock::{Clock, SystemClock};
use crate::config::{ArchivePolicy, IntegrationConfig};
use crate::error::{ExecutorError, IntegrationError};
use crate::executor::{MigrationExecutor, ProgressSink};
use crate::router::DataModeRouter;
use crate::state_machine::validate_transition;
use crate::types::{
    ArchiveOutcome, DataMode, IntegrationSnapshot, IntegrationStatus, MigrationAssessment,
    MigrationId, MigrationProgress, MigrationReport, UnifiedUserData,
};
use crate::validation::ValidationEngine;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use vaultshift_model::{Account, LedgerBook, LegacyRecord, Transaction};
use vaultshift_store::{json_stores, KeyValueStore, LegacyStore, PrivacyStore};

/// External collaborators the controller is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub legacy: Arc<dyn LegacyStore>,
    pub privacy: Arc<dyn PrivacyStore>,
    /// Backend for write-once archive snapshots
    pub archive: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    #[must_use]
    pub fn new(
        legacy: Arc<dyn LegacyStore>,
        privacy: Arc<dyn PrivacyStore>,
        archive: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            legacy,
            privacy,
            archive,
            clock: Arc::new(SystemClock),
        }
    }

    /// JSON schema stores and the archive, all over one backend
    #[must_use]
    pub fn over(kv: Arc<dyn KeyValueStore>, config: &IntegrationConfig) -> Self {
        let (legacy, privacy) = json_stores(Arc::clone(&kv), &config.keys);
        Self::new(Arc::new(legacy), Arc::new(privacy), kv)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

struct ControllerInner {
    config: IntegrationConfig,
    state: watch::Sender<IntegrationSnapshot>,
    /// Held by assess, migrate and rollback
    op_lock: Arc<Mutex<()>>,
    /// CRUD read side, mode switches write side
    barrier: RwLock<()>,
    validator: ValidationEngine,
    executor: MigrationExecutor,
    router: DataModeRouter,
    archive: ArchiveStore,
    legacy: Arc<dyn LegacyStore>,
    privacy: Arc<dyn PrivacyStore>,
    clock: Arc<dyn Clock>,
}

impl ControllerInner {
    fn current(&self) -> IntegrationSnapshot {
        self.state.borrow().clone()
    }

    fn status(&self) -> IntegrationStatus {
        self.state.borrow().status
    }

    /// Move to `to` and apply `update`, as one snapshot replacement
    fn transition(
        &self,
        to: IntegrationStatus,
        update: impl FnOnce(&mut IntegrationSnapshot),
    ) -> Result<(), IntegrationError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|snapshot| {
            let from = snapshot.status;
            if let Err(e) = validate_transition(from, to) {
                outcome = Err(e);
                return false;
            }
            snapshot.status = to;
            update(snapshot);
            tracing::info!(from = ?from, to = ?to, mode = %snapshot.mode, "status transition");
            true
        });
        outcome
    }

    fn not_ready(&self, operation: &'static str) -> IntegrationError {
        let status = self.status();
        tracing::warn!(operation, status = ?status, "operation rejected");
        IntegrationError::NotReady { operation, status }
    }
}

impl ProgressSink for ControllerInner {
    fn report(&self, step: &str, fraction: f64) {
        let progress = MigrationProgress::new(step, fraction, self.clock.now());
        tracing::debug!(step, progress = progress.progress, "migration progress");
        self.state.send_if_modified(|snapshot| {
            if snapshot.mode != DataMode::Migrating {
                return false;
            }
            snapshot.progress = Some(progress);
            true
        });
    }
}

/// An accepted migration run
///
/// Owns the operation lock for the run. Dropped without being settled (the
/// task panicked or was aborted), it fails the migration so the controller
/// cannot stay in `Migrating`.
struct MigrationTicket {
    inner: Arc<ControllerInner>,
    id: MigrationId,
    started_at: DateTime<Utc>,
    settled: bool,
    _op: OwnedMutexGuard<()>,
}

impl MigrationTicket {
    fn complete(mut self, report: &MigrationReport) -> Result<(), IntegrationError> {
        let result = self.inner.transition(IntegrationStatus::MigrationCompleted, |s| {
            s.mode = DataMode::PrivacyFirst;
            s.progress = None;
            s.assessment.recommended = false;
            s.archive_key = report.archive_key().map(str::to_string);
        });
        if result.is_ok() {
            self.settled = true;
            tracing::info!(
                migration = %report.id,
                transactions = report.transaction_count,
                accounts = report.account_count,
                degraded = report.is_degraded(),
                "migration completed"
            );
        }
        result
    }

    fn fail(mut self, err: IntegrationError) -> IntegrationError {
        tracing::error!(migration = %self.id, error = %err, "migration failed");
        self.resolve_failed(err.to_string());
        self.settled = true;
        err
    }

    fn resolve_failed(&self, message: String) {
        let result = self.inner.transition(IntegrationStatus::MigrationFailed, |s| {
            s.mode = DataMode::Legacy;
            s.progress = None;
            s.last_error = Some(message);
        });
        if let Err(e) = result {
            tracing::error!(migration = %self.id, error = %e, "could not record migration failure");
        }
    }
}

impl Drop for MigrationTicket {
    fn drop(&mut self) {
        if !self.settled {
            tracing::error!(migration = %self.id, "migration task ended without reporting");
            self.resolve_failed("migration task ended without reporting".to_string());
        }
    }
}

/// The migration controller
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct IntegrationController {
    inner: Arc<ControllerInner>,
}

impl IntegrationController {
    /// Wire a controller and run the startup assessment
    ///
    /// If a privacy-first record exists the controller starts in
    /// `PrivacyFirst`/`MigrationCompleted`; else if a legacy record exists in
    /// `Legacy`/`PendingMigration`; else in `Legacy`/`NoData`.
    ///
    /// # Errors
    /// Invalid configuration, or a store failure during detection.
    pub async fn new(
        config: IntegrationConfig,
        collaborators: Collaborators,
    ) -> Result<Self, IntegrationError> {
        config.validate()?;

        let Collaborators {
            legacy,
            privacy,
            archive,
            clock,
        } = collaborators;

        let (state, _) = watch::channel(IntegrationSnapshot::default());
        let inner = Arc::new(ControllerInner {
            validator: ValidationEngine::new(&config),
            executor: MigrationExecutor::new(Arc::clone(&legacy), Arc::clone(&privacy)),
            router: DataModeRouter::new(Arc::clone(&legacy), Arc::clone(&privacy)),
            archive: ArchiveStore::new(
                archive,
                config.archive_prefix.clone(),
                config.max_archive_suffix,
            ),
            config,
            state,
            op_lock: Arc::new(Mutex::new(())),
            barrier: RwLock::new(()),
            legacy,
            privacy,
            clock,
        });

        let mut archive_key = None;
        let (mode, status) = if inner.privacy.exists().await? {
            archive_key = match inner.archive.pinned_source().await {
                Ok(key) => key,
                Err(e) => {
                    tracing::warn!(error = %e, "could not read archived source marker");
                    None
                }
            };
            (DataMode::PrivacyFirst, IntegrationStatus::MigrationCompleted)
        } else if inner.legacy.load().await?.is_some() {
            (DataMode::Legacy, IntegrationStatus::PendingMigration)
        } else {
            (DataMode::Legacy, IntegrationStatus::NoData)
        };
        inner.transition(status, |s| {
            s.mode = mode;
            s.archive_key = archive_key;
        })?;

        Ok(Self { inner })
    }

    /// Consistent copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> IntegrationSnapshot {
        self.inner.current()
    }

    /// Observe every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<IntegrationSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn data_mode(&self) -> DataMode {
        self.inner.state.borrow().mode
    }

    #[must_use]
    pub fn status(&self) -> IntegrationStatus {
        self.inner.status()
    }

    /// Progress of the in-flight migration, if any
    #[must_use]
    pub fn progress(&self) -> Option<MigrationProgress> {
        self.inner.state.borrow().progress.clone()
    }

    /// Result of the last assessment
    #[must_use]
    pub fn migration_assessment(&self) -> MigrationAssessment {
        self.inner.state.borrow().assessment.clone()
    }

    #[must_use]
    pub fn config(&self) -> &IntegrationConfig {
        &self.inner.config
    }

    /// Archive of pre-migration snapshots
    #[must_use]
    pub fn archive(&self) -> &ArchiveStore {
        &self.inner.archive
    }

    /// (Re)assess migration readiness
    ///
    /// No legacy record: `NoLegacyData`. Blocking findings: `ValidationFailed`.
    /// Otherwise `Ready`. Repeating the call without a data change gives the
    /// same status and findings.
    ///
    /// # Errors
    /// `NotReady` if another operation holds the controller or the status
    /// does not allow assessment; store read failure.
    pub async fn assess_migration_readiness(&self) -> Result<MigrationAssessment, IntegrationError> {
        let _op = self
            .inner
            .op_lock
            .try_lock()
            .map_err(|_| self.inner.not_ready("assess migration readiness"))?;

        if !self.inner.status().allows_assessment() {
            return Err(self.inner.not_ready("assess migration readiness"));
        }

        let Some(record) = self.inner.legacy.load().await? else {
            let assessment = MigrationAssessment::default();
            self.inner.transition(IntegrationStatus::NoLegacyData, |s| {
                s.assessment = assessment.clone();
            })?;
            return Ok(assessment);
        };

        let issues = self.inner.validator.validate(&record);
        let assessment = MigrationAssessment {
            recommended: !ValidationEngine::is_blocking(&issues),
            issues,
        };
        let next = if assessment.recommended {
            IntegrationStatus::Ready
        } else {
            IntegrationStatus::ValidationFailed
        };
        self.inner.transition(next, |s| {
            s.assessment = assessment.clone();
        })?;

        tracing::info!(
            issues = assessment.issues.len(),
            critical = assessment.critical_count(),
            recommended = assessment.recommended,
            "assessed migration readiness"
        );
        Ok(assessment)
    }

    /// Run the big-bang migration to the privacy-first schema
    ///
    /// Requires status `Ready`. The legacy record is validated again before
    /// the mode switch, since CRUD may have changed it after the assessment.
    /// The work runs on a spawned task, which finishes even if this future is
    /// dropped.
    ///
    /// # Errors
    /// Without any state change: `NotReady` if the status is not `Ready` or
    /// another operation is running, `ValidationBlocked` if the current record
    /// has critical findings, or a failure to read it. Otherwise the executor's error, or the
    /// archive error under [`ArchivePolicy::Required`]; the controller is then
    /// in `Legacy`/`MigrationFailed`.
    pub async fn execute_big_bang_migration(&self) -> Result<MigrationReport, IntegrationError> {
        let op = Arc::clone(&self.inner.op_lock)
            .try_lock_owned()
            .map_err(|_| self.inner.not_ready("execute migration"))?;

        if self.inner.status() != IntegrationStatus::Ready {
            return Err(self.inner.not_ready("execute migration"));
        }

        let id = MigrationId::new();
        let started_at = self.inner.clock.now();
        {
            let _barrier = self.inner.barrier.write().await;

            let source = self.inner.executor.load_source().await?;
            let issues = self.inner.validator.validate(&source);
            let assessment = MigrationAssessment {
                recommended: !ValidationEngine::is_blocking(&issues),
                issues,
            };
            if !assessment.recommended {
                let critical = assessment.critical_count();
                tracing::warn!(critical, "legacy record changed since assessment, migration blocked");
                return Err(IntegrationError::ValidationBlocked { critical });
            }

            self.inner.transition(IntegrationStatus::Migrating, |s| {
                s.mode = DataMode::Migrating;
                s.progress = Some(MigrationProgress::new("Initializing", 0.0, started_at));
                s.assessment = assessment;
                s.last_error = None;
                s.archive_key = None;
            })?;
        }
        tracing::info!(migration = %id, policy = ?self.inner.config.archive_policy, "migration started");

        let ticket = MigrationTicket {
            inner: Arc::clone(&self.inner),
            id,
            started_at,
            settled: false,
            _op: op,
        };
        match tokio::spawn(run_migration(ticket)).await {
            Ok(result) => result,
            Err(e) => Err(ExecutorError::Interrupted(e.to_string()).into()),
        }
    }

    /// Assess, then migrate if nothing blocks
    ///
    /// # Errors
    /// `ValidationBlocked` with the critical count if the assessment blocks,
    /// `NotReady` if there is no legacy data; otherwise as
    /// [`Self::execute_big_bang_migration`].
    pub async fn assess_and_migrate(&self) -> Result<MigrationReport, IntegrationError> {
        let assessment = self.assess_migration_readiness().await?;
        if !assessment.recommended {
            let critical = assessment.critical_count();
            if critical == 0 {
                return Err(self.inner.not_ready("execute migration"));
            }
            tracing::warn!(critical, "migration blocked by validation");
            return Err(IntegrationError::ValidationBlocked { critical });
        }
        self.execute_big_bang_migration().await
    }

    /// Emergency rollback to the legacy schema
    ///
    /// Rebuilds the legacy record from the privacy-first records, taking the
    /// fields the split dropped from the snapshot archived by the migration
    /// that produced them. A degraded migration has no snapshot, and the
    /// rebuild then uses the privacy-first records alone. On success
    /// the controller is `Legacy`/`Ready` with a fresh assessment of the
    /// rebuilt record.
    ///
    /// # Errors
    /// `NotReady` unless the status is `MigrationCompleted` and no other
    /// operation is running. Executor errors leave the state unchanged.
    pub async fn rollback_to_legacy(&self) -> Result<LegacyRecord, IntegrationError> {
        let _op = self
            .inner
            .op_lock
            .try_lock()
            .map_err(|_| self.inner.not_ready("rollback"))?;

        if self.inner.status() != IntegrationStatus::MigrationCompleted {
            return Err(self.inner.not_ready("rollback"));
        }

        let _barrier = self.inner.barrier.write().await;

        let archived = match self.inner.current().archive_key {
            Some(key) => match self.inner.archive.load(&key).await {
                Ok(Some(record)) => {
                    tracing::info!(key = %key, "rolling back with archived snapshot");
                    Some(record)
                }
                Ok(None) => {
                    tracing::warn!(key = %key, "archived snapshot missing, rolling back without it");
                    None
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "archive unavailable, rolling back without it");
                    None
                }
            },
            None => {
                tracing::info!("no archived snapshot for this migration");
                None
            }
        };

        let rebuilt = self
            .inner
            .executor
            .rollback(archived.as_ref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "rollback failed, state unchanged");
                IntegrationError::from(e)
            })?;

        let issues = self.inner.validator.validate(&rebuilt);
        let assessment = MigrationAssessment {
            recommended: !ValidationEngine::is_blocking(&issues),
            issues,
        };
        if let Err(e) = self.inner.archive.pin_source(None).await {
            tracing::warn!(error = %e, "could not clear archived source marker");
        }
        self.inner.transition(IntegrationStatus::Ready, |s| {
            s.mode = DataMode::Legacy;
            s.progress = None;
            s.assessment = assessment;
            s.archive_key = None;
        })?;

        Ok(rebuilt)
    }

    /// Unified view of the active record
    ///
    /// # Errors
    /// Store read failure.
    pub async fn current_user_data(&self) -> Result<Option<UnifiedUserData>, IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        Ok(self.inner.router.user_data(self.data_mode()).await?)
    }

    /// # Errors
    /// Store read failure.
    pub async fn total_balance(&self) -> Result<f64, IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        Ok(self.inner.router.total_balance(self.data_mode()).await?)
    }

    /// # Errors
    /// Store read failure.
    pub async fn transactions(&self) -> Result<Vec<Transaction>, IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        Ok(self.inner.router.transactions(self.data_mode()).await?)
    }

    /// # Errors
    /// Store read failure.
    pub async fn accounts(&self) -> Result<Vec<Account>, IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        Ok(self.inner.router.accounts(self.data_mode()).await?)
    }

    /// # Errors
    /// `MigrationInProgress` while migrating; ledger or store failure.
    pub async fn add_transaction(&self, transaction: Transaction) -> Result<(), IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        let mode = self.writable_mode("add transaction")?;
        Ok(self.inner.router.add_transaction(mode, transaction).await?)
    }

    /// # Errors
    /// `MigrationInProgress` while migrating; ledger or store failure.
    pub async fn update_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<(), IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        let mode = self.writable_mode("update transaction")?;
        Ok(self.inner.router.update_transaction(mode, transaction).await?)
    }

    /// # Errors
    /// `MigrationInProgress` while migrating; ledger or store failure.
    pub async fn remove_transaction(&self, id: &str) -> Result<Transaction, IntegrationError> {
        let _barrier = self.inner.barrier.read().await;
        let mode = self.writable_mode("remove transaction")?;
        Ok(self.inner.router.remove_transaction(mode, id).await?)
    }

    fn writable_mode(&self, operation: &'static str) -> Result<DataMode, IntegrationError> {
        match self.data_mode() {
            DataMode::Migrating => {
                tracing::warn!(operation, "rejected: migration in progress");
                Err(IntegrationError::MigrationInProgress)
            }
            mode => Ok(mode),
        }
    }
}

impl std::fmt::Debug for IntegrationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationController")
            .field("snapshot", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn run_migration(ticket: MigrationTicket) -> Result<MigrationReport, IntegrationError> {
    let inner = Arc::clone(&ticket.inner);

    let mut archived = None;
    if inner.config.archive_policy == ArchivePolicy::Required {
        inner.report("Archiving legacy snapshot", 0.05);
        let source = match inner.executor.load_source().await {
            Ok(source) => source,
            Err(e) => return Err(ticket.fail(e.into())),
        };
        match inner.archive.archive(&source, ticket.started_at).await {
            Ok(key) => archived = Some(ArchiveOutcome::Archived { key }),
            Err(e) => return Err(ticket.fail(e.into())),
        }
    }

    let commit = match inner.executor.migrate(inner.as_ref()).await {
        Ok(commit) => commit,
        Err(e) => return Err(ticket.fail(e.into())),
    };

    let archive = match archived {
        Some(outcome) => outcome,
        None => {
            inner.report("Archiving legacy snapshot", 0.95);
            match inner.archive.archive(&commit.source, ticket.started_at).await {
                Ok(key) => ArchiveOutcome::Archived { key },
                Err(e) => {
                    tracing::warn!(migration = %ticket.id, error = %e, "archive failed, migration degraded");
                    ArchiveOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        }
    };

    let pinned = match &archive {
        ArchiveOutcome::Archived { key } => Some(key.as_str()),
        ArchiveOutcome::Failed { .. } => None,
    };
    if let Err(e) = inner.archive.pin_source(pinned).await {
        tracing::warn!(migration = %ticket.id, error = %e, "could not record archived source");
    }

    let report = MigrationReport {
        id: ticket.id,
        started_at: ticket.started_at,
        completed_at: inner.clock.now(),
        balance: commit.financial.balance(),
        transaction_count: commit.financial.transaction_count(),
        account_count: commit.financial.account_count(),
        archive,
    };
    ticket.complete(&report)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultshift_store::MemoryStore;

    async fn controller_over(kv: Arc<MemoryStore>) -> IntegrationController {
        let config = IntegrationConfig::default();
        let collaborators = Collaborators::over(kv, &config);
        IntegrationController::new(config, collaborators).await.unwrap()
    }

    #[tokio::test]
    async fn empty_store_starts_with_no_data() {
        let controller = controller_over(Arc::new(MemoryStore::new())).await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.mode, DataMode::Legacy);
        assert_eq!(snapshot.status, IntegrationStatus::NoData);
        assert!(snapshot.progress.is_none());
    }

    #[tokio::test]
    async fn assessment_without_legacy_data() {
        let controller = controller_over(Arc::new(MemoryStore::new())).await;

        let assessment = controller.assess_migration_readiness().await.unwrap();
        assert!(!assessment.recommended);
        assert_eq!(controller.status(), IntegrationStatus::NoLegacyData);

        let err = controller.assess_and_migrate().await.unwrap_err();
        assert!(matches!(err, IntegrationError::NotReady { .. }));
    }

    #[tokio::test]
    async fn execute_before_assessment_is_rejected_without_change() {
        let kv = Arc::new(MemoryStore::new());
        let config = IntegrationConfig::default();
        let (legacy, _) = json_stores(kv.clone(), &config.keys);
        legacy
            .save(&LegacyRecord::new("Ada", "ada@example.com", "EUR"))
            .await
            .unwrap();

        let controller = controller_over(kv).await;
        let before = controller.snapshot();
        assert_eq!(before.status, IntegrationStatus::PendingMigration);

        let err = controller.execute_big_bang_migration().await.unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::NotReady {
                status: IntegrationStatus::PendingMigration,
                ..
            }
        ));
        assert_eq!(controller.snapshot(), before);
    }

    #[tokio::test]
    async fn rollback_requires_completed_migration() {
        let controller = controller_over(Arc::new(MemoryStore::new())).await;

        let err = controller.rollback_to_legacy().await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(controller.data_mode(), DataMode::Legacy);
    }

    #[tokio::test]
    async fn progress_is_ignored_outside_migration() {
        let controller = controller_over(Arc::new(MemoryStore::new())).await;

        controller.inner.report("stray", 0.5);
        assert!(controller.progress().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let kv = Arc::new(MemoryStore::new());
        let config = IntegrationConfig::default();
        let (legacy, _) = json_stores(kv.clone(), &config.keys);
        legacy
            .save(&LegacyRecord::new("Ada", "ada@example.com", "EUR"))
            .await
            .unwrap();
        let controller = controller_over(kv).await;
        let mut rx = controller.subscribe();

        controller.assess_migration_readiness().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().status, IntegrationStatus::Ready);
    }
}
