//! End-to-end migration scenarios over in-memory stores

use pretty_assertions::assert_eq;
use vaultshift_core::prelude::*;
use vaultshift_core::{
    ArchiveOutcome, ArchivePolicy, ExecutorError, IssueCode, ProgressSink, RouterError, Severity,
};
use vaultshift_model::{LedgerBook, LedgerError, LegacyRecord, Transaction};
use vaultshift_store::{LegacyStore, PrivacyStore};
use vaultshift_test_utils::{epoch, scenario_a_record, scenario_b_record, Harness};

#[tokio::test]
async fn scenario_a_clean_record_migrates_and_archives() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;
    assert_eq!(controller.status(), IntegrationStatus::PendingMigration);

    let assessment = controller.assess_migration_readiness().await.unwrap();
    assert!(assessment.recommended);
    assert_eq!(assessment.critical_count(), 0);
    assert_eq!(controller.status(), IntegrationStatus::Ready);

    let report = controller.execute_big_bang_migration().await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.mode, DataMode::PrivacyFirst);
    assert_eq!(snapshot.status, IntegrationStatus::MigrationCompleted);
    assert!(snapshot.progress.is_none());
    assert!(!snapshot.assessment.recommended);

    let financial = harness.privacy.load_financial().await.unwrap().unwrap();
    assert_eq!(financial.balance, 120.50);
    assert_eq!(financial.transaction_count(), 3);
    assert_eq!(financial.account_count(), 1);
    let profile = harness.privacy.load_profile().await.unwrap().unwrap();
    assert_eq!(profile.email, "ada@example.com");

    assert!(!report.is_degraded());
    assert_eq!(report.transaction_count, 3);
    let key = report.archive_key().unwrap().to_string();
    assert_eq!(
        key,
        format!("archive/legacy-{:013}", epoch().timestamp_millis())
    );
    assert_eq!(controller.archive().list().await.unwrap(), vec![key.clone()]);
    let archived = controller.archive().load(&key).await.unwrap().unwrap();
    assert_eq!(archived, scenario_a_record());
}

#[tokio::test]
async fn scenario_b_dangling_reference_blocks_migration() {
    let harness = Harness::new().with_legacy(scenario_b_record()).await;
    let controller = harness.controller().await;

    let assessment = controller.assess_migration_readiness().await.unwrap();
    assert!(!assessment.recommended);
    assert_eq!(controller.status(), IntegrationStatus::ValidationFailed);
    assert!(assessment.issues.iter().any(|issue| {
        issue.code == IssueCode::DanglingAccountReference && issue.severity == Severity::Critical
    }));

    let before = controller.snapshot();
    let err = controller.execute_big_bang_migration().await.unwrap_err();
    assert!(matches!(
        err,
        IntegrationError::NotReady {
            status: IntegrationStatus::ValidationFailed,
            ..
        }
    ));
    assert_eq!(controller.snapshot(), before);

    let err = controller.assess_and_migrate().await.unwrap_err();
    assert!(matches!(err, IntegrationError::ValidationBlocked { critical: 1 }));
    assert!(!harness.privacy.exists().await.unwrap());
}

#[tokio::test]
async fn scenario_c_write_failure_leaves_nothing_committed() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    harness.faults.fail_writes_to(harness.financial_key());
    let controller = harness.controller().await;
    controller.assess_migration_readiness().await.unwrap();

    let err = controller.execute_big_bang_migration().await.unwrap_err();
    assert!(matches!(
        err,
        IntegrationError::Executor(ExecutorError::WriteFailure(_))
    ));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.mode, DataMode::Legacy);
    assert_eq!(snapshot.status, IntegrationStatus::MigrationFailed);
    assert!(snapshot.progress.is_none());
    assert_eq!(snapshot.last_error, Some(err.to_string()));

    // the profile written before the failure was taken back
    assert!(harness.privacy.load_profile().await.unwrap().is_none());
    assert!(!harness.privacy.exists().await.unwrap());
    assert_eq!(
        harness.legacy.load().await.unwrap().unwrap(),
        scenario_a_record()
    );
    assert!(controller.archive().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_migration_can_be_reassessed_and_retried() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    harness.faults.fail_writes_to(harness.profile_key());
    let controller = harness.controller().await;

    assert!(controller.assess_and_migrate().await.is_err());
    assert_eq!(controller.status(), IntegrationStatus::MigrationFailed);

    harness.faults.heal();
    let report = controller.assess_and_migrate().await.unwrap();
    assert_eq!(report.balance, 120.50);
    assert_eq!(controller.status(), IntegrationStatus::MigrationCompleted);
    assert_eq!(controller.snapshot().last_error, None);
}

#[tokio::test]
async fn archive_failure_degrades_best_effort_migration() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    harness.faults.fail_archive_writes();
    let controller = harness.controller().await;

    let report = controller.assess_and_migrate().await.unwrap();

    assert!(report.is_degraded());
    assert!(matches!(report.archive, ArchiveOutcome::Failed { .. }));
    assert_eq!(controller.data_mode(), DataMode::PrivacyFirst);
    assert_eq!(controller.status(), IntegrationStatus::MigrationCompleted);
}

#[tokio::test]
async fn archive_failure_fails_required_migration_before_any_write() {
    let config = IntegrationConfig::new().with_archive_policy(ArchivePolicy::Required);
    let harness = Harness::with_config(config)
        .with_legacy(scenario_a_record())
        .await;
    harness.faults.fail_archive_writes();
    let controller = harness.controller().await;

    let err = controller.assess_and_migrate().await.unwrap_err();

    assert!(matches!(err, IntegrationError::Archive(_)));
    assert_eq!(controller.data_mode(), DataMode::Legacy);
    assert_eq!(controller.status(), IntegrationStatus::MigrationFailed);
    assert!(!harness.privacy.exists().await.unwrap());
}

#[tokio::test]
async fn required_archive_is_written_before_commit() {
    let config = IntegrationConfig::new().with_archive_policy(ArchivePolicy::Required);
    let harness = Harness::with_config(config)
        .with_legacy(scenario_a_record())
        .await;
    harness.faults.fail_writes_to(harness.financial_key());
    let controller = harness.controller().await;

    assert!(controller.assess_and_migrate().await.is_err());

    // the snapshot survives a failed migration
    assert_eq!(controller.archive().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn assessment_is_idempotent() {
    let harness = Harness::new()
        .with_legacy(scenario_a_record().with_extra("uiTheme", serde_json::json!("dark")))
        .await;
    let controller = harness.controller().await;

    let first = controller.assess_migration_readiness().await.unwrap();
    let status = controller.status();
    let second = controller.assess_migration_readiness().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(controller.status(), status);
    assert_eq!(first.issues.len(), 1);
    assert_eq!(first.issues[0].code, IssueCode::DeprecatedField);
}

#[tokio::test]
async fn restart_detects_completed_migration() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    harness.controller().await.assess_and_migrate().await.unwrap();

    let restarted = harness.controller().await;
    assert_eq!(restarted.data_mode(), DataMode::PrivacyFirst);
    assert_eq!(restarted.status(), IntegrationStatus::MigrationCompleted);
    assert_eq!(restarted.total_balance().await.unwrap(), 120.50);
}

#[tokio::test]
async fn archived_source_survives_restart() {
    let source = scenario_a_record().with_extra("uiTheme", serde_json::json!("dark"));
    let harness = Harness::new().with_legacy(source.clone()).await;
    let report = harness.controller().await.assess_and_migrate().await.unwrap();
    let key = report.archive_key().unwrap().to_string();

    let restarted = harness.controller().await;
    assert_eq!(restarted.snapshot().archive_key, Some(key));

    let rebuilt = restarted.rollback_to_legacy().await.unwrap();
    assert_eq!(rebuilt.extra, source.extra);
    assert!(restarted.snapshot().archive_key.is_none());
    assert!(restarted.archive().pinned_source().await.unwrap().is_none());
}

#[tokio::test]
async fn empty_transaction_id_is_refused_after_assessment() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;
    controller.assess_migration_readiness().await.unwrap();
    assert_eq!(controller.status(), IntegrationStatus::Ready);

    let err = controller
        .add_transaction(Transaction::new("", 1.0, "anon"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IntegrationError::Router(RouterError::Ledger(LedgerError::EmptyTransactionId))
    ));
    assert_eq!(harness.legacy.load().await.unwrap().unwrap(), scenario_a_record());
    assert!(controller.execute_big_bang_migration().await.is_ok());
}

#[tokio::test]
async fn record_changed_after_assessment_is_validated_again() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;
    controller.assess_migration_readiness().await.unwrap();

    // written behind the controller's back, after it reported Ready
    harness.legacy.save(&scenario_b_record()).await.unwrap();
    let before = controller.snapshot();

    let err = controller.execute_big_bang_migration().await.unwrap_err();

    assert!(matches!(err, IntegrationError::ValidationBlocked { critical: 1 }));
    assert_eq!(controller.snapshot(), before);
    assert!(!harness.privacy.exists().await.unwrap());
    assert!(controller.archive().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn crud_is_uniform_across_modes() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;

    controller
        .add_transaction(Transaction::new("t-10", 9.50, "Refund").in_account("acc-main"))
        .await
        .unwrap();
    assert_eq!(controller.total_balance().await.unwrap(), 130.0);

    controller.assess_and_migrate().await.unwrap();
    assert_eq!(controller.total_balance().await.unwrap(), 130.0);

    controller
        .update_transaction(Transaction::new("t-10", 19.50, "Refund").in_account("acc-main"))
        .await
        .unwrap();
    assert_eq!(controller.total_balance().await.unwrap(), 140.0);
    assert_eq!(controller.accounts().await.unwrap()[0].balance, 140.0);

    let removed = controller.remove_transaction("t-10").await.unwrap();
    assert_eq!(removed.amount, 19.50);
    assert_eq!(controller.transactions().await.unwrap().len(), 3);

    let user = controller.current_user_data().await.unwrap().unwrap();
    assert_eq!(user.mode, DataMode::PrivacyFirst);
    assert_eq!(user.total_balance, 120.50);

    // legacy copy is untouched by privacy-first writes
    assert_eq!(harness.legacy.load().await.unwrap().unwrap().balance, 130.0);
}

#[tokio::test]
async fn rollback_restores_legacy_with_archived_fields() {
    let source = scenario_a_record().with_extra("uiTheme", serde_json::json!("dark"));
    let harness = Harness::new().with_legacy(source.clone()).await;
    let controller = harness.controller().await;
    controller.assess_and_migrate().await.unwrap();

    controller
        .add_transaction(Transaction::new("t-11", -20.50, "Taxi").in_account("acc-main"))
        .await
        .unwrap();

    let rebuilt = controller.rollback_to_legacy().await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.mode, DataMode::Legacy);
    assert_eq!(snapshot.status, IntegrationStatus::Ready);
    assert!(snapshot.assessment.recommended);

    assert_eq!(rebuilt.extra, source.extra);
    assert_eq!(rebuilt.balance, 100.0);
    assert_eq!(rebuilt.transaction_count(), 4);
    assert_eq!(harness.legacy.load().await.unwrap().unwrap(), rebuilt);
    assert!(!harness.privacy.exists().await.unwrap());
    assert_eq!(controller.total_balance().await.unwrap(), 100.0);
}

#[tokio::test]
async fn rollback_after_degraded_migration_ignores_older_snapshots() {
    let harness = Harness::new()
        .with_legacy(scenario_a_record().with_extra("uiTheme", serde_json::json!("dark")))
        .await;
    let controller = harness.controller().await;
    controller.assess_and_migrate().await.unwrap();
    controller.rollback_to_legacy().await.unwrap();

    let bob = LegacyRecord::new("Bob", "bob@example.com", "EUR");
    harness.legacy.save(&bob).await.unwrap();
    harness.faults.fail_archive_writes();
    let report = controller.assess_and_migrate().await.unwrap();
    assert!(report.is_degraded());
    assert!(controller.snapshot().archive_key.is_none());

    let rebuilt = controller.rollback_to_legacy().await.unwrap();

    assert_eq!(rebuilt.name, "Bob");
    assert!(rebuilt.extra.is_empty());
    assert_eq!(controller.archive().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_rollback_leaves_state_unchanged() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;
    controller.assess_and_migrate().await.unwrap();
    harness.faults.fail_deletes_of(harness.profile_key());

    let before = controller.snapshot();
    let err = controller.rollback_to_legacy().await.unwrap_err();

    assert!(matches!(
        err,
        IntegrationError::Executor(ExecutorError::WriteFailure(_))
    ));
    assert_eq!(controller.snapshot(), before);
    assert_eq!(controller.data_mode(), DataMode::PrivacyFirst);
    let financial = harness.privacy.load_financial().await.unwrap().unwrap();
    assert_eq!(financial.balance, 120.50);
    // legacy record is back to its pre-rollback content
    assert_eq!(
        harness.legacy.load().await.unwrap().unwrap(),
        scenario_a_record()
    );
}

#[tokio::test]
async fn rollback_without_privacy_data_reports_missing_source() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;
    controller.assess_and_migrate().await.unwrap();
    harness.privacy.delete_financial().await.unwrap();

    let err = controller.rollback_to_legacy().await.unwrap_err();

    assert!(matches!(
        err,
        IntegrationError::Executor(ExecutorError::NoSourceData(_))
    ));
    assert_eq!(controller.status(), IntegrationStatus::MigrationCompleted);
}

#[tokio::test]
async fn progress_is_timestamped_by_injected_clock() {
    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let controller = harness.controller().await;
    let mut rx = controller.subscribe();
    controller.assess_migration_readiness().await.unwrap();

    harness.clock.advance(chrono::Duration::minutes(5));
    let report = controller.execute_big_bang_migration().await.unwrap();

    assert_eq!(report.started_at, epoch() + chrono::Duration::minutes(5));
    // the receiver keeps only the latest value
    assert_eq!(
        rx.borrow_and_update().status,
        IntegrationStatus::MigrationCompleted
    );
}

#[tokio::test]
async fn executor_reports_increasing_progress() {
    struct Recorder(parking_lot::Mutex<Vec<f64>>);
    impl ProgressSink for Recorder {
        fn report(&self, _step: &str, fraction: f64) {
            self.0.lock().push(fraction);
        }
    }

    let harness = Harness::new().with_legacy(scenario_a_record()).await;
    let executor = vaultshift_core::MigrationExecutor::new(
        harness.legacy.clone(),
        harness.privacy.clone(),
    );
    let recorder = Recorder(parking_lot::Mutex::new(Vec::new()));
    executor.migrate(&recorder).await.unwrap();

    let fractions = recorder.0.lock().clone();
    assert!(fractions.windows(2).all(|w| w[0] < w[1]), "{fractions:?}");
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
}
