//! Pre-migration validation of the legacy aggregate
//!
//! Findings that would make the privacy-first split lose or misrepresent
//! data are `Critical` and block migration. Oddities the split handles
//! safely are `Warning` or `Info`.
//!
//! Evaluation is a pure function of the record and the configuration, so
//! validating the same input twice yields the same findings in the same order.

use crate::config::IntegrationConfig;
use crate::types::{IssueCode, Severity, ValidationIssue};
use std::collections::{BTreeSet, HashSet};
use vaultshift_model::LegacyRecord;

/// Legacy record validator
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    deprecated_fields: BTreeSet<String>,
    balance_tolerance: f64,
}

impl ValidationEngine {
    /// Create validator from configuration
    #[must_use]
    pub fn new(config: &IntegrationConfig) -> Self {
        Self {
            deprecated_fields: config.deprecated_fields.iter().cloned().collect(),
            balance_tolerance: config.balance_tolerance,
        }
    }

    /// Whether any finding blocks migration
    #[inline]
    #[must_use]
    pub fn is_blocking(issues: &[ValidationIssue]) -> bool {
        issues.iter().any(ValidationIssue::is_blocking)
    }

    /// Validate a legacy record
    #[must_use]
    pub fn validate(&self, record: &LegacyRecord) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !record.balance.is_finite() {
            issues.push(ValidationIssue::new(
                IssueCode::NonFiniteBalance,
                Severity::Critical,
                format!("total balance is not a finite number ({})", record.balance),
            ));
        }

        let account_ids = self.check_accounts(record, &mut issues);
        self.check_transactions(record, &account_ids, &mut issues);
        self.check_account_balances(record, &mut issues);
        self.check_extra_fields(record, &mut issues);
        self.check_identity(record, &mut issues);
        self.check_balance_consistency(record, &mut issues);
        self.check_ordering(record, &mut issues);

        tracing::debug!(
            issues = issues.len(),
            blocking = Self::is_blocking(&issues),
            "validated legacy record"
        );
        issues
    }

    fn check_accounts<'r>(
        &self,
        record: &'r LegacyRecord,
        issues: &mut Vec<ValidationIssue>,
    ) -> HashSet<&'r str> {
        let mut seen = HashSet::with_capacity(record.accounts.len());

        for (i, account) in record.accounts.iter().enumerate() {
            if account.id.is_empty() {
                issues.push(ValidationIssue::new(
                    IssueCode::EmptyAccountId,
                    Severity::Critical,
                    format!("account #{i} ('{}') has an empty id", account.name),
                ));
            } else if !seen.insert(account.id.as_str()) {
                issues.push(ValidationIssue::new(
                    IssueCode::DuplicateAccount,
                    Severity::Critical,
                    format!("account id '{}' appears more than once", account.id),
                ));
            }
        }

        seen
    }

    fn check_transactions(
        &self,
        record: &LegacyRecord,
        account_ids: &HashSet<&str>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let mut seen = HashSet::with_capacity(record.transactions.len());

        for (i, tx) in record.transactions.iter().enumerate() {
            if tx.id.is_empty() {
                issues.push(ValidationIssue::new(
                    IssueCode::EmptyTransactionId,
                    Severity::Critical,
                    format!("transaction #{i} has an empty id"),
                ));
            } else if !seen.insert(tx.id.as_str()) {
                issues.push(ValidationIssue::new(
                    IssueCode::DuplicateTransaction,
                    Severity::Critical,
                    format!("transaction id '{}' appears more than once", tx.id),
                ));
            }

            if !tx.amount.is_finite() {
                issues.push(ValidationIssue::new(
                    IssueCode::NonFiniteAmount,
                    Severity::Critical,
                    format!("transaction '{}' has a non-finite amount", tx.id),
                ));
            }

            if let Some(account) = &tx.account_id {
                if !account_ids.contains(account.as_str()) {
                    issues.push(ValidationIssue::new(
                        IssueCode::DanglingAccountReference,
                        Severity::Critical,
                        format!(
                            "transaction '{}' references nonexistent account '{account}'",
                            tx.id
                        ),
                    ));
                }
            }
        }
    }

    fn check_account_balances(&self, record: &LegacyRecord, issues: &mut Vec<ValidationIssue>) {
        for account in record.accounts.iter().filter(|a| !a.balance.is_finite()) {
            issues.push(ValidationIssue::new(
                IssueCode::NonFiniteAccountBalance,
                Severity::Critical,
                format!("account '{}' has a non-finite balance", account.id),
            ));
        }
    }

    fn check_extra_fields(&self, record: &LegacyRecord, issues: &mut Vec<ValidationIssue>) {
        // BTreeMap iteration keeps the finding order stable
        for key in record.extra.keys() {
            if self.deprecated_fields.contains(key) {
                issues.push(ValidationIssue::new(
                    IssueCode::DeprecatedField,
                    Severity::Warning,
                    format!("deprecated legacy field '{key}' will be dropped"),
                ));
            } else {
                issues.push(ValidationIssue::new(
                    IssueCode::UnrepresentableField,
                    Severity::Critical,
                    format!("legacy field '{key}' has no privacy-first representation"),
                ));
            }
        }
    }

    fn check_identity(&self, record: &LegacyRecord, issues: &mut Vec<ValidationIssue>) {
        let mut missing = Vec::new();
        if record.name.trim().is_empty() {
            missing.push("name");
        }
        if record.email.trim().is_empty() {
            missing.push("email");
        }
        if !missing.is_empty() {
            issues.push(ValidationIssue::new(
                IssueCode::IncompleteIdentity,
                Severity::Warning,
                format!("profile will be created without {}", missing.join(" and ")),
            ));
        }
    }

    fn check_balance_consistency(&self, record: &LegacyRecord, issues: &mut Vec<ValidationIssue>) {
        if record.accounts.is_empty() || !record.balance.is_finite() {
            return;
        }
        let sum: f64 = record.accounts.iter().map(|a| a.balance).sum();
        if sum.is_finite() && (sum - record.balance).abs() > self.balance_tolerance {
            issues.push(ValidationIssue::new(
                IssueCode::BalanceMismatch,
                Severity::Warning,
                format!(
                    "account balances sum to {sum:.2} but total balance is {:.2}",
                    record.balance
                ),
            ));
        }
    }

    fn check_ordering(&self, record: &LegacyRecord, issues: &mut Vec<ValidationIssue>) {
        let unordered = record
            .transactions
            .windows(2)
            .any(|pair| pair[1].date < pair[0].date);
        if unordered {
            issues.push(ValidationIssue::new(
                IssueCode::UnorderedTransactions,
                Severity::Info,
                "transactions are not in chronological order; order is preserved as-is",
            ));
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(&IntegrationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vaultshift_model::{Account, Transaction};

    fn clean_record() -> LegacyRecord {
        LegacyRecord::new("Ada", "ada@example.com", "EUR")
            .with_balance(100.0)
            .with_account(Account::new("acc-1", "Main", 100.0))
            .with_transaction(Transaction::new("t-1", 100.0, "salary").in_account("acc-1"))
    }

    fn codes(issues: &[ValidationIssue]) -> Vec<IssueCode> {
        issues.iter().map(|i| i.code).collect()
    }

    #[test]
    fn clean_record_has_no_findings() {
        let issues = ValidationEngine::default().validate(&clean_record());
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn dangling_account_reference_is_critical() {
        let record = clean_record()
            .with_transaction(Transaction::new("t-2", 1.0, "ghost").in_account("acc-9"));

        let issues = ValidationEngine::default().validate(&record);
        assert_eq!(codes(&issues), vec![IssueCode::DanglingAccountReference]);
        assert!(ValidationEngine::is_blocking(&issues));
    }

    #[test]
    fn duplicates_and_non_finite_values_are_critical() {
        let mut record = clean_record()
            .with_transaction(Transaction::new("t-1", f64::INFINITY, "dup"))
            .with_account(Account::new("acc-1", "Again", 0.0));
        record.balance = f64::NAN;

        let found = codes(&ValidationEngine::default().validate(&record));
        assert!(found.contains(&IssueCode::NonFiniteBalance));
        assert!(found.contains(&IssueCode::DuplicateAccount));
        assert!(found.contains(&IssueCode::DuplicateTransaction));
        assert!(found.contains(&IssueCode::NonFiniteAmount));
    }

    #[test]
    fn critical_findings_follow_rule_order() {
        let mut record = clean_record()
            .with_transaction(Transaction::new("", 1.0, "anon"))
            .with_account(Account::new("", "Nameless", 0.0));
        record.accounts[0].balance = f64::NAN;
        record.balance = f64::INFINITY;

        let issues = ValidationEngine::default().validate(&record);
        assert_eq!(
            codes(&issues),
            vec![
                IssueCode::NonFiniteBalance,
                IssueCode::EmptyAccountId,
                IssueCode::EmptyTransactionId,
                IssueCode::NonFiniteAccountBalance,
            ]
        );
    }

    #[test]
    fn deprecated_fields_warn_unknown_fields_block() {
        let engine = ValidationEngine::default();

        let deprecated = clean_record().with_extra("uiTheme", serde_json::json!("dark"));
        let issues = engine.validate(&deprecated);
        assert_eq!(codes(&issues), vec![IssueCode::DeprecatedField]);
        assert!(!ValidationEngine::is_blocking(&issues));

        let unknown = clean_record().with_extra("budgetRules", serde_json::json!([1]));
        let issues = engine.validate(&unknown);
        assert_eq!(codes(&issues), vec![IssueCode::UnrepresentableField]);
        assert!(ValidationEngine::is_blocking(&issues));
    }

    #[test]
    fn soft_findings_do_not_block() {
        let mut record = clean_record()
            .with_transaction(
                Transaction::new("t-0", 0.0, "older")
                    .on(Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()),
            );
        record.transactions[0].date = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        record.email = String::new();
        record.accounts[0].balance = 90.0;

        let issues = ValidationEngine::default().validate(&record);
        assert_eq!(
            codes(&issues),
            vec![
                IssueCode::IncompleteIdentity,
                IssueCode::BalanceMismatch,
                IssueCode::UnorderedTransactions,
            ]
        );
        assert!(!ValidationEngine::is_blocking(&issues));
    }

    #[test]
    fn validation_is_deterministic() {
        let record = clean_record()
            .with_extra("zeta", serde_json::json!(1))
            .with_extra("alpha", serde_json::json!(2))
            .with_transaction(Transaction::new("", 1.0, "anon"));
        let engine = ValidationEngine::default();

        assert_eq!(engine.validate(&record), engine.validate(&record));
    }
}
