//! Schema records
//!
//! The legacy schema persists one [`LegacyRecord`]; the privacy-first schema
//! persists a [`UserProfile`] and a [`FinancialData`] under separate keys.

use crate::entry::{Account, Transaction};
use crate::ledger::LedgerBook;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Legacy aggregate: identity and finances in one record
///
/// Keys the model does not know are kept in `extra` so that validation can
/// see what a split would drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    pub name: String,
    pub email: String,
    pub currency: String,
    pub balance: f64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LegacyRecord {
    /// Create an empty record
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            currency: currency.into(),
            balance: 0.0,
            transactions: Vec::new(),
            accounts: Vec::new(),
            created_at: None,
            extra: BTreeMap::new(),
        }
    }

    /// With opening balance
    #[inline]
    #[must_use]
    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    /// With account
    #[inline]
    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// With transaction, pushed as-is without posting its amount
    #[inline]
    #[must_use]
    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transactions.push(transaction);
        self
    }

    /// With an unmodelled legacy field
    #[inline]
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl LedgerBook for LegacyRecord {
    fn balance(&self) -> f64 {
        self.balance
    }

    fn set_balance(&mut self, balance: f64) {
        self.balance = balance;
    }

    fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn accounts_mut(&mut self) -> &mut Vec<Account> {
        &mut self.accounts
    }
}

/// Privacy-first identity record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Privacy-first financial record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialData {
    pub currency: String,
    pub balance: f64,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl FinancialData {
    /// Create an empty financial record
    #[must_use]
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            balance: 0.0,
            transactions: Vec::new(),
            accounts: Vec::new(),
        }
    }
}

impl LedgerBook for FinancialData {
    fn balance(&self) -> f64 {
        self.balance
    }

    fn set_balance(&mut self, balance: f64) {
        self.balance = balance;
    }

    fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    fn accounts_mut(&mut self) -> &mut Vec<Account> {
        &mut self.accounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_legacy_keys_land_in_extra() {
        let json = r#"{
            "name": "Ada",
            "email": "ada@example.com",
            "currency": "EUR",
            "balance": 10.5,
            "uiTheme": "dark",
            "budgetRules": [1, 2]
        }"#;

        let record: LegacyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.balance, 10.5);
        assert!(record.transactions.is_empty());
        assert_eq!(
            record.extra.keys().cloned().collect::<Vec<_>>(),
            vec!["budgetRules".to_string(), "uiTheme".to_string()]
        );
    }

    #[test]
    fn legacy_record_survives_encoding() {
        let record = LegacyRecord::new("Ada", "ada@example.com", "EUR")
            .with_balance(3.0)
            .with_account(Account::new("acc-1", "Main", 3.0))
            .with_extra("uiTheme", serde_json::json!("dark"));

        let bytes = serde_json::to_vec(&record).unwrap();
        let decoded: LegacyRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, record);
    }
}
