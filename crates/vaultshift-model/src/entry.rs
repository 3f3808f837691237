//! Transactions and accounts
//!
//! The two entry types are identical in both schemas; only the record that
//! holds them differs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single ledger movement. Positive amounts credit, negative amounts debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Identifier, unique within one record
    pub id: String,
    /// Signed amount in the record's currency
    pub amount: f64,
    /// Free-form description
    pub description: String,
    /// Optional category label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Booking date
    pub date: DateTime<Utc>,
    /// Account this movement is booked against, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

impl Transaction {
    /// Create a transaction dated at the Unix epoch
    ///
    /// Tests and fixtures want stable dates; call [`Transaction::on`] to set one.
    #[must_use]
    pub fn new(id: impl Into<String>, amount: f64, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount,
            description: description.into(),
            category: None,
            date: DateTime::UNIX_EPOCH,
            account_id: None,
        }
    }

    /// With booking date
    #[inline]
    #[must_use]
    pub fn on(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// With account reference
    #[inline]
    #[must_use]
    pub fn in_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Kind of account a balance is held in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    #[default]
    Checking,
    Savings,
    Credit,
    Cash,
    Investment,
}

/// An account owned by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: AccountKind,
    pub balance: f64,
}

impl Account {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, balance: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: AccountKind::default(),
            balance,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_kind(mut self, kind: AccountKind) -> Self {
        self.kind = kind;
        self
    }
}
