//! Mutation rules shared by both schemas
//!
//! [`LedgerBook`] is implemented by [`crate::LegacyRecord`] and
//! [`crate::FinancialData`]. Every balance rule lives in the provided methods,
//! so a transaction applied to either schema moves the balances identically.

use crate::entry::{Account, Transaction};

/// Errors raised when a ledger mutation is refused
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// Transaction id already present
    #[error("duplicate transaction id: {0}")]
    DuplicateTransaction(String),

    /// No transaction with this id
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// Transaction references an account that does not exist
    #[error("transaction {transaction} references unknown account {account}")]
    UnknownAccount { transaction: String, account: String },

    /// Amount is NaN or infinite
    #[error("transaction {0} has a non-finite amount")]
    NonFiniteAmount(String),

    /// Transaction id is empty
    #[error("transaction id must not be empty")]
    EmptyTransactionId,
}

/// A record that carries a balance, transactions and accounts
pub trait LedgerBook {
    fn balance(&self) -> f64;
    fn set_balance(&mut self, balance: f64);
    fn transactions(&self) -> &[Transaction];
    fn transactions_mut(&mut self) -> &mut Vec<Transaction>;
    fn accounts(&self) -> &[Account];
    fn accounts_mut(&mut self) -> &mut Vec<Account>;

    #[inline]
    fn transaction_count(&self) -> usize {
        self.transactions().len()
    }

    #[inline]
    fn account_count(&self) -> usize {
        self.accounts().len()
    }

    /// Append a transaction and credit its amount
    ///
    /// # Errors
    /// Empty or duplicate id, unknown account or non-finite amount.
    fn add_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        check_entry(self, &transaction)?;
        if self.transactions().iter().any(|t| t.id == transaction.id) {
            return Err(LedgerError::DuplicateTransaction(transaction.id));
        }

        post(self, transaction.account_id.as_deref(), transaction.amount);
        self.transactions_mut().push(transaction);
        Ok(())
    }

    /// Replace the transaction with the same id, re-posting the difference
    ///
    /// # Errors
    /// Unknown id, unknown account or non-finite amount.
    fn update_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        check_entry(self, &transaction)?;
        let index = self
            .transactions()
            .iter()
            .position(|t| t.id == transaction.id)
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction.id.clone()))?;

        let previous = self.transactions()[index].clone();
        post(self, previous.account_id.as_deref(), -previous.amount);
        post(self, transaction.account_id.as_deref(), transaction.amount);
        self.transactions_mut()[index] = transaction;
        Ok(())
    }

    /// Remove a transaction by id and reverse its amount
    ///
    /// # Errors
    /// Unknown id.
    fn remove_transaction(&mut self, id: &str) -> Result<Transaction, LedgerError> {
        let index = self
            .transactions()
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| LedgerError::TransactionNotFound(id.to_string()))?;

        let removed = self.transactions_mut().remove(index);
        post(self, removed.account_id.as_deref(), -removed.amount);
        Ok(removed)
    }
}

fn check_entry<B: LedgerBook + ?Sized>(
    book: &B,
    transaction: &Transaction,
) -> Result<(), LedgerError> {
    if transaction.id.is_empty() {
        return Err(LedgerError::EmptyTransactionId);
    }
    if !transaction.amount.is_finite() {
        return Err(LedgerError::NonFiniteAmount(transaction.id.clone()));
    }
    if let Some(account) = &transaction.account_id {
        if !book.accounts().iter().any(|a| &a.id == account) {
            return Err(LedgerError::UnknownAccount {
                transaction: transaction.id.clone(),
                account: account.clone(),
            });
        }
    }
    Ok(())
}

fn post<B: LedgerBook + ?Sized>(book: &mut B, account: Option<&str>, amount: f64) {
    let total = book.balance() + amount;
    book.set_balance(total);
    if let Some(account) = account {
        if let Some(entry) = book.accounts_mut().iter_mut().find(|a| a.id == account) {
            entry.balance += amount;
        }
    }
}
