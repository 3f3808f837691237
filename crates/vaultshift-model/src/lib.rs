//! vaultshift data model
//!
//! Plain, serializable records for both storage schemas.
//!
//! # Core Concepts
//!
//! - [`LegacyRecord`]: single aggregate holding identity, balance, transactions and accounts
//! - [`UserProfile`] + [`FinancialData`]: the privacy-first split of the same data
//! - [`LedgerBook`]: the mutation rules shared by both schemas
//!
//! # Example
//!
//! ```rust,ignore
//! use vaultshift_model::{LedgerBook, LegacyRecord, Transaction};
//!
//! let mut record = LegacyRecord::new("Ada", "ada@example.com", "EUR");
//! record.add_transaction(Transaction::new("t-1", 42.0, "salary"))?;
//! assert_eq!(record.balance(), 42.0);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod entry;
mod ledger;
mod records;

pub use entry::{Account, AccountKind, Transaction};
pub use ledger::{LedgerBook, LedgerError};
pub use records::{FinancialData, LegacyRecord, UserProfile};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
