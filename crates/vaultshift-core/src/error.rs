//! Error types for vaultshift Core
//!
//! Provides error handling for:
//! - State-machine precondition violations
//! - Migration executor failures (write, serialization, missing source)
//! - Archive failures
//! - Data-mode routing and CRUD rejection
//! - Configuration loading

use crate::types::{DataMode, IntegrationStatus};
use std::path::PathBuf;
use vaultshift_model::LedgerError;
use vaultshift_store::StoreError;

/// Main controller error type
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    /// Operation attempted outside its required status
    #[error("integration not ready for {operation} (status: {status})")]
    NotReady {
        operation: &'static str,
        status: IntegrationStatus,
    },

    /// Critical validation issues prevent migration
    #[error("migration blocked by {critical} critical validation issue(s)")]
    ValidationBlocked { critical: usize },

    /// Mutation refused while the cutover is in flight
    #[error("rejected: migration in progress")]
    MigrationInProgress,

    /// Transition outside the state machine
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition {
        from: IntegrationStatus,
        to: IntegrationStatus,
    },

    /// Executor failed
    #[error("{0}")]
    Executor(#[from] ExecutorError),

    /// Archive failed (only fatal under the required archive policy)
    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    /// Routing or ledger failure in steady state
    #[error("data access failed: {0}")]
    Router(RouterError),

    /// Storage collaborator failed
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl IntegrationError {
    /// Refusals that never touched state
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotReady { .. } | Self::ValidationBlocked { .. } | Self::MigrationInProgress
        )
    }

    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MigrationInProgress
                | Self::Store(_)
                | Self::Archive(_)
                | Self::Executor(ExecutorError::WriteFailure(_) | ExecutorError::StorageRead(_))
        )
    }
}

impl From<RouterError> for IntegrationError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::MigrationInProgress => Self::MigrationInProgress,
            other => Self::Router(other),
        }
    }
}

/// Migration executor failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// A store write failed; nothing was committed
    #[error("storage write failed: {0}")]
    WriteFailure(String),

    /// A store read failed before anything was written
    #[error("storage read failed: {0}")]
    StorageRead(String),

    /// A record could not be encoded or decoded
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Nothing to migrate or roll back from
    #[error("no source data found: {0}")]
    NoSourceData(String),

    /// The migration task stopped before reporting
    #[error("migration interrupted: {0}")]
    Interrupted(String),
}

impl ExecutorError {
    /// Classify a store error raised while writing
    #[must_use]
    pub fn from_write(err: &StoreError) -> Self {
        if err.is_serialization() {
            Self::Serialization(err.to_string())
        } else {
            Self::WriteFailure(err.to_string())
        }
    }

    /// Classify a store error raised while reading
    #[must_use]
    pub fn from_read(err: &StoreError) -> Self {
        if err.is_serialization() {
            Self::Serialization(err.to_string())
        } else {
            Self::StorageRead(err.to_string())
        }
    }
}

/// Archive failures
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Backend failed
    #[error("archive store failed: {0}")]
    Store(#[from] StoreError),

    /// Snapshot could not be encoded
    #[error("archive encoding failed: {0}")]
    Serialization(String),

    /// Every collision suffix is taken
    #[error("no free archive key for {base} after {attempts} attempts")]
    KeySpaceExhausted { base: String, attempts: u32 },
}

/// Data-mode routing failures
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Mutation attempted while migrating
    #[error("rejected: migration in progress")]
    MigrationInProgress,

    /// The active schema holds no record to mutate
    #[error("no {0} record to modify")]
    NoRecord(DataMode),

    /// Ledger rule refused the mutation
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Backing store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file malformed
    #[error("invalid config: {0}")]
    Parse(String),

    /// Config value out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
