//! Core types for the migration controller
//!
//! Defines the fundamental types for the controller:
//! - Data mode and integration status
//! - Validation findings and assessments
//! - Migration progress, reports and identifiers
//! - The unified read projection handed to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Which schema currently serves reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataMode {
    /// Single aggregate record
    Legacy,
    /// Split profile + financial records
    PrivacyFirst,
    /// Cutover in flight; mutations are refused
    Migrating,
}

impl DataMode {
    /// Steady-state modes serve data; `Migrating` does not
    #[inline]
    #[must_use]
    pub fn is_steady(self) -> bool {
        !matches!(self, DataMode::Migrating)
    }
}

impl std::fmt::Display for DataMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataMode::Legacy => "legacy",
            DataMode::PrivacyFirst => "privacy-first",
            DataMode::Migrating => "migrating",
        };
        f.write_str(name)
    }
}

/// Controller state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationStatus {
    NotInitialized,
    NoData,
    NoLegacyData,
    PendingMigration,
    Ready,
    ValidationFailed,
    Migrating,
    MigrationCompleted,
    MigrationFailed,
}

impl IntegrationStatus {
    /// Statuses from which readiness may be (re)assessed
    #[inline]
    #[must_use]
    pub fn allows_assessment(self) -> bool {
        matches!(
            self,
            IntegrationStatus::NoData
                | IntegrationStatus::NoLegacyData
                | IntegrationStatus::PendingMigration
                | IntegrationStatus::Ready
                | IntegrationStatus::ValidationFailed
                | IntegrationStatus::MigrationFailed
        )
    }
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Severity of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    /// Blocks migration
    Critical,
}

/// Machine-readable kind of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    NonFiniteBalance,
    EmptyAccountId,
    DuplicateAccount,
    NonFiniteAccountBalance,
    EmptyTransactionId,
    DuplicateTransaction,
    NonFiniteAmount,
    DanglingAccountReference,
    UnrepresentableField,
    DeprecatedField,
    IncompleteIdentity,
    BalanceMismatch,
    UnorderedTransactions,
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub description: String,
    pub severity: Severity,
}

impl ValidationIssue {
    #[inline]
    #[must_use]
    pub fn new(code: IssueCode, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            severity,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Outcome of the last readiness assessment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationAssessment {
    pub issues: Vec<ValidationIssue>,
    pub recommended: bool,
}

impl MigrationAssessment {
    /// Number of blocking findings
    #[must_use]
    pub fn critical_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_blocking()).count()
    }
}

/// Progress of an in-flight migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationProgress {
    pub step: String,
    /// Fraction complete, clamped to `[0, 1]`
    pub progress: f64,
    pub timestamp: DateTime<Utc>,
}

impl MigrationProgress {
    #[must_use]
    pub fn new(step: impl Into<String>, progress: f64, timestamp: DateTime<Utc>) -> Self {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        };
        Self {
            step: step.into(),
            progress,
            timestamp,
        }
    }
}

/// Consistent view of controller state
///
/// Replaced as a whole on every transition, so mode, status and progress are
/// always observed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSnapshot {
    pub mode: DataMode,
    pub status: IntegrationStatus,
    pub progress: Option<MigrationProgress>,
    pub assessment: MigrationAssessment,
    /// Diagnostic of the last failed migration or rollback
    pub last_error: Option<String>,
    /// Archived snapshot of the record the privacy-first data came from
    #[serde(default)]
    pub archive_key: Option<String>,
}

impl Default for IntegrationSnapshot {
    fn default() -> Self {
        Self {
            mode: DataMode::Legacy,
            status: IntegrationStatus::NotInitialized,
            progress: None,
            assessment: MigrationAssessment::default(),
            last_error: None,
            archive_key: None,
        }
    }
}

/// Unique migration run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MigrationId(pub Ulid);

impl MigrationId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MigrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MigrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to the pre-migration snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveOutcome {
    Archived { key: String },
    Failed { reason: String },
}

/// Result of a successful migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub id: MigrationId,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub balance: f64,
    pub transaction_count: usize,
    pub account_count: usize,
    pub archive: ArchiveOutcome,
}

impl MigrationReport {
    /// Completed, but the legacy snapshot was not archived
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self.archive, ArchiveOutcome::Failed { .. })
    }

    #[must_use]
    pub fn archive_key(&self) -> Option<&str> {
        match &self.archive {
            ArchiveOutcome::Archived { key } => Some(key),
            ArchiveOutcome::Failed { .. } => None,
        }
    }
}

/// Read-only projection over whichever schema is active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedUserData {
    pub mode: DataMode,
    pub name: String,
    pub email: String,
    pub total_balance: f64,
    pub transaction_count: usize,
    pub account_count: usize,
}
