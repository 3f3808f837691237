//! vaultshift Core - legacy to privacy-first migration controller
//!
//! Moves a locally persisted financial dataset from the legacy single-record
//! schema to the split profile + financial-data schema:
//! - Validates the legacy record before anything is written
//! - Runs the big-bang migration with all-or-nothing commit semantics
//! - Archives the pre-migration snapshot under a write-once key
//! - Rolls back to the legacy schema on demand
//! - Routes reads and writes to whichever schema is active
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vaultshift_core::{Collaborators, IntegrationConfig, IntegrationController};
//! use vaultshift_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = IntegrationConfig::new();
//! let collaborators = Collaborators::over(Arc::new(MemoryStore::new()), &config);
//! let controller = IntegrationController::new(config, collaborators).await?;
//!
//! let report = controller.assess_and_migrate().await?;
//! println!("migrated {} transactions", report.transaction_count);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod archive;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod router;
pub mod state_machine;
pub mod types;
pub mod validation;

pub use archive::ArchiveStore;
pub use clock::{Clock, SystemClock};
pub use config::{ArchivePolicy, IntegrationConfig};
pub use controller::{Collaborators, IntegrationController};
pub use error::{ArchiveError, ConfigError, ExecutorError, IntegrationError, RouterError};
pub use executor::{MigrationCommit, MigrationExecutor, NoProgress, ProgressSink};
pub use router::DataModeRouter;
pub use types::{
    ArchiveOutcome, DataMode, IntegrationSnapshot, IntegrationStatus, IssueCode,
    MigrationAssessment, MigrationId, MigrationProgress, MigrationReport, Severity,
    UnifiedUserData, ValidationIssue,
};
pub use validation::ValidationEngine;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving the controller
    pub use crate::{
        Collaborators, DataMode, IntegrationConfig, IntegrationController, IntegrationError,
        IntegrationStatus, MigrationReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
