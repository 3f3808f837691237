//! Controller configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vaultshift_store::StorageKeys;

/// When the pre-migration legacy snapshot is archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivePolicy {
    /// Archive after a successful commit; failure degrades the report
    #[default]
    BestEffort,
    /// Archive before any privacy-first write; failure fails the migration
    Required,
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Storage keys for both schemas
    pub keys: StorageKeys,
    /// Key prefix for archive snapshots
    pub archive_prefix: String,
    /// Highest collision suffix tried before giving up
    pub max_archive_suffix: u32,
    /// Archive ordering and failure policy
    pub archive_policy: ArchivePolicy,
    /// Legacy fields that are safe to drop
    pub deprecated_fields: Vec<String>,
    /// Allowed gap between total balance and the sum of account balances
    pub balance_tolerance: f64,
}

impl IntegrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With archive policy
    #[inline]
    #[must_use]
    pub fn with_archive_policy(mut self, policy: ArchivePolicy) -> Self {
        self.archive_policy = policy;
        self
    }

    /// With storage keys
    #[inline]
    #[must_use]
    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    /// With deprecated legacy fields
    #[must_use]
    pub fn with_deprecated_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deprecated_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Malformed TOML or out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Unreadable file, malformed TOML or out-of-range values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.archive_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "archive_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.balance_tolerance.is_finite() || self.balance_tolerance < 0.0 {
            return Err(ConfigError::Invalid {
                field: "balance_tolerance",
                reason: format!("{} is not a non-negative number", self.balance_tolerance),
            });
        }
        let keys = [&self.keys.legacy, &self.keys.profile, &self.keys.financial];
        if keys.iter().any(|k| k.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "keys",
                reason: "storage keys must not be empty".to_string(),
            });
        }
        if keys[0] == keys[1] || keys[0] == keys[2] || keys[1] == keys[2] {
            return Err(ConfigError::Invalid {
                field: "keys",
                reason: "storage keys must be distinct".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            keys: StorageKeys::default(),
            archive_prefix: "archive/".to_string(),
            max_archive_suffix: 64,
            archive_policy: ArchivePolicy::BestEffort,
            deprecated_fields: ["appVersion", "lastSyncToken", "onboardingComplete", "uiTheme"]
                .into_iter()
                .map(String::from)
                .collect(),
            balance_tolerance: 0.005,
        }
    }
}
