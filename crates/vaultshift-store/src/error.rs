//! Error types for storage collaborators

use std::path::PathBuf;

/// Errors raised by key-value backends and schema stores
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `put_new` hit an existing key
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// Key contains characters the backend cannot address
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// IO error in a file-backed store
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding or decoding a record failed
    #[error("serialization failed for '{key}': {message}")]
    Serialization { key: String, message: String },

    /// Backend refused the operation (used by in-process doubles)
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create serialization error for key
    pub fn serialization(key: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Check if this is an encoding problem rather than a storage fault
    #[inline]
    #[must_use]
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

/// Result alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_error_display() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = StoreError::serialization("user.profile", &err);

        assert!(err.is_serialization());
        assert!(err.to_string().contains("user.profile"));
    }

    #[test]
    fn io_error_is_not_serialization() {
        let err = StoreError::io_error(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert!(!err.is_serialization());
        assert!(err.to_string().contains("disk full"));
    }
}
