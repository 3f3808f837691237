//! vaultshift storage collaborators
//!
//! Provides the persistence the migration core consumes:
//! - [`KeyValueStore`]: byte-level persistence with a no-overwrite `put_new`
//! - [`MemoryStore`] and [`FileStore`]: in-process and directory-backed backends
//! - [`LegacyStore`] / [`PrivacyStore`]: schema-level record access
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vaultshift_store::{json_stores, FileStore, LegacyStore, StorageKeys};
//!
//! let kv = Arc::new(FileStore::open("/var/lib/vaultshift").await?);
//! let (legacy, privacy) = json_stores(kv, &StorageKeys::default());
//! let record = legacy.load().await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod file;
pub mod kv;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use kv::{KeyValueStore, MemoryStore};
pub use schema::{
    json_stores, JsonLegacyStore, JsonPrivacyStore, LegacyStore, PrivacyStore, StorageKeys,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
