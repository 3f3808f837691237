//! Directory-backed key-value store
//!
//! Each key maps to one file under the root directory; `/` in a key becomes a
//! subdirectory. Writes go through a hidden temporary file in the target
//! directory so readers never see a half-written value.

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File-backed [`KeyValueStore`]
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    ///
    /// # Errors
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io_error(&root, e))?;
        tracing::debug!(root = %root.display(), "opened file store");
        Ok(Self {
            root,
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    /// Write `value` to a fresh temporary sibling of `path`
    async fn write_temp(&self, path: &Path, value: &[u8]) -> StoreResult<PathBuf> {
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io_error(parent, e))?;

        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(".{name}.tmp-{}-{n}", std::process::id()));

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::io_error(&tmp, e))?;
        let written = match file.write_all(value).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io_error(&tmp, e));
        }
        Ok(tmp)
    }
}

fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    for segment in key.split('/') {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if segment.starts_with('.') {
            return Err(invalid("segment starts with '.'"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(invalid("invalid characters"));
        }
    }
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(&path, &value).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io_error(&path, e));
        }
        Ok(())
    }

    async fn put_new(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.write_temp(&path, &value).await?;

        // hard_link refuses an existing destination, which makes the publish atomic
        let linked = fs::hard_link(&tmp, &path).await;
        let _ = fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::AlreadyExists(key.to_string()))
            }
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io_error(path, e)),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io_error(dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io_error(&dir, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let key = format!("{key_prefix}{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::io_error(entry.path(), e))?;

                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{key}/")));
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
