//! Local filesystem blob store.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::blob::{BlobLocator, BlobStore};
use ironvault_common::{Error, Result};

/// Local filesystem blob store.
///
/// Stores one file per blob directly under a root directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local store with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied or invalid path
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| {
                Error::StorageWriteFailure(format!(
                    "Cannot create blob root {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }

        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn to_fs_path(&self, locator: &BlobLocator) -> PathBuf {
        self.root.join(locator.as_str())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn write(&self, locator: &BlobLocator, data: Vec<u8>) -> Result<()> {
        let fs_path = self.to_fs_path(locator);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&fs_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    Error::AlreadyExists(format!("Blob already exists: {}", locator))
                }
                _ => Error::StorageWriteFailure(format!("Cannot create {}: {}", locator, e)),
            })?;

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&fs_path).await {
                warn!(locator = %locator, error = %cleanup, "Failed to remove partial blob");
            }
            return Err(Error::StorageWriteFailure(format!(
                "Cannot write {}: {}",
                locator, e
            )));
        }

        Ok(())
    }

    async fn read(&self, locator: &BlobLocator) -> Result<Vec<u8>> {
        fs::read(self.to_fs_path(locator))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::NotFound(format!("Blob not found: {}", locator)),
                _ => Error::StorageReadFailure(format!("Cannot read {}: {}", locator, e)),
            })
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool> {
        fs::try_exists(self.to_fs_path(locator))
            .await
            .map_err(|e| Error::StorageReadFailure(format!("Cannot stat {}: {}", locator, e)))
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<()> {
        fs::remove_file(self.to_fs_path(locator))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::NotFound(format!("Blob not found: {}", locator)),
                _ => Error::StorageWriteFailure(format!("Cannot delete {}: {}", locator, e)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_creates_root() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let (_dir, store) = store();
        let locator = BlobLocator::generate();

        store.write(&locator, b"ciphertext".to_vec()).await.unwrap();
        assert!(store.root().join(locator.as_str()).is_file());
        assert_eq!(store.read(&locator).await.unwrap(), b"ciphertext");

        store.delete(&locator).await.unwrap();
        assert!(!store.exists(&locator).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_refuses_overwrite() {
        let (_dir, store) = store();
        let locator = BlobLocator::generate();

        store.write(&locator, vec![1]).await.unwrap();
        let result = store.write(&locator, vec![2]).await;

        assert!(result.unwrap_err().is_already_exists());
        assert_eq!(store.read(&locator).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_missing_blob_is_not_found() {
        let (_dir, store) = store();
        let locator = BlobLocator::generate();

        assert!(store.read(&locator).await.unwrap_err().is_not_found());
        assert!(store.delete(&locator).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_write_into_removed_root_fails() {
        let (_dir, store) = store();
        std::fs::remove_dir_all(store.root()).unwrap();

        let result = store.write(&BlobLocator::generate(), vec![0]).await;
        assert!(matches!(result, Err(Error::StorageWriteFailure(_))));
    }
}
