//! In-memory blob store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::blob::{BlobLocator, BlobStore};
use ironvault_common::{Error, Result};

/// In-memory blob store.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobLocator, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Whether the store holds no blobs.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, locator: &BlobLocator, data: Vec<u8>) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        if blobs.contains_key(locator) {
            return Err(Error::AlreadyExists(format!(
                "Blob already exists: {}",
                locator
            )));
        }
        blobs.insert(locator.clone(), data);
        Ok(())
    }

    async fn read(&self, locator: &BlobLocator) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", locator)))
    }

    async fn exists(&self, locator: &BlobLocator) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(locator))
    }

    async fn delete(&self, locator: &BlobLocator) -> Result<()> {
        match self.blobs.write().await.remove(locator) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("Blob not found: {}", locator))),
        }
    }
}
