//! Blob store trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use ironvault_common::{Error, Result};

/// Unique reference to a stored blob.
///
/// A locator is a single path component so every backend can map it
/// directly to a key or file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocator(String);

impl BlobLocator {
    /// Generate a fresh locator from a random UUID.
    ///
    /// The locator never embeds a user-supplied filename.
    pub fn generate() -> Self {
        Self(format!("{}.blob", Uuid::new_v4().simple()))
    }

    /// Wrap an existing locator string.
    ///
    /// # Errors
    /// - Returns error if the locator is empty, contains a path separator,
    ///   or is a relative path component
    pub fn new(locator: impl Into<String>) -> Result<Self> {
        let locator = locator.into();
        if locator.is_empty() {
            return Err(Error::InvalidInput("Blob locator cannot be empty".to_string()));
        }
        if locator.contains('/') || locator.contains('\\') {
            return Err(Error::InvalidInput(
                "Blob locator cannot contain separators".to_string(),
            ));
        }
        if locator == "." || locator == ".." {
            return Err(Error::InvalidInput(format!(
                "Invalid blob locator: {}",
                locator
            )));
        }
        Ok(Self(locator))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage for encrypted blobs.
///
/// Implementations provide atomic single-blob write, read and delete.
/// They know nothing about owners, filenames or keys.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Get the backend name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Write a new blob.
    ///
    /// # Postconditions
    /// - On success the blob is readable under `locator`
    /// - On failure no complete blob exists under `locator`
    ///
    /// # Errors
    /// - `AlreadyExists` if the locator is taken; the existing blob is untouched
    /// - `StorageWriteFailure` if the backend fails
    async fn write(&self, locator: &BlobLocator, data: Vec<u8>) -> Result<()>;

    /// Read a blob.
    ///
    /// # Errors
    /// - `NotFound` if no blob exists under `locator`
    /// - `StorageReadFailure` if the backend fails
    async fn read(&self, locator: &BlobLocator) -> Result<Vec<u8>>;

    /// Check if a blob exists.
    async fn exists(&self, locator: &BlobLocator) -> Result<bool>;

    /// Delete a blob.
    ///
    /// # Errors
    /// - `NotFound` if no blob exists under `locator`
    /// - `StorageWriteFailure` if the backend fails
    async fn delete(&self, locator: &BlobLocator) -> Result<()>;
}
