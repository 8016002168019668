//! Vault configuration.
//!
//! Selects the blob backend, metadata backend and key source, and
//! assembles a ready [`VaultEngine`] from them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use ironvault_common::{Error, Result};
use ironvault_crypto::{KdfParams, KeyProvider, Salt, StaticKeyProvider, VaultKey};
use ironvault_storage::{BlobStore, LocalBlobStore, MemoryBlobStore};

use crate::engine::VaultEngine;
use crate::metadata::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore};

/// Known plaintext sealed under a passphrase-derived key so a wrong
/// passphrase is caught before any file is touched.
const KEY_VERIFICATION_PLAINTEXT: &[u8] = b"IRONVAULT_KEY_VERIFICATION_V1";

/// Blob backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlobStoreConfig {
    Memory,
    Local { root: PathBuf },
}

impl BlobStoreConfig {
    fn is_persistent(&self) -> bool {
        !matches!(self, BlobStoreConfig::Memory)
    }

    /// Instantiate the configured backend.
    pub fn build(&self) -> Result<Arc<dyn BlobStore>> {
        match self {
            BlobStoreConfig::Memory => Ok(Arc::new(MemoryBlobStore::new())),
            BlobStoreConfig::Local { root } => Ok(Arc::new(LocalBlobStore::new(root)?)),
        }
    }
}

/// Metadata backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataStoreConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl MetadataStoreConfig {
    fn is_persistent(&self) -> bool {
        !matches!(self, MetadataStoreConfig::Memory)
    }

    /// Instantiate the configured backend.
    pub fn build(&self) -> Result<Arc<dyn MetadataStore>> {
        match self {
            MetadataStoreConfig::Memory => Ok(Arc::new(MemoryMetadataStore::new())),
            MetadataStoreConfig::Sqlite { path } => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        Error::Config(format!("Failed to create {}: {}", parent.display(), e))
                    })?;
                }
                Ok(Arc::new(SqliteMetadataStore::open(path)?))
            }
        }
    }
}

/// Where the vault key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KeySource {
    /// Fresh random key per process. Data does not survive a restart.
    Generate,
    /// Base64-encoded 256-bit key.
    Raw { key: String },
    /// Argon2id key derived from a passphrase supplied at startup.
    Passphrase {
        salt: Salt,
        kdf: KdfParams,
        verification: Vec<u8>,
    },
}

impl KeySource {
    /// Set up a passphrase key source with a fresh salt.
    ///
    /// # Errors
    /// - `InvalidInput` if the passphrase is empty
    /// - KDF or encryption failure
    pub fn passphrase(passphrase: &[u8], kdf: KdfParams) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(Error::InvalidInput("Passphrase cannot be empty".to_string()));
        }

        let salt = Salt::generate();
        let provider = StaticKeyProvider::from_passphrase(passphrase, &salt, &kdf)?;
        let verification = provider.encrypt(KEY_VERIFICATION_PLAINTEXT)?;

        Ok(KeySource::Passphrase {
            salt,
            kdf,
            verification,
        })
    }

    /// Raw key source holding a newly generated key.
    pub fn random_raw() -> Self {
        KeySource::Raw {
            key: VaultKey::generate().to_base64(),
        }
    }

    pub fn requires_passphrase(&self) -> bool {
        matches!(self, KeySource::Passphrase { .. })
    }

    /// Instantiate the key provider.
    ///
    /// # Errors
    /// - `Config` if a passphrase is required but missing or incorrect
    /// - `InvalidInput` if a raw key is not valid base64 of the right length
    pub fn build(&self, passphrase: Option<&[u8]>) -> Result<Arc<dyn KeyProvider>> {
        match self {
            KeySource::Generate => Ok(Arc::new(StaticKeyProvider::generate())),
            KeySource::Raw { key } => Ok(Arc::new(StaticKeyProvider::from_key(
                VaultKey::from_base64(key)?,
            ))),
            KeySource::Passphrase {
                salt,
                kdf,
                verification,
            } => {
                let passphrase = passphrase.ok_or_else(|| {
                    Error::Config("Key source requires a passphrase".to_string())
                })?;
                let provider = StaticKeyProvider::from_passphrase(passphrase, salt, kdf)?;
                match provider.decrypt(verification) {
                    Ok(plaintext) if plaintext == KEY_VERIFICATION_PLAINTEXT => {
                        Ok(Arc::new(provider))
                    }
                    _ => Err(Error::Config("Incorrect passphrase".to_string())),
                }
            }
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub blob_store: BlobStoreConfig,
    pub metadata_store: MetadataStoreConfig,
    pub key: KeySource,
}

impl VaultConfig {
    /// Everything in memory with a per-process key.
    pub fn in_memory() -> Self {
        Self {
            blob_store: BlobStoreConfig::Memory,
            metadata_store: MetadataStoreConfig::Memory,
            key: KeySource::Generate,
        }
    }

    /// Blobs under `dir/blobs` and metadata in `dir/vault.db`.
    pub fn local(dir: impl AsRef<Path>, key: KeySource) -> Self {
        let dir = dir.as_ref();
        Self {
            blob_store: BlobStoreConfig::Local {
                root: dir.join("blobs"),
            },
            metadata_store: MetadataStoreConfig::Sqlite {
                path: dir.join("vault.db"),
            },
            key,
        }
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Write the configuration file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Assemble an engine over the configured backends.
    ///
    /// # Errors
    /// - `Config` if the key source needs a passphrase that is missing or wrong
    /// - Backend initialization failure
    pub fn build_engine(&self, passphrase: Option<&[u8]>) -> Result<VaultEngine> {
        if self.key == KeySource::Generate
            && (self.blob_store.is_persistent() || self.metadata_store.is_persistent())
        {
            warn!("Generated key is not persisted; stored files will be unreadable after restart");
        }

        let keys = self.key.build(passphrase)?;
        let blobs = self.blob_store.build()?;
        let metadata = self.metadata_store.build()?;

        info!(blob_store = blobs.name(), "Vault engine ready");
        Ok(VaultEngine::new(keys, blobs, metadata))
    }
}
