//! Key provider abstraction.
//!
//! The engine never touches key bytes. It is handed a `KeyProvider` at
//! construction and calls `encrypt`/`decrypt` through it.

use crate::aead;
use crate::kdf::{derive_key, KdfParams};
use crate::keys::{Salt, VaultKey};
use ironvault_common::Result;

/// Encrypts and decrypts vault blobs.
pub trait KeyProvider: Send + Sync {
    /// Encrypt plaintext into a self-contained blob.
    ///
    /// Each call must use a fresh nonce so identical plaintexts yield
    /// distinct blobs.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a blob produced by [`KeyProvider::encrypt`].
    ///
    /// # Errors
    /// - `MalformedInput` if the blob is not a product of `encrypt`
    /// - `IntegrityFailure` if the blob was tampered with or sealed under another key
    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>>;
}

/// Single process-wide key shared by every file.
///
/// There is no per-file key and no rotation.
#[derive(Debug)]
pub struct StaticKeyProvider {
    key: VaultKey,
}

impl StaticKeyProvider {
    /// Provider with a freshly generated key. Blobs written under it are
    /// unreadable once the process exits.
    pub fn generate() -> Self {
        Self {
            key: VaultKey::generate(),
        }
    }

    /// Provider over an existing key.
    pub fn from_key(key: VaultKey) -> Self {
        Self { key }
    }

    /// Provider over a key derived from a configured passphrase.
    pub fn from_passphrase(passphrase: &[u8], salt: &Salt, params: &KdfParams) -> Result<Self> {
        Ok(Self {
            key: derive_key(passphrase, salt, params)?,
        })
    }
}

impl KeyProvider for StaticKeyProvider {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        aead::encrypt(self.key.as_bytes(), plaintext)
    }

    fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        aead::decrypt(self.key.as_bytes(), blob)
    }
}
