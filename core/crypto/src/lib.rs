//! Cryptographic primitives for IronVault.
//!
//! This module provides:
//! - Authenticated encryption using XChaCha20-Poly1305
//! - The vault key with automatic zeroization
//! - Key derivation from a configured passphrase using Argon2id
//! - The `KeyProvider` seam through which the engine encrypts blobs
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Every encryption uses a fresh random nonce

pub mod aead;
pub mod kdf;
pub mod keys;
pub mod provider;

pub use aead::{decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use kdf::{derive_key, KdfParams};
pub use keys::{Salt, VaultKey, KEY_LENGTH};
pub use provider::{KeyProvider, StaticKeyProvider};
