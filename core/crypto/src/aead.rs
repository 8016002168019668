//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity,
//! with a 24-byte nonce that is safe for random generation.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};

use crate::keys::KEY_LENGTH;
use ironvault_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &[u8]) -> Result<XChaCha20Poly1305> {
    if key.len() != KEY_LENGTH {
        return Err(Error::EncryptionFailure(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }
    Ok(XChaCha20Poly1305::new(GenericArray::from_slice(key)))
}

/// Encrypt plaintext using XChaCha20-Poly1305.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
///
/// # Postconditions
/// - Returns nonce || ciphertext || tag
/// - The nonce is randomly generated per call
///
/// # Errors
/// - `EncryptionFailure` if the key length is wrong or the cipher fails
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::EncryptionFailure(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// # Errors
/// - `EncryptionFailure` if the key length is wrong
/// - `MalformedInput` if the blob is shorter than NONCE_SIZE + TAG_SIZE
/// - `IntegrityFailure` if authentication fails (tampered data or another key)
pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = cipher_for(key)?;

    if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::MalformedInput(format!(
            "Ciphertext too short: {} bytes",
            ciphertext.len()
        )));
    }

    let (nonce_bytes, encrypted) = ciphertext.split_at(NONCE_SIZE);
    let nonce = GenericArray::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, encrypted)
        .map_err(|_| Error::IntegrityFailure("Ciphertext authentication failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Hello, World!";

        let ciphertext = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &ciphertext).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Test message";

        let ciphertext = encrypt(&key, plaintext).unwrap();

        assert_eq!(ciphertext.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Same plaintext";

        let ct1 = encrypt(&key, plaintext).unwrap();
        let ct2 = encrypt(&key, plaintext).unwrap();

        assert_ne!(&ct1[..NONCE_SIZE], &ct2[..NONCE_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key_is_integrity_failure() {
        let ciphertext = encrypt(&[1u8; KEY_LENGTH], b"Secret data").unwrap();
        let result = decrypt(&[2u8; KEY_LENGTH], &ciphertext);

        assert!(matches!(result, Err(Error::IntegrityFailure(_))));
    }

    #[test]
    fn test_short_blob_is_malformed() {
        let key = [42u8; KEY_LENGTH];
        let result = decrypt(&key, &[0u8; NONCE_SIZE + TAG_SIZE - 1]);

        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];

        assert!(matches!(
            encrypt(&short_key, b"data"),
            Err(Error::EncryptionFailure(_))
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [42u8; KEY_LENGTH];

        let ciphertext = encrypt(&key, b"").unwrap();
        assert_eq!(ciphertext.len(), NONCE_SIZE + TAG_SIZE);
        assert!(decrypt(&key, &ciphertext).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = [7u8; KEY_LENGTH];
            let ciphertext = encrypt(&key, &data).unwrap();
            prop_assert_eq!(decrypt(&key, &ciphertext).unwrap(), data);
        }

        #[test]
        fn prop_any_flipped_byte_fails_integrity(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            index in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let key = [7u8; KEY_LENGTH];
            let mut ciphertext = encrypt(&key, &data).unwrap();
            let at = index.index(ciphertext.len());
            ciphertext[at] ^= mask;

            let result = decrypt(&key, &ciphertext);
            prop_assert!(matches!(result, Err(Error::IntegrityFailure(_))));
        }
    }
}
