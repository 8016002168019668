//! Common error types for IronVault.

use thiserror::Error;

/// Top-level error type for IronVault operations.
///
/// `NotFound` and `AccessDenied` are always reported as separate kinds,
/// even where a caller may choose to present them identically.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced file or record is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access control policy rejected the request.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Encryption could not be performed.
    #[error("Encryption failure: {0}")]
    EncryptionFailure(String),

    /// Ciphertext failed authentication (tampered or foreign key).
    #[error("Integrity failure: {0}")]
    IntegrityFailure(String),

    /// Input is not a well-formed encrypted blob.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A create-only write found its target already taken.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A blob or metadata store rejected a write.
    #[error("Storage write failure: {0}")]
    StorageWriteFailure(String),

    /// A blob or metadata store failed to serve a read.
    #[error("Storage read failure: {0}")]
    StorageReadFailure(String),

    /// No valid principal. Raised by the authentication collaborator.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is missing or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error reports a missing file or record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether a create-only write collided with existing data.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
