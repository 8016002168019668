//! Blob storage abstraction for IronVault.
//!
//! Blobs are opaque encrypted payloads addressed by a unique locator.
//! This crate defines the `BlobStore` capability the vault engine consumes
//! and ships an in-memory and a local filesystem backend.
//!
//! # Design Principles
//! - Backend isolation: no encryption or access logic lives here
//! - Async operations: all I/O operations are async
//! - Create-only writes: a locator is never overwritten
//! - Unified error semantics: missing blobs are `NotFound`, everything else
//!   is a storage read or write failure

pub mod blob;
pub mod local;
pub mod memory;

pub use blob::{BlobLocator, BlobStore};
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
