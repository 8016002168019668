//! Vault storage engine for IronVault.
//!
//! This module provides:
//! - The `VaultFile` and `AuditRecord` data model
//! - The access control policy for every vault action
//! - The metadata store seam with in-memory and SQLite backends
//! - The engine orchestrating upload, download, delete, list, search
//!   and audit trail queries
//! - Configuration that assembles an engine from its backends
//!
//! # Architecture
//! The engine sits between the request-handling layer and the blob and
//! metadata stores, encrypting and decrypting through an injected key
//! provider and gating every access through the policy.

pub mod config;
pub mod engine;
pub mod metadata;
pub mod model;
pub mod policy;

pub use config::{BlobStoreConfig, KeySource, MetadataStoreConfig, VaultConfig};
pub use engine::VaultEngine;
pub use metadata::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore};
pub use model::{AuditAction, AuditRecord, AuditScope, FileScope, FileSelector, VaultFile};
pub use policy::{AccessPolicy, Action};
