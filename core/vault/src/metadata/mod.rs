//! Metadata store for vault files and audit records.
//!
//! The engine relies only on atomic single-record operations. Neither
//! backend offers cross-record transactions.

use async_trait::async_trait;

use ironvault_common::{FileId, Result};

use crate::model::{AuditRecord, AuditScope, FileScope, VaultFile};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;

/// Persistence for `VaultFile` rows and the audit trail.
///
/// Query methods return records in insertion order.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new file row.
    ///
    /// # Errors
    /// - `StorageWriteFailure` if the id already exists or the backend fails
    async fn insert_file(&self, file: &VaultFile) -> Result<()>;

    /// Fetch a file row by id.
    async fn get_file(&self, id: &FileId) -> Result<Option<VaultFile>>;

    /// Most recently inserted file named `filename` within `scope`.
    async fn find_latest_by_filename(
        &self,
        scope: &FileScope,
        filename: &str,
    ) -> Result<Option<VaultFile>>;

    /// Remove a file row. Returns `false` if no row existed.
    async fn remove_file(&self, id: &FileId) -> Result<bool>;

    /// All files within `scope`.
    async fn list_files(&self, scope: &FileScope) -> Result<Vec<VaultFile>>;

    /// Files within `scope` whose name contains `needle`, ignoring case.
    async fn search_files(&self, scope: &FileScope, needle: &str) -> Result<Vec<VaultFile>>;

    /// Append an audit record. Records are never updated or removed.
    async fn append_audit(&self, record: &AuditRecord) -> Result<()>;

    /// Audit records within `scope`.
    async fn audit_records(&self, scope: &AuditScope) -> Result<Vec<AuditRecord>>;
}
