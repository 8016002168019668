//! In-memory metadata store for testing.

use async_trait::async_trait;
use tokio::sync::RwLock;

use ironvault_common::{Error, FileId, Result};

use super::MetadataStore;
use crate::model::{filename_matches, AuditRecord, AuditScope, FileScope, VaultFile};

/// In-memory metadata store.
///
/// Rows are kept in insertion order. All data is lost on drop.
#[derive(Default)]
pub struct MemoryMetadataStore {
    files: RwLock<Vec<VaultFile>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of file rows.
    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }

    /// Number of audit records.
    pub async fn audit_count(&self) -> usize {
        self.audit.read().await.len()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_file(&self, file: &VaultFile) -> Result<()> {
        let mut files = self.files.write().await;
        if files.iter().any(|f| f.id == file.id) {
            return Err(Error::StorageWriteFailure(format!(
                "File id already exists: {}",
                file.id
            )));
        }
        files.push(file.clone());
        Ok(())
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<VaultFile>> {
        Ok(self.files.read().await.iter().find(|f| &f.id == id).cloned())
    }

    async fn find_latest_by_filename(
        &self,
        scope: &FileScope,
        filename: &str,
    ) -> Result<Option<VaultFile>> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .rev()
            .find(|f| f.filename == filename && scope.contains(f))
            .cloned())
    }

    async fn remove_file(&self, id: &FileId) -> Result<bool> {
        let mut files = self.files.write().await;
        match files.iter().position(|f| &f.id == id) {
            Some(index) => {
                files.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_files(&self, scope: &FileScope) -> Result<Vec<VaultFile>> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|f| scope.contains(f))
            .cloned()
            .collect())
    }

    async fn search_files(&self, scope: &FileScope, needle: &str) -> Result<Vec<VaultFile>> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .filter(|f| scope.contains(f) && filename_matches(&f.filename, needle))
            .cloned()
            .collect())
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        self.audit.write().await.push(record.clone());
        Ok(())
    }

    async fn audit_records(&self, scope: &AuditScope) -> Result<Vec<AuditRecord>> {
        Ok(self
            .audit
            .read()
            .await
            .iter()
            .filter(|r| scope.contains(r))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AuditAction;
    use ironvault_common::UserId;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = MemoryMetadataStore::new();
        let file = VaultFile::new(user("alice"), "a.txt", 1);

        store.insert_file(&file).await.unwrap();
        assert_eq!(store.get_file(&file.id).await.unwrap(), Some(file.clone()));

        assert!(store.remove_file(&file.id).await.unwrap());
        assert!(!store.remove_file(&file.id).await.unwrap());
        assert_eq!(store.get_file(&file.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryMetadataStore::new();
        let file = VaultFile::new(user("alice"), "a.txt", 1);

        store.insert_file(&file).await.unwrap();
        assert!(matches!(
            store.insert_file(&file).await,
            Err(Error::StorageWriteFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_find_latest_prefers_newest() {
        let store = MemoryMetadataStore::new();
        let older = VaultFile::new(user("alice"), "dup.txt", 1);
        let newer = VaultFile::new(user("alice"), "dup.txt", 2);
        let other = VaultFile::new(user("bob"), "dup.txt", 3);

        store.insert_file(&older).await.unwrap();
        store.insert_file(&newer).await.unwrap();
        store.insert_file(&other).await.unwrap();

        let scoped = store
            .find_latest_by_filename(&FileScope::OwnedBy(user("alice")), "dup.txt")
            .await
            .unwrap();
        assert_eq!(scoped.map(|f| f.id), Some(newer.id));

        let global = store
            .find_latest_by_filename(&FileScope::All, "dup.txt")
            .await
            .unwrap();
        assert_eq!(global.map(|f| f.id), Some(other.id));
    }

    #[tokio::test]
    async fn test_search_scoped_and_case_insensitive() {
        let store = MemoryMetadataStore::new();
        store
            .insert_file(&VaultFile::new(user("alice"), "Report.pdf", 1))
            .await
            .unwrap();
        store
            .insert_file(&VaultFile::new(user("bob"), "report-bob.pdf", 1))
            .await
            .unwrap();

        let alice = store
            .search_files(&FileScope::OwnedBy(user("alice")), "REPORT")
            .await
            .unwrap();
        assert_eq!(alice.len(), 1);

        let all = store.search_files(&FileScope::All, "report").await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_audit_append_order() {
        let store = MemoryMetadataStore::new();
        let file = VaultFile::new(user("alice"), "a.txt", 1);

        for action in [AuditAction::Upload, AuditAction::Download, AuditAction::Delete] {
            store
                .append_audit(&AuditRecord::for_file(&user("alice"), action, &file))
                .await
                .unwrap();
        }

        let actions: Vec<_> = store
            .audit_records(&AuditScope::All)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.action)
            .collect();
        assert_eq!(
            actions,
            vec![AuditAction::Upload, AuditAction::Download, AuditAction::Delete]
        );
        assert_eq!(store.audit_count().await, 3);
    }
}
