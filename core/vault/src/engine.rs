//! Vault storage engine.
//!
//! Composes the key provider, blob store, metadata store and access
//! policy into the vault operations. An audit record is appended only
//! after the storage side of an action has fully succeeded.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use ironvault_common::{Error, FileId, Principal, Result};
use ironvault_crypto::KeyProvider;
use ironvault_storage::{BlobLocator, BlobStore};

use crate::metadata::MetadataStore;
use crate::model::{AuditAction, AuditRecord, FileScope, FileSelector, VaultFile};
use crate::policy::{AccessPolicy, Action};

fn encryption_failure(e: Error) -> Error {
    match e {
        Error::EncryptionFailure(_) => e,
        other => Error::EncryptionFailure(other.to_string()),
    }
}

/// A stored blob that does not decrypt is treated as tampered, whatever
/// the reason the provider gives.
fn integrity_failure(e: Error) -> Error {
    match e {
        Error::IntegrityFailure(_) => e,
        other => Error::IntegrityFailure(other.to_string()),
    }
}

fn write_failure(e: Error) -> Error {
    match e {
        Error::StorageWriteFailure(_) => e,
        other => Error::StorageWriteFailure(other.to_string()),
    }
}

fn read_failure(e: Error) -> Error {
    match e {
        Error::StorageReadFailure(_) | Error::NotFound(_) => e,
        other => Error::StorageReadFailure(other.to_string()),
    }
}

/// The vault storage engine.
///
/// Cheap to share behind an `Arc`; every operation may run concurrently
/// with any other.
pub struct VaultEngine {
    keys: Arc<dyn KeyProvider>,
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl VaultEngine {
    /// Create an engine over its collaborators.
    ///
    /// The key provider is fixed for the lifetime of the engine.
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            keys,
            blobs,
            metadata,
        }
    }

    /// Encrypt and store a new file owned by `principal`.
    ///
    /// # Postconditions
    /// - A blob, a file row and one UPLOAD audit record exist
    /// - Two uploads never share an id or locator, even with equal filenames
    ///
    /// # Errors
    /// - `InvalidInput` if the filename is empty
    /// - `EncryptionFailure` if encryption fails
    /// - `StorageWriteFailure` if the blob, row or audit record cannot be written;
    ///   whatever was already written is removed before returning
    pub async fn upload(
        &self,
        principal: &Principal,
        filename: &str,
        data: &[u8],
    ) -> Result<VaultFile> {
        if filename.is_empty() {
            return Err(Error::InvalidInput("Filename cannot be empty".to_string()));
        }
        if !AccessPolicy::can_upload(principal) {
            return Err(Error::AccessDenied(format!(
                "{} may not upload files",
                principal.username
            )));
        }

        debug!(actor = %principal.id, filename, size = data.len(), "Uploading file");

        let ciphertext = self.keys.encrypt(data).map_err(encryption_failure)?;
        let file = VaultFile::new(principal.id.clone(), filename, data.len() as u64);

        if let Err(e) = self.blobs.write(&file.blob_ref, ciphertext).await {
            // A taken locator holds another file's blob.
            if !e.is_already_exists() {
                self.discard_blob(&file.blob_ref).await;
            }
            return Err(write_failure(e));
        }

        if let Err(e) = self.metadata.insert_file(&file).await {
            self.discard_blob(&file.blob_ref).await;
            return Err(write_failure(e));
        }

        let record = AuditRecord::for_file(&principal.id, AuditAction::Upload, &file);
        if let Err(e) = self.metadata.append_audit(&record).await {
            if let Err(cleanup) = self.metadata.remove_file(&file.id).await {
                warn!(file_id = %file.id, error = %cleanup, "Failed to roll back file row");
            }
            self.discard_blob(&file.blob_ref).await;
            return Err(write_failure(e));
        }

        info!(file_id = %file.id, actor = %principal.id, size = file.size, "File uploaded");
        Ok(file)
    }

    /// Decrypt and return a file's content.
    ///
    /// # Errors
    /// - `NotFound` if the selector matches nothing or the file vanished concurrently
    /// - `AccessDenied` if the principal may not read the file
    /// - `StorageReadFailure` if the blob cannot be read
    /// - `IntegrityFailure` if the blob does not authenticate
    /// - `StorageWriteFailure` if the DOWNLOAD audit record cannot be written
    pub async fn download(&self, principal: &Principal, selector: &FileSelector) -> Result<Vec<u8>> {
        debug!(actor = %principal.id, selector = %selector, "Downloading file");

        let file = self.resolve(principal, selector).await?;
        if !AccessPolicy::can_download(principal, &file) {
            return Err(Error::AccessDenied(format!(
                "{} may not download {}",
                principal.username, file.id
            )));
        }

        let blob = self.blobs.read(&file.blob_ref).await.map_err(|e| {
            if e.is_not_found() {
                Error::NotFound(format!("File not found: {}", file.id))
            } else {
                read_failure(e)
            }
        })?;
        let plaintext = self.keys.decrypt(&blob).map_err(integrity_failure)?;

        let record = AuditRecord::for_file(&principal.id, AuditAction::Download, &file);
        self.metadata
            .append_audit(&record)
            .await
            .map_err(write_failure)?;

        info!(file_id = %file.id, actor = %principal.id, size = plaintext.len(), "File downloaded");
        Ok(plaintext)
    }

    /// Look up a file descriptor without reading its content.
    ///
    /// Visibility follows the download rule. No audit record is written.
    pub async fn describe(&self, principal: &Principal, id: &FileId) -> Result<VaultFile> {
        let file = self.resolve(principal, &FileSelector::Id(*id)).await?;
        if !AccessPolicy::can_download(principal, &file) {
            return Err(Error::AccessDenied(format!(
                "{} may not view {}",
                principal.username, file.id
            )));
        }
        Ok(file)
    }

    /// Delete the most recent file named `filename`.
    ///
    /// The name resolves among the principal's own files, or among all
    /// files for principals allowed to delete anything.
    ///
    /// # Errors
    /// - `NotFound` if no file matches
    /// - `AccessDenied` if the principal may not delete
    /// - `StorageWriteFailure` if the blob, row or audit record cannot be written
    pub async fn delete(&self, principal: &Principal, filename: &str) -> Result<()> {
        debug!(actor = %principal.id, filename, "Deleting file");

        let scope = AccessPolicy::file_scope(principal, Action::Delete);
        let file = self
            .metadata
            .find_latest_by_filename(&scope, filename)
            .await
            .map_err(read_failure)?
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", filename)))?;

        self.remove(principal, file).await
    }

    /// Delete a file by id.
    pub async fn delete_by_id(&self, principal: &Principal, id: &FileId) -> Result<()> {
        debug!(actor = %principal.id, file_id = %id, "Deleting file");

        let file = self.resolve(principal, &FileSelector::Id(*id)).await?;
        self.remove(principal, file).await
    }

    /// Files visible to the principal, in creation order.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<VaultFile>> {
        let scope = AccessPolicy::file_scope(principal, Action::List);
        self.metadata.list_files(&scope).await.map_err(read_failure)
    }

    /// Files visible to the principal whose name contains `needle`,
    /// ignoring case.
    pub async fn search(&self, principal: &Principal, needle: &str) -> Result<Vec<VaultFile>> {
        let scope = AccessPolicy::file_scope(principal, Action::Search);
        self.metadata
            .search_files(&scope, needle)
            .await
            .map_err(read_failure)
    }

    /// Audit records visible to the principal, in append order.
    ///
    /// Admins see everything. Others see the records about files they
    /// own, including actions taken on them by someone else.
    pub async fn audit_trail(&self, principal: &Principal) -> Result<Vec<AuditRecord>> {
        let scope = AccessPolicy::audit_scope(principal);
        self.metadata
            .audit_records(&scope)
            .await
            .map_err(read_failure)
    }

    async fn resolve(&self, principal: &Principal, selector: &FileSelector) -> Result<VaultFile> {
        let found = match selector {
            FileSelector::Id(id) => self.metadata.get_file(id).await,
            FileSelector::Owned { owner, filename } => {
                self.metadata
                    .find_latest_by_filename(&FileScope::OwnedBy(owner.clone()), filename)
                    .await
            }
            FileSelector::Named(filename) => {
                let scope = AccessPolicy::file_scope(principal, Action::Download);
                self.metadata.find_latest_by_filename(&scope, filename).await
            }
        };

        found
            .map_err(read_failure)?
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", selector)))
    }

    /// Blob first, then row, then audit. A blob that is already gone
    /// counts as deleted so an interrupted delete can be retried.
    async fn remove(&self, principal: &Principal, file: VaultFile) -> Result<()> {
        if !AccessPolicy::can_delete(principal, &file) {
            return Err(Error::AccessDenied(format!(
                "{} may not delete {}",
                principal.username, file.id
            )));
        }

        match self.blobs.delete(&file.blob_ref).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(file_id = %file.id, "Blob already missing, removing row");
            }
            Err(e) => return Err(write_failure(e)),
        }

        if !self
            .metadata
            .remove_file(&file.id)
            .await
            .map_err(write_failure)?
        {
            return Err(Error::NotFound(format!("File not found: {}", file.id)));
        }

        let record = AuditRecord::for_file(&principal.id, AuditAction::Delete, &file);
        if let Err(e) = self.metadata.append_audit(&record).await {
            error!(file_id = %file.id, error = %e, "File deleted but audit record was not written");
            return Err(write_failure(e));
        }

        info!(file_id = %file.id, actor = %principal.id, "File deleted");
        Ok(())
    }

    async fn discard_blob(&self, locator: &BlobLocator) {
        match self.blobs.delete(locator).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(locator = %locator, error = %e, "Failed to clean up blob"),
        }
    }
}
