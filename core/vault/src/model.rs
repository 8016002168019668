//! Vault records and query scopes.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use ironvault_common::{Error, FileId, Result, UserId};
use ironvault_storage::BlobLocator;

/// Current time at the microsecond precision every store persists.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Descriptor of an encrypted file held in the vault.
///
/// Ownership is fixed at creation. `blob_ref` is unique even when two
/// files share owner and filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultFile {
    pub id: FileId,
    pub filename: String,
    pub blob_ref: BlobLocator,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Plaintext size in bytes.
    pub size: u64,
}

impl VaultFile {
    /// Describe a new file with a fresh id and locator.
    pub fn new(owner_id: UserId, filename: impl Into<String>, size: u64) -> Self {
        Self {
            id: FileId::generate(),
            filename: filename.into(),
            blob_ref: BlobLocator::generate(),
            owner_id,
            created_at: now_micros(),
            size,
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }
}

/// Action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Upload,
    Download,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "UPLOAD",
            AuditAction::Download => "DOWNLOAD",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UPLOAD" => Ok(AuditAction::Upload),
            "DOWNLOAD" => Ok(AuditAction::Download),
            "DELETE" => Ok(AuditAction::Delete),
            other => Err(Error::Serialization(format!("Unknown audit action: {}", other))),
        }
    }
}

/// Append-only record of a completed vault action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub actor_id: UserId,
    pub action: AuditAction,
    pub file_id: Option<FileId>,
    /// Owner of the referenced file at the time of the action.
    pub file_owner_id: Option<UserId>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Record `action` by `actor` on `file`.
    pub fn for_file(actor: &UserId, action: AuditAction, file: &VaultFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor.clone(),
            action,
            file_id: Some(file.id),
            file_owner_id: Some(file.owner_id.clone()),
            timestamp: now_micros(),
        }
    }

    /// Whether the file this record touched is owned by `user`.
    pub fn concerns_file_of(&self, user: &UserId) -> bool {
        self.file_owner_id.as_ref() == Some(user)
    }
}

/// How a caller names the file it wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelector {
    /// Canonical lookup by engine-generated id.
    Id(FileId),
    /// Most recent file with `filename` owned by `owner`.
    Owned { owner: UserId, filename: String },
    /// Most recent file with `filename` visible to the caller.
    Named(String),
}

impl fmt::Display for FileSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSelector::Id(id) => write!(f, "id {}", id),
            FileSelector::Owned { owner, filename } => write!(f, "{}/{}", owner, filename),
            FileSelector::Named(filename) => write!(f, "{}", filename),
        }
    }
}

/// Which files a query may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileScope {
    All,
    OwnedBy(UserId),
}

impl FileScope {
    pub fn contains(&self, file: &VaultFile) -> bool {
        match self {
            FileScope::All => true,
            FileScope::OwnedBy(owner) => file.is_owned_by(owner),
        }
    }
}

/// Which audit records a query may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditScope {
    All,
    /// Records about files owned by the user, whoever acted.
    FilesOwnedBy(UserId),
}

impl AuditScope {
    pub fn contains(&self, record: &AuditRecord) -> bool {
        match self {
            AuditScope::All => true,
            AuditScope::FilesOwnedBy(user) => record.concerns_file_of(user),
        }
    }
}

/// Case-insensitive substring match on a filename.
///
/// An empty needle matches every filename.
pub fn filename_matches(filename: &str, needle: &str) -> bool {
    filename.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[test]
    fn test_new_files_get_distinct_ids_and_locators() {
        let a = VaultFile::new(user("alice"), "report.pdf", 10);
        let b = VaultFile::new(user("alice"), "report.pdf", 10);

        assert_ne!(a.id, b.id);
        assert_ne!(a.blob_ref, b.blob_ref);
        assert!(!a.blob_ref.as_str().contains("report"));
    }

    #[test]
    fn test_filename_matches_ignores_case() {
        assert!(filename_matches("Quarterly-Report.PDF", "report"));
        assert!(filename_matches("notes.txt", ""));
        assert!(!filename_matches("notes.txt", "report"));
    }

    #[test]
    fn test_audit_action_parse() {
        assert_eq!("DELETE".parse::<AuditAction>().unwrap(), AuditAction::Delete);
        assert!("delete".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_audit_scope_follows_file_owner() {
        let file = VaultFile::new(user("alice"), "a.txt", 1);
        let record = AuditRecord::for_file(&user("admin"), AuditAction::Download, &file);

        assert!(AuditScope::FilesOwnedBy(user("alice")).contains(&record));
        assert!(!AuditScope::FilesOwnedBy(user("admin")).contains(&record));
        assert!(!AuditScope::FilesOwnedBy(user("bob")).contains(&record));
        assert!(AuditScope::All.contains(&record));
    }

    #[test]
    fn test_file_scope() {
        let file = VaultFile::new(user("alice"), "a.txt", 1);

        assert!(FileScope::All.contains(&file));
        assert!(FileScope::OwnedBy(user("alice")).contains(&file));
        assert!(!FileScope::OwnedBy(user("bob")).contains(&file));
    }
}
