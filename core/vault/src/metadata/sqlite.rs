//! SQLite-backed metadata store.
//!
//! Files and audit records live in two tables with an autoincrement
//! `seq` column that fixes insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, types::ToSql, Connection, Row};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use ironvault_common::{Error, FileId, Result, UserId};
use ironvault_storage::BlobLocator;

use super::MetadataStore;
use crate::model::{filename_matches, AuditAction, AuditRecord, AuditScope, FileScope, VaultFile};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS vault_files (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL,
    blob_ref TEXT NOT NULL UNIQUE,
    owner_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    size INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_owner ON vault_files(owner_id);
CREATE INDEX IF NOT EXISTS idx_files_filename ON vault_files(filename);

CREATE TABLE IF NOT EXISTS audit_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    actor_id TEXT NOT NULL,
    action TEXT NOT NULL,
    file_id TEXT,
    file_owner_id TEXT,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_owner ON audit_records(file_owner_id);
"#;

fn read_err(e: rusqlite::Error) -> Error {
    Error::StorageReadFailure(format!("SQLite query failed: {}", e))
}

fn write_err(e: rusqlite::Error) -> Error {
    Error::StorageWriteFailure(format!("SQLite write failed: {}", e))
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> Error {
    Error::StorageReadFailure(format!("Corrupt {} in metadata store: {}", what, detail))
}

fn timestamp_from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| corrupt("timestamp", micros))
}

/// Raw `vault_files` row before validation.
struct FileRow {
    id: String,
    filename: String,
    blob_ref: String,
    owner_id: String,
    created_at: i64,
    size: i64,
}

impl FileRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            filename: row.get(1)?,
            blob_ref: row.get(2)?,
            owner_id: row.get(3)?,
            created_at: row.get(4)?,
            size: row.get(5)?,
        })
    }

    fn into_file(self) -> Result<VaultFile> {
        Ok(VaultFile {
            id: self.id.parse().map_err(|e| corrupt("file id", e))?,
            filename: self.filename,
            blob_ref: BlobLocator::new(self.blob_ref).map_err(|e| corrupt("blob locator", e))?,
            owner_id: UserId::new(self.owner_id).map_err(|e| corrupt("owner id", e))?,
            created_at: timestamp_from_micros(self.created_at)?,
            size: u64::try_from(self.size).map_err(|e| corrupt("size", e))?,
        })
    }
}

/// Raw `audit_records` row before validation.
struct AuditRow {
    id: String,
    actor_id: String,
    action: String,
    file_id: Option<String>,
    file_owner_id: Option<String>,
    timestamp: i64,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            action: row.get(2)?,
            file_id: row.get(3)?,
            file_owner_id: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<AuditRecord> {
        let file_id = self
            .file_id
            .map(|id| id.parse::<FileId>())
            .transpose()
            .map_err(|e| corrupt("file id", e))?;
        let file_owner_id = self
            .file_owner_id
            .map(UserId::new)
            .transpose()
            .map_err(|e| corrupt("owner id", e))?;

        Ok(AuditRecord {
            id: Uuid::parse_str(&self.id).map_err(|e| corrupt("audit id", e))?,
            actor_id: UserId::new(self.actor_id).map_err(|e| corrupt("actor id", e))?,
            action: self.action.parse()?,
            file_id,
            file_owner_id,
            timestamp: timestamp_from_micros(self.timestamp)?,
        })
    }
}

fn query_files(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<VaultFile>> {
    let mut stmt = conn.prepare(sql).map_err(read_err)?;
    let rows = stmt.query_map(params, FileRow::from_row).map_err(read_err)?;

    let mut files = Vec::new();
    for row in rows {
        files.push(row.map_err(read_err)?.into_file()?);
    }
    Ok(files)
}

fn query_audit(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<AuditRecord>> {
    let mut stmt = conn.prepare(sql).map_err(read_err)?;
    let rows = stmt.query_map(params, AuditRow::from_row).map_err(read_err)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.map_err(read_err)?.into_record()?);
    }
    Ok(records)
}

fn list_scoped(conn: &Connection, scope: &FileScope) -> Result<Vec<VaultFile>> {
    match scope {
        FileScope::All => query_files(
            conn,
            "SELECT id, filename, blob_ref, owner_id, created_at, size
             FROM vault_files ORDER BY seq",
            &[],
        ),
        FileScope::OwnedBy(owner) => query_files(
            conn,
            "SELECT id, filename, blob_ref, owner_id, created_at, size
             FROM vault_files WHERE owner_id = ?1 ORDER BY seq",
            &[&owner.as_str()],
        ),
    }
}

/// Metadata store over a single SQLite connection.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Create or open a metadata database.
    ///
    /// # Errors
    /// - `StorageWriteFailure` if the database cannot be opened or migrated
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(write_err)?;
        conn.execute_batch(SCHEMA).map_err(write_err)?;

        info!(path = %db_path.as_ref().display(), "Metadata store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert_file(&self, file: &VaultFile) -> Result<()> {
        debug!(file_id = %file.id, "Inserting file row");
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO vault_files (id, filename, blob_ref, owner_id, created_at, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.id.to_string(),
                file.filename,
                file.blob_ref.as_str(),
                file.owner_id.as_str(),
                file.created_at.timestamp_micros(),
                i64::try_from(file.size).map_err(|e| Error::InvalidInput(e.to_string()))?,
            ],
        )
        .map_err(write_err)?;
        Ok(())
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<VaultFile>> {
        let conn = self.conn.lock().await;
        let mut files = query_files(
            &conn,
            "SELECT id, filename, blob_ref, owner_id, created_at, size
             FROM vault_files WHERE id = ?1",
            &[&id.to_string()],
        )?;
        Ok(files.pop())
    }

    async fn find_latest_by_filename(
        &self,
        scope: &FileScope,
        filename: &str,
    ) -> Result<Option<VaultFile>> {
        let conn = self.conn.lock().await;
        let mut files = match scope {
            FileScope::All => query_files(
                &conn,
                "SELECT id, filename, blob_ref, owner_id, created_at, size
                 FROM vault_files WHERE filename = ?1 ORDER BY seq DESC LIMIT 1",
                &[&filename],
            )?,
            FileScope::OwnedBy(owner) => query_files(
                &conn,
                "SELECT id, filename, blob_ref, owner_id, created_at, size
                 FROM vault_files WHERE owner_id = ?1 AND filename = ?2
                 ORDER BY seq DESC LIMIT 1",
                &[&owner.as_str(), &filename],
            )?,
        };
        Ok(files.pop())
    }

    async fn remove_file(&self, id: &FileId) -> Result<bool> {
        debug!(file_id = %id, "Removing file row");
        let conn = self.conn.lock().await;
        let removed = conn
            .execute("DELETE FROM vault_files WHERE id = ?1", [id.to_string()])
            .map_err(write_err)?;
        Ok(removed > 0)
    }

    async fn list_files(&self, scope: &FileScope) -> Result<Vec<VaultFile>> {
        let conn = self.conn.lock().await;
        list_scoped(&conn, scope)
    }

    async fn search_files(&self, scope: &FileScope, needle: &str) -> Result<Vec<VaultFile>> {
        // SQLite's lower() only folds ASCII, so matching happens here.
        let conn = self.conn.lock().await;
        let mut files = list_scoped(&conn, scope)?;
        files.retain(|f| filename_matches(&f.filename, needle));
        Ok(files)
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO audit_records (id, actor_id, action, file_id, file_owner_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.actor_id.as_str(),
                record.action.as_str(),
                record.file_id.map(|id| id.to_string()),
                record.file_owner_id.as_ref().map(|id| id.as_str()),
                record.timestamp.timestamp_micros(),
            ],
        )
        .map_err(write_err)?;
        Ok(())
    }

    async fn audit_records(&self, scope: &AuditScope) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock().await;
        match scope {
            AuditScope::All => query_audit(
                &conn,
                "SELECT id, actor_id, action, file_id, file_owner_id, timestamp
                 FROM audit_records ORDER BY seq",
                &[],
            ),
            AuditScope::FilesOwnedBy(owner) => query_audit(
                &conn,
                "SELECT id, actor_id, action, file_id, file_owner_id, timestamp
                 FROM audit_records WHERE file_owner_id = ?1 ORDER BY seq",
                &[&owner.as_str()],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_file_roundtrip() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let file = VaultFile::new(user("alice"), "report.pdf", 42);

        store.insert_file(&file).await.unwrap();

        assert_eq!(store.get_file(&file.id).await.unwrap(), Some(file));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_write_failure() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let file = VaultFile::new(user("alice"), "report.pdf", 42);

        store.insert_file(&file).await.unwrap();
        assert!(matches!(
            store.insert_file(&file).await,
            Err(Error::StorageWriteFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_reports_presence() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let file = VaultFile::new(user("alice"), "a.txt", 1);

        store.insert_file(&file).await.unwrap();
        assert!(store.remove_file(&file.id).await.unwrap());
        assert!(!store.remove_file(&file.id).await.unwrap());
        assert_eq!(store.get_file(&file.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_latest_and_scope() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let older = VaultFile::new(user("alice"), "dup.txt", 1);
        let newer = VaultFile::new(user("alice"), "dup.txt", 2);
        let bobs = VaultFile::new(user("bob"), "dup.txt", 3);
        for f in [&older, &newer, &bobs] {
            store.insert_file(f).await.unwrap();
        }

        let alice = store
            .find_latest_by_filename(&FileScope::OwnedBy(user("alice")), "dup.txt")
            .await
            .unwrap();
        assert_eq!(alice.map(|f| f.id), Some(newer.id));

        let any = store
            .find_latest_by_filename(&FileScope::All, "dup.txt")
            .await
            .unwrap();
        assert_eq!(any.map(|f| f.id), Some(bobs.id));

        let missing = store
            .find_latest_by_filename(&FileScope::All, "nope.txt")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_and_search_order() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let names = ["Budget.xlsx", "budget-2024.xlsx", "notes.md"];
        for name in names {
            store
                .insert_file(&VaultFile::new(user("alice"), name, 1))
                .await
                .unwrap();
        }

        let listed: Vec<_> = store
            .list_files(&FileScope::OwnedBy(user("alice")))
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.filename)
            .collect();
        assert_eq!(listed, names);

        let found = store.search_files(&FileScope::All, "BUDGET").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(store
            .list_files(&FileScope::OwnedBy(user("bob")))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_audit_scope_and_order() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let file = VaultFile::new(user("alice"), "a.txt", 1);

        let upload = AuditRecord::for_file(&user("alice"), AuditAction::Upload, &file);
        let download = AuditRecord::for_file(&user("root"), AuditAction::Download, &file);
        store.append_audit(&upload).await.unwrap();
        store.append_audit(&download).await.unwrap();

        assert_eq!(
            store.audit_records(&AuditScope::All).await.unwrap(),
            vec![upload.clone(), download.clone()]
        );
        assert_eq!(
            store
                .audit_records(&AuditScope::FilesOwnedBy(user("alice")))
                .await
                .unwrap(),
            vec![upload, download]
        );
        // Acting on a file does not put its records in the actor's scope.
        assert!(store
            .audit_records(&AuditScope::FilesOwnedBy(user("root")))
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .audit_records(&AuditScope::FilesOwnedBy(user("bob")))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.db");
        let file = VaultFile::new(user("alice"), "kept.txt", 5);

        {
            let store = SqliteMetadataStore::open(&path).unwrap();
            store.insert_file(&file).await.unwrap();
        }

        let reopened = SqliteMetadataStore::open(&path).unwrap();
        assert_eq!(reopened.get_file(&file.id).await.unwrap(), Some(file));
    }
}
