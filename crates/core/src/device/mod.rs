//! Access to the e-reader: its bookmark database and its book paths.
//!
//! Provides a [`KoboDatabase`] handle over `.kobo/KoboReader.sqlite` with
//! typed bookmark queries, plus device detection and per-book path
//! resolution in [`paths`].

pub mod paths;
pub mod queries;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::errors::DeviceError;

pub use paths::{
    relative_book_path, CalibreDeviceIndex, Device, DevicePathResolver, DeviceSlot,
};
pub use queries::RestoreStats;

/// Handle over the device's bookmark database.
///
/// Each handle is meant to live for one book's query or one book's batch of
/// inserts; the connection is closed when the handle is dropped, on success
/// and error paths alike.
pub struct KoboDatabase {
    conn: Connection,
}

impl KoboDatabase {
    /// Open an existing device database at `path`.
    ///
    /// The file is never created: a missing database means the device is
    /// not (or no longer) mounted. A database locked by another process
    /// fails on the first statement rather than waiting.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening device database");

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)?;
        Self::configure(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, DeviceError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Ok(Self { conn })
    }

    fn configure(conn: &Connection) -> Result<(), DeviceError> {
        // Book paths are matched with LIKE; on-device paths are case-sensitive.
        conn.execute_batch("PRAGMA case_sensitive_like = ON;")?;
        Ok(())
    }

    /// Borrow the underlying connection.
    ///
    /// Prefer the typed query methods over raw SQL whenever possible.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure inside a SQLite transaction. If the closure returns
    /// `Ok`, the transaction is committed; otherwise it is rolled back.
    pub fn transaction<F, T>(&mut self, f: F) -> Result<T, DeviceError>
    where
        F: FnOnce(&Connection) -> Result<T, DeviceError>,
    {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Check that the `Bookmark` table has every column this tool uses.
    pub fn verify_schema(&self) -> Result<(), DeviceError> {
        let missing = schema::missing_columns(&self.conn)?;
        if missing.is_empty() {
            info!("device bookmark schema verified");
            Ok(())
        } else {
            Err(DeviceError::SchemaMismatch { missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KoboReader.sqlite");
        assert!(KoboDatabase::open(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_open_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("KoboReader.sqlite");
        Connection::open(&path)
            .unwrap()
            .execute_batch(schema::BOOKMARK_TABLE_DDL)
            .unwrap();

        let db = KoboDatabase::open(&path).unwrap();
        db.verify_schema().unwrap();
    }

    #[test]
    fn test_verify_schema_reports_missing_table() {
        let db = KoboDatabase::in_memory().unwrap();
        let err = db.verify_schema().unwrap_err();
        assert!(matches!(err, DeviceError::SchemaMismatch { ref missing } if missing.len() == schema::REQUIRED_COLUMNS.len()));
    }

    #[test]
    fn test_transaction_rollback() {
        let mut db = KoboDatabase::in_memory().unwrap();
        db.conn().execute_batch(schema::BOOKMARK_TABLE_DDL).unwrap();

        let result: Result<(), DeviceError> = db.transaction(|conn| {
            conn.execute(
                "INSERT INTO Bookmark (BookmarkID, VolumeID, ContentID, StartContainerPath,
                 StartContainerChildIndex, StartOffset, EndContainerPath, EndContainerChildIndex,
                 EndOffset, ChapterProgress, Hidden, Published)
                 VALUES ('x', 'v', 'c', 'p', 0, 0, 'p', 0, 0, 0, 'false', 'false')",
                [],
            )?;
            Err(DeviceError::NotDetected("forced".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM Bookmark", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
