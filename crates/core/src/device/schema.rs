//! The device's `Bookmark` table as this tool relies on it.
//!
//! The schema belongs to the e-reader firmware and is never migrated here;
//! it is only inspected so that a firmware change is reported up front
//! instead of failing halfway through a batch.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::DeviceError;

/// Every `Bookmark` column read during backup or written during restore.
pub static REQUIRED_COLUMNS: &[&str] = &[
    "BookmarkID",
    "VolumeID",
    "ContentID",
    "StartContainerPath",
    "StartContainerChildIndex",
    "StartOffset",
    "EndContainerPath",
    "EndContainerChildIndex",
    "EndOffset",
    "Text",
    "Annotation",
    "DateCreated",
    "ChapterProgress",
    "Hidden",
    "Version",
    "DateModified",
    "Creator",
    "UUID",
    "UserID",
    "SyncTime",
    "Published",
    "ContextString",
    "Type",
];

/// The `Bookmark` table as created by current Kobo firmware.
///
/// Used to build fixture databases.
pub const BOOKMARK_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS Bookmark (
    BookmarkID                  TEXT NOT NULL,
    VolumeID                    TEXT NOT NULL,
    ContentID                   TEXT NOT NULL,
    StartContainerPath          TEXT NOT NULL,
    StartContainerChildIndex    INTEGER NOT NULL,
    StartOffset                 INTEGER NOT NULL,
    EndContainerPath            TEXT NOT NULL,
    EndContainerChildIndex      INTEGER NOT NULL,
    EndOffset                   INTEGER NOT NULL,
    Text                        TEXT,
    Annotation                  TEXT,
    ExtraAnnotationData         BLOB,
    DateCreated                 TEXT,
    ChapterProgress             REAL NOT NULL DEFAULT 0,
    Hidden                      BOOL NOT NULL DEFAULT 0,
    Version                     TEXT,
    DateModified                TEXT,
    Creator                     TEXT,
    UUID                        TEXT,
    UserID                      TEXT,
    SyncTime                    TEXT,
    Published                   BIT DEFAULT false,
    ContextString               TEXT,
    Type                        TEXT,
    PRIMARY KEY (BookmarkID)
);

CREATE INDEX IF NOT EXISTS bookmark_content ON Bookmark (ContentID);
CREATE INDEX IF NOT EXISTS bookmark_volume ON Bookmark (VolumeID);
"#;

/// Return the required columns the `Bookmark` table lacks.
///
/// A missing table reports every column.
pub fn missing_columns(conn: &Connection) -> Result<Vec<String>, DeviceError> {
    let mut stmt = conn.prepare("PRAGMA table_info(Bookmark)")?;
    let present: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !present.iter().any(|c| c.eq_ignore_ascii_case(required)))
        .map(|c| c.to_string())
        .collect();

    debug!(present = present.len(), missing = missing.len(), "inspected Bookmark table");
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_has_every_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(BOOKMARK_TABLE_DDL).unwrap();
        assert!(missing_columns(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_old_firmware_lacks_late_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(BOOKMARK_TABLE_DDL).unwrap();
        conn.execute_batch(
            "CREATE TABLE old AS SELECT * FROM Bookmark;
             DROP TABLE Bookmark;
             CREATE TABLE Bookmark AS SELECT BookmarkID, VolumeID, ContentID,
                StartContainerPath, StartContainerChildIndex, StartOffset,
                EndContainerPath, EndContainerChildIndex, EndOffset, Text, Annotation,
                DateCreated, ChapterProgress, Hidden, Version, DateModified, Creator,
                UUID, UserID, SyncTime, Published FROM old;",
        )
        .unwrap();

        assert_eq!(missing_columns(&conn).unwrap(), vec!["ContextString", "Type"]);
    }

    #[test]
    fn test_column_names_compare_case_insensitively() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&BOOKMARK_TABLE_DDL.replace("VolumeID ", "VolumeId "))
            .unwrap();
        assert!(missing_columns(&conn).unwrap().is_empty());
    }
}
