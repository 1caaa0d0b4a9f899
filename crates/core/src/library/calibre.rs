//! [`LibraryStore`] over a calibre library's `metadata.db`.
//!
//! Bookmarks live in a long-text custom column (`#bookmarks` by default).
//! calibre keeps such a column in its own table, `custom_column_<N>`, with
//! one `(book, value)` row per book that has a value.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use super::LibraryStore;
use crate::errors::LibraryError;

/// calibre's datatype name for long-text columns.
const LONG_TEXT_DATATYPE: &str = "comments";

/// The subset of calibre's schema this module touches.
///
/// Used to build fixture libraries.
pub const LIBRARY_FIXTURE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    title   TEXT NOT NULL DEFAULT 'Unknown',
    sort    TEXT,
    path    TEXT NOT NULL DEFAULT '',
    uuid    TEXT
);

CREATE TABLE IF NOT EXISTS custom_columns (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    label           TEXT NOT NULL,
    name            TEXT NOT NULL,
    datatype        TEXT NOT NULL,
    mark_for_delete BOOL DEFAULT 0 NOT NULL,
    editable        BOOL DEFAULT 1 NOT NULL,
    display         TEXT DEFAULT '{}' NOT NULL,
    is_multiple     BOOL DEFAULT 0 NOT NULL,
    normalized      BOOL NOT NULL,
    UNIQUE(label)
);
"#;

/// A calibre library opened for bookmark access.
pub struct CalibreLibrary {
    conn: Connection,
    label: String,
    table: String,
}

impl CalibreLibrary {
    /// Open the `metadata.db` inside `library_dir` and locate the custom
    /// column `label` (given without `#`).
    pub fn open<P: AsRef<Path>>(library_dir: P, label: &str) -> Result<Self, LibraryError> {
        let path = library_dir.as_ref().join("metadata.db");
        if !path.is_file() {
            return Err(LibraryError::NotFound(path.display().to_string()));
        }
        debug!(path = %path.display(), "opening library database");

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&path, flags)?;
        Self::from_connection(conn, label)
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection, label: &str) -> Result<Self, LibraryError> {
        let column_id = resolve_column(&conn, label)?;
        let table = format!("custom_column_{}", column_id);
        info!(label, table = %table, "library bookmark column resolved");

        Ok(Self {
            conn,
            label: label.to_string(),
            table,
        })
    }

    /// Lookup label of the bookmark column, without `#`.
    pub fn column_label(&self) -> &str {
        &self.label
    }

    /// Borrow the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn ensure_book(&self, book_id: i64) -> Result<(), LibraryError> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM books WHERE id = ?1", params![book_id], |row| {
                row.get(0)
            })
            .optional()?;
        match found {
            Some(_) => Ok(()),
            None => Err(LibraryError::BookNotFound(book_id)),
        }
    }
}

/// Find the id of the long-text custom column `label`.
fn resolve_column(conn: &Connection, label: &str) -> Result<i64, LibraryError> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, datatype FROM custom_columns
             WHERE label = ?1 AND mark_for_delete = 0",
            params![label],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        None => Err(LibraryError::ColumnNotFound(label.to_string())),
        Some((_, datatype)) if datatype != LONG_TEXT_DATATYPE => {
            Err(LibraryError::WrongColumnType {
                label: label.to_string(),
                datatype,
            })
        }
        Some((id, _)) => Ok(id),
    }
}

impl LibraryStore for CalibreLibrary {
    fn title(&self, book_id: i64) -> Result<String, LibraryError> {
        self.conn
            .query_row("SELECT title FROM books WHERE id = ?1", params![book_id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or(LibraryError::BookNotFound(book_id))
    }

    fn read_bookmarks(&self, book_id: i64) -> Result<Option<String>, LibraryError> {
        self.ensure_book(book_id)?;

        let sql = format!("SELECT value FROM {} WHERE book = ?1", self.table);
        let value: Option<Option<String>> = self
            .conn
            .query_row(&sql, params![book_id], |row| row.get(0))
            .optional()?;

        let value = value.flatten().filter(|v| !v.trim().is_empty());
        debug!(book_id, stored = value.is_some(), "read library bookmarks");
        Ok(value)
    }

    fn write_bookmarks(&mut self, book_id: i64, value: Option<&str>) -> Result<(), LibraryError> {
        self.ensure_book(book_id)?;

        match value {
            Some(text) => {
                let sql = format!(
                    "INSERT INTO {} (book, value) VALUES (?1, ?2)
                     ON CONFLICT(book) DO UPDATE SET value = excluded.value",
                    self.table
                );
                self.conn.execute(&sql, params![book_id, text])?;
                debug!(book_id, bytes = text.len(), "stored library bookmarks");
            }
            None => {
                let sql = format!("DELETE FROM {} WHERE book = ?1", self.table);
                self.conn.execute(&sql, params![book_id])?;
                debug!(book_id, "cleared library bookmarks");
            }
        }
        Ok(())
    }
}
