//! Typed bookmark queries against the device database.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::paths::{ONBOARD_ROOT, VOLUME_PREFIX};
use super::KoboDatabase;
use crate::errors::DeviceError;
use crate::models::{Bookmark, BookmarkSet, DeviceFlag};

// ---------------------------------------------------------------------------
// Column conversions
// ---------------------------------------------------------------------------

impl FromSql for DeviceFlag {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(DeviceFlag::FALSE),
            ValueRef::Integer(i) => Ok(DeviceFlag(i != 0)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(DeviceFlag::parse)
                .ok_or(FromSqlError::InvalidType),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for DeviceFlag {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// Outcome of restoring one book's bookmarks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStats {
    /// Rows inserted.
    pub inserted: usize,
    /// Bookmarks already present on the device, left untouched.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

const BOOKMARK_COLUMNS: &str = "BookmarkID, ContentID, StartContainerPath, \
     StartContainerChildIndex, StartOffset, EndContainerPath, EndContainerChildIndex, \
     EndOffset, Text, Annotation, DateCreated, ChapterProgress, Hidden, Version, \
     DateModified, Creator, UUID, UserID, SyncTime, Published, ContextString, Type";

impl KoboDatabase {
    /// All visible bookmarks of the book at `book_path` (relative to the
    /// device root), in row order.
    pub fn bookmarks_for_book(&self, book_path: &str) -> Result<BookmarkSet, DeviceError> {
        let escaped = escape_like(book_path);
        let volume_pattern = format!("{}{}", VOLUME_PREFIX, escaped);
        let content_pattern = format!("{}{}%", ONBOARD_ROOT, escaped);
        let content_prefix = format!("{}{}", ONBOARD_ROOT, book_path);

        let sql = format!(
            "SELECT {} FROM Bookmark
             WHERE Hidden = 'false'
               AND VolumeID LIKE ?1 ESCAPE '\\'
               AND ContentID LIKE ?2 ESCAPE '\\'",
            BOOKMARK_COLUMNS
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let bookmarks = stmt
            .query_map(params![volume_pattern, content_pattern], |row| {
                bookmark_from_row(row, &content_prefix)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(book_path, count = bookmarks.len(), "read device bookmarks");
        Ok(BookmarkSet::new(bookmarks))
    }

    /// Whether any row (for any book) carries `bookmark_id`.
    pub fn bookmark_exists(&self, bookmark_id: &str) -> Result<bool, DeviceError> {
        Ok(bookmark_exists(self.conn(), bookmark_id)?)
    }

    /// Insert every bookmark of `set` that the device does not have yet.
    ///
    /// Existing rows are never updated or deleted. All inserts for the book
    /// run in one transaction, so a failure leaves the device unchanged.
    pub fn restore_bookmarks(
        &mut self,
        book_path: &str,
        set: &BookmarkSet,
    ) -> Result<RestoreStats, DeviceError> {
        let stats = self.transaction(|conn| {
            let mut stats = RestoreStats::default();
            for bookmark in set {
                if bookmark_exists(conn, &bookmark.bookmark_id)? {
                    debug!(id = %bookmark.bookmark_id, "already on device");
                    stats.skipped += 1;
                    continue;
                }
                insert_bookmark(conn, book_path, bookmark)?;
                stats.inserted += 1;
            }
            Ok(stats)
        })?;

        info!(
            book_path,
            inserted = stats.inserted,
            skipped = stats.skipped,
            "restored bookmarks to device"
        );
        Ok(stats)
    }
}

fn bookmark_exists(conn: &Connection, bookmark_id: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM Bookmark WHERE BookmarkID = ?1",
        params![bookmark_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert one row. Required columns are always written; nullable ones only
/// when set, so the table default applies otherwise.
fn insert_bookmark(conn: &Connection, book_path: &str, b: &Bookmark) -> Result<(), DeviceError> {
    let mut columns: Vec<&str> = Vec::with_capacity(23);
    let mut values: Vec<Value> = Vec::with_capacity(23);

    let mut push = |column: &'static str, value: Value| {
        columns.push(column);
        values.push(value);
    };
    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    push("BookmarkID", text(&b.bookmark_id));
    push("VolumeID", Value::Text(format!("{}{}", VOLUME_PREFIX, book_path)));
    push(
        "ContentID",
        Value::Text(format!("{}{}{}", ONBOARD_ROOT, book_path, b.content_id)),
    );
    push("StartContainerPath", text(&b.start_container_path));
    push("StartContainerChildIndex", Value::Integer(b.start_container_child_index));
    push("StartOffset", Value::Integer(b.start_offset));
    push("EndContainerPath", text(&b.end_container_path));
    push("EndContainerChildIndex", Value::Integer(b.end_container_child_index));
    push("EndOffset", Value::Integer(b.end_offset));

    let optional = [
        ("Text", &b.text),
        ("Annotation", &b.annotation),
        ("DateCreated", &b.date_created),
    ];
    for (column, value) in optional {
        if let Some(v) = value {
            push(column, text(v));
        }
    }

    push("ChapterProgress", Value::Real(b.chapter_progress));
    push("Hidden", text(b.hidden.as_str()));

    let optional = [
        ("Version", &b.version),
        ("DateModified", &b.date_modified),
        ("Creator", &b.creator),
        ("UUID", &b.uuid),
        ("UserID", &b.user_id),
        ("SyncTime", &b.sync_time),
    ];
    for (column, value) in optional {
        if let Some(v) = value {
            push(column, text(v));
        }
    }

    push("Published", text(b.published.as_str()));

    let optional = [("ContextString", &b.context_string), ("Type", &b.kind)];
    for (column, value) in optional {
        if let Some(v) = value {
            push(column, text(v));
        }
    }

    let placeholders = vec!["?"; columns.len()].join(",");
    let sql = format!(
        "INSERT INTO Bookmark ({}) VALUES ({})",
        columns.join(","),
        placeholders
    );
    conn.execute(&sql, params_from_iter(values.iter()))?;
    debug!(id = %b.bookmark_id, columns = columns.len(), "inserted device bookmark");
    Ok(())
}

/// Map one `Bookmark` row, making `ContentID` relative to the book.
fn bookmark_from_row(row: &Row<'_>, content_prefix: &str) -> rusqlite::Result<Bookmark> {
    let content_id: String = row.get("ContentID")?;
    let content_id = content_id
        .strip_prefix(content_prefix)
        .map(str::to_string)
        .unwrap_or(content_id);

    Ok(Bookmark {
        bookmark_id: row.get("BookmarkID")?,
        content_id,
        start_container_path: row.get("StartContainerPath")?,
        start_container_child_index: row.get("StartContainerChildIndex")?,
        start_offset: row.get("StartOffset")?,
        end_container_path: row.get("EndContainerPath")?,
        end_container_child_index: row.get("EndContainerChildIndex")?,
        end_offset: row.get("EndOffset")?,
        text: row.get("Text")?,
        annotation: row.get("Annotation")?,
        date_created: row.get("DateCreated")?,
        chapter_progress: row.get("ChapterProgress")?,
        hidden: row.get("Hidden")?,
        version: row.get("Version")?,
        date_modified: row.get("DateModified")?,
        creator: row.get("Creator")?,
        uuid: row.get("UUID")?,
        user_id: row.get("UserID")?,
        sync_time: row.get("SyncTime")?,
        published: row.get("Published")?,
        context_string: row.get("ContextString")?,
        kind: row.get("Type")?,
    })
}

/// Escape `\`, `_` and `%` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '_' | '%') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
