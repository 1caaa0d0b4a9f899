//! End-to-end tests for the backup/restore cycle.
//!
//! These tests exercise the real `BookmarkSync` engine with:
//! - A mounted-device directory holding `.kobo/KoboReader.sqlite` and a
//!   `metadata.calibre` book list
//! - A calibre library directory holding `metadata.db` with a `#bookmarks`
//!   long-text column
//!
//! Everything lives in temporary directories; no real device is needed.

use std::path::Path;

use rusqlite::{params, Connection};
use tempfile::TempDir;

use kobomarks_core::config::DeviceConfig;
use kobomarks_core::device::schema::BOOKMARK_TABLE_DDL;
use kobomarks_core::device::{CalibreDeviceIndex, Device};
use kobomarks_core::errors::SyncError;
use kobomarks_core::library::calibre::LIBRARY_FIXTURE_DDL;
use kobomarks_core::library::{CalibreLibrary, LibraryStore};
use kobomarks_core::merge::{prompt_fn, Conflict, ConflictKind, Resolution};
use kobomarks_core::models::BookmarkSet;
use kobomarks_core::sync_engine::{BookStatus, BookmarkSync};

const DUNE_PATH: &str = "calibre/Frank Herbert/Dune - Frank Herbert_12.kepub.epub";
const EMMA_PATH: &str = "calibre/Jane Austen/Emma - Jane Austen_15.kepub.epub";

// ===========================================================================
// Helpers
// ===========================================================================

struct Fixture {
    _device_dir: TempDir,
    _library_dir: TempDir,
    device_root: std::path::PathBuf,
    library_root: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let device_dir = tempfile::tempdir().unwrap();
        let library_dir = tempfile::tempdir().unwrap();
        let device_root = device_dir.path().to_path_buf();
        let library_root = library_dir.path().to_path_buf();

        create_device(&device_root);
        create_library(&library_root);

        Self {
            _device_dir: device_dir,
            _library_dir: library_dir,
            device_root,
            library_root,
        }
    }

    fn device(&self) -> Device {
        Device::detect(&DeviceConfig {
            mount_point: self.device_root.clone(),
            card_a: None,
            card_b: None,
        })
        .expect("device should be detected")
    }

    fn sync(&self) -> BookmarkSync<CalibreLibrary, CalibreDeviceIndex> {
        let device = self.device();
        let index = CalibreDeviceIndex::load(&device).unwrap();
        let library = CalibreLibrary::open(&self.library_root, "bookmarks").unwrap();
        BookmarkSync::new(library, index, Some(device))
    }

    fn device_conn(&self) -> Connection {
        Connection::open(self.device_root.join(".kobo/KoboReader.sqlite")).unwrap()
    }

    fn stored(&self, book_id: i64) -> Option<BookmarkSet> {
        let library = CalibreLibrary::open(&self.library_root, "bookmarks").unwrap();
        library
            .read_bookmarks(book_id)
            .unwrap()
            .map(|text| BookmarkSet::from_json(&text).unwrap())
    }
}

fn create_device(root: &Path) {
    std::fs::create_dir_all(root.join(".kobo")).unwrap();
    let conn = Connection::open(root.join(".kobo/KoboReader.sqlite")).unwrap();
    conn.execute_batch(BOOKMARK_TABLE_DDL).unwrap();

    let book_list = serde_json::json!([
        {"lpath": DUNE_PATH, "application_id": 12, "title": "Dune", "uuid": "0b4a"},
        {"lpath": EMMA_PATH, "application_id": 15, "title": "Emma", "uuid": "77fe"},
    ]);
    std::fs::write(root.join("metadata.calibre"), book_list.to_string()).unwrap();
}

fn create_library(root: &Path) {
    let conn = Connection::open(root.join("metadata.db")).unwrap();
    conn.execute_batch(LIBRARY_FIXTURE_DDL).unwrap();
    conn.execute_batch(
        "INSERT INTO custom_columns (id, label, name, datatype, normalized)
             VALUES (3, 'bookmarks', 'Bookmarks', 'comments', 0);
         CREATE TABLE custom_column_3 (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             book INTEGER,
             value TEXT NOT NULL COLLATE NOCASE,
             UNIQUE(book));
         INSERT INTO books (id, title) VALUES (12, 'Dune'), (15, 'Emma'), (20, 'Not sent');",
    )
    .unwrap();
}

fn add_device_bookmark(conn: &Connection, id: &str, book_path: &str, text: &str) {
    conn.execute(
        "INSERT INTO Bookmark (BookmarkID, VolumeID, ContentID, StartContainerPath,
         StartContainerChildIndex, StartOffset, EndContainerPath, EndContainerChildIndex,
         EndOffset, Text, Annotation, DateCreated, ChapterProgress, Hidden, Version,
         DateModified, Creator, UUID, UserID, SyncTime, Published, ContextString, Type)
         VALUES (?1, ?2, ?3, 'span#kobo\\.7\\.1', 0, 0, 'span#kobo\\.7\\.3', 0, 41,
                 ?4, NULL, '2023-01-02T10:00:00.000', 0.4, 'false', NULL,
                 '2023-01-02T10:00:00.000', NULL, NULL, NULL, NULL, 'false', 'ctx', 'highlight')",
        params![
            id,
            format!("file:///mnt/onboard/{}", book_path),
            format!("/mnt/onboard/{}!OEBPS!text/part0003.xhtml", book_path),
            text,
        ],
    )
    .unwrap();
}

fn never(c: &Conflict<'_>) -> Resolution {
    panic!("unexpected prompt for bookmark {}", c.bookmark_id())
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_backup_then_restore_after_device_reset() {
    let fx = Fixture::new();
    {
        let conn = fx.device_conn();
        add_device_bookmark(&conn, "d-1", DUNE_PATH, "The spice must flow.");
        add_device_bookmark(&conn, "d-2", DUNE_PATH, "Fear is the mind-killer.");
        add_device_bookmark(&conn, "e-1", EMMA_PATH, "Handsome, clever, and rich.");
    }

    let mut sync = fx.sync();
    let report = sync.backup(&[12, 15], &mut prompt_fn(never)).unwrap();
    assert_eq!(report.processed(), 2);
    assert_eq!(report.confirmation(), "Backed up the bookmarks of 2 book(s)");

    let dune = fx.stored(12).expect("Dune backed up");
    assert_eq!(dune.ids(), vec!["d-1", "d-2"]);
    assert_eq!(dune.bookmarks[0].content_id, "!OEBPS!text/part0003.xhtml");
    assert_eq!(fx.stored(15).unwrap().ids(), vec!["e-1"]);

    // The device is reset: every bookmark is gone.
    fx.device_conn().execute("DELETE FROM Bookmark", []).unwrap();

    let report = sync.restore(&[12, 15]).unwrap();
    assert_eq!(report.processed(), 2);
    assert_eq!(report.confirmation(), "Restored bookmarks of 2 book(s)");

    let db = fx.device().open_database().unwrap();
    let restored = db.bookmarks_for_book(DUNE_PATH).unwrap();
    assert_eq!(restored, dune);
    assert_eq!(db.bookmarks_for_book(EMMA_PATH).unwrap().ids(), vec!["e-1"]);
}

#[test]
fn test_second_backup_prompts_for_edits_and_deletions() {
    let fx = Fixture::new();
    {
        let conn = fx.device_conn();
        add_device_bookmark(&conn, "d-1", DUNE_PATH, "original");
        add_device_bookmark(&conn, "d-2", DUNE_PATH, "to be deleted");
    }
    fx.sync().backup(&[12], &mut prompt_fn(never)).unwrap();

    {
        let conn = fx.device_conn();
        conn.execute("UPDATE Bookmark SET Text = 'edited' WHERE BookmarkID = 'd-1'", [])
            .unwrap();
        conn.execute("DELETE FROM Bookmark WHERE BookmarkID = 'd-2'", [])
            .unwrap();
        add_device_bookmark(&conn, "d-3", DUNE_PATH, "new");
    }

    let mut seen = Vec::new();
    let report = fx
        .sync()
        .backup(
            &[12],
            &mut prompt_fn(|c| {
                seen.push((c.kind(), c.bookmark_id().to_string()));
                match c.kind() {
                    ConflictKind::Edit => Resolution::KeepDevice,
                    ConflictKind::Deletion => Resolution::KeepLibrary,
                }
            }),
        )
        .unwrap();

    assert_eq!(
        seen,
        vec![
            (ConflictKind::Edit, "d-1".to_string()),
            (ConflictKind::Deletion, "d-2".to_string()),
        ]
    );
    let stats = report.books[0].merge.clone().unwrap();
    assert_eq!((stats.updated, stats.added, stats.restored), (1, 1, 1));

    let stored = fx.stored(12).unwrap();
    assert_eq!(stored.ids(), vec!["d-1", "d-3", "d-2"]);
    assert_eq!(stored.find("d-1").unwrap().text.as_deref(), Some("edited"));
}

#[test]
fn test_hidden_bookmarks_are_not_backed_up() {
    let fx = Fixture::new();
    {
        let conn = fx.device_conn();
        add_device_bookmark(&conn, "d-1", DUNE_PATH, "visible");
        add_device_bookmark(&conn, "d-2", DUNE_PATH, "hidden");
        conn.execute("UPDATE Bookmark SET Hidden = 'true' WHERE BookmarkID = 'd-2'", [])
            .unwrap();
    }

    fx.sync().backup(&[12], &mut prompt_fn(never)).unwrap();
    assert_eq!(fx.stored(12).unwrap().ids(), vec!["d-1"]);
}

#[test]
fn test_book_not_on_device_does_not_stop_the_batch() {
    let fx = Fixture::new();
    add_device_bookmark(&fx.device_conn(), "e-1", EMMA_PATH, "Emma");

    let report = fx.sync().backup(&[20, 15], &mut prompt_fn(never)).unwrap();
    assert!(matches!(report.books[0].status, BookStatus::Failed { .. }));
    assert_eq!(report.books[1].status, BookStatus::Processed);
    assert_eq!(report.processed(), 1);
    assert!(fx.stored(15).is_some());
}

#[test]
fn test_confirmed_deletion_of_everything_clears_the_column() {
    let fx = Fixture::new();
    add_device_bookmark(&fx.device_conn(), "d-1", DUNE_PATH, "only one");
    fx.sync().backup(&[12], &mut prompt_fn(never)).unwrap();
    assert!(fx.stored(12).is_some());

    fx.device_conn().execute("DELETE FROM Bookmark", []).unwrap();
    fx.sync()
        .backup(&[12], &mut prompt_fn(|_| Resolution::KeepDevice))
        .unwrap();
    assert!(fx.stored(12).is_none());

    let rows: i64 = Connection::open(fx.library_root.join("metadata.db"))
        .unwrap()
        .query_row("SELECT COUNT(*) FROM custom_column_3", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn test_missing_device_aborts_before_any_book() {
    let fx = Fixture::new();
    let library = CalibreLibrary::open(&fx.library_root, "bookmarks").unwrap();
    let mut sync = BookmarkSync::new(library, CalibreDeviceIndex::default(), None);

    let err = sync.restore(&[12]).unwrap_err();
    assert!(matches!(err, SyncError::NoDeviceDetected));
    assert_eq!(err.to_string(), "No device is detected.");
}
