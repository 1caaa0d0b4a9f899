//! The desktop library side: per-book storage of the serialized bookmark set.

pub mod calibre;

use crate::errors::LibraryError;

pub use calibre::CalibreLibrary;

/// Per-book metadata access needed by backup and restore.
pub trait LibraryStore {
    /// Display title of the book.
    fn title(&self, book_id: i64) -> Result<String, LibraryError>;

    /// Stored bookmark text, or `None` when the field is unset or empty.
    fn read_bookmarks(&self, book_id: i64) -> Result<Option<String>, LibraryError>;

    /// Replace the stored bookmark text. `None` clears the field.
    fn write_bookmarks(&mut self, book_id: i64, value: Option<&str>) -> Result<(), LibraryError>;
}
