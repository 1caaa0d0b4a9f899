//! kobomarks core library.
//!
//! This crate provides the building blocks for keeping Kobo e-reader
//! bookmarks backed up in a calibre library: the bookmark model and its
//! exchange format, the three-way merge engine, access to the device
//! database and to the library's custom column, configuration, and the
//! backup/restore engine.

pub mod config;
pub mod device;
pub mod errors;
pub mod library;
pub mod merge;
pub mod models;
pub mod sync_engine;

// Re-exports for convenience.
pub use config::AppConfig;
pub use device::{CalibreDeviceIndex, Device, KoboDatabase};
pub use library::{CalibreLibrary, LibraryStore};
pub use merge::{merge, ConflictPrompt};
pub use models::{Bookmark, BookmarkSet};
pub use sync_engine::BookmarkSync;
