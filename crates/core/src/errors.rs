//! Error types for the kobomarks core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Bookmark model errors
// ---------------------------------------------------------------------------

/// Errors from encoding or decoding the bookmark exchange format.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// The stored text is not a well-formed bookmark set.
    #[error("bookmark data is not valid: {0}")]
    ParseError(#[from] serde_json::Error),

    /// A bookmark set could not be written in the exchange format.
    #[error("bookmark data could not be encoded: {0}")]
    EncodeError(serde_json::Error),
}

// ---------------------------------------------------------------------------
// Device errors
// ---------------------------------------------------------------------------

/// Errors from the e-reader and its bookmark database.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No mounted device was found at the configured location.
    #[error("no device detected at '{0}'")]
    NotDetected(String),

    /// Underlying rusqlite error (device unplugged, locked file, ...).
    #[error("device database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// The `Bookmark` table lacks columns this tool reads or writes.
    #[error("device Bookmark table is missing columns: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The `metadata.calibre` book list on a device slot is malformed.
    #[error("device book list at '{path}' is not valid: {detail}")]
    BookListInvalid { path: String, detail: String },

    /// Generic I/O error.
    #[error("device I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Library errors
// ---------------------------------------------------------------------------

/// Errors from the desktop library metadata store.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The library database file does not exist.
    #[error("library database not found: {0}")]
    NotFound(String),

    /// No custom column with the configured label exists.
    #[error("custom column '#{0}' does not exist in the library")]
    ColumnNotFound(String),

    /// The custom column exists but cannot hold long text.
    #[error("custom column '#{label}' has type '{datatype}', expected 'comments' (long text)")]
    WrongColumnType { label: String, datatype: String },

    /// The requested book is not in the library.
    #[error("book {0} not found in library")]
    BookNotFound(i64),

    /// Underlying rusqlite error.
    #[error("library database error: {0}")]
    SqliteError(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Prompt errors
// ---------------------------------------------------------------------------

/// Errors raised by an interactive conflict prompt.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The user aborted the prompt (e.g. Ctrl-C or closed stdin).
    #[error("conflict prompt was cancelled")]
    Cancelled,

    /// Terminal I/O failed while prompting.
    #[error("conflict prompt failed: {0}")]
    IoError(#[from] std::io::Error),

    /// The conflicting versions could not be rendered for display.
    #[error("conflict could not be shown: {0}")]
    Render(#[from] BookmarkError),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from a backup or restore run.
///
/// `NoDeviceDetected` and `NoBooksSelected` abort the whole batch; the
/// remaining variants describe a single book's failure.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No device connection is available.
    #[error("No device is detected.")]
    NoDeviceDetected,

    /// The selection is empty.
    #[error("No books selected")]
    NoBooksSelected,

    /// The book could not be located on the device.
    #[error("book {0} is not on the device")]
    BookNotOnDevice(i64),

    #[error("sync device error: {0}")]
    DeviceError(#[from] DeviceError),

    #[error("sync library error: {0}")]
    LibraryError(#[from] LibraryError),

    #[error("sync bookmark error: {0}")]
    BookmarkError(#[from] BookmarkError),

    #[error("sync prompt error: {0}")]
    PromptError(#[from] PromptError),
}
