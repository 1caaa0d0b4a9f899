//! Backup and restore over a selection of books.
//!
//! The [`BookmarkSync`] engine drives one batch at a time:
//!
//! 1. Check the batch preconditions: a device is present, then the
//!    selection is not empty. Either failure aborts the batch.
//! 2. Process each book on its own. A failing book is logged and recorded
//!    in the [`BatchReport`]; the remaining books still run.
//!
//! Backup merges the device bookmarks into the library field. Restore
//! inserts the stored bookmarks the device lacks.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::{Device, DevicePathResolver, RestoreStats};
use crate::errors::SyncError;
use crate::library::LibraryStore;
use crate::merge::{merge, ConflictPrompt, MergeStats};
use crate::models::BookmarkSet;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Which way a batch moves bookmarks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Backup,
    Restore,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backup => write!(f, "backup"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// How a single book fared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum BookStatus {
    Processed,
    Skipped { reason: String },
    Failed { error: String },
}

/// Result for one book of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookOutcome {
    pub book_id: i64,
    /// `None` when the title could not be read.
    pub title: Option<String>,
    pub status: BookStatus,
    /// Merge counters, for a backup that reached the merge.
    pub merge: Option<MergeStats>,
    /// Insert counters, for a restore that reached the device.
    pub restore: Option<RestoreStats>,
    /// Non-fatal problems, such as unreadable stored bookmarks.
    pub warnings: Vec<String>,
}

impl BookOutcome {
    fn new(book_id: i64) -> Self {
        Self {
            book_id,
            title: None,
            status: BookStatus::Processed,
            merge: None,
            restore: None,
            warnings: Vec::new(),
        }
    }

    fn skip(&mut self, reason: &str) {
        debug!(book_id = self.book_id, reason, "book skipped");
        self.status = BookStatus::Skipped {
            reason: reason.to_string(),
        };
    }

    /// Title if known, else the book id.
    pub fn label(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!("book {}", self.book_id),
        }
    }
}

/// Summary of a backup or restore batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    pub direction: SyncDirection,
    pub books: Vec<BookOutcome>,
}

impl BatchReport {
    fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            books: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, BookStatus::Processed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, BookStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, BookStatus::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&BookStatus) -> bool) -> usize {
        self.books.iter().filter(|b| pred(&b.status)).count()
    }

    /// Closing message naming how many books were processed.
    pub fn confirmation(&self) -> String {
        match self.direction {
            SyncDirection::Backup => {
                format!("Backed up the bookmarks of {} book(s)", self.processed())
            }
            SyncDirection::Restore => format!("Restored bookmarks of {} book(s)", self.processed()),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Backup/restore engine over a library, a device and a path resolver.
pub struct BookmarkSync<L, R> {
    library: L,
    resolver: R,
    device: Option<Device>,
}

impl<L, R> BookmarkSync<L, R>
where
    L: LibraryStore,
    R: DevicePathResolver,
{
    /// `device` is `None` when no device is connected; every batch then
    /// fails with [`SyncError::NoDeviceDetected`].
    pub fn new(library: L, resolver: R, device: Option<Device>) -> Self {
        info!(device = device.is_some(), "initializing bookmark sync");
        Self {
            library,
            resolver,
            device,
        }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    /// Merge the device bookmarks of each book into the library.
    ///
    /// `prompt` decides every edit and deletion conflict.
    pub fn backup<P>(&mut self, book_ids: &[i64], prompt: &mut P) -> Result<BatchReport, SyncError>
    where
        P: ConflictPrompt + ?Sized,
    {
        let device = self.preflight(book_ids)?;
        info!(books = book_ids.len(), "starting bookmark backup");

        let mut report = BatchReport::new(SyncDirection::Backup);
        for &book_id in book_ids {
            let mut outcome = BookOutcome::new(book_id);
            if let Err(e) = self.backup_book(&device, book_id, prompt, &mut outcome) {
                warn!(book_id, error = %e, "backup failed for book");
                outcome.status = BookStatus::Failed {
                    error: e.to_string(),
                };
            }
            report.books.push(outcome);
        }

        info!(
            processed = report.processed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "bookmark backup complete"
        );
        Ok(report)
    }

    /// Insert the stored bookmarks of each book that the device lacks.
    pub fn restore(&mut self, book_ids: &[i64]) -> Result<BatchReport, SyncError> {
        let device = self.preflight(book_ids)?;
        info!(books = book_ids.len(), "starting bookmark restore");

        let mut report = BatchReport::new(SyncDirection::Restore);
        for &book_id in book_ids {
            let mut outcome = BookOutcome::new(book_id);
            if let Err(e) = self.restore_book(&device, book_id, &mut outcome) {
                warn!(book_id, error = %e, "restore failed for book");
                outcome.status = BookStatus::Failed {
                    error: e.to_string(),
                };
            }
            report.books.push(outcome);
        }

        info!(
            processed = report.processed(),
            skipped = report.skipped(),
            failed = report.failed(),
            "bookmark restore complete"
        );
        Ok(report)
    }

    /// Device first, then the selection.
    fn preflight(&self, book_ids: &[i64]) -> Result<Device, SyncError> {
        let device = self.device.clone().ok_or(SyncError::NoDeviceDetected)?;
        if book_ids.is_empty() {
            return Err(SyncError::NoBooksSelected);
        }
        Ok(device)
    }

    fn backup_book<P>(
        &mut self,
        device: &Device,
        book_id: i64,
        prompt: &mut P,
        outcome: &mut BookOutcome,
    ) -> Result<(), SyncError>
    where
        P: ConflictPrompt + ?Sized,
    {
        let title = self.library.title(book_id)?;
        outcome.title = Some(title.clone());

        let book_path = self.book_path(device, book_id)?;
        let device_set = device.open_database()?.bookmarks_for_book(&book_path)?;
        let library_set = self.stored_set(book_id, &mut outcome.warnings)?;

        let merged = merge(Some(&device_set), library_set.as_ref(), &title, prompt)?;
        let json = merged.merged.as_ref().map(BookmarkSet::to_json).transpose()?;
        self.library.write_bookmarks(book_id, json.as_deref())?;

        debug!(book_id, cleared = json.is_none(), "library bookmarks updated");
        outcome.merge = Some(merged.stats);
        Ok(())
    }

    fn restore_book(
        &self,
        device: &Device,
        book_id: i64,
        outcome: &mut BookOutcome,
    ) -> Result<(), SyncError> {
        let title = self.library.title(book_id)?;
        outcome.title = Some(title);

        let set = match self.stored_set(book_id, &mut outcome.warnings)? {
            Some(set) => set,
            None => {
                outcome.skip("no stored bookmarks");
                return Ok(());
            }
        };
        let book_path = match self.resolver.resolve_device_path(book_id) {
            Some(path) => device.relative_path(&path),
            None => {
                outcome.skip("not on the device");
                return Ok(());
            }
        };

        let stats = device.open_database()?.restore_bookmarks(&book_path, &set)?;
        outcome.restore = Some(stats);
        Ok(())
    }

    fn book_path(&self, device: &Device, book_id: i64) -> Result<String, SyncError> {
        let absolute = self
            .resolver
            .resolve_device_path(book_id)
            .ok_or(SyncError::BookNotOnDevice(book_id))?;
        let relative = device.relative_path(&absolute);
        debug!(book_id, path = %relative, "resolved book on device");
        Ok(relative)
    }

    /// Parse the stored set. Unreadable text counts as no prior bookmarks.
    fn stored_set(
        &self,
        book_id: i64,
        warnings: &mut Vec<String>,
    ) -> Result<Option<BookmarkSet>, SyncError> {
        let text = match self.library.read_bookmarks(book_id)? {
            Some(text) => text,
            None => return Ok(None),
        };
        match BookmarkSet::from_json(&text) {
            Ok(set) => Ok(Some(set)),
            Err(e) => {
                warn!(book_id, error = %e, "ignoring unreadable stored bookmarks");
                warnings.push(format!("stored bookmarks ignored: {}", e));
                Ok(None)
            }
        }
    }
}
