//! Three-way bookmark merge keyed by bookmark ID.
//!
//! The device is the candidate source of truth and the library holds the
//! state from the previous backup. The merge is asymmetric:
//!
//! 1. Device bookmarks are walked in order. New ones are taken as-is,
//!    identical ones are taken without asking, differing ones are an edit
//!    conflict decided by the prompt.
//! 2. Library bookmarks missing from the device are deletion conflicts; the
//!    library copy survives unless the prompt confirms the deletion.
//!
//! Pass-1 output always precedes pass-2 survivors. An empty result is
//! reported as `None` so the caller clears the stored value instead of
//! storing an empty list.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::conflict::{Conflict, ConflictPrompt, Resolution};
use crate::errors::PromptError;
use crate::models::BookmarkSet;

/// Counters describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Present on both sides with identical fields.
    pub unchanged: usize,
    /// Present only on the device.
    pub added: usize,
    /// Edit conflicts resolved in favour of the device.
    pub updated: usize,
    /// Edit conflicts resolved in favour of the library.
    pub kept_library: usize,
    /// Deletion conflicts where the library copy was kept.
    pub restored: usize,
    /// Deletion conflicts where the deletion was confirmed.
    pub deleted: usize,
}

impl MergeStats {
    /// Number of times the prompt was consulted.
    pub fn prompts(&self) -> usize {
        self.updated + self.kept_library + self.restored + self.deleted
    }
}

/// Result of reconciling one book.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged set, or `None` when nothing survived.
    pub merged: Option<BookmarkSet>,
    pub stats: MergeStats,
}

/// Reconcile the device and library sets of one book.
///
/// A missing set on either side is treated as empty. `prompt` is called
/// once for every edit and deletion conflict, in result order; a prompt
/// error aborts the merge.
pub fn merge<P>(
    device: Option<&BookmarkSet>,
    library: Option<&BookmarkSet>,
    title: &str,
    prompt: &mut P,
) -> Result<MergeOutcome, PromptError>
where
    P: ConflictPrompt + ?Sized,
{
    let empty = BookmarkSet::default();
    let device = device.unwrap_or(&empty);
    let library = library.unwrap_or(&empty);

    info!(
        title,
        device_count = device.len(),
        library_count = library.len(),
        "merging bookmarks"
    );

    let mut stats = MergeStats::default();
    let mut bookmarks = Vec::with_capacity(device.len().max(library.len()));

    for device_version in device {
        match library.find(&device_version.bookmark_id) {
            None => {
                debug!(id = %device_version.bookmark_id, "new on device");
                stats.added += 1;
                bookmarks.push(device_version.clone());
            }
            Some(library_version) if library_version == device_version => {
                stats.unchanged += 1;
                bookmarks.push(device_version.clone());
            }
            Some(library_version) => {
                let conflict = Conflict::Edit {
                    title,
                    device: device_version,
                    library: library_version,
                };
                let resolution = prompt.decide(&conflict)?;
                debug!(id = %device_version.bookmark_id, %resolution, "edit conflict decided");
                match resolution {
                    Resolution::KeepDevice => {
                        stats.updated += 1;
                        bookmarks.push(device_version.clone());
                    }
                    Resolution::KeepLibrary => {
                        stats.kept_library += 1;
                        bookmarks.push(library_version.clone());
                    }
                }
            }
        }
    }

    for library_version in library {
        if device.contains(&library_version.bookmark_id) {
            continue;
        }
        let conflict = Conflict::Deletion {
            title,
            library: library_version,
        };
        let resolution = prompt.decide(&conflict)?;
        debug!(id = %library_version.bookmark_id, %resolution, "deletion conflict decided");
        match resolution {
            Resolution::KeepDevice => stats.deleted += 1,
            Resolution::KeepLibrary => {
                stats.restored += 1;
                bookmarks.push(library_version.clone());
            }
        }
    }

    info!(
        title,
        result_count = bookmarks.len(),
        prompts = stats.prompts(),
        "merge complete"
    );

    let merged = if bookmarks.is_empty() {
        None
    } else {
        Some(BookmarkSet::new(bookmarks))
    };
    Ok(MergeOutcome { merged, stats })
}
