//! Locating the device and the books stored on it.
//!
//! The device is found through the configured mount points. A book's path
//! on the device comes from the `metadata.calibre` book list that calibre's
//! device driver maintains at the root of every storage slot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::KoboDatabase;
use crate::config::DeviceConfig;
use crate::errors::DeviceError;

/// Root of the main memory as the firmware sees it.
pub const ONBOARD_ROOT: &str = "/mnt/onboard/";

/// Prefix of the `VolumeID` column for books in main memory.
pub const VOLUME_PREFIX: &str = "file:///mnt/onboard/";

/// Bookmark database location, relative to the main memory root.
pub const DATABASE_RELATIVE_PATH: &str = ".kobo/KoboReader.sqlite";

/// Book list kept by calibre at the root of each slot.
pub const BOOK_LIST_FILE: &str = "metadata.calibre";

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A storage area of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSlot {
    Main,
    CardA,
    CardB,
}

impl std::fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::CardA => write!(f, "card_a"),
            Self::CardB => write!(f, "card_b"),
        }
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// A mounted e-reader.
#[derive(Debug, Clone)]
pub struct Device {
    main: PathBuf,
    card_a: Option<PathBuf>,
    card_b: Option<PathBuf>,
}

impl Device {
    pub fn new(main: PathBuf, card_a: Option<PathBuf>, card_b: Option<PathBuf>) -> Self {
        Self {
            main,
            card_a,
            card_b,
        }
    }

    /// Find the device described by `config`.
    ///
    /// Fails unless the main mount point holds the bookmark database.
    pub fn detect(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let device = Self::new(
            config.mount_point.clone(),
            config.card_a.clone(),
            config.card_b.clone(),
        );

        let db_path = device.database_path();
        if !db_path.is_file() {
            debug!(path = %db_path.display(), "no bookmark database at mount point");
            return Err(DeviceError::NotDetected(
                config.mount_point.display().to_string(),
            ));
        }

        info!(mount_point = %config.mount_point.display(), "device detected");
        Ok(device)
    }

    /// Mount root of `slot`, if that slot is configured.
    pub fn slot_root(&self, slot: DeviceSlot) -> Option<&Path> {
        match slot {
            DeviceSlot::Main => Some(&self.main),
            DeviceSlot::CardA => self.card_a.as_deref(),
            DeviceSlot::CardB => self.card_b.as_deref(),
        }
    }

    /// Configured slots, main first.
    pub fn slots(&self) -> impl Iterator<Item = (DeviceSlot, &Path)> + '_ {
        [DeviceSlot::Main, DeviceSlot::CardA, DeviceSlot::CardB]
            .into_iter()
            .filter_map(move |slot| self.slot_root(slot).map(|root| (slot, root)))
    }

    /// The main root as a string prefix ending in `/`.
    pub fn root_prefix(&self) -> String {
        slot_prefix(&self.main)
    }

    pub fn database_path(&self) -> PathBuf {
        self.main.join(DATABASE_RELATIVE_PATH)
    }

    /// Open the bookmark database. Each call yields a fresh handle.
    pub fn open_database(&self) -> Result<KoboDatabase, DeviceError> {
        KoboDatabase::open(self.database_path())
    }

    /// Path of `absolute` relative to the main root, in device form.
    pub fn relative_path(&self, absolute: &str) -> String {
        relative_book_path(&self.root_prefix(), absolute)
    }
}

/// Strip `device_root` from `absolute` (left as is when it does not start
/// with it). Separators are normalised to `/` on both sides first.
pub fn relative_book_path(device_root: &str, absolute: &str) -> String {
    let root = device_root.replace('\\', "/");
    let absolute = absolute.replace('\\', "/");
    match absolute.strip_prefix(&root) {
        Some(rest) => rest.to_string(),
        None => absolute,
    }
}

/// `root` without trailing separators, followed by a single `/`.
fn slot_prefix(root: &Path) -> String {
    let root = root.to_string_lossy();
    format!("{}/", root.trim_end_matches(&['/', '\\'][..]))
}

// ---------------------------------------------------------------------------
// Path resolution
// ---------------------------------------------------------------------------

/// Maps a library book to its absolute path on the mounted device.
pub trait DevicePathResolver {
    /// `None` when the book is not on the device.
    fn resolve_device_path(&self, book_id: i64) -> Option<String>;
}

/// One entry of a `metadata.calibre` book list. Other keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookListEntry {
    /// Path relative to the slot root.
    pub lpath: String,

    /// Id of the book in the library it was sent from.
    #[serde(default)]
    pub application_id: Option<i64>,
}

/// Book locations read from the book list of every configured slot.
#[derive(Debug, Clone, Default)]
pub struct CalibreDeviceIndex {
    paths: HashMap<i64, String>,
}

impl CalibreDeviceIndex {
    /// Read the book list of each slot of `device`.
    ///
    /// A slot without a book list holds no known books. When a book appears
    /// on several slots the first one (main, card A, card B) wins.
    pub fn load(device: &Device) -> Result<Self, DeviceError> {
        let mut index = Self::default();
        for (slot, root) in device.slots() {
            let list_path = root.join(BOOK_LIST_FILE);
            if !list_path.is_file() {
                debug!(%slot, path = %list_path.display(), "no book list on slot");
                continue;
            }

            let entries = read_book_list(&list_path)?;
            let count = entries.len();
            for entry in entries {
                if let Some(id) = entry.application_id {
                    index
                        .paths
                        .entry(id)
                        .or_insert_with(|| join_slot_path(root, &entry.lpath));
                }
            }
            debug!(%slot, entries = count, "read book list");
        }

        info!(books = index.paths.len(), "device book index loaded");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl DevicePathResolver for CalibreDeviceIndex {
    fn resolve_device_path(&self, book_id: i64) -> Option<String> {
        self.paths.get(&book_id).cloned()
    }
}

fn read_book_list(path: &Path) -> Result<Vec<BookListEntry>, DeviceError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| DeviceError::BookListInvalid {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

fn join_slot_path(root: &Path, lpath: &str) -> String {
    format!(
        "{}{}",
        slot_prefix(root),
        lpath.trim_start_matches(&['/', '\\'][..])
    )
}
