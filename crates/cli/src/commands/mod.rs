//! kobomarks subcommands.
//!
//! Provides backup, restore, show and doctor, plus the helpers they share
//! for loading configuration and wiring the core collaborators together.

pub mod backup;
pub mod doctor;
pub mod prompt;
pub mod restore;
pub mod show;
pub mod style;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use kobomarks_core::config::AppConfig;
use kobomarks_core::device::{CalibreDeviceIndex, Device};
use kobomarks_core::library::CalibreLibrary;
use kobomarks_core::sync_engine::{BatchReport, BookStatus, BookmarkSync};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/kobomarks/config.toml";

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub device: Option<PathBuf>,
    pub library: Option<PathBuf>,
}

/// Load the configuration, apply overrides and validate it.
pub fn load_config(config_path: &str, overrides: &Overrides) -> Result<AppConfig> {
    let config = read_config(config_path, overrides)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Load the configuration and apply overrides without validating.
pub fn read_config(config_path: &str, overrides: &Overrides) -> Result<AppConfig> {
    let resolved = expand_tilde(config_path);
    let mut config =
        AppConfig::load_from_file(&resolved).context("failed to load configuration file")?;
    apply_overrides(&mut config, overrides);
    Ok(config)
}

/// Apply command-line overrides and expand `~` in configured paths.
fn apply_overrides(config: &mut AppConfig, overrides: &Overrides) {
    if let Some(device) = &overrides.device {
        config.device.mount_point = device.clone();
    }
    if let Some(library) = &overrides.library {
        config.library.path = library.clone();
    }

    config.device.mount_point = expand_path(&config.device.mount_point);
    config.device.card_a = config.device.card_a.as_deref().map(expand_path);
    config.device.card_b = config.device.card_b.as_deref().map(expand_path);
    config.library.path = expand_path(&config.library.path);
}

/// Open the library and, when connected, the device.
///
/// A missing device is not an error here; the batch reports it.
pub fn open_sync(config: &AppConfig) -> Result<BookmarkSync<CalibreLibrary, CalibreDeviceIndex>> {
    let library = CalibreLibrary::open(&config.library.path, config.library.column_label())
        .context("failed to open calibre library")?;

    let (device, index) = match Device::detect(&config.device) {
        Ok(device) => {
            let index =
                CalibreDeviceIndex::load(&device).context("failed to read device book list")?;
            (Some(device), index)
        }
        Err(e) => {
            debug!(error = %e, "device not available");
            (None, CalibreDeviceIndex::default())
        }
    };

    Ok(BookmarkSync::new(library, index, device))
}

/// Print one line per book followed by the confirmation.
pub fn print_report(report: &BatchReport) {
    println!();
    for book in &report.books {
        match &book.status {
            BookStatus::Processed => println!("  {}", style::success(&book.label())),
            BookStatus::Skipped { reason } => println!(
                "  {}",
                style::dim(&format!("○ {} (skipped: {})", book.label(), reason))
            ),
            BookStatus::Failed { error } => {
                println!("  {}", style::error(&format!("{}: {}", book.label(), error)))
            }
        }
        for warning in &book.warnings {
            println!("    {}", style::warn(warning));
        }
    }

    println!();
    println!("{}", style::header(&report.confirmation()));
    if report.skipped() > 0 {
        println!("{}", style::dim(&format!("{} book(s) skipped", report.skipped())));
    }
}

/// Expand `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(expand_tilde(s)),
        None => path.to_path_buf(),
    }
}
