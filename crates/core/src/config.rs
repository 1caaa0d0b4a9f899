//! Configuration for kobomarks.
//!
//! A small TOML file naming where the e-reader is mounted, where the calibre
//! library lives, and which custom column holds the bookmarks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the e-reader is mounted.
    pub device: DeviceConfig,

    /// The calibre library holding the backups.
    pub library: LibraryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// Mount points of the e-reader's storage slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Main memory mount point (the directory containing `.kobo/`).
    pub mount_point: PathBuf,

    /// First SD card, if any.
    #[serde(default)]
    pub card_a: Option<PathBuf>,

    /// Second SD card, if any.
    #[serde(default)]
    pub card_b: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Library
// ---------------------------------------------------------------------------

/// The calibre library and its bookmarks column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Library directory (the one containing `metadata.db`).
    pub path: PathBuf,

    /// Lookup label of the long-text custom column, with or without the
    /// leading `#`.
    #[serde(default = "default_column")]
    pub column: String,
}

impl LibraryConfig {
    /// Column label without the `#` prefix, as stored in `custom_columns`.
    pub fn column_label(&self) -> &str {
        self.column.trim_start_matches('#')
    }
}

fn default_column() -> String {
    "bookmarks".into()
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.mount_point.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "device.mount_point".into(),
                detail: "device mount point must not be empty".into(),
            });
        }
        if self.library.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "library.path".into(),
                detail: "library path must not be empty".into(),
            });
        }

        let label = self.library.column_label();
        if label.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "library.column".into(),
                detail: "column label must not be empty".into(),
            });
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ConfigError::InvalidValue {
                field: "library.column".into(),
                detail: format!(
                    "'{}' is not a calibre lookup name (lowercase letters, digits, underscores)",
                    label
                ),
            });
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!("must be one of {}", LOG_LEVELS.join(", ")),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# kobomarks configuration

[device]
# Directory where the e-reader's main memory is mounted (contains .kobo/).
mount_point = "/media/KOBOeReader"
# card_a = "/media/KOBOSD"

[library]
# calibre library directory (contains metadata.db).
path = "~/Calibre Library"
# Long-text custom column holding the backups (#bookmarks).
column = "bookmarks"

[logging]
level = "warn"
"#
    }
}
