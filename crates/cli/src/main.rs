//! kobomarks command-line tool.
//!
//! Backs up the bookmarks of a Kobo e-reader into a calibre library,
//! restores them to the device, and inspects or validates the setup.

mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tracing_subscriber::EnvFilter;

use kobomarks_core::config::AppConfig;

use commands::{expand_tilde, Overrides, DEFAULT_CONFIG_PATH};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// kobomarks command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "kobomarks",
    version,
    about = "Back up and restore Kobo e-reader bookmarks in a calibre library"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Device mount point, overriding the configuration.
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// calibre library folder, overriding the configuration.
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge the device bookmarks of the given books into the library.
    Backup {
        /// calibre book id (repeatable).
        #[arg(short, long = "book", value_name = "ID", num_args = 1..)]
        books: Vec<i64>,
    },

    /// Insert backed-up bookmarks the device is missing.
    Restore {
        /// calibre book id (repeatable).
        #[arg(short, long = "book", value_name = "ID", num_args = 1..)]
        books: Vec<i64>,
    },

    /// Show the bookmarks stored in the library for a book.
    Show {
        /// calibre book id.
        book: i64,
    },

    /// Run health checks on the device and library setup.
    Doctor,

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Validate the configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_logging(cli: &Cli) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if cli.verbose => EnvFilter::new("debug"),
        Err(_) => {
            let level = AppConfig::load_from_file(expand_tilde(&cli.config))
                .map(|c| c.logging.level)
                .unwrap_or_else(|_| "warn".to_string());
            EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let overrides = Overrides {
        device: cli.device,
        library: cli.library,
    };

    match cli.command {
        Commands::Init { output } => {
            let output = output.unwrap_or_else(|| cli.config.clone());
            cmd_init(Path::new(&expand_tilde(&output)))
        }
        Commands::Validate => cmd_validate(&cli.config, &overrides),
        Commands::Doctor => {
            let config = commands::read_config(&cli.config, &overrides)?;
            commands::doctor::run_doctor(&config)
        }
        Commands::Backup { books } => {
            let config = commands::load_config(&cli.config, &overrides)?;
            commands::backup::run_backup(&config, &books)
        }
        Commands::Restore { books } => {
            let config = commands::load_config(&cli.config, &overrides)?;
            commands::restore::run_restore(&config, &books)
        }
        Commands::Show { book } => {
            let config = commands::load_config(&cli.config, &overrides)?;
            commands::show::run_show(&config, book)
        }
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!("{} already exists. Overwrite?", output.display()))
            .default(false)
            .interact()
            .context("failed to read confirmation")?;

        if !overwrite {
            println!("Keeping the existing file.");
            return Ok(());
        }
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("failed to create config directory")?;
        }
    }
    std::fs::write(output, AppConfig::default_template())
        .context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set [device] mount_point to where the e-reader is mounted");
    println!("  2. Set [library] path to your calibre library folder");
    println!("  3. In calibre, add a 'Long text' column with lookup name #bookmarks");
    println!(
        "  4. Check the setup with: kobomarks doctor --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &str, overrides: &Overrides) -> Result<()> {
    println!("Validating configuration: {}", expand_tilde(config_path));
    println!();

    let config = commands::read_config(config_path, overrides)?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All required fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let optional = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not set".to_string())
    };

    println!();
    println!("Configuration summary:");
    println!("  Device        : {}", config.device.mount_point.display());
    println!("  Card A        : {}", optional(&config.device.card_a));
    println!("  Card B        : {}", optional(&config.device.card_b));
    println!("  Library       : {}", config.library.path.display());
    println!("  Column        : #{}", config.library.column_label());
    println!("  Log level     : {}", config.logging.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}
