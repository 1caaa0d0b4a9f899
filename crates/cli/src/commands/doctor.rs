//! Health check for the device and library setup.

use anyhow::Result;

use kobomarks_core::config::AppConfig;
use kobomarks_core::device::{CalibreDeviceIndex, Device};
use kobomarks_core::errors::LibraryError;
use kobomarks_core::library::CalibreLibrary;

use super::style;

/// Check configuration, device and library, and list what needs fixing.
pub fn run_doctor(config: &AppConfig) -> Result<()> {
    println!();
    println!("{}", style::header("kobomarks Doctor"));
    println!("{}", "═".repeat(16));
    println!();

    let mut issues = Vec::new();

    // 1. Configuration
    match config.validate() {
        Ok(()) => println!("  {}", style::success("Configuration     Valid")),
        Err(e) => {
            println!("  {}", style::error(&format!("Configuration     {}", e)));
            issues.push("Fix configuration errors".to_string());
        }
    }

    // 2. Device
    let mount_point = config.device.mount_point.display();
    match Device::detect(&config.device) {
        Ok(device) => {
            println!(
                "  {}",
                style::success(&format!("Device            {}", mount_point))
            );

            // 3. Device bookmark table
            match device.open_database().and_then(|db| db.verify_schema()) {
                Ok(()) => println!("  {}", style::success("Device Database   OK")),
                Err(e) => {
                    println!("  {}", style::error(&format!("Device Database   {}", e)));
                    issues.push("The device database cannot be used; check the firmware version".to_string());
                }
            }

            // 4. Book list
            match CalibreDeviceIndex::load(&device) {
                Ok(index) if index.is_empty() => {
                    println!("  {}", style::warn("Book List         No books sent from calibre"));
                    issues.push("Send books to the device with calibre before backing up".to_string());
                }
                Ok(index) => println!(
                    "  {}",
                    style::success(&format!("Book List         {} book(s)", index.len()))
                ),
                Err(e) => {
                    println!("  {}", style::error(&format!("Book List         {}", e)));
                    issues.push("Reconnect the device to calibre to rebuild its book list".to_string());
                }
            }
        }
        Err(_) => {
            println!(
                "  {}",
                style::error(&format!("Device            Not detected at {}", mount_point))
            );
            issues.push(format!(
                "Connect the e-reader or set [device] mount_point (currently {})",
                mount_point
            ));
        }
    }

    // 5. Library and bookmarks column
    match CalibreLibrary::open(&config.library.path, config.library.column_label()) {
        Ok(library) => println!(
            "  {}",
            style::success(&format!(
                "Library           {} (#{})",
                config.library.path.display(),
                library.column_label()
            ))
        ),
        Err(e) => {
            println!("  {}", style::error(&format!("Library           {}", e)));
            let hint = match e {
                LibraryError::ColumnNotFound(_) | LibraryError::WrongColumnType { .. } => format!(
                    "Create a 'Long text' column with lookup name #{} in calibre",
                    config.library.column_label()
                ),
                _ => "Set [library] path to the calibre library folder".to_string(),
            };
            issues.push(hint);
        }
    }

    // Summary
    println!();
    if issues.is_empty() {
        println!("  {} All checks passed!", console::style("✓").green().bold());
    } else {
        println!(
            "  {} {} issue(s) found:",
            console::style("!").yellow().bold(),
            issues.len()
        );
        for (i, issue) in issues.iter().enumerate() {
            println!("    {}. {}", i + 1, issue);
        }
    }
    println!();

    Ok(())
}
