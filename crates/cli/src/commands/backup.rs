//! `kobomarks backup`: merge device bookmarks into the library.

use anyhow::Result;

use kobomarks_core::config::AppConfig;

use super::prompt::TerminalPrompt;
use super::style;

/// Back up the bookmarks of the given books.
pub fn run_backup(config: &AppConfig, books: &[i64]) -> Result<()> {
    let mut sync = super::open_sync(config)?;
    let mut prompt = TerminalPrompt::new();

    let report = match sync.backup(books, &mut prompt) {
        Ok(report) => report,
        Err(e) => anyhow::bail!("Cannot back up bookmarks: {}", e),
    };

    super::print_report(&report);
    if prompt.asked() > 0 {
        println!(
            "{}",
            style::dim(&format!("{} conflict(s) decided", prompt.asked()))
        );
    }
    println!();

    if report.has_failures() {
        anyhow::bail!("{} book(s) could not be backed up", report.failed());
    }
    Ok(())
}
