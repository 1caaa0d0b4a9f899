//! `kobomarks restore`: put backed-up bookmarks back on the device.

use anyhow::Result;

use kobomarks_core::config::AppConfig;

use super::style;

/// Restore the bookmarks of the given books. Existing device bookmarks are
/// never changed.
pub fn run_restore(config: &AppConfig, books: &[i64]) -> Result<()> {
    let mut sync = super::open_sync(config)?;

    let report = match sync.restore(books) {
        Ok(report) => report,
        Err(e) => anyhow::bail!("Cannot restore bookmarks: {}", e),
    };

    super::print_report(&report);
    let inserted: usize = report
        .books
        .iter()
        .filter_map(|b| b.restore)
        .map(|s| s.inserted)
        .sum();
    println!("{}", style::dim(&format!("{} bookmark(s) inserted", inserted)));
    println!();

    if report.has_failures() {
        anyhow::bail!("{} book(s) could not be restored", report.failed());
    }
    Ok(())
}
