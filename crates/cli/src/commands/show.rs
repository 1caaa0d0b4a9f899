//! `kobomarks show`: list the bookmarks backed up for a book.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use kobomarks_core::config::AppConfig;
use kobomarks_core::library::{CalibreLibrary, LibraryStore};
use kobomarks_core::models::BookmarkSet;

use super::style;

const PREVIEW_CHARS: usize = 60;

/// Show the stored bookmarks of one book.
pub fn run_show(config: &AppConfig, book_id: i64) -> Result<()> {
    let library = CalibreLibrary::open(&config.library.path, config.library.column_label())
        .context("failed to open calibre library")?;

    let title = library.title(book_id).context("failed to read book")?;
    let stored = library
        .read_bookmarks(book_id)
        .context("failed to read stored bookmarks")?;

    let text = match stored {
        Some(text) => text,
        None => {
            println!();
            println!("{}", style::dim(&format!("No bookmarks stored for {}", title)));
            println!();
            return Ok(());
        }
    };
    let set = BookmarkSet::from_json(&text).context("stored bookmarks are not valid")?;

    println!();
    println!(
        "{}",
        style::header(&format!("{} ({} bookmark(s))", title, set.len()))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Chapter", "Progress", "Text", "Annotation", "Modified"]);

    for b in &set {
        table.add_row(vec![
            Cell::new(short_id(&b.bookmark_id)),
            Cell::new(&b.content_id),
            Cell::new(format!("{:.0}%", b.chapter_progress * 100.0)),
            Cell::new(preview(b.text.as_deref())),
            Cell::new(preview(b.annotation.as_deref())),
            Cell::new(date(b.date_modified.as_deref().or(b.date_created.as_deref()))),
        ]);
    }

    println!("{}", table);
    println!();
    Ok(())
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

fn preview(text: Option<&str>) -> String {
    let text = match text {
        Some(t) => t.split_whitespace().collect::<Vec<_>>().join(" "),
        None => return "—".to_string(),
    };
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

fn date(value: Option<&str>) -> String {
    match value {
        Some(v) => v.chars().take(10).collect(),
        None => "—".to_string(),
    }
}
