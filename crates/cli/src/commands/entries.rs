use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use photojournal_core::domain::Entry;
use photojournal_core::Journal;

use super::{resolve_entry, resolve_folder, short_id};

const MEMO_PREVIEW_CHARS: usize = 40;

pub async fn add(journal: &Journal, paths: Vec<PathBuf>, memo: &str, folder: Option<&str>) -> Result<()> {
    let folder = match folder {
        Some(f) => Some(resolve_folder(journal, f).await?),
        None => None,
    };

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut added = 0;
    let mut failed = 0;
    for path in &paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        pb.set_message(name);

        let result = match tokio::fs::read(path).await {
            Ok(bytes) => journal
                .add_entry(bytes, memo, folder.as_ref().map(|f| f.id))
                .await
                .map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(entry) => {
                added += 1;
                pb.println(format!("Added {} <- {}", short_id(&entry.id), path.display()));
            }
            Err(e) => {
                failed += 1;
                pb.println(format!("Skipped {}: {e:#}", path.display()));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message(format!("{added} added, {failed} failed"));

    if added == 0 && failed > 0 {
        anyhow::bail!("no images were added");
    }
    Ok(())
}

pub async fn ls(journal: &Journal, folder: Option<&str>) -> Result<()> {
    let folder = match folder {
        Some(f) => Some(resolve_folder(journal, f).await?),
        None => None,
    };
    let entries = journal.entries(folder.as_ref().map(|f| f.id)).await?;
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    let folder_names: HashMap<_, _> = journal
        .folders()
        .await?
        .into_iter()
        .map(|f| (f.id, f.name))
        .collect();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Created"),
        Cell::new("Folder"),
        Cell::new("Size"),
        Cell::new("Memo"),
    ]);

    for entry in &entries {
        let folder_cell = match entry.folder_id.and_then(|id| folder_names.get(&id)) {
            Some(name) => Cell::new(name).fg(Color::Cyan),
            None => Cell::new("\u{2014}").fg(Color::DarkGrey),
        };
        let size_cell = match entry.dimensions {
            Some(d) => Cell::new(format!("{}x{}", d.width, d.height)),
            None => Cell::new("unknown").fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(short_id(&entry.id)),
            Cell::new(entry.created_at.format("%Y-%m-%d %H:%M").to_string()),
            folder_cell,
            size_cell,
            Cell::new(memo_preview(&entry.memo)),
        ]);
    }

    println!("{table}");
    println!("{} entries", entries.len());
    Ok(())
}

pub async fn show(journal: &Journal, id: &str) -> Result<()> {
    let entry = resolve_entry(journal, id).await?;
    let folder = match entry.folder_id {
        Some(folder_id) => journal
            .folders()
            .await?
            .into_iter()
            .find(|f| f.id == folder_id)
            .map(|f| f.name),
        None => None,
    };
    print_entry(&entry, folder.as_deref());
    Ok(())
}

pub async fn export(journal: &Journal, id: &str, dest: &Path, thumbnail: bool) -> Result<()> {
    let entry = resolve_entry(journal, id).await?;
    let bytes = if thumbnail {
        journal.load_preview(&entry).await?
    } else {
        journal.load_image(&entry).await?
    };
    tokio::fs::write(dest, &bytes)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;
    println!("Exported {} ({} bytes) to {}", short_id(&entry.id), bytes.len(), dest.display());
    Ok(())
}

pub async fn memo(journal: &Journal, id: &str, text: &str) -> Result<()> {
    let entry = resolve_entry(journal, id).await?;
    let updated = journal.update_memo(entry.id, text).await?;
    println!("Updated memo of {}", short_id(&updated.id));
    Ok(())
}

pub async fn mv(journal: &Journal, id: &str, folder: Option<&str>) -> Result<()> {
    let entry = resolve_entry(journal, id).await?;
    match folder {
        Some(f) => {
            let folder = resolve_folder(journal, f).await?;
            journal.move_entry_to_folder(entry.id, Some(folder.id)).await?;
            println!("Moved {} to {}", short_id(&entry.id), folder.name);
        }
        None => {
            journal.move_entry_to_folder(entry.id, None).await?;
            println!("Moved {} out of its folder", short_id(&entry.id));
        }
    }
    Ok(())
}

pub async fn rm(journal: &Journal, id: &str) -> Result<()> {
    let entry = resolve_entry(journal, id).await?;
    match journal.delete_entry(entry.id).await? {
        Some(_) => println!("Deleted {}", short_id(&entry.id)),
        None => println!("Entry {} was already deleted", short_id(&entry.id)),
    }
    Ok(())
}

fn print_entry(entry: &Entry, folder: Option<&str>) {
    println!();
    println!("  Entry {}", entry.id);
    println!("  ------------------------------------------");
    println!("  Created:    {}", entry.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:    {}", entry.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Folder:     {}", folder.unwrap_or("(none)"));
    match entry.dimensions {
        Some(d) => println!("  Size:       {} x {}", d.width, d.height),
        None => println!("  Size:       unknown"),
    }
    println!("  Image:      {}", entry.image_asset);
    println!(
        "  Thumbnail:  {}",
        entry.thumbnail_asset.as_deref().unwrap_or("(none)")
    );
    if let Some(title) = &entry.title {
        println!("  Title:      {title}");
    }
    println!();
    if entry.memo.is_empty() {
        println!("  (no memo)");
    } else {
        for line in entry.memo.lines() {
            println!("  {line}");
        }
    }
    println!();
}

fn memo_preview(memo: &str) -> String {
    let first_line = memo.lines().next().unwrap_or("");
    let mut preview: String = first_line.chars().take(MEMO_PREVIEW_CHARS).collect();
    if first_line.chars().count() > MEMO_PREVIEW_CHARS || memo.lines().nth(1).is_some() {
        preview.push('\u{2026}');
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_preview_short() {
        assert_eq!(memo_preview("hello"), "hello");
        assert_eq!(memo_preview(""), "");
    }

    #[test]
    fn test_memo_preview_truncates_long_line() {
        let long = "x".repeat(60);
        let preview = memo_preview(&long);
        assert_eq!(preview.chars().count(), MEMO_PREVIEW_CHARS + 1);
        assert!(preview.ends_with('\u{2026}'));
    }

    #[test]
    fn test_memo_preview_marks_multiline() {
        assert_eq!(memo_preview("first\nsecond"), "first\u{2026}");
    }
}
