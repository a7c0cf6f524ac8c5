use std::collections::HashMap;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use photojournal_core::Journal;

use super::{resolve_folder, short_id};

pub async fn list(journal: &Journal) -> Result<()> {
    let folders = journal.folders().await?;
    if folders.is_empty() {
        println!("No folders. Add one with: pjournal folders add <name>");
        return Ok(());
    }

    let mut counts: HashMap<_, usize> = HashMap::new();
    for entry in journal.entries(None).await? {
        if let Some(folder_id) = entry.folder_id {
            *counts.entry(folder_id).or_default() += 1;
        }
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Entries"),
        Cell::new("Created"),
    ]);
    for folder in &folders {
        table.add_row(vec![
            Cell::new(folder.sort_order),
            Cell::new(short_id(&folder.id)),
            Cell::new(&folder.name),
            Cell::new(counts.get(&folder.id).copied().unwrap_or(0)),
            Cell::new(folder.created_at.format("%Y-%m-%d").to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn add(journal: &Journal, name: &str) -> Result<()> {
    let folder = journal.add_folder(name).await?;
    println!("Added folder: {} ({})", folder.name, folder.id);
    Ok(())
}

pub async fn rename(journal: &Journal, folder: &str, name: &str) -> Result<()> {
    let folder = resolve_folder(journal, folder).await?;
    let renamed = journal.rename_folder(folder.id, name).await?;
    println!("Renamed folder: {} -> {}", folder.name, renamed.name);
    Ok(())
}

pub async fn rm(journal: &Journal, folder: &str) -> Result<()> {
    let folder = resolve_folder(journal, folder).await?;
    match journal.delete_folder(folder.id).await? {
        Some((folder, unfiled)) => println!(
            "Removed folder: {} ({} entries moved out of the folder)",
            folder.name, unfiled
        ),
        None => println!("Folder {} was already removed", folder.name),
    }
    Ok(())
}
