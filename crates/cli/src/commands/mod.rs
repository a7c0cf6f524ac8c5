pub mod entries;
pub mod folders;
pub mod layout;
pub mod maintenance;

use anyhow::{bail, Result};
use photojournal_core::domain::{Entry, Folder};
use photojournal_core::Journal;
use uuid::Uuid;

/// Resolve a full entry ID or a unique prefix of one.
pub(crate) async fn resolve_entry(journal: &Journal, id: &str) -> Result<Entry> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(journal.get_entry(uuid).await?);
    }
    let prefix = id.to_ascii_lowercase();
    let mut matches: Vec<Entry> = journal
        .entries(None)
        .await?
        .into_iter()
        .filter(|e| e.id.to_string().starts_with(&prefix))
        .collect();
    match matches.len() {
        0 => bail!("no entry matches '{id}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("'{id}' is ambiguous ({n} entries match)"),
    }
}

/// Resolve a folder by ID or by exact (trimmed) name.
pub(crate) async fn resolve_folder(journal: &Journal, folder: &str) -> Result<Folder> {
    let folders = journal.folders().await?;
    if let Ok(uuid) = Uuid::parse_str(folder) {
        if let Some(found) = folders.iter().find(|f| f.id == uuid) {
            return Ok(found.clone());
        }
    }
    let name = folder.trim();
    let mut matches: Vec<Folder> = folders.into_iter().filter(|f| f.name == name).collect();
    match matches.len() {
        0 => bail!("no folder named '{name}'"),
        1 => Ok(matches.remove(0)),
        n => bail!("{n} folders are named '{name}'; use the folder ID"),
    }
}

pub(crate) fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}
