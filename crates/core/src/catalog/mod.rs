pub mod schema;
pub mod store;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

use crate::domain::*;
use crate::error::{Error, Result};

pub use store::CatalogStore;

const ENTRY_COLUMNS: &str = "id, created_at, updated_at, memo, image_asset, thumbnail_asset, \
                             title, folder_id, image_width, image_height";

const FOLDER_COLUMNS: &str = "id, name, created_at, sort_order";

/// SQLite-backed catalog of journal entries and folders.
///
/// Every mutating method runs inside a single transaction; storage failures
/// raised there surface as [`Error::WriteFailure`].
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open or create a catalog at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn write<T>(&mut self, op: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction().map_err(Error::write_failure)?;
        let value = op(&tx).map_err(Error::into_write_failure)?;
        tx.commit().map_err(Error::write_failure)?;
        Ok(value)
    }

    // ── Entries ──────────────────────────────────────────────────────

    /// All entries, newest first.
    pub fn list_all_entries(&self) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY created_at DESC, rowid DESC"
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entries filed under `folder_id`, newest first.
    pub fn list_entries_by_folder(&self, folder_id: Uuid) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE folder_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let entries = stmt
            .query_map(params![folder_id.to_string()], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_entry(&self, id: Uuid) -> Result<Option<Entry>> {
        fetch_entry(&self.conn, id)
    }

    pub fn count_entries(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn insert_entry(&mut self, entry: &Entry) -> Result<()> {
        if entry.image_asset.is_empty() {
            return Err(Error::InvalidAssetId(String::new()));
        }
        self.write(|tx| {
            tx.execute(
                &format!("INSERT INTO entries ({ENTRY_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)"),
                params![
                    entry.id.to_string(),
                    entry.created_at.timestamp_micros(),
                    entry.updated_at.timestamp_micros(),
                    entry.memo,
                    entry.image_asset,
                    entry.thumbnail_asset,
                    entry.title,
                    entry.folder_id.map(|f| f.to_string()),
                    entry.dimensions.map(|d| d.width),
                    entry.dimensions.map(|d| d.height),
                ],
            )?;
            Ok(())
        })?;
        log::debug!("event=entry_insert id={}", entry.id);
        Ok(())
    }

    /// Remove an entry. Returns the removed record, or `None` when it was already gone.
    pub fn delete_entry(&mut self, id: Uuid) -> Result<Option<Entry>> {
        let removed = self.write(|tx| {
            let Some(entry) = fetch_entry(tx, id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM entries WHERE id = ?1", params![id.to_string()])?;
            Ok(Some(entry))
        })?;
        if removed.is_some() {
            log::debug!("event=entry_delete id={id}");
        }
        Ok(removed)
    }

    pub fn update_memo(&mut self, id: Uuid, memo: &str) -> Result<Entry> {
        self.write(|tx| {
            let mut entry = fetch_entry(tx, id)?.ok_or(Error::EntryNotFound(id))?;
            entry.memo = memo.to_string();
            entry.updated_at = timestamp_now().max(entry.updated_at);
            tx.execute(
                "UPDATE entries SET memo = ?1, updated_at = ?2 WHERE id = ?3",
                params![entry.memo, entry.updated_at.timestamp_micros(), id.to_string()],
            )?;
            Ok(entry)
        })
    }

    /// Re-file an entry. The folder is not checked for existence; dangling
    /// references are cleared when a folder is deleted.
    pub fn move_entry_to_folder(&mut self, id: Uuid, folder_id: Option<Uuid>) -> Result<Entry> {
        self.write(|tx| {
            let mut entry = fetch_entry(tx, id)?.ok_or(Error::EntryNotFound(id))?;
            entry.folder_id = folder_id;
            entry.updated_at = timestamp_now().max(entry.updated_at);
            tx.execute(
                "UPDATE entries SET folder_id = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    folder_id.map(|f| f.to_string()),
                    entry.updated_at.timestamp_micros(),
                    id.to_string()
                ],
            )?;
            Ok(entry)
        })
    }

    /// Entries with no cached image size, newest first.
    pub fn entries_missing_dimensions(&self) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE image_width IS NULL OR image_height IS NULL
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let entries = stmt
            .query_map([], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Write cached image sizes in a single transaction. Ids that no longer
    /// exist are ignored. Returns the number of records updated.
    pub fn update_dimensions_batch(&mut self, updates: &[(Uuid, Dimensions)]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        self.write(|tx| {
            let mut stmt = tx.prepare(
                "UPDATE entries SET image_width = ?1, image_height = ?2 WHERE id = ?3",
            )?;
            let mut updated = 0usize;
            for (id, dims) in updates {
                updated += stmt.execute(params![dims.width, dims.height, id.to_string()])?;
            }
            Ok(updated)
        })
    }

    // ── Folders ──────────────────────────────────────────────────────

    /// Folders by sort order, ties broken by creation time.
    pub fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders ORDER BY sort_order ASC, created_at ASC, rowid ASC"
        ))?;
        let folders = stmt
            .query_map([], folder_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(folders)
    }

    pub fn get_folder(&self, id: Uuid) -> Result<Option<Folder>> {
        fetch_folder(&self.conn, id)
    }

    /// Create a folder ordered after every existing one.
    pub fn add_folder(&mut self, name: &str) -> Result<Folder> {
        let name = normalize_folder_name(name)?;
        let folder = self.write(|tx| {
            let max_order: Option<i64> =
                tx.query_row("SELECT MAX(sort_order) FROM folders", [], |row| row.get(0))?;
            let folder = Folder {
                id: Uuid::new_v4(),
                name,
                created_at: timestamp_now(),
                sort_order: max_order.unwrap_or(0) + 1,
            };
            tx.execute(
                &format!("INSERT INTO folders ({FOLDER_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
                params![
                    folder.id.to_string(),
                    folder.name,
                    folder.created_at.timestamp_micros(),
                    folder.sort_order
                ],
            )?;
            Ok(folder)
        })?;
        log::debug!("event=folder_add id={} sort_order={}", folder.id, folder.sort_order);
        Ok(folder)
    }

    pub fn rename_folder(&mut self, id: Uuid, name: &str) -> Result<Folder> {
        let name = normalize_folder_name(name)?;
        self.write(|tx| {
            let mut folder = fetch_folder(tx, id)?.ok_or(Error::FolderNotFound(id))?;
            tx.execute(
                "UPDATE folders SET name = ?1 WHERE id = ?2",
                params![name, id.to_string()],
            )?;
            folder.name = name;
            Ok(folder)
        })
    }

    /// Delete a folder, first clearing the folder reference on every entry
    /// that points at it. Both steps commit together.
    /// Returns the removed folder and the number of entries cleared.
    pub fn delete_folder(&mut self, id: Uuid) -> Result<Option<(Folder, usize)>> {
        let removed = self.write(|tx| {
            let Some(folder) = fetch_folder(tx, id)? else {
                return Ok(None);
            };
            let cleared = tx.execute(
                "UPDATE entries SET folder_id = NULL WHERE folder_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute("DELETE FROM folders WHERE id = ?1", params![id.to_string()])?;
            Ok(Some((folder, cleared)))
        })?;
        if let Some((_, cleared)) = &removed {
            log::info!("event=folder_delete id={id} cleared_entries={cleared}");
        }
        Ok(removed)
    }
}

fn normalize_folder_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidFolderName);
    }
    Ok(trimmed.to_string())
}

fn fetch_entry(conn: &Connection, id: Uuid) -> Result<Option<Entry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
            params![id.to_string()],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

fn fetch_folder(conn: &Connection, id: Uuid) -> Result<Option<Folder>> {
    let folder = conn
        .query_row(
            &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?1"),
            params![id.to_string()],
            folder_from_row,
        )
        .optional()?;
    Ok(folder)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let width: Option<f64> = row.get(8)?;
    let height: Option<f64> = row.get(9)?;
    let folder_id = match row.get::<_, Option<String>>(7)? {
        Some(raw) => Some(parse_uuid(7, &raw)?),
        None => None,
    };

    Ok(Entry {
        id: uuid_at(row, 0)?,
        created_at: time_at(row, 1)?,
        updated_at: time_at(row, 2)?,
        memo: row.get(3)?,
        image_asset: row.get(4)?,
        thumbnail_asset: row.get(5)?,
        title: row.get(6)?,
        folder_id,
        dimensions: match (width, height) {
            (Some(w), Some(h)) => Some(Dimensions::new(w, h)),
            _ => None,
        },
    })
}

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        created_at: time_at(row, 2)?,
        sort_order: row.get(3)?,
    })
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    parse_uuid(idx, &raw)
}

fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}
