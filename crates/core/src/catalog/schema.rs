use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS folders (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            sort_order  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_folders_order ON folders(sort_order, created_at);

        CREATE TABLE IF NOT EXISTS entries (
            id              TEXT PRIMARY KEY,
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL,
            memo            TEXT NOT NULL,
            image_asset     TEXT NOT NULL,
            thumbnail_asset TEXT,
            title           TEXT,
            folder_id       TEXT,
            image_width     REAL,
            image_height    REAL,
            CHECK ((image_width IS NULL) = (image_height IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_entries_created ON entries(created_at);
        CREATE INDEX IF NOT EXISTS idx_entries_folder ON entries(folder_id);

        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Stamp or check the schema version. Catalogs written by a newer build are refused.
pub fn migrate(conn: &Connection) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match stored.and_then(|v| v.parse::<u32>().ok()) {
        None => {
            conn.execute(
                "INSERT OR REPLACE INTO config (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }
        Some(db) if db > SCHEMA_VERSION => {
            return Err(Error::SchemaTooNew {
                db,
                code: SCHEMA_VERSION,
            });
        }
        Some(_) => {}
    }
    Ok(())
}
