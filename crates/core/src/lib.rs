pub mod assets;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod layout;
pub mod migration;
pub mod settings;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use assets::AssetStore;
use catalog::CatalogStore;
use config::JournalConfig;
use domain::*;
use error::{Error, Result};
use layout::{AspectRatioItem, Layout, LayoutParams};
use migration::{DimensionMigrator, MigrationReport, MigrationState};
use settings::Settings;

/// Outcome of an orphan sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Asset identifiers on disk that no entry references.
    pub orphans: Vec<String>,
    pub removed: usize,
}

/// The main entry point for the photo journal library.
///
/// Ties the catalog, the asset store and the settings file together under one
/// root directory. Cheap to clone; clones share the same stores.
#[derive(Clone)]
pub struct Journal {
    config: JournalConfig,
    catalog: CatalogStore,
    assets: AssetStore,
    settings: Arc<Settings>,
    migrator: DimensionMigrator,
    // Held shared while assets exist on disk ahead of their record, and
    // exclusively by the orphan sweep.
    staging: Arc<RwLock<()>>,
}

impl Journal {
    /// Open or create a journal, creating the root and asset directories as needed.
    pub async fn open(config: JournalConfig) -> Result<Self> {
        std::fs::create_dir_all(config.root())?;
        let catalog = CatalogStore::open(config.catalog_path()).await?;
        let assets = AssetStore::from_config(&config)?;
        let settings = Arc::new(Settings::open(&config.settings_path())?);
        let migrator = DimensionMigrator::new(catalog.clone(), assets.clone(), Arc::clone(&settings));
        log::info!("event=journal_open root={}", config.root().display());
        Ok(Self {
            config,
            catalog,
            assets,
            settings,
            migrator,
            staging: Arc::new(RwLock::new(())),
        })
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Entries ──────────────────────────────────────────────────────

    /// Store the image, its thumbnail and a new entry pointing at both.
    ///
    /// Assets written before a failure are removed again on a best-effort basis.
    pub async fn add_entry(
        &self,
        image: Vec<u8>,
        memo: impl Into<String>,
        folder_id: Option<Uuid>,
    ) -> Result<Entry> {
        let _staging = self.staging.read().await;
        let original = self.assets.save_original(image.clone()).await?;
        let thumbnail = match self.assets.save_thumbnail(image).await {
            Ok(t) => t,
            Err(e) => {
                self.discard_assets([original.id.as_str()]).await;
                return Err(e);
            }
        };

        let mut entry = Entry::new(original.id.clone(), memo);
        entry.thumbnail_asset = Some(thumbnail.id.clone());
        entry.folder_id = folder_id;
        entry.dimensions = Some(original.dimensions());

        if let Err(e) = self.catalog.insert_entry(entry.clone()).await {
            self.discard_assets(entry.asset_ids()).await;
            return Err(e);
        }
        log::info!(
            "event=entry_added id={} image={} thumbnail={} folder={:?}",
            entry.id,
            original.id,
            thumbnail.id,
            folder_id
        );
        Ok(entry)
    }

    pub async fn get_entry(&self, id: Uuid) -> Result<Entry> {
        self.catalog.get_entry(id).await?.ok_or(Error::EntryNotFound(id))
    }

    /// Entries newest first, optionally limited to one folder.
    pub async fn entries(&self, folder_id: Option<Uuid>) -> Result<Vec<Entry>> {
        match folder_id {
            Some(folder_id) => self.catalog.list_by_folder(folder_id).await,
            None => self.catalog.list_all().await,
        }
    }

    pub async fn count_entries(&self) -> Result<usize> {
        self.catalog.count_entries().await
    }

    pub async fn update_memo(&self, id: Uuid, memo: impl Into<String>) -> Result<Entry> {
        self.catalog.update_memo(id, memo).await
    }

    pub async fn move_entry_to_folder(&self, id: Uuid, folder_id: Option<Uuid>) -> Result<Entry> {
        self.catalog.move_entry_to_folder(id, folder_id).await
    }

    /// Remove the record, then its asset files. File removal failures are
    /// logged and left for [`sweep_orphans`](Self::sweep_orphans). Returns
    /// `None` when the entry was already gone.
    pub async fn delete_entry(&self, id: Uuid) -> Result<Option<Entry>> {
        let Some(entry) = self.catalog.delete_entry(id).await? else {
            return Ok(None);
        };
        self.discard_assets(entry.asset_ids()).await;
        log::info!("event=entry_deleted id={id}");
        Ok(Some(entry))
    }

    pub async fn load_image(&self, entry: &Entry) -> Result<Vec<u8>> {
        self.assets.load(&entry.image_asset).await
    }

    /// Thumbnail bytes, falling back to the original when the entry has none.
    pub async fn load_preview(&self, entry: &Entry) -> Result<Vec<u8>> {
        let id = entry.thumbnail_asset.as_deref().unwrap_or(&entry.image_asset);
        self.assets.load(id).await
    }

    // ── Folders ──────────────────────────────────────────────────────

    pub async fn folders(&self) -> Result<Vec<Folder>> {
        self.catalog.list_folders().await
    }

    pub async fn add_folder(&self, name: impl Into<String>) -> Result<Folder> {
        let folder = self.catalog.add_folder(name).await?;
        log::info!("event=folder_added id={} sort_order={}", folder.id, folder.sort_order);
        Ok(folder)
    }

    pub async fn rename_folder(&self, id: Uuid, name: impl Into<String>) -> Result<Folder> {
        self.catalog.rename_folder(id, name).await
    }

    /// Delete a folder. Its entries survive, unfiled. Returns the folder and
    /// how many entries were unfiled, or `None` when it was already gone.
    pub async fn delete_folder(&self, id: Uuid) -> Result<Option<(Folder, usize)>> {
        self.catalog.delete_folder(id).await
    }

    // ── Gallery ──────────────────────────────────────────────────────

    /// Entries in display order together with their masonry placement.
    pub async fn gallery_layout(
        &self,
        folder_id: Option<Uuid>,
        content_width: f64,
        cell_padding: f64,
    ) -> Result<(Vec<Entry>, Layout)> {
        let entries = self.entries(folder_id).await?;
        let items: Vec<AspectRatioItem> = entries.iter().map(AspectRatioItem::from).collect();
        let params = LayoutParams::new(
            layout::columns_for_width(content_width),
            content_width,
            cell_padding,
        );
        let layout = layout::layout_with(&items, &params);
        Ok((entries, layout))
    }

    // ── Maintenance ──────────────────────────────────────────────────

    pub fn migration_state(&self) -> Result<MigrationState> {
        self.migrator.state()
    }

    /// Backfill cached image sizes once per installation. A failed pass is
    /// reported rather than returned as an error so the journal stays usable.
    pub async fn run_startup_migration(&self) -> MigrationReport {
        self.migrator.run().await
    }

    /// Find asset files no entry references and, unless `dry_run`, delete them.
    pub async fn sweep_orphans(&self, dry_run: bool) -> Result<SweepReport> {
        let _staging = self.staging.write().await;

        let entries = self.catalog.list_all().await?;
        let referenced: HashSet<&str> = entries.iter().flat_map(|e| e.asset_ids()).collect();
        let orphans: Vec<String> = self
            .assets
            .list_ids()
            .await?
            .into_iter()
            .filter(|id| !referenced.contains(id.as_str()))
            .collect();

        let mut removed = 0;
        if !dry_run {
            for id in &orphans {
                match self.assets.delete(id).await {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("event=orphan_delete_failed asset={id} error={e}"),
                }
            }
        }
        log::info!(
            "event=orphan_sweep found={} removed={removed} dry_run={dry_run}",
            orphans.len()
        );
        Ok(SweepReport { orphans, removed })
    }

    async fn discard_assets<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            if let Err(e) = self.assets.delete(id).await {
                log::warn!("event=asset_cleanup_failed asset={id} error={e}");
            }
        }
    }
}
