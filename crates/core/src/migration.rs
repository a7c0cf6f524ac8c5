//! One-shot backfill of cached image dimensions for entries created before
//! the catalog stored them.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::assets::AssetStore;
use crate::catalog::CatalogStore;
use crate::config::DIMENSION_MIGRATION_KEY;
use crate::error::Result;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MigrationState {
    NotStarted,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Entries that were missing dimensions when the pass started.
    pub examined: usize,
    pub updated: usize,
    /// Entries whose image could not be probed. They stay without dimensions.
    pub skipped: usize,
    /// True when the pass had already completed and nothing was read.
    pub already_done: bool,
    /// The pass stopped on a storage error. The completion flag is left
    /// unset, so the next launch runs it again.
    pub failed: bool,
}

/// Probes every entry lacking dimensions, writes the results back in one
/// transaction, then records completion in [`Settings`].
///
/// A pass runs on its own task: dropping the future returned by
/// [`run`](Self::run) does not stop it. Concurrent calls queue behind the
/// running pass and observe its completion flag.
#[derive(Clone)]
pub struct DimensionMigrator {
    catalog: CatalogStore,
    assets: AssetStore,
    settings: Arc<Settings>,
    running: Arc<Mutex<()>>,
}

impl DimensionMigrator {
    pub fn new(catalog: CatalogStore, assets: AssetStore, settings: Arc<Settings>) -> Self {
        Self {
            catalog,
            assets,
            settings,
            running: Arc::new(Mutex::new(())),
        }
    }

    pub fn state(&self) -> Result<MigrationState> {
        if self.settings.flag(DIMENSION_MIGRATION_KEY)? {
            Ok(MigrationState::Completed)
        } else if self.running.try_lock().is_err() {
            Ok(MigrationState::Running)
        } else {
            Ok(MigrationState::NotStarted)
        }
    }

    /// Run the pass unless it already completed. Never fails: storage errors
    /// are logged and reported through [`MigrationReport::failed`].
    pub async fn run(&self) -> MigrationReport {
        let this = self.clone();
        match tokio::spawn(async move { this.run_pass().await }).await {
            Ok(report) => report,
            Err(e) => {
                log::warn!("event=dimension_migration_failed error={e}");
                MigrationReport {
                    failed: true,
                    ..MigrationReport::default()
                }
            }
        }
    }

    async fn run_pass(&self) -> MigrationReport {
        let _running = self.running.lock().await;

        let mut report = MigrationReport::default();
        match self.backfill(&mut report).await {
            Ok(()) => log::info!(
                "event=dimension_migration_done examined={} updated={} skipped={} already_done={}",
                report.examined,
                report.updated,
                report.skipped,
                report.already_done
            ),
            Err(e) => {
                report.failed = true;
                log::warn!(
                    "event=dimension_migration_failed examined={} updated={} error={e}",
                    report.examined,
                    report.updated
                );
            }
        }
        report
    }

    async fn backfill(&self, report: &mut MigrationReport) -> Result<()> {
        if self.settings.flag(DIMENSION_MIGRATION_KEY)? {
            report.already_done = true;
            return Ok(());
        }

        let pending = self.catalog.entries_missing_dimensions().await?;
        report.examined = pending.len();
        log::info!("event=dimension_migration_start pending={}", pending.len());

        let asset_ids = pending.iter().map(|e| e.image_asset.clone()).collect();
        let probed = self.assets.probe_many(asset_ids).await?;

        let mut updates = Vec::with_capacity(pending.len());
        for (entry, (asset_id, result)) in pending.iter().zip(probed) {
            match result {
                Ok(dimensions) => updates.push((entry.id, dimensions)),
                Err(e) => {
                    report.skipped += 1;
                    log::warn!(
                        "event=dimension_probe_failed entry={} asset={asset_id} error={e}",
                        entry.id
                    );
                }
            }
        }

        if !updates.is_empty() {
            report.updated = self.catalog.update_dimensions_batch(updates).await?;
        }

        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || settings.set_flag(DIMENSION_MIGRATION_KEY, true)).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dimensions, Entry};
    use image::{DynamicImage, RgbImage};

    struct Fixture {
        tmp: tempfile::TempDir,
        catalog: CatalogStore,
        assets: AssetStore,
        settings: Arc<Settings>,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let assets = AssetStore::open(tmp.path().join("images"), tmp.path().join("thumbnails")).unwrap();
            let settings = Arc::new(Settings::open(&tmp.path().join("settings.json")).unwrap());
            Self {
                catalog: CatalogStore::open_in_memory().unwrap(),
                assets,
                settings,
                tmp,
            }
        }

        fn migrator(&self) -> DimensionMigrator {
            DimensionMigrator::new(self.catalog.clone(), self.assets.clone(), Arc::clone(&self.settings))
        }

        /// Write a PNG straight into the images directory, bypassing the store.
        fn legacy_image(&self, name: &str, w: u32, h: u32) -> String {
            let path = self.assets.path_for(name).unwrap();
            DynamicImage::ImageRgb8(RgbImage::new(w, h))
                .save_with_format(&path, image::ImageFormat::Png)
                .unwrap();
            name.to_string()
        }

        async fn legacy_entry(&self, asset: &str) -> Entry {
            let entry = Entry::new(asset, "old");
            self.catalog.insert_entry(entry.clone()).await.unwrap();
            entry
        }
    }

    #[tokio::test]
    async fn test_backfills_missing_dimensions() {
        let fx = Fixture::new();
        let a = fx.legacy_image("a.jpg", 40, 30);
        let entry = fx.legacy_entry(&a).await;

        let report = fx.migrator().run().await;
        assert_eq!(report.examined, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 0);

        let stored = fx.catalog.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.dimensions, Some(Dimensions::new(40.0, 30.0)));
        assert_eq!(stored.updated_at, entry.updated_at);
        assert_eq!(fx.migrator().state().unwrap(), MigrationState::Completed);
    }

    #[tokio::test]
    async fn test_unreadable_image_is_skipped() {
        let fx = Fixture::new();
        let good = fx.legacy_image("good.jpg", 10, 20);
        fx.legacy_entry(&good).await;
        let missing = fx.legacy_entry("gone.jpg").await;

        let report = fx.migrator().run().await;
        assert_eq!(report.examined, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 1);

        let stored = fx.catalog.get_entry(missing.id).await.unwrap().unwrap();
        assert_eq!(stored.dimensions, None);
        assert_eq!(fx.migrator().state().unwrap(), MigrationState::Completed);
    }

    #[tokio::test]
    async fn test_second_run_reads_nothing() {
        let fx = Fixture::new();
        fx.migrator().run().await;

        let late = fx.legacy_image("late.jpg", 8, 8);
        let entry = fx.legacy_entry(&late).await;

        let report = fx.migrator().run().await;
        assert!(report.already_done);
        assert_eq!(report.examined, 0);
        let stored = fx.catalog.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.dimensions, None);
    }

    #[tokio::test]
    async fn test_interrupted_pass_reruns() {
        let fx = Fixture::new();
        let a = fx.legacy_image("a.jpg", 12, 6);
        let b = fx.legacy_image("b.jpg", 6, 12);
        let first = fx.legacy_entry(&a).await;
        fx.legacy_entry(&b).await;

        // Simulate a crash after part of the batch landed but before the flag was set.
        fx.catalog
            .update_dimensions_batch(vec![(first.id, Dimensions::new(12.0, 6.0))])
            .await
            .unwrap();
        assert_eq!(fx.migrator().state().unwrap(), MigrationState::NotStarted);

        let report = fx.migrator().run().await;
        assert_eq!(report.examined, 1);
        assert_eq!(report.updated, 1);
        assert!(fx.catalog.entries_missing_dimensions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flag_write_failure_is_reported_and_retried() {
        let fx = Fixture::new();
        let a = fx.legacy_image("a.jpg", 20, 10);
        let entry = fx.legacy_entry(&a).await;

        // A directory in place of the settings file makes the flag write fail.
        let settings_path = fx.tmp.path().join("settings.json");
        std::fs::create_dir(&settings_path).unwrap();

        let report = fx.migrator().run().await;
        assert!(report.failed);
        assert!(!report.already_done);
        assert_eq!((report.examined, report.updated), (1, 1));
        assert!(!fx.settings.flag(DIMENSION_MIGRATION_KEY).unwrap());
        assert_eq!(fx.migrator().state().unwrap(), MigrationState::NotStarted);
        let stored = fx.catalog.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.dimensions, Some(Dimensions::new(20.0, 10.0)));

        std::fs::remove_dir(&settings_path).unwrap();
        let retry = fx.migrator().run().await;
        assert!(!retry.failed);
        assert!(!retry.already_done);
        assert_eq!(retry.examined, 0);
        assert_eq!(fx.migrator().state().unwrap(), MigrationState::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_do_one_pass() {
        let fx = Fixture::new();
        let a = fx.legacy_image("a.jpg", 5, 5);
        fx.legacy_entry(&a).await;

        let migrator = fx.migrator();
        let (r1, r2) = tokio::join!(migrator.run(), migrator.run());
        assert_eq!(r1.already_done as u8 + r2.already_done as u8, 1);
        assert_eq!(r1.updated + r2.updated, 1);
    }

    #[tokio::test]
    async fn test_dropped_caller_still_completes() {
        let fx = Fixture::new();
        let a = fx.legacy_image("a.jpg", 5, 5);
        let entry = fx.legacy_entry(&a).await;

        let migrator = fx.migrator();
        let handle = tokio::spawn({
            let migrator = migrator.clone();
            async move { migrator.run().await }
        });
        handle.abort();

        // A follow-up run waits on any pass still holding the lock.
        migrator.run().await;
        let stored = fx.catalog.get_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.dimensions, Some(Dimensions::new(5.0, 5.0)));
    }
}
