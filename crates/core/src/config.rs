use std::path::{Path, PathBuf};

/// JPEG quality used when re-encoding originals.
pub const ORIGINAL_JPEG_QUALITY: u8 = 80;

/// JPEG quality used for thumbnails.
pub const THUMBNAIL_JPEG_QUALITY: u8 = 70;

/// Thumbnails are downsampled until their shorter edge is at most this many pixels.
pub const THUMBNAIL_SHORT_EDGE: u32 = 500;

/// Literal prefix carried by every thumbnail identifier.
pub const THUMBNAIL_PREFIX: &str = "thumb_";

/// Default inset between gallery cells, in points.
pub const DEFAULT_CELL_PADDING: f64 = 8.0;

/// Settings key holding the one-shot dimension backfill flag.
pub const DIMENSION_MIGRATION_KEY: &str = "did_migrate_image_dimensions_v1";

/// On-disk layout of a journal rooted at a single application-owned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalConfig {
    root: PathBuf,
}

impl JournalConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$HOME/.photojournal`, or `./.photojournal` when `HOME` is unset.
    pub fn default_root() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".photojournal")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.db")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}
