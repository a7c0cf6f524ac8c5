pub mod codec;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task;
use uuid::Uuid;

use crate::config::{
    JournalConfig, ORIGINAL_JPEG_QUALITY, THUMBNAIL_JPEG_QUALITY, THUMBNAIL_PREFIX,
    THUMBNAIL_SHORT_EDGE,
};
use crate::domain::{Dimensions, SavedAsset};
use crate::error::{Error, Result};

const ASSET_EXTENSION: &str = "jpg";

/// Durable storage for original and thumbnail images.
///
/// Files live in two flat directories. Thumbnail identifiers carry
/// [`THUMBNAIL_PREFIX`], which is the only thing that decides which directory
/// an identifier resolves into. Files are written once and never rewritten.
#[derive(Clone)]
pub struct AssetStore {
    images_dir: PathBuf,
    thumbnails_dir: PathBuf,
    gate: Arc<RwLock<()>>,
}

impl AssetStore {
    /// Open the store, creating both directories if needed.
    pub fn open(images_dir: impl Into<PathBuf>, thumbnails_dir: impl Into<PathBuf>) -> Result<Self> {
        let images_dir = images_dir.into();
        let thumbnails_dir = thumbnails_dir.into();
        fs::create_dir_all(&images_dir)?;
        fs::create_dir_all(&thumbnails_dir)?;
        Ok(Self {
            images_dir,
            thumbnails_dir,
            gate: Arc::new(RwLock::new(())),
        })
    }

    pub fn from_config(config: &JournalConfig) -> Result<Self> {
        Self::open(config.images_dir(), config.thumbnails_dir())
    }

    pub fn is_thumbnail_id(id: &str) -> bool {
        id.starts_with(THUMBNAIL_PREFIX)
    }

    /// Resolve an identifier to its file path. The file may not exist.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        let dir = if Self::is_thumbnail_id(id) {
            &self.thumbnails_dir
        } else {
            &self.images_dir
        };
        Ok(dir.join(id))
    }

    /// Re-encode at the original quality and store under a fresh identifier.
    /// Identical inputs still produce distinct assets.
    pub async fn save_original(&self, bytes: Vec<u8>) -> Result<SavedAsset> {
        let (encoded, width, height) = task::spawn_blocking(move || -> Result<_> {
            let img = codec::decode_upright(&bytes)?;
            let encoded = codec::encode_jpeg(&img, ORIGINAL_JPEG_QUALITY)?;
            Ok((encoded, img.width(), img.height()))
        })
        .await??;

        let id = format!("{}.{ASSET_EXTENSION}", Uuid::new_v4());
        self.write_new(id, encoded, width, height).await
    }

    /// Downsample so the shorter edge is at most [`THUMBNAIL_SHORT_EDGE`] and
    /// store under a thumbnail identifier. Smaller images keep their size.
    pub async fn save_thumbnail(&self, bytes: Vec<u8>) -> Result<SavedAsset> {
        let (encoded, width, height) = task::spawn_blocking(move || -> Result<_> {
            let img = codec::decode_upright(&bytes)?;
            let img = codec::downscale_short_edge(img, THUMBNAIL_SHORT_EDGE)?;
            let encoded = codec::encode_jpeg(&img, THUMBNAIL_JPEG_QUALITY)?;
            Ok((encoded, img.width(), img.height()))
        })
        .await??;

        let id = format!("{THUMBNAIL_PREFIX}{}.{ASSET_EXTENSION}", Uuid::new_v4());
        self.write_new(id, encoded, width, height).await
    }

    async fn write_new(&self, id: String, bytes: Vec<u8>, width: u32, height: u32) -> Result<SavedAsset> {
        let path = self.path_for(&id)?;
        let _guard = Arc::clone(&self.gate).write_owned().await;
        task::spawn_blocking(move || write_atomic(&path, &bytes).map_err(Error::into_write_failure))
            .await??;
        log::debug!("event=asset_write id={id} width={width} height={height}");
        Ok(SavedAsset { id, width, height })
    }

    pub async fn load(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(id)?;
        let id = id.to_string();
        let _guard = Arc::clone(&self.gate).read_owned().await;
        task::spawn_blocking(move || match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::AssetNotFound(id)),
            Err(e) => Err(e.into()),
        })
        .await?
    }

    /// Remove an asset. Missing files are not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        let _guard = Arc::clone(&self.gate).write_owned().await;
        task::spawn_blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::write_failure(e)),
        })
        .await?
    }

    /// Header-only size probe of a stored asset.
    pub async fn probe_dimensions(&self, id: &str) -> Result<Dimensions> {
        let paths = self.probe_many(vec![id.to_string()]).await?;
        paths
            .into_iter()
            .next()
            .map(|(_, result)| result)
            .unwrap_or_else(|| Err(Error::AssetNotFound(id.to_string())))
    }

    /// Probe many assets in parallel without decoding pixels. Results keep input order.
    pub async fn probe_many(&self, ids: Vec<String>) -> Result<Vec<(String, Result<Dimensions>)>> {
        let resolved: Vec<(String, Result<PathBuf>)> = ids
            .into_iter()
            .map(|id| {
                let path = self.path_for(&id);
                (id, path)
            })
            .collect();
        let _guard = Arc::clone(&self.gate).read_owned().await;
        let results = task::spawn_blocking(move || {
            use rayon::prelude::*;
            resolved
                .into_par_iter()
                .map(|(id, path)| {
                    let dims = path.and_then(|p| codec::probe_dimensions(&p)).map(|(w, h)| {
                        Dimensions::new(w as f64, h as f64)
                    });
                    (id, dims)
                })
                .collect::<Vec<_>>()
        })
        .await?;
        Ok(results)
    }

    /// Every identifier currently on disk, originals first, each list sorted.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let images_dir = self.images_dir.clone();
        let thumbnails_dir = self.thumbnails_dir.clone();
        let _guard = Arc::clone(&self.gate).read_owned().await;
        task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut ids = list_dir(&images_dir, |name| !name.starts_with(THUMBNAIL_PREFIX))?;
            ids.extend(list_dir(&thumbnails_dir, |name| name.starts_with(THUMBNAIL_PREFIX))?);
            Ok(ids)
        })
        .await?
    }
}

/// Identifiers are bare file names. Anything that could escape the store
/// directories, or that looks like a temp file, is rejected.
fn validate_id(id: &str) -> Result<()> {
    let bad = id.is_empty()
        || id.starts_with('.')
        || id.contains(['/', '\\', '\0'])
        || Path::new(id).components().count() != 1;
    if bad {
        return Err(Error::InvalidAssetId(id.to_string()));
    }
    Ok(())
}

/// Write to a temp file in the destination directory, fsync, then move it
/// into place. Fails rather than replacing an existing file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new().prefix(".tmp").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist_noclobber(path).map_err(|e| e.error)?;
    Ok(())
}

fn list_dir(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if validate_id(name).is_ok() && keep(name) {
            ids.push(name.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}
