use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached pixel size of an entry's original image.
/// Width and height travel together so neither can exist without the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Height over width, or `None` when the width cannot divide.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width > 0.0 && self.width.is_finite() && self.height.is_finite() {
            Some(self.height / self.width)
        } else {
            None
        }
    }
}

/// A single photo-plus-memo journal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub memo: String,
    /// Asset identifier of the original image. Always resolvable while the entry exists.
    pub image_asset: String,
    pub thumbnail_asset: Option<String>,
    pub title: Option<String>,
    /// Grouping label only; the folder does not own the entry.
    pub folder_id: Option<Uuid>,
    pub dimensions: Option<Dimensions>,
}

impl Entry {
    /// Fresh entry with a new identifier, stamped now.
    pub fn new(image_asset: impl Into<String>, memo: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            memo: memo.into(),
            image_asset: image_asset.into(),
            thumbnail_asset: None,
            title: None,
            folder_id: None,
            dimensions: None,
        }
    }

    /// Asset identifiers owned by this entry (original first).
    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.image_asset.as_str()).chain(self.thumbnail_asset.as_deref())
    }
}

/// A named, user-ordered grouping label applied to entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub sort_order: i64,
}

/// Result of writing an image asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedAsset {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

impl SavedAsset {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width as f64, self.height as f64)
    }
}

/// Current UTC time truncated to the microsecond precision the catalog stores.
pub fn timestamp_now() -> DateTime<Utc> {
    let micros = Utc::now().timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}
