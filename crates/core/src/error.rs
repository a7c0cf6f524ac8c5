use std::path::PathBuf;

use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("entry not found: {0}")]
    EntryNotFound(Uuid),

    #[error("folder not found: {0}")]
    FolderNotFound(Uuid),

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("invalid asset identifier: {0:?}")]
    InvalidAssetId(String),

    #[error("folder name must not be empty")]
    InvalidFolderName,

    #[error("storage write failed: {0}")]
    WriteFailure(#[source] BoxError),

    #[error("could not decode image: {0}")]
    DecodeFailure(#[source] image::ImageError),

    #[error("image dimensions unavailable for {}: {reason}", .path.display())]
    MetadataUnavailable { path: PathBuf, reason: String },

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("catalog schema version {db} is newer than supported version {code}")]
    SchemaTooNew { db: u32, code: u32 },

    #[error("store lock poisoned by a panicking writer")]
    StorePoisoned,
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    WriteFailure,
    DecodeFailure,
    MetadataUnavailable,
    Other,
}

impl Error {
    pub fn write_failure(err: impl Into<BoxError>) -> Self {
        Error::WriteFailure(err.into())
    }

    /// Re-tags storage-level failures raised inside a write as `WriteFailure`.
    /// Domain errors pass through untouched.
    pub(crate) fn into_write_failure(self) -> Self {
        match self {
            Error::Database(e) => Error::WriteFailure(Box::new(e)),
            Error::Io(e) => Error::WriteFailure(Box::new(e)),
            Error::Settings(e) => Error::WriteFailure(Box::new(e)),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EntryNotFound(_) | Error::FolderNotFound(_) | Error::AssetNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::WriteFailure(_) => ErrorKind::WriteFailure,
            Error::DecodeFailure(_) => ErrorKind::DecodeFailure,
            Error::MetadataUnavailable { .. } => ErrorKind::MetadataUnavailable,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kinds() {
        assert!(Error::EntryNotFound(Uuid::nil()).is_not_found());
        assert!(Error::FolderNotFound(Uuid::nil()).is_not_found());
        assert!(Error::AssetNotFound("x.jpg".into()).is_not_found());
        assert!(!Error::InvalidFolderName.is_not_found());
    }

    #[test]
    fn test_into_write_failure_retags_storage_errors() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(io.into_write_failure().kind(), ErrorKind::WriteFailure);

        let db = Error::Database(rusqlite::Error::InvalidQuery);
        assert_eq!(db.into_write_failure().kind(), ErrorKind::WriteFailure);
    }

    #[test]
    fn test_into_write_failure_keeps_domain_errors() {
        let id = Uuid::new_v4();
        let err = Error::EntryNotFound(id).into_write_failure();
        assert!(matches!(err, Error::EntryNotFound(got) if got == id));
    }

    #[test]
    fn test_metadata_unavailable_message() {
        let err = Error::MetadataUnavailable {
            path: PathBuf::from("/tmp/a.jpg"),
            reason: "truncated header".into(),
        };
        assert_eq!(err.kind(), ErrorKind::MetadataUnavailable);
        assert!(err.to_string().contains("/tmp/a.jpg"));
        assert!(err.to_string().contains("truncated header"));
    }
}
