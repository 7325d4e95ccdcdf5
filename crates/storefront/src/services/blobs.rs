//! Filesystem-backed blob storage for deliverable files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::payments::store::{BlobMetadata, BlobStore, StoreError};

/// Serves product files from a directory on local disk.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a stored path against the root, rejecting anything that
    /// could escape it. Catalog paths are plain file names, so any parent
    /// or absolute component is treated as data corruption.
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|c| {
            !matches!(
                c,
                std::path::Component::Normal(_) | std::path::Component::CurDir
            )
        });
        if escapes {
            return Err(StoreError::DataCorruption(format!(
                "blob path {path:?} escapes storage root"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn metadata(&self, path: &str) -> Result<Option<BlobMetadata>, StoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(Some(BlobMetadata { len: meta.len() })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::read(&full).await?)
    }
}
