// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! File-backed storage with atomic overwrite.
//!
//! Each collection lives in its own `<collection>.json` file inside the
//! backend's directory. Writes go to a `.tmp` sibling first and are moved
//! into place with `rename`, so a crash mid-write leaves the previous
//! snapshot intact.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tracing::{debug, warn};

use super::traits::{StorageBackend, StorageError};

/// Storage backend writing one JSON file per collection.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend rooted at `dir`, creating the directory if needed.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn file_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn save(&self, collection: &str, data: &[u8]) -> Result<(), StorageError> {
        let target = self.file_path(collection);
        let tmp = self.dir.join(format!("{collection}.json.tmp"));

        tokio::fs::write(&tmp, data).await?;
        // Atomic replace: the target is either the old snapshot or the new one.
        tokio::fs::rename(&tmp, &target).await?;

        debug!(collection, bytes = data.len(), "Collection persisted");
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let target = self.file_path(collection);
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(collection, "No persisted state, starting empty");
                Ok(None)
            }
            Err(e) => {
                warn!(collection, error = %e, "Failed to load collection");
                Err(e.into())
            }
        }
    }
}
