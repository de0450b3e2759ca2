use async_trait::async_trait;
use dashmap::DashMap;

use super::traits::{StorageBackend, StorageError};

/// In-memory storage backend for tests and ephemeral queues.
pub struct MemoryBackend {
    collections: DashMap<String, Vec<u8>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }

    /// Number of stored collections
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn save(&self, collection: &str, data: &[u8]) -> Result<(), StorageError> {
        self.collections.insert(collection.to_string(), data.to_vec());
        Ok(())
    }

    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.collections.get(collection).map(|r| r.value().clone()))
    }
}
