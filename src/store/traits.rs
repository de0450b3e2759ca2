use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence collaborator: a keyed blob store with atomic overwrite.
///
/// `save` must be all-or-nothing: a partially applied write must not
/// corrupt the previously stored state, because the queue treats a
/// successful save as a durability guarantee to its caller.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Atomically replace the contents of `collection`.
    async fn save(&self, collection: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Load the last saved contents of `collection`, or `None` if it was
    /// never saved.
    async fn load(&self, collection: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
