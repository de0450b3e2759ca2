//! Durable storage: the persistence seam and the operation queue built on it.

pub mod traits;
pub mod json_file;
pub mod memory;
pub mod queue;

pub use traits::{StorageBackend, StorageError};
pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use queue::{DurableQueue, QueueCounts};
