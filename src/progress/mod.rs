//! Viewing progress persistence
//!
//! - Storage: key-value backends (memory, JSON file)
//! - Cache: resume/completion policy and coalesced writes
//! - Sync: best-effort remote push/pull

pub mod cache;
pub mod storage;
pub mod sync;

pub use cache::{ProgressCache, ProgressWriter, WriteOutcome};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use sync::RemoteSync;
