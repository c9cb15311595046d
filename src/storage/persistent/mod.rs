//! Persistent storage backend for the view cache.
//!
//! This module provides a durable, crash-safe [`BlobStore`](crate::storage::BlobStore) with:
//! - Staged writes (temp file, fsync, rename) so no reader sees a partial blob
//! - File locking for single-process ownership of a cache directory
//! - CRC32 checksums for corruption detection
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── .lock                      (flock / LockFileEx)
//! ├── concept.blob               (shared reference artifact)
//! ├── <fingerprint>.dupDocIDs.blob
//! ├── <fingerprint>.manifest.blob (written last; existence sentinel)
//! └── h-<blake3>.blob            (keys too long or unsafe for a file name)
//! ```

mod codec;
mod file_lock;
mod store;

pub use file_lock::FileLock;
pub use store::FileBlobStore;

use std::path::Path;

use crate::config::CacheConfig;
use crate::error::ConsolidationError;

/// Open or create a file-backed view cache at `path`.
///
/// # Errors
/// - If the path cannot be created or accessed
/// - If another process holds the lock
///
/// # Example
/// ```rust,no_run
/// use consolidata::config::CacheConfig;
/// use consolidata::storage::persistent::open_cache;
///
/// let store = open_cache("./viewcache", &CacheConfig::default())?;
/// # Ok::<(), consolidata::ConsolidationError>(())
/// ```
pub fn open_cache(
    path: impl AsRef<Path>,
    config: &CacheConfig,
) -> Result<FileBlobStore, ConsolidationError> {
    Ok(FileBlobStore::open(path.as_ref(), config)?)
}
