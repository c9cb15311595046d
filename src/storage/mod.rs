//! Blob storage for the view cache.
//!
//! [`BlobStore`] is the abstract key → bytes contract. [`memory`] holds the
//! volatile backend; `persistent` (feature-gated) the file-backed one.

mod traits;

pub mod memory;
#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryBlobStore;
pub use traits::{get_json, put_json, to_json, BlobStore, StorageError};
