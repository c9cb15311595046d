//! In-memory blob store.
//!
//! Thread-safe and volatile; intended for embedded usage, tests, and as the
//! reference implementation of [`BlobStore`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::storage::traits::{BlobStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// In-memory implementation of [`BlobStore`].
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    ///
    /// # Errors
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.blobs.read().map_err(|_| lock_err("blobs.read"))?.len())
    }

    /// Returns true if nothing is stored.
    ///
    /// # Errors
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl BlobStore for InMemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let blobs = self.blobs.read().map_err(|_| lock_err("blobs.read"))?;
        Ok(blobs.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        let mut blobs = self.blobs.write().map_err(|_| lock_err("blobs.write"))?;
        blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let blobs = self.blobs.read().map_err(|_| lock_err("blobs.read"))?;
        Ok(blobs.contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut blobs = self.blobs.write().map_err(|_| lock_err("blobs.write"))?;
        Ok(blobs.remove(key).is_some())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let blobs = self.blobs.read().map_err(|_| lock_err("blobs.read"))?;
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn publish(
        &self,
        batch: &[(String, Vec<u8>)],
        sentinel: (&str, &[u8]),
    ) -> Result<(), StorageError> {
        if sentinel.0.is_empty() || batch.iter().any(|(k, _)| k.is_empty()) {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        let mut blobs = self.blobs.write().map_err(|_| lock_err("blobs.write"))?;
        for (key, value) in batch {
            blobs.insert(key.clone(), value.clone());
        }
        blobs.insert(sentinel.0.to_string(), sentinel.1.to_vec());
        Ok(())
    }
}
