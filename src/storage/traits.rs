//! Abstract blob-store contract.
//!
//! The view cache persists every artifact as an opaque blob under a string
//! key. Key presence is the "already computed" sentinel, so implementations
//! must never expose a key before its bytes are fully written.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key is not usable by this backend.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Stored bytes failed an integrity check.
    #[error("Corrupted blob '{key}': {message}")]
    Corrupted { key: String, message: String },

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key → blob store.
///
/// # Consistency
/// - `put` and `publish` must be atomic per key: a reader sees either the old
///   bytes, the new bytes, or no key, never a partial write.
/// - `publish` makes `sentinel` visible only after every batch entry is.
pub trait BlobStore: Send + Sync {
    /// Read a blob.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write (or replace) a blob.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Returns true if the key is present.
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove a blob. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// All keys starting with `prefix`, ascending.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Write every entry of `batch`, then the sentinel key.
    fn publish(
        &self,
        batch: &[(String, Vec<u8>)],
        sentinel: (&str, &[u8]),
    ) -> Result<(), StorageError>;
}

impl<T: BlobStore + ?Sized> BlobStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        (**self).exists(key)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        (**self).delete(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).keys_with_prefix(prefix)
    }

    fn publish(
        &self,
        batch: &[(String, Vec<u8>)],
        sentinel: (&str, &[u8]),
    ) -> Result<(), StorageError> {
        (**self).publish(batch, sentinel)
    }
}

/// Serialize `value` as JSON and store it under `key`.
///
/// # Errors
/// Returns `SerializationError` or the backend's write error.
pub fn put_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: BlobStore + ?Sized,
    T: serde::Serialize + ?Sized,
{
    let bytes = to_json(value)?;
    store.put(key, &bytes)
}

/// Read `key` and deserialize it from JSON.
///
/// # Errors
/// Returns `SerializationError` when the blob is not valid JSON for `T`.
pub fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: BlobStore + ?Sized,
    T: serde::de::DeserializeOwned,
{
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::SerializationError(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Serialize `value` to JSON bytes.
///
/// # Errors
/// Returns `SerializationError` on failure.
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_blob_store_object_safe(_: &dyn BlobStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::BackendError("disk full".to_string());
        assert!(err.to_string().contains("disk full"));

        let err = StorageError::Corrupted {
            key: "concept".to_string(),
            message: "CRC mismatch".to_string(),
        };
        assert!(err.to_string().contains("concept"));
    }
}
