//! File-backed blob store.
//!
//! One file per key inside the cache directory. Writes go to a uniquely
//! named temp file, are flushed and fsynced, then renamed over the final
//! name, so a reader never observes a partially written blob. A key index is
//! rebuilt from the key frames on open; files deleted externally are noticed
//! lazily and dropped from the index.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::storage::traits::{BlobStore, StorageError};

use super::codec;
use super::file_lock::FileLock;

const BLOB_EXT: &str = "blob";
const TEMP_EXT: &str = "tmp";

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn is_plain_file_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | '^' | '+' | '.' | ',' | '-')
}

/// Maps a key to its file name: the key itself when it is short and uses
/// only portable characters, otherwise a blake3 digest of the key.
fn file_name_for(key: &str, max_len: usize) -> String {
    if key.len() <= max_len && !key.starts_with('.') && key.chars().all(is_plain_file_char) {
        format!("{key}.{BLOB_EXT}")
    } else {
        format!("h-{}.{BLOB_EXT}", blake3::hash(key.as_bytes()).to_hex())
    }
}

/// Durable implementation of [`BlobStore`] over a directory.
#[derive(Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
    _lock: FileLock,
    index: RwLock<BTreeMap<String, PathBuf>>,
    max_file_name_len: usize,
    sync_on_write: bool,
}

impl FileBlobStore {
    /// Open or create a store in `dir`, taking the directory lock.
    ///
    /// Leftover temp files from interrupted writes are removed; unreadable
    /// blob files are skipped with a warning.
    ///
    /// # Errors
    /// - the directory cannot be created or read
    /// - another process holds the lock
    pub fn open(dir: &Path, config: &CacheConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)?;
        let lock = FileLock::acquire(dir)?;
        if let Some(pid) = lock.reclaimed_from() {
            warn!(dir = %dir.display(), pid, "reclaimed cache directory from an exited owner");
        }

        let mut index = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let ext = path.extension().and_then(|e| e.to_str());

            if ext == Some(TEMP_EXT) {
                let _ = fs::remove_file(&path);
                continue;
            }
            if ext != Some(BLOB_EXT) {
                continue;
            }

            match Self::read_key(&path) {
                Ok(key) => {
                    index.insert(key, path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable blob file"),
            }
        }

        debug!(dir = %dir.display(), blobs = index.len(), "opened file blob store");

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
            index: RwLock::new(index),
            max_file_name_len: config.max_file_name_len,
            sync_on_write: config.sync_on_write,
        })
    }

    /// Directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_key(path: &Path) -> std::io::Result<String> {
        let mut reader = BufReader::new(File::open(path)?);
        codec::decode_key(&mut reader)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key, self.max_file_name_len))
    }

    /// Write-to-temp-then-rename. The rename is the commit point.
    fn write_file(&self, key: &str, value: &[u8]) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        let final_path = self.path_for(key);
        let temp_path = final_path.with_extension(format!("{BLOB_EXT}.{}.{TEMP_EXT}", Uuid::new_v4()));

        let bytes = codec::encode_blob(key, value)?;
        let result = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(&bytes)?;
            file.flush()?;
            if self.sync_on_write {
                file.sync_all()?;
            }
            fs::rename(&temp_path, &final_path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(final_path)
    }

    fn index_insert(&self, key: &str, path: PathBuf) -> Result<(), StorageError> {
        let mut index = self.index.write().map_err(|_| lock_err("index.write"))?;
        index.insert(key.to_string(), path);
        Ok(())
    }

    fn index_remove(&self, key: &str) -> Result<Option<PathBuf>, StorageError> {
        let mut index = self.index.write().map_err(|_| lock_err("index.write"))?;
        Ok(index.remove(key))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = {
            let index = self.index.read().map_err(|_| lock_err("index.read"))?;
            match index.get(key) {
                Some(p) => p.clone(),
                None => return Ok(None),
            }
        };

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.index_remove(key)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let (stored_key, payload) =
            codec::decode_blob(&mut BufReader::new(file)).map_err(|e| StorageError::Corrupted {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        if stored_key != key {
            return Err(StorageError::Corrupted {
                key: key.to_string(),
                message: format!("file holds key '{stored_key}'"),
            });
        }
        Ok(Some(payload))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.write_file(key, value)?;
        self.index_insert(key, path)
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("index.read"))?;
        Ok(index.get(key).is_some_and(|p| p.exists()))
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let Some(path) = self.index_remove(key)? else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let index = self.index.read().map_err(|_| lock_err("index.read"))?;
        Ok(index
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .filter(|(_, p)| p.exists())
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn publish(
        &self,
        batch: &[(String, Vec<u8>)],
        sentinel: (&str, &[u8]),
    ) -> Result<(), StorageError> {
        for (key, value) in batch {
            self.put(key, value)?;
        }
        // Directory entries must be durable before the sentinel appears.
        if self.sync_on_write {
            sync_dir(&self.dir)?;
        }
        self.put(sentinel.0, sentinel.1)
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
