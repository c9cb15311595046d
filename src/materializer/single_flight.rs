//! Per-key mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{ConsolidationError, ConsolidationResult};

/// Lock table serializing work per key. Entries are dropped once no caller
/// holds or waits on them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `key`.
    ///
    /// # Errors
    /// Returns `Internal` if a lock was poisoned by a panicking holder.
    pub fn with_lock<R>(&self, key: &str, f: impl FnOnce() -> R) -> ConsolidationResult<R> {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .map_err(|_| ConsolidationError::internal("single-flight table poisoned"))?;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let result = {
            let _guard = slot
                .lock()
                .map_err(|_| ConsolidationError::internal(format!("single-flight lock poisoned: {key}")))?;
            f()
        };

        let mut slots = self
            .slots
            .lock()
            .map_err(|_| ConsolidationError::internal("single-flight table poisoned"))?;
        // One reference in the table, one here: nobody else is waiting.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        Ok(result)
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Returns true when no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
