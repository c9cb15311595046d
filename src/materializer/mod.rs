//! Derived-view materializer.
//!
//! Turns a request into a cached snapshot of consolidated document sets and
//! lookup tables:
//!
//! ```text
//! params ──► Fingerprint ──► <fp>.manifest present? ──yes──► hit
//!                                   │ no
//!                                   ▼
//!                        single-flight lock on <fp>
//!                                   │ re-check
//!                                   ▼
//!          raw ids ─► dupDocIDs ─► consolidated views ─► tables
//!                                   │
//!                                   ▼
//!              publish <fp>.<field>…, then <fp>.manifest
//! ```
//!
//! Shared reference artifacts are computed once by the first
//! materialization and reused by every fingerprint.

mod mode;
mod reference;
mod response;
mod single_flight;
mod snapshot;
mod tables;
mod views;

pub use mode::ViewMode;
pub use reference::{
    DdpNames, DdpTriple, ReferenceArtifact, ReferenceCache, ReferenceData, StateInfo,
    INITIALIZED_MARKER, PLACEHOLDER_LAST_NAMES,
};
pub use response::{Response, Status};
pub use single_flight::KeyedLocks;
pub use snapshot::{Manifest, Snapshot, SnapshotField, MANIFEST_FIELD};
pub use views::{
    compute_consolidated_views, compute_current_view, compute_duplicate_expansion,
    DocumentAliasMaps,
};

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{ConsolidationError, ConsolidationResult};
use crate::fingerprint::{is_full, Fingerprint};
use crate::provider::{IdSetSource, RowProvider};
use crate::record::DocumentId;
use crate::storage::{get_json, to_json, BlobStore, StorageError};

/// Lifecycle of one fingerprint's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheState {
    /// No manifest has been published.
    Uncached,
    /// A caller holds the fingerprint's lock and is computing.
    Computing,
    /// The manifest is published.
    Cached,
}

/// Payload of [`Materializer::trigger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    /// Cache key of the request.
    pub fingerprint: Fingerprint,
    /// True when the snapshot was already cached before this call.
    pub existed: bool,
}

/// Request entry point over a blob store and the upstream collaborators.
pub struct Materializer {
    store: Arc<dyn BlobStore>,
    provider: Arc<dyn RowProvider>,
    ids: Arc<dyn IdSetSource>,
    locks: KeyedLocks,
    /// Fingerprints being computed right now; settled states live in the store.
    computing: Mutex<HashSet<String>>,
}

impl Materializer {
    /// Creates a materializer.
    #[must_use]
    pub fn new(
        store: Arc<dyn BlobStore>,
        provider: Arc<dyn RowProvider>,
        ids: Arc<dyn IdSetSource>,
    ) -> Self {
        Self {
            store,
            provider,
            ids,
            locks: KeyedLocks::new(),
            computing: Mutex::new(HashSet::new()),
        }
    }

    /// Underlying blob store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Makes sure the request's snapshot is cached, computing it on a miss.
    ///
    /// Concurrent callers with the same fingerprint compute once; the others
    /// wait and observe `existed == true`.
    ///
    /// # Errors
    /// Upstream, storage, and alias failures abort the computation and leave
    /// the fingerprint uncached.
    pub fn trigger(
        &self,
        params: &Map<String, Value>,
    ) -> ConsolidationResult<Response<TriggerOutcome>> {
        let fingerprint = Fingerprint::from_params(params);
        let manifest_key = fingerprint.field_key(MANIFEST_FIELD);

        if self.store.exists(&manifest_key)? {
            debug!(%fingerprint, "snapshot cache hit");
            return Ok(Response::ok(TriggerOutcome {
                fingerprint,
                existed: true,
            }));
        }

        let existed = self.locks.with_lock(fingerprint.as_str(), || -> ConsolidationResult<bool> {
            if self.store.exists(&manifest_key)? {
                return Ok(true);
            }
            self.mark_computing(&fingerprint, true)?;
            let result = self.materialize(&fingerprint, params);
            self.mark_computing(&fingerprint, false)?;
            match result {
                Ok(()) => Ok(false),
                Err(e) => {
                    warn!(%fingerprint, error = %e, "materialization failed");
                    Err(e)
                }
            }
        })??;

        Ok(Response::ok(TriggerOutcome {
            fingerprint,
            existed,
        }))
    }

    /// Document ids of the request's view mode, materializing on a miss.
    ///
    /// # Errors
    /// Same as [`Self::trigger`], plus storage failures while loading.
    pub fn documents(
        &self,
        params: &Map<String, Value>,
    ) -> ConsolidationResult<Response<Vec<DocumentId>>> {
        self.trigger(params)?;
        let fingerprint = Fingerprint::from_params(params);
        let mode = ViewMode::from_params(params);
        let snapshot = self.load_snapshot(&fingerprint, &[mode.field()])?;
        Ok(Response::from_set(mode.select(&snapshot).to_vec()))
    }

    /// Reads back `fields` of a cached snapshot. Fields the snapshot does not
    /// carry (full-mode skips) stay empty.
    ///
    /// # Errors
    /// - `SnapshotMissing` when nothing is cached for the request
    /// - `Storage(Corrupted)` when a field listed in the manifest is absent
    pub fn load(
        &self,
        params: &Map<String, Value>,
        fields: &[SnapshotField],
    ) -> ConsolidationResult<Response<Snapshot>> {
        let fingerprint = Fingerprint::from_params(params);
        Ok(Response::ok(self.load_snapshot(&fingerprint, fields)?))
    }

    /// Current state of a fingerprint.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn state(&self, fingerprint: &Fingerprint) -> ConsolidationResult<CacheState> {
        let computing = self
            .computing
            .lock()
            .map_err(|_| ConsolidationError::internal("materializer state table poisoned"))?
            .contains(fingerprint.as_str());
        if computing {
            return Ok(CacheState::Computing);
        }
        if self.store.exists(&fingerprint.field_key(MANIFEST_FIELD))? {
            Ok(CacheState::Cached)
        } else {
            Ok(CacheState::Uncached)
        }
    }

    /// Shared reference artifacts.
    ///
    /// # Errors
    /// `NotInitialized` before the first materialization.
    pub fn reference(&self) -> ConsolidationResult<ReferenceData> {
        ReferenceCache::new(self.store.as_ref(), self.provider.as_ref()).load()
    }

    fn mark_computing(&self, fingerprint: &Fingerprint, active: bool) -> ConsolidationResult<()> {
        let mut computing = self
            .computing
            .lock()
            .map_err(|_| ConsolidationError::internal("materializer state table poisoned"))?;
        if active {
            computing.insert(fingerprint.as_str().to_string());
        } else {
            computing.remove(fingerprint.as_str());
        }
        Ok(())
    }

    fn materialize(
        &self,
        fingerprint: &Fingerprint,
        params: &Map<String, Value>,
    ) -> ConsolidationResult<()> {
        let snapshot = self.compute(params)?;
        self.persist(fingerprint, &snapshot)?;
        info!(
            %fingerprint,
            full = snapshot.full,
            raw = snapshot.ori_doc_ids.len(),
            duplicates = snapshot.dup_doc_ids.len(),
            disambiguated = snapshot.non_col_mod_doc_ids.len(),
            "snapshot materialized"
        );
        Ok(())
    }

    fn compute(&self, params: &Map<String, Value>) -> ConsolidationResult<Snapshot> {
        let full = is_full(params);
        let raw = if full {
            self.provider.all_document_ids()?
        } else {
            self.ids.document_ids(params)?
        };

        let reference = ReferenceCache::new(self.store.as_ref(), self.provider.as_ref()).ensure()?;
        let maps = &reference.doc_alias_maps;

        let dup_doc_ids = compute_duplicate_expansion(&raw, maps, full);
        let (non_col_mod_doc_ids, non_mod_doc_ids) = compute_consolidated_views(&dup_doc_ids, maps);
        let mut snapshot = Snapshot {
            full,
            non_mod_ori_doc_ids: compute_current_view(&raw, maps),
            ori_doc_ids: raw,
            dup_doc_ids,
            non_col_mod_doc_ids,
            non_mod_doc_ids,
            ..Snapshot::default()
        };

        tables::fill_document_tables(self.provider.as_ref(), &mut snapshot)?;
        let edges = tables::fill_person_tables(self.provider.as_ref(), &mut snapshot)?;
        if !full {
            tables::fill_person_names(self.provider.as_ref(), &mut snapshot)?;
            tables::fill_organization_tables(self.provider.as_ref(), &mut snapshot, &edges)?;
        }
        Ok(snapshot)
    }

    fn persist(&self, fingerprint: &Fingerprint, snapshot: &Snapshot) -> ConsolidationResult<()> {
        self.delete_stale(fingerprint)?;

        let fields: Vec<SnapshotField> = SnapshotField::persisted(snapshot.full).collect();
        let batch = fields
            .iter()
            .map(|&f| Ok((fingerprint.field_key(f.name()), snapshot.encode_field(f)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let manifest = to_json(&Manifest {
            fingerprint: fingerprint.as_str().to_string(),
            full: snapshot.full,
            fields,
            created_at: Utc::now(),
        })?;
        let manifest_key = fingerprint.field_key(MANIFEST_FIELD);
        self.store.publish(&batch, (&manifest_key, &manifest))?;
        Ok(())
    }

    /// Removes artifacts left by an interrupted run. Only keys whose suffix
    /// is a snapshot field or the manifest belong to this fingerprint; a
    /// longer fingerprint can share the prefix.
    fn delete_stale(&self, fingerprint: &Fingerprint) -> ConsolidationResult<()> {
        let prefix = fingerprint.key_prefix();
        let mut removed = 0usize;
        for key in self.store.keys_with_prefix(&prefix)? {
            let owned = key.strip_prefix(&prefix).is_some_and(|suffix| {
                suffix == MANIFEST_FIELD || SnapshotField::from_name(suffix).is_some()
            });
            if owned && self.store.delete(&key)? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(%fingerprint, removed, "stale snapshot artifacts deleted");
        }
        Ok(())
    }

    fn load_snapshot(
        &self,
        fingerprint: &Fingerprint,
        fields: &[SnapshotField],
    ) -> ConsolidationResult<Snapshot> {
        let manifest: Manifest = get_json(self.store.as_ref(), &fingerprint.field_key(MANIFEST_FIELD))?
            .ok_or_else(|| ConsolidationError::SnapshotMissing {
                fingerprint: fingerprint.to_string(),
            })?;

        let mut snapshot = Snapshot {
            full: manifest.full,
            ..Snapshot::default()
        };
        for &field in fields {
            if !manifest.fields.contains(&field) {
                continue;
            }
            let key = fingerprint.field_key(field.name());
            let bytes = self.store.get(&key)?.ok_or_else(|| StorageError::Corrupted {
                key: key.clone(),
                message: "listed in manifest but absent".to_string(),
            })?;
            snapshot.decode_field(field, &bytes)?;
        }
        Ok(snapshot)
    }
}
