//! Shared reference artifacts.
//!
//! Lookup tables that do not depend on the request are computed once,
//! stored under fixed names, and reused by every later materialization.
//! Presence of an artifact means it has been computed. The `_initialized`
//! marker records that a first full pass has completed, which separates
//! "never computed" from "deleted since".

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::views::DocumentAliasMaps;
use crate::error::{ConsolidationError, ConsolidationResult};
use crate::provider::RowProvider;
use crate::record::PersonId;
use crate::storage::{get_json, to_json, BlobStore};

/// Marker written once every artifact exists.
pub const INITIALIZED_MARKER: &str = "_initialized";

/// Last names that mark a person row as a placeholder.
pub const PLACEHOLDER_LAST_NAMES: [&str; 4] = ["", "none", "available", "data not available"];

/// Fixed-name shared artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceArtifact {
    /// Directorate/division/program names and assignments.
    DdpName,
    /// Status group → status ids.
    GroupStatus,
    /// Concept parent → children.
    Concept,
    /// Region metadata.
    StateInfo,
    /// Placeholder person rows.
    ExcludedPersonIds,
    /// Document alias maps.
    DdMap,
}

impl ReferenceArtifact {
    /// Every artifact.
    pub const ALL: [Self; 6] = [
        Self::DdpName,
        Self::GroupStatus,
        Self::Concept,
        Self::StateInfo,
        Self::ExcludedPersonIds,
        Self::DdMap,
    ];

    /// Storage key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::DdpName => "ddp_name",
            Self::GroupStatus => "group_status",
            Self::Concept => "concept",
            Self::StateInfo => "stateInfo",
            Self::ExcludedPersonIds => "excludedPersonIDs",
            Self::DdMap => "ddMap",
        }
    }
}

impl fmt::Display for ReferenceArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One directorate/division/program triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdpTriple {
    pub dir: u64,
    pub div: u64,
    pub pgm: u64,
}

/// Hierarchy name tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdpNames {
    pub id_pgmname: BTreeMap<u64, String>,
    pub id_divname: BTreeMap<u64, String>,
    pub id_divabbr: BTreeMap<u64, String>,
    pub id_dirname: BTreeMap<u64, String>,
    pub id_dirabbr: BTreeMap<u64, String>,
    /// dir → div → pgm → assignment ids.
    #[serde(rename = "ddp_ddpIDs")]
    pub ddp_ddp_ids: BTreeMap<u64, BTreeMap<u64, BTreeMap<u64, Vec<u64>>>>,
    #[serde(rename = "ddpID_ddp")]
    pub ddp_id_ddp: BTreeMap<u64, DdpTriple>,
}

/// Region name and abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    pub name: String,
    pub abbr: Option<String>,
}

/// Every shared artifact, decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub ddp: DdpNames,
    pub group_status: BTreeMap<u64, Vec<u64>>,
    pub concept: BTreeMap<u64, Vec<u64>>,
    pub state_info: BTreeMap<u64, StateInfo>,
    pub excluded_person_ids: Vec<PersonId>,
    pub doc_alias_maps: DocumentAliasMaps,
}

/// Computes, stores, and reads the shared artifacts.
pub struct ReferenceCache<'a> {
    store: &'a dyn BlobStore,
    provider: &'a dyn RowProvider,
}

impl<'a> ReferenceCache<'a> {
    /// Binds the cache to a store and a row provider.
    #[must_use]
    pub fn new(store: &'a dyn BlobStore, provider: &'a dyn RowProvider) -> Self {
        Self { store, provider }
    }

    /// Returns true once a first pass has stored every artifact.
    ///
    /// # Errors
    /// Propagates store failures.
    pub fn is_initialized(&self) -> ConsolidationResult<bool> {
        Ok(self.store.exists(INITIALIZED_MARKER)?)
    }

    /// Compute path: computes and stores whatever is missing, then marks the
    /// cache initialized.
    ///
    /// # Errors
    /// Propagates provider and store failures.
    pub fn ensure(&self) -> ConsolidationResult<ReferenceData> {
        let data = ReferenceData {
            ddp: self.get_or_compute(ReferenceArtifact::DdpName, || self.compute_ddp())?,
            group_status: self
                .get_or_compute(ReferenceArtifact::GroupStatus, || self.compute_group_status())?,
            concept: self.get_or_compute(ReferenceArtifact::Concept, || self.compute_concept())?,
            state_info: self
                .get_or_compute(ReferenceArtifact::StateInfo, || self.compute_state_info())?,
            excluded_person_ids: self.get_or_compute(ReferenceArtifact::ExcludedPersonIds, || {
                self.compute_excluded_persons()
            })?,
            doc_alias_maps: self
                .get_or_compute(ReferenceArtifact::DdMap, || self.compute_dd_map())?,
        };

        if !self.is_initialized()? {
            self.store.put(INITIALIZED_MARKER, &to_json(&true)?)?;
            info!("shared reference artifacts initialized");
        }
        Ok(data)
    }

    /// Read path.
    ///
    /// # Errors
    /// - `NotInitialized` if no first pass has ever completed
    /// - provider and store failures while recomputing a deleted artifact
    pub fn load(&self) -> ConsolidationResult<ReferenceData> {
        if !self.is_initialized()? {
            return Err(ConsolidationError::NotInitialized {
                artifact: INITIALIZED_MARKER.to_string(),
            });
        }
        self.ensure()
    }

    /// Reads one artifact without computing it.
    ///
    /// # Errors
    /// Returns `MissingReferenceData` when it has not been stored.
    pub fn read<T: DeserializeOwned>(&self, artifact: ReferenceArtifact) -> ConsolidationResult<T> {
        get_json(self.store, artifact.key())?.ok_or_else(|| ConsolidationError::MissingReferenceData {
            artifact: artifact.key().to_string(),
        })
    }

    fn get_or_compute<T, F>(&self, artifact: ReferenceArtifact, compute: F) -> ConsolidationResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> ConsolidationResult<T>,
    {
        match self.read(artifact) {
            Ok(value) => Ok(value),
            Err(e) if e.is_missing_reference() => {
                if self.is_initialized()? {
                    warn!(%artifact, "reference artifact missing; recomputing");
                }
                let value = compute()?;
                self.store.put(artifact.key(), &to_json(&value)?)?;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    fn compute_ddp(&self) -> ConsolidationResult<DdpNames> {
        let (programs, divisions, directorates) = self.provider.hierarchy_names()?;
        let mut names = DdpNames::default();

        for p in programs {
            names.id_pgmname.insert(p.id, p.name);
        }
        for d in divisions {
            if let Some(abbr) = d.abbreviation {
                names.id_divabbr.insert(d.id, abbr);
            }
            names.id_divname.insert(d.id, d.name);
        }
        for d in directorates {
            if let Some(abbr) = d.abbreviation {
                names.id_dirabbr.insert(d.id, abbr);
            }
            names.id_dirname.insert(d.id, d.name);
        }
        for row in self.provider.ddp_rows()? {
            names
                .ddp_ddp_ids
                .entry(row.directorate_id)
                .or_default()
                .entry(row.division_id)
                .or_default()
                .entry(row.program_id)
                .or_default()
                .push(row.id);
            names.ddp_id_ddp.insert(
                row.id,
                DdpTriple {
                    dir: row.directorate_id,
                    div: row.division_id,
                    pgm: row.program_id,
                },
            );
        }
        Ok(names)
    }

    fn compute_group_status(&self) -> ConsolidationResult<BTreeMap<u64, Vec<u64>>> {
        let mut groups: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for row in self.provider.status_groups()? {
            groups.entry(row.group_id).or_default().push(row.status_id);
        }
        Ok(groups)
    }

    fn compute_concept(&self) -> ConsolidationResult<BTreeMap<u64, Vec<u64>>> {
        let mut tree: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for edge in self.provider.concept_edges()? {
            tree.entry(edge.parent).or_default().push(edge.child);
        }
        Ok(tree)
    }

    fn compute_state_info(&self) -> ConsolidationResult<BTreeMap<u64, StateInfo>> {
        Ok(self
            .provider
            .states()?
            .into_iter()
            .map(|s| {
                (
                    s.id,
                    StateInfo {
                        name: s.name,
                        abbr: s.abbreviation,
                    },
                )
            })
            .collect())
    }

    fn compute_excluded_persons(&self) -> ConsolidationResult<Vec<PersonId>> {
        Ok(self.provider.placeholder_person_ids(&PLACEHOLDER_LAST_NAMES)?)
    }

    fn compute_dd_map(&self) -> ConsolidationResult<DocumentAliasMaps> {
        Ok(DocumentAliasMaps::from_links(&self.provider.document_alias_links()?))
    }
}
