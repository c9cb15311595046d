//! View modes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::snapshot::{Snapshot, SnapshotField};
use crate::record::DocumentId;

/// Consolidation policy selecting which document set a caller receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Both alias kinds collapsed.
    #[default]
    Disambiguated,
    /// Known-duplicates superset.
    All,
    /// Superseded versions dropped.
    Current,
    /// Only resubmissions collapsed; collaborative copies stay visible.
    Collab,
    /// The raw filtered set.
    Original,
}

impl ViewMode {
    /// Parses a mode name, ignoring case. Unknown names fall back to
    /// `Disambiguated`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "current" => Self::Current,
            "collab" => Self::Collab,
            "ori" | "original" => Self::Original,
            _ => Self::Disambiguated,
        }
    }

    /// Reads the `mode` request parameter. The name matches case-insensitively
    /// and the later of colliding names wins, as in the fingerprint.
    #[must_use]
    pub fn from_params(params: &Map<String, Value>) -> Self {
        params
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case("mode"))
            .and_then(|(_, v)| v.as_str())
            .map_or(Self::Disambiguated, Self::parse)
    }

    /// Snapshot field backing this mode.
    #[must_use]
    pub const fn field(self) -> SnapshotField {
        match self {
            Self::Disambiguated => SnapshotField::NonColModDocIds,
            Self::All => SnapshotField::DupDocIds,
            Self::Current => SnapshotField::NonModOriDocIds,
            Self::Collab => SnapshotField::NonModDocIds,
            Self::Original => SnapshotField::OriDocIds,
        }
    }

    /// Picks the precomputed set for this mode.
    #[must_use]
    pub fn select(self, snapshot: &Snapshot) -> &[DocumentId] {
        match self {
            Self::Disambiguated => &snapshot.non_col_mod_doc_ids,
            Self::All => &snapshot.dup_doc_ids,
            Self::Current => &snapshot.non_mod_ori_doc_ids,
            Self::Collab => &snapshot.non_mod_doc_ids,
            Self::Original => &snapshot.ori_doc_ids,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disambiguated => "disambiguated",
            Self::All => "all",
            Self::Current => "current",
            Self::Collab => "collab",
            Self::Original => "original",
        };
        f.write_str(name)
    }
}
