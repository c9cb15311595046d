//! Consolidated document views.
//!
//! Each view is one alias primitive applied to one map: expansion over the
//! combined map, one-hop substitution over the combined or Modified-only
//! map, and removal over the Modified-only map.

use serde::{Deserialize, Serialize};

use crate::alias::{expand_alias_closure, remove_aliased, substitute_alias_closure, AliasMap};
use crate::record::{AliasKind, DocumentAliasLink, DocumentId};

/// Document alias maps persisted as the `ddMap` reference artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAliasMaps {
    /// Modified and Collaborative links.
    #[serde(rename = "allDocDocMap")]
    pub all: AliasMap<DocumentId>,
    /// Modified links only.
    #[serde(rename = "modDocDocMap")]
    pub modified: AliasMap<DocumentId>,
}

impl DocumentAliasMaps {
    /// Builds both maps from stored links. A later link for the same source
    /// replaces an earlier one.
    #[must_use]
    pub fn from_links(links: &[DocumentAliasLink]) -> Self {
        let mut maps = Self::default();
        for link in links {
            maps.all.insert(link.source, link.target);
            if link.kind == AliasKind::Modified {
                maps.modified.insert(link.source, link.target);
            }
        }
        maps
    }
}

/// `dupDocIDs`: the known-duplicates superset of `raw`. In full mode the raw
/// set already is the universe.
#[must_use]
pub fn compute_duplicate_expansion(
    raw: &[DocumentId],
    maps: &DocumentAliasMaps,
    full: bool,
) -> Vec<DocumentId> {
    if full {
        return raw.to_vec();
    }
    expand_alias_closure(raw, &maps.all)
}

/// `(nonColModDocIDs, nonModDocIDs)`: one-hop substitution with the combined
/// map and with the Modified-only map.
#[must_use]
pub fn compute_consolidated_views(
    dup: &[DocumentId],
    maps: &DocumentAliasMaps,
) -> (Vec<DocumentId>, Vec<DocumentId>) {
    (
        substitute_alias_closure(dup, &maps.all),
        substitute_alias_closure(dup, &maps.modified),
    )
}

/// `nonModOriDocIDs`: `raw` without superseded documents. Nothing is
/// redirected.
#[must_use]
pub fn compute_current_view(raw: &[DocumentId], maps: &DocumentAliasMaps) -> Vec<DocumentId> {
    remove_aliased(raw, &maps.modified)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<DocumentId> {
        raw.iter().copied().map(DocumentId).collect()
    }

    fn link(s: u64, t: u64, kind: AliasKind) -> DocumentAliasLink {
        DocumentAliasLink {
            source: DocumentId(s),
            target: DocumentId(t),
            kind,
        }
    }

    #[test]
    fn test_current_drops_superseded() {
        let maps = DocumentAliasMaps::from_links(&[link(11, 10, AliasKind::Modified)]);
        assert_eq!(compute_current_view(&ids(&[10, 11, 12]), &maps), ids(&[10, 12]));
    }

    #[test]
    fn test_disambiguated_collapses_collaborative() {
        let maps = DocumentAliasMaps::from_links(&[link(11, 10, AliasKind::Collaborative)]);
        let dup = compute_duplicate_expansion(&ids(&[10, 11]), &maps, false);
        let (non_col_mod, non_mod) = compute_consolidated_views(&dup, &maps);
        assert_eq!(non_col_mod, ids(&[10]));
        assert_eq!(non_mod, ids(&[10, 11]));
    }

    #[test]
    fn test_expansion_pulls_in_aliases() {
        let maps = DocumentAliasMaps::from_links(&[
            link(11, 10, AliasKind::Modified),
            link(12, 10, AliasKind::Collaborative),
        ]);
        assert_eq!(
            compute_duplicate_expansion(&ids(&[11]), &maps, false),
            ids(&[11, 10, 12])
        );
        assert_eq!(compute_duplicate_expansion(&ids(&[11]), &maps, true), ids(&[11]));
    }

    #[test]
    fn test_dd_map_wire_names() {
        let maps = DocumentAliasMaps::from_links(&[link(2, 1, AliasKind::Modified)]);
        let json = serde_json::to_value(&maps).unwrap();
        assert_eq!(json["allDocDocMap"]["2"], 1);
        assert_eq!(json["modDocDocMap"]["2"], 1);
    }
}
