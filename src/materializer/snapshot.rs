//! Per-fingerprint cache snapshot.
//!
//! A snapshot is persisted one artifact per field under
//! `<fingerprint>.<field>`, followed by a `<fingerprint>.manifest` sentinel
//! listing the fields that were written. Field names are part of the on-disk
//! format.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alias::AliasMap;
use crate::record::{DocumentId, PersonId};
use crate::storage::{to_json, StorageError};

/// Name of the sentinel artifact.
pub const MANIFEST_FIELD: &str = "manifest";

macro_rules! snapshot_fields {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Persisted snapshot field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum SnapshotField {
            $(
                #[doc = concat!("`", $name, "`")]
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl SnapshotField {
            /// Every field, in persistence order.
            pub const ALL: &'static [SnapshotField] = &[$(SnapshotField::$variant),+];

            /// Artifact suffix of this field.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(SnapshotField::$variant => $name,)+
                }
            }

            /// Looks a field up by its artifact suffix.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(SnapshotField::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

snapshot_fields! {
    Full => "full",
    OriDocIds => "oriDocIDs",
    DupDocIds => "dupDocIDs",
    NonColModDocIds => "nonColModDocIDs",
    NonModDocIds => "nonModDocIDs",
    NonModOriDocIds => "nonModOriDocIDs",
    DocTitle => "docTitle",
    DocAward => "docAward",
    DocAmount => "docAmount",
    YearDocIds => "yearDocIDs",
    DdpDocs => "ddpDocs",
    DocDdp => "docDDP",
    DupAuthorIds => "dupAuthorIDs",
    AuthorIds => "authorIDs",
    AuthorMap => "authorMap",
    DocAuthors => "docAuthors",
    AuthorDocs => "authorDocs",
    PoIds => "poIDs",
    DocPos => "docPOs",
    PoDocs => "poDocs",
    PersonName => "personName",
    EliminatedPersonIds => "eliminatedPersonIDs",
    OrgName => "orgName",
    OrgDocs => "orgDocs",
    StateOrg => "stateOrg",
}

impl SnapshotField {
    /// Fields that are neither computed nor persisted for unfiltered
    /// requests.
    #[must_use]
    pub const fn skipped_in_full(self) -> bool {
        matches!(
            self,
            Self::DocTitle
                | Self::PersonName
                | Self::DocAuthors
                | Self::OrgName
                | Self::StateOrg
                | Self::OrgDocs
                | Self::PoIds
        )
    }

    /// Fields persisted for a request of the given fullness.
    pub fn persisted(full: bool) -> impl Iterator<Item = Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(move |f| !(full && f.skipped_in_full()))
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sentinel written after every field of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub fingerprint: String,
    pub full: bool,
    pub fields: Vec<SnapshotField>,
    pub created_at: DateTime<Utc>,
}

/// Derived sets and lookup tables for one fingerprint.
///
/// Fields that were not requested on load, or skipped in full mode, stay at
/// their empty default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub full: bool,
    pub ori_doc_ids: Vec<DocumentId>,
    pub dup_doc_ids: Vec<DocumentId>,
    pub non_col_mod_doc_ids: Vec<DocumentId>,
    pub non_mod_doc_ids: Vec<DocumentId>,
    pub non_mod_ori_doc_ids: Vec<DocumentId>,
    pub doc_title: BTreeMap<DocumentId, String>,
    pub doc_award: BTreeMap<DocumentId, String>,
    pub doc_amount: BTreeMap<DocumentId, f64>,
    pub year_doc_ids: BTreeMap<i32, Vec<DocumentId>>,
    pub ddp_docs: BTreeMap<u64, Vec<DocumentId>>,
    pub doc_ddp: BTreeMap<DocumentId, u64>,
    pub dup_author_ids: Vec<PersonId>,
    pub author_ids: Vec<PersonId>,
    pub author_map: AliasMap<PersonId>,
    pub doc_authors: BTreeMap<DocumentId, Vec<PersonId>>,
    pub author_docs: BTreeMap<PersonId, Vec<DocumentId>>,
    pub po_ids: Vec<PersonId>,
    pub doc_pos: BTreeMap<DocumentId, Vec<PersonId>>,
    pub po_docs: BTreeMap<PersonId, Vec<DocumentId>>,
    pub person_name: BTreeMap<PersonId, String>,
    pub eliminated_person_ids: Vec<PersonId>,
    pub org_name: BTreeMap<u64, String>,
    pub org_docs: BTreeMap<u64, Vec<DocumentId>>,
    pub state_org: BTreeMap<u64, Vec<u64>>,
}

fn decode<T: serde::de::DeserializeOwned>(field: SnapshotField, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::SerializationError(format!("{field}: {e}")))
}

impl Snapshot {
    /// JSON bytes of one field.
    ///
    /// # Errors
    /// Returns `SerializationError` on failure.
    pub fn encode_field(&self, field: SnapshotField) -> Result<Vec<u8>, StorageError> {
        match field {
            SnapshotField::Full => to_json(&self.full),
            SnapshotField::OriDocIds => to_json(&self.ori_doc_ids),
            SnapshotField::DupDocIds => to_json(&self.dup_doc_ids),
            SnapshotField::NonColModDocIds => to_json(&self.non_col_mod_doc_ids),
            SnapshotField::NonModDocIds => to_json(&self.non_mod_doc_ids),
            SnapshotField::NonModOriDocIds => to_json(&self.non_mod_ori_doc_ids),
            SnapshotField::DocTitle => to_json(&self.doc_title),
            SnapshotField::DocAward => to_json(&self.doc_award),
            SnapshotField::DocAmount => to_json(&self.doc_amount),
            SnapshotField::YearDocIds => to_json(&self.year_doc_ids),
            SnapshotField::DdpDocs => to_json(&self.ddp_docs),
            SnapshotField::DocDdp => to_json(&self.doc_ddp),
            SnapshotField::DupAuthorIds => to_json(&self.dup_author_ids),
            SnapshotField::AuthorIds => to_json(&self.author_ids),
            SnapshotField::AuthorMap => to_json(&self.author_map),
            SnapshotField::DocAuthors => to_json(&self.doc_authors),
            SnapshotField::AuthorDocs => to_json(&self.author_docs),
            SnapshotField::PoIds => to_json(&self.po_ids),
            SnapshotField::DocPos => to_json(&self.doc_pos),
            SnapshotField::PoDocs => to_json(&self.po_docs),
            SnapshotField::PersonName => to_json(&self.person_name),
            SnapshotField::EliminatedPersonIds => to_json(&self.eliminated_person_ids),
            SnapshotField::OrgName => to_json(&self.org_name),
            SnapshotField::OrgDocs => to_json(&self.org_docs),
            SnapshotField::StateOrg => to_json(&self.state_org),
        }
    }

    /// Replaces one field from its JSON bytes.
    ///
    /// # Errors
    /// Returns `SerializationError` when the bytes do not decode.
    pub fn decode_field(&mut self, field: SnapshotField, bytes: &[u8]) -> Result<(), StorageError> {
        match field {
            SnapshotField::Full => self.full = decode(field, bytes)?,
            SnapshotField::OriDocIds => self.ori_doc_ids = decode(field, bytes)?,
            SnapshotField::DupDocIds => self.dup_doc_ids = decode(field, bytes)?,
            SnapshotField::NonColModDocIds => self.non_col_mod_doc_ids = decode(field, bytes)?,
            SnapshotField::NonModDocIds => self.non_mod_doc_ids = decode(field, bytes)?,
            SnapshotField::NonModOriDocIds => self.non_mod_ori_doc_ids = decode(field, bytes)?,
            SnapshotField::DocTitle => self.doc_title = decode(field, bytes)?,
            SnapshotField::DocAward => self.doc_award = decode(field, bytes)?,
            SnapshotField::DocAmount => self.doc_amount = decode(field, bytes)?,
            SnapshotField::YearDocIds => self.year_doc_ids = decode(field, bytes)?,
            SnapshotField::DdpDocs => self.ddp_docs = decode(field, bytes)?,
            SnapshotField::DocDdp => self.doc_ddp = decode(field, bytes)?,
            SnapshotField::DupAuthorIds => self.dup_author_ids = decode(field, bytes)?,
            SnapshotField::AuthorIds => self.author_ids = decode(field, bytes)?,
            SnapshotField::AuthorMap => self.author_map = decode(field, bytes)?,
            SnapshotField::DocAuthors => self.doc_authors = decode(field, bytes)?,
            SnapshotField::AuthorDocs => self.author_docs = decode(field, bytes)?,
            SnapshotField::PoIds => self.po_ids = decode(field, bytes)?,
            SnapshotField::DocPos => self.doc_pos = decode(field, bytes)?,
            SnapshotField::PoDocs => self.po_docs = decode(field, bytes)?,
            SnapshotField::PersonName => self.person_name = decode(field, bytes)?,
            SnapshotField::EliminatedPersonIds => self.eliminated_person_ids = decode(field, bytes)?,
            SnapshotField::OrgName => self.org_name = decode(field, bytes)?,
            SnapshotField::OrgDocs => self.org_docs = decode(field, bytes)?,
            SnapshotField::StateOrg => self.state_org = decode(field, bytes)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_roundtrip() {
        for field in SnapshotField::ALL {
            assert_eq!(SnapshotField::from_name(field.name()), Some(*field));
        }
        assert_eq!(SnapshotField::ALL.len(), 25);
        assert_eq!(SnapshotField::from_name("manifest"), None);
    }

    #[test]
    fn test_full_mode_skips_query_fields() {
        let partial = SnapshotField::persisted(false).count();
        let full: Vec<_> = SnapshotField::persisted(true).collect();
        assert_eq!(partial - full.len(), 7);
        assert!(!full.contains(&SnapshotField::DocTitle));
        assert!(full.contains(&SnapshotField::DocAmount));
    }

    #[test]
    fn test_field_encoding() {
        let mut s = Snapshot {
            dup_doc_ids: vec![DocumentId(3), DocumentId(1)],
            ..Snapshot::default()
        };
        s.year_doc_ids.insert(2010, vec![DocumentId(3)]);

        let bytes = s.encode_field(SnapshotField::YearDocIds).unwrap();
        assert_eq!(bytes, br#"{"2010":[3]}"#);

        let mut loaded = Snapshot::default();
        loaded
            .decode_field(SnapshotField::DupDocIds, &s.encode_field(SnapshotField::DupDocIds).unwrap())
            .unwrap();
        assert_eq!(loaded.dup_doc_ids, s.dup_doc_ids);
        assert!(loaded.decode_field(SnapshotField::Full, b"[1]").is_err());
    }

    #[test]
    fn test_manifest_lists_fields_by_name() {
        let m = Manifest {
            fingerprint: "q=x".into(),
            full: false,
            fields: vec![SnapshotField::OriDocIds],
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["fields"][0], "oriDocIDs");
    }
}
