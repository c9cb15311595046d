//! Record and identifier types.
//!
//! Person and document ids are distinct newtypes so an alias map over one
//! kind can never be fed ids of the other. Both serialize transparently as
//! integers, which keeps persisted snapshots compact and readable.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw integer id.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a person row (author, PI, program officer).
    PersonId
);

numeric_id!(
    /// Identifier of a document row (proposal, award, publication).
    DocumentId
);

/// Relationship kind carried by a document alias link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    /// The source is a superseded version (resubmission) of the target.
    Modified,
    /// The source is a co-filed copy of the target at another institution.
    Collaborative,
}

impl fmt::Display for AliasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified => write!(f, "modified"),
            Self::Collaborative => write!(f, "collaborative"),
        }
    }
}

/// Relationship between a document and a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    /// Author / PI / co-PI.
    Authorship,
    /// Program officer responsible for the award.
    ProgramOfficer,
}

/// Immutable person source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonId,
    pub first_name: String,
    #[serde(default)]
    pub middle_initial: String,
    pub last_name: String,
    #[serde(default)]
    pub affiliation_id: Option<u64>,
}

impl PersonRecord {
    /// Creates a person record without middle initial or affiliation.
    #[must_use]
    pub fn new(id: u64, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: PersonId(id),
            first_name: first_name.into(),
            middle_initial: String::new(),
            last_name: last_name.into(),
            affiliation_id: None,
        }
    }

    /// Sets the middle initial.
    #[must_use]
    pub fn with_middle(mut self, middle: impl Into<String>) -> Self {
        self.middle_initial = middle.into();
        self
    }

    /// Sets the affiliation reference.
    #[must_use]
    pub fn with_affiliation(mut self, affiliation_id: u64) -> Self {
        self.affiliation_id = Some(affiliation_id);
        self
    }

    /// Byte length of `last + first + middle`, the evidence weight used to
    /// decide which of two matching records is canonical.
    #[must_use]
    pub fn name_weight(&self) -> usize {
        self.last_name.len() + self.first_name.len() + self.middle_initial.len()
    }

    /// Sort key used inside a bucket: `(last, first, middle, id desc)`.
    #[must_use]
    pub fn bucket_order(&self, other: &Self) -> std::cmp::Ordering {
        self.last_name
            .cmp(&other.last_name)
            .then_with(|| self.first_name.cmp(&other.first_name))
            .then_with(|| self.middle_initial.cmp(&other.middle_initial))
            .then_with(|| other.id.cmp(&self.id))
    }

    /// Display form `"Last, First M."`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut out = format!("{}, {}", self.last_name.trim(), self.first_name.trim());
        let middle = self.middle_initial.trim();
        if !middle.is_empty() {
            out.push(' ');
            out.push_str(middle);
            if !middle.ends_with('.') {
                out.push('.');
            }
        }
        out
    }
}

/// Document source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub genre_id: Option<u64>,
    /// Dir/div/program hierarchy row the document is filed under.
    #[serde(default)]
    pub ddp_id: Option<u64>,
    /// Award number in the upstream source.
    #[serde(default)]
    pub award_number: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl DocumentRecord {
    /// Creates a document with only an id and a title.
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id: DocumentId(id),
            title: title.into(),
            publication_date: None,
            genre_id: None,
            ddp_id: None,
            award_number: None,
            amount: None,
        }
    }

    /// Sets the publication date.
    #[must_use]
    pub fn published(mut self, date: NaiveDate) -> Self {
        self.publication_date = Some(date);
        self
    }

    /// Sets the obligated award amount.
    #[must_use]
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Sets the hierarchy assignment.
    #[must_use]
    pub fn in_ddp(mut self, ddp_id: u64) -> Self {
        self.ddp_id = Some(ddp_id);
        self
    }

    /// Sets the upstream award number.
    #[must_use]
    pub fn with_award_number(mut self, award: impl Into<String>) -> Self {
        self.award_number = Some(award.into());
        self
    }
}

/// Directed person alias edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonAliasLink {
    pub source: PersonId,
    pub target: PersonId,
}

/// Directed document alias edge with its relationship kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentAliasLink {
    pub source: DocumentId,
    pub target: DocumentId,
    pub kind: AliasKind,
}

/// Candidate row fed to the proposal grouper: one row per document, carrying
/// the lead PI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub document_id: DocumentId,
    pub title: String,
    pub year: Option<i32>,
    pub pi_id: PersonId,
}

/// Document–person relationship edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPersonEdge {
    pub document_id: DocumentId,
    pub person_id: PersonId,
    pub role: PersonRole,
    /// Author ordering on the document (1 = lead PI).
    #[serde(default)]
    pub ordering: u32,
}
