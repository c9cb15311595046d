//! Collaborator interfaces.
//!
//! The consolidation passes never build queries themselves. They ask a
//! [`RowProvider`] for the specific rows they need, write discovered links
//! through an [`AliasSink`], and receive raw filtered id sets from an
//! [`IdSetSource`]. Every method is one-shot: a failure is surfaced as an
//! [`UpstreamError`] and never retried.

mod memory;

pub use memory::{CatalogData, InMemoryCatalog};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UpstreamError;
use crate::record::{
    CandidateRow, DocumentAliasLink, DocumentId, DocumentPersonEdge, DocumentRecord,
    PersonAliasLink, PersonId, PersonRecord,
};

/// Result alias for collaborator calls.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Which candidate rows the proposal grouper should scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateQuery {
    /// Documents whose title carries the collaborative-filing prefix.
    CollaborativeTitles,
    /// Every proposal document.
    AllProposals,
}

/// Affiliation row: links a person to an organization and a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationRow {
    pub id: u64,
    pub organization_id: u64,
    #[serde(default)]
    pub state_id: Option<u64>,
}

/// Named entity with optional abbreviation (organization, program, division,
/// directorate, state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRow {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

/// One directorate/division/program assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdpRow {
    pub id: u64,
    pub directorate_id: u64,
    pub division_id: u64,
    pub program_id: u64,
}

/// Parent/child edge of the concept tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptEdge {
    pub parent: u64,
    pub child: u64,
}

/// Status-group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusGroupRow {
    pub group_id: u64,
    pub status_id: u64,
}

/// Row reads used by the disambiguation passes and the materializer.
///
/// Id-scoped reads take `None` for "every row".
pub trait RowProvider: Send + Sync {
    /// Persons whose last name starts with `last_initial` and first name
    /// starts with `first_initial` (ASCII, case-insensitive).
    fn people_in_bucket(&self, last_initial: char, first_initial: char)
        -> UpstreamResult<Vec<PersonRecord>>;

    /// Persons by id.
    fn persons(&self, ids: &[PersonId]) -> UpstreamResult<Vec<PersonRecord>>;

    /// Ids of persons whose last name is one of `placeholders`
    /// (case-insensitive).
    fn placeholder_person_ids(&self, placeholders: &[&str]) -> UpstreamResult<Vec<PersonId>>;

    /// Person alias links whose source is in `sources`.
    fn person_aliases(&self, sources: Option<&[PersonId]>) -> UpstreamResult<Vec<PersonAliasLink>>;

    /// Candidate rows for the proposal grouper, one per document, carrying
    /// the lead PI.
    fn candidate_rows(&self, query: CandidateQuery) -> UpstreamResult<Vec<CandidateRow>>;

    /// Every document alias link of every kind.
    fn document_alias_links(&self) -> UpstreamResult<Vec<DocumentAliasLink>>;

    /// Every document id.
    fn all_document_ids(&self) -> UpstreamResult<Vec<DocumentId>>;

    /// Documents by id.
    fn documents(&self, ids: &[DocumentId]) -> UpstreamResult<Vec<DocumentRecord>>;

    /// Authorship and program-officer edges of `documents`.
    fn document_person_edges(
        &self,
        documents: Option<&[DocumentId]>,
    ) -> UpstreamResult<Vec<DocumentPersonEdge>>;

    /// Affiliations by id.
    fn affiliations(&self, ids: &[u64]) -> UpstreamResult<Vec<AffiliationRow>>;

    /// Organizations by id.
    fn organizations(&self, ids: &[u64]) -> UpstreamResult<Vec<NamedRow>>;

    /// Programs, divisions, and directorates, in that order.
    fn hierarchy_names(&self) -> UpstreamResult<(Vec<NamedRow>, Vec<NamedRow>, Vec<NamedRow>)>;

    /// Directorate/division/program assignment rows.
    fn ddp_rows(&self) -> UpstreamResult<Vec<DdpRow>>;

    /// Status-group memberships.
    fn status_groups(&self) -> UpstreamResult<Vec<StatusGroupRow>>;

    /// Concept tree edges.
    fn concept_edges(&self) -> UpstreamResult<Vec<ConceptEdge>>;

    /// Region metadata.
    fn states(&self) -> UpstreamResult<Vec<NamedRow>>;
}

/// Write side for discovered alias links.
pub trait AliasSink: Send + Sync {
    /// Records a new person alias link.
    fn insert_person_alias(&self, link: PersonAliasLink) -> UpstreamResult<()>;

    /// Re-points an existing person alias link.
    fn update_person_alias(&self, link: PersonAliasLink) -> UpstreamResult<()>;

    /// Records a new document alias link.
    fn insert_document_alias(&self, link: DocumentAliasLink) -> UpstreamResult<()>;
}

/// Supplies the raw document id set for a structured filter.
pub trait IdSetSource: Send + Sync {
    /// Document ids matching the request parameters.
    fn document_ids(&self, params: &Map<String, Value>) -> UpstreamResult<Vec<DocumentId>>;
}
