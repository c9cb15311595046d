//! In-memory catalog.
//!
//! Implements every collaborator trait over plain vectors. Used by tests and
//! by the `consolidate` binary, which loads a [`CatalogData`] JSON file.

use std::collections::{BTreeSet, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UpstreamError;
use crate::record::{
    CandidateRow, DocumentAliasLink, DocumentId, DocumentPersonEdge, DocumentRecord,
    PersonAliasLink, PersonId, PersonRecord, PersonRole,
};

use super::{
    AffiliationRow, AliasSink, CandidateQuery, ConceptEdge, DdpRow, IdSetSource, NamedRow,
    RowProvider, StatusGroupRow, UpstreamResult,
};

/// Raw tables held by [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogData {
    pub persons: Vec<PersonRecord>,
    pub documents: Vec<DocumentRecord>,
    pub person_aliases: Vec<PersonAliasLink>,
    pub document_aliases: Vec<DocumentAliasLink>,
    pub edges: Vec<DocumentPersonEdge>,
    pub affiliations: Vec<AffiliationRow>,
    pub organizations: Vec<NamedRow>,
    pub programs: Vec<NamedRow>,
    pub divisions: Vec<NamedRow>,
    pub directorates: Vec<NamedRow>,
    pub ddp: Vec<DdpRow>,
    pub status_groups: Vec<StatusGroupRow>,
    pub concepts: Vec<ConceptEdge>,
    pub states: Vec<NamedRow>,
}

/// Thread-safe in-memory implementation of the collaborator traits.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

fn lock_err(context: &'static str) -> UpstreamError {
    UpstreamError::query(context, "poisoned lock")
}

fn leading_char(s: &str) -> Option<char> {
    s.trim_start().chars().next().map(|c| c.to_ascii_lowercase())
}

impl InMemoryCatalog {
    /// Wraps loaded tables.
    #[must_use]
    pub fn new(data: CatalogData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Parses a JSON catalog.
    ///
    /// # Errors
    /// Returns `MalformedRow` when the document does not match [`CatalogData`].
    pub fn from_json(text: &str) -> UpstreamResult<Self> {
        let data: CatalogData = serde_json::from_str(text)
            .map_err(|e| UpstreamError::malformed("catalog", e.to_string()))?;
        Ok(Self::new(data))
    }

    /// Copy of the current tables, alias links included.
    ///
    /// # Errors
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self) -> UpstreamResult<CatalogData> {
        Ok(self.read("snapshot")?.clone())
    }

    fn read(
        &self,
        context: &'static str,
    ) -> UpstreamResult<std::sync::RwLockReadGuard<'_, CatalogData>> {
        self.data.read().map_err(|_| lock_err(context))
    }

    fn write(
        &self,
        context: &'static str,
    ) -> UpstreamResult<std::sync::RwLockWriteGuard<'_, CatalogData>> {
        self.data.write().map_err(|_| lock_err(context))
    }
}

impl RowProvider for InMemoryCatalog {
    fn people_in_bucket(
        &self,
        last_initial: char,
        first_initial: char,
    ) -> UpstreamResult<Vec<PersonRecord>> {
        let data = self.read("people_in_bucket")?;
        let (last, first) = (last_initial.to_ascii_lowercase(), first_initial.to_ascii_lowercase());
        Ok(data
            .persons
            .iter()
            .filter(|p| {
                leading_char(&p.last_name) == Some(last) && leading_char(&p.first_name) == Some(first)
            })
            .cloned()
            .collect())
    }

    fn persons(&self, ids: &[PersonId]) -> UpstreamResult<Vec<PersonRecord>> {
        let wanted: HashSet<PersonId> = ids.iter().copied().collect();
        let data = self.read("persons")?;
        Ok(data
            .persons
            .iter()
            .filter(|p| wanted.contains(&p.id))
            .cloned()
            .collect())
    }

    fn placeholder_person_ids(&self, placeholders: &[&str]) -> UpstreamResult<Vec<PersonId>> {
        let data = self.read("placeholder_person_ids")?;
        Ok(data
            .persons
            .iter()
            .filter(|p| {
                let last = p.last_name.to_lowercase();
                placeholders.iter().any(|ph| last == ph.to_lowercase())
            })
            .map(|p| p.id)
            .collect())
    }

    fn person_aliases(&self, sources: Option<&[PersonId]>) -> UpstreamResult<Vec<PersonAliasLink>> {
        let data = self.read("person_aliases")?;
        Ok(match sources {
            None => data.person_aliases.clone(),
            Some(ids) => {
                let wanted: HashSet<PersonId> = ids.iter().copied().collect();
                data.person_aliases
                    .iter()
                    .filter(|l| wanted.contains(&l.source))
                    .copied()
                    .collect()
            }
        })
    }

    fn candidate_rows(&self, query: CandidateQuery) -> UpstreamResult<Vec<CandidateRow>> {
        let data = self.read("candidate_rows")?;
        let mut rows = Vec::new();
        for edge in &data.edges {
            if edge.role != PersonRole::Authorship || edge.ordering != 1 {
                continue;
            }
            let Some(doc) = data.documents.iter().find(|d| d.id == edge.document_id) else {
                return Err(UpstreamError::malformed(
                    "candidate_rows",
                    format!("edge references unknown document {}", edge.document_id),
                ));
            };
            if query == CandidateQuery::CollaborativeTitles
                && !doc.title.to_lowercase().starts_with("collab")
            {
                continue;
            }
            rows.push(CandidateRow {
                document_id: doc.id,
                title: doc.title.clone(),
                year: doc.publication_date.map(|d| chrono::Datelike::year(&d)),
                pi_id: edge.person_id,
            });
        }
        Ok(rows)
    }

    fn document_alias_links(&self) -> UpstreamResult<Vec<DocumentAliasLink>> {
        Ok(self.read("document_alias_links")?.document_aliases.clone())
    }

    fn all_document_ids(&self) -> UpstreamResult<Vec<DocumentId>> {
        Ok(self
            .read("all_document_ids")?
            .documents
            .iter()
            .map(|d| d.id)
            .collect())
    }

    fn documents(&self, ids: &[DocumentId]) -> UpstreamResult<Vec<DocumentRecord>> {
        let wanted: HashSet<DocumentId> = ids.iter().copied().collect();
        let data = self.read("documents")?;
        Ok(data
            .documents
            .iter()
            .filter(|d| wanted.contains(&d.id))
            .cloned()
            .collect())
    }

    fn document_person_edges(
        &self,
        documents: Option<&[DocumentId]>,
    ) -> UpstreamResult<Vec<DocumentPersonEdge>> {
        let data = self.read("document_person_edges")?;
        Ok(match documents {
            None => data.edges.clone(),
            Some(ids) => {
                let wanted: HashSet<DocumentId> = ids.iter().copied().collect();
                data.edges
                    .iter()
                    .filter(|e| wanted.contains(&e.document_id))
                    .copied()
                    .collect()
            }
        })
    }

    fn affiliations(&self, ids: &[u64]) -> UpstreamResult<Vec<AffiliationRow>> {
        let wanted: HashSet<u64> = ids.iter().copied().collect();
        let data = self.read("affiliations")?;
        Ok(data
            .affiliations
            .iter()
            .filter(|a| wanted.contains(&a.id))
            .cloned()
            .collect())
    }

    fn organizations(&self, ids: &[u64]) -> UpstreamResult<Vec<NamedRow>> {
        let wanted: HashSet<u64> = ids.iter().copied().collect();
        let data = self.read("organizations")?;
        Ok(data
            .organizations
            .iter()
            .filter(|o| wanted.contains(&o.id))
            .cloned()
            .collect())
    }

    fn hierarchy_names(&self) -> UpstreamResult<(Vec<NamedRow>, Vec<NamedRow>, Vec<NamedRow>)> {
        let data = self.read("hierarchy_names")?;
        Ok((
            data.programs.clone(),
            data.divisions.clone(),
            data.directorates.clone(),
        ))
    }

    fn ddp_rows(&self) -> UpstreamResult<Vec<DdpRow>> {
        Ok(self.read("ddp_rows")?.ddp.clone())
    }

    fn status_groups(&self) -> UpstreamResult<Vec<StatusGroupRow>> {
        Ok(self.read("status_groups")?.status_groups.clone())
    }

    fn concept_edges(&self) -> UpstreamResult<Vec<ConceptEdge>> {
        Ok(self.read("concept_edges")?.concepts.clone())
    }

    fn states(&self) -> UpstreamResult<Vec<NamedRow>> {
        Ok(self.read("states")?.states.clone())
    }
}

impl AliasSink for InMemoryCatalog {
    fn insert_person_alias(&self, link: PersonAliasLink) -> UpstreamResult<()> {
        let mut data = self.write("insert_person_alias")?;
        if data.person_aliases.iter().any(|l| l.source == link.source) {
            return Err(UpstreamError::query(
                "insert_person_alias",
                format!("person {} already has an alias", link.source),
            ));
        }
        data.person_aliases.push(link);
        Ok(())
    }

    fn update_person_alias(&self, link: PersonAliasLink) -> UpstreamResult<()> {
        let mut data = self.write("update_person_alias")?;
        match data.person_aliases.iter_mut().find(|l| l.source == link.source) {
            Some(existing) => {
                existing.target = link.target;
                Ok(())
            }
            None => Err(UpstreamError::query(
                "update_person_alias",
                format!("person {} has no alias to update", link.source),
            )),
        }
    }

    fn insert_document_alias(&self, link: DocumentAliasLink) -> UpstreamResult<()> {
        self.write("insert_document_alias")?.document_aliases.push(link);
        Ok(())
    }
}

/// Supports a small filter vocabulary: `year`, `ddpID`, and `title`
/// (case-insensitive substring). Integer filters accept a number, a numeric
/// string, or a sequence of either. Unknown parameters are ignored.
impl IdSetSource for InMemoryCatalog {
    fn document_ids(&self, params: &Map<String, Value>) -> UpstreamResult<Vec<DocumentId>> {
        let mut years = None;
        let mut ddps = None;
        let mut title = None;
        for (key, value) in params {
            match key.to_lowercase().as_str() {
                "year" => years = Some(integer_set(key, value)?),
                "ddpid" => ddps = Some(integer_set(key, value)?),
                "title" => title = value.as_str().map(str::to_lowercase),
                _ => {}
            }
        }

        let data = self.read("document_ids")?;
        Ok(data
            .documents
            .iter()
            .filter(|d| {
                years.as_ref().map_or(true, |ys: &BTreeSet<i64>| {
                    d.publication_date
                        .is_some_and(|p| ys.contains(&i64::from(chrono::Datelike::year(&p))))
                })
            })
            .filter(|d| {
                ddps.as_ref().map_or(true, |ds: &BTreeSet<i64>| {
                    d.ddp_id
                        .and_then(|id| i64::try_from(id).ok())
                        .is_some_and(|id| ds.contains(&id))
                })
            })
            .filter(|d| {
                title
                    .as_deref()
                    .map_or(true, |t| d.title.to_lowercase().contains(t))
            })
            .map(|d| d.id)
            .collect())
    }
}

fn integer_set(key: &str, value: &Value) -> UpstreamResult<BTreeSet<i64>> {
    let parse = |v: &Value| -> UpstreamResult<i64> {
        let parsed = match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| {
            UpstreamError::malformed("document_ids", format!("{key}: not an integer: {v}"))
        })
    };
    match value {
        Value::Array(items) => items.iter().map(parse).collect(),
        other => Ok(BTreeSet::from([parse(other)?])),
    }
}
