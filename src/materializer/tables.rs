//! Query-dependent lookup tables of a snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::Datelike;

use super::reference::PLACEHOLDER_LAST_NAMES;
use super::snapshot::Snapshot;
use crate::alias::{substitute_alias_closure, AliasMap};
use crate::error::ConsolidationResult;
use crate::provider::RowProvider;
use crate::record::{DocumentId, DocumentPersonEdge, PersonId, PersonRole};

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Titles, award numbers, amounts, years, and hierarchy assignments.
///
/// Hierarchy assignments cover only the raw set; the other tables cover the
/// duplicate superset.
pub(super) fn fill_document_tables(
    provider: &dyn RowProvider,
    snapshot: &mut Snapshot,
) -> ConsolidationResult<()> {
    let original: HashSet<DocumentId> = snapshot.ori_doc_ids.iter().copied().collect();

    for doc in provider.documents(&snapshot.dup_doc_ids)? {
        if !snapshot.full {
            snapshot.doc_title.insert(doc.id, doc.title.clone());
        }
        if let Some(award) = &doc.award_number {
            snapshot.doc_award.insert(doc.id, award.clone());
        }
        if let Some(amount) = doc.amount {
            snapshot.doc_amount.insert(doc.id, amount);
        }
        if let Some(date) = doc.publication_date {
            snapshot.year_doc_ids.entry(date.year()).or_default().push(doc.id);
        }
        if let (Some(ddp), true) = (doc.ddp_id, original.contains(&doc.id)) {
            snapshot.ddp_docs.entry(ddp).or_default().push(doc.id);
            snapshot.doc_ddp.insert(doc.id, ddp);
        }
    }
    Ok(())
}

/// Author and program-officer tables with one-hop person substitution.
pub(super) fn fill_person_tables(
    provider: &dyn RowProvider,
    snapshot: &mut Snapshot,
) -> ConsolidationResult<Vec<DocumentPersonEdge>> {
    let scope = (!snapshot.full).then_some(snapshot.dup_doc_ids.as_slice());
    let edges = provider.document_person_edges(scope)?;

    let mut authors = Vec::new();
    let mut officers = Vec::new();
    let mut seen_authors = HashSet::new();
    let mut seen_officers = HashSet::new();
    for edge in &edges {
        match edge.role {
            PersonRole::Authorship if seen_authors.insert(edge.person_id) => authors.push(edge.person_id),
            PersonRole::ProgramOfficer if seen_officers.insert(edge.person_id) => {
                officers.push(edge.person_id);
            }
            _ => {}
        }
    }

    let author_map = person_alias_map(provider, &authors, snapshot.full)?;
    let officer_map = person_alias_map(provider, &officers, false)?;

    for edge in &edges {
        let (map, by_doc, by_person) = match edge.role {
            PersonRole::Authorship => (&author_map, &mut snapshot.doc_authors, &mut snapshot.author_docs),
            PersonRole::ProgramOfficer => (&officer_map, &mut snapshot.doc_pos, &mut snapshot.po_docs),
        };
        let person = map.get(&edge.person_id).unwrap_or(edge.person_id);
        push_unique(by_doc.entry(edge.document_id).or_default(), person);
        push_unique(by_person.entry(person).or_default(), edge.document_id);
    }

    snapshot.author_ids = substitute_alias_closure(&authors, &author_map);
    snapshot.po_ids = substitute_alias_closure(&officers, &officer_map);
    snapshot.dup_author_ids = authors;
    snapshot.author_map = author_map;

    if snapshot.full {
        snapshot.doc_authors.clear();
    }
    Ok(edges)
}

fn person_alias_map(
    provider: &dyn RowProvider,
    persons: &[PersonId],
    all: bool,
) -> ConsolidationResult<AliasMap<PersonId>> {
    let scope = (!all).then_some(persons);
    Ok(provider
        .person_aliases(scope)?
        .into_iter()
        .map(|l| (l.source, l.target))
        .collect())
}

/// Display names of canonical authors and officers; placeholder rows are
/// listed as eliminated instead.
pub(super) fn fill_person_names(
    provider: &dyn RowProvider,
    snapshot: &mut Snapshot,
) -> ConsolidationResult<()> {
    let mut ids = snapshot.po_ids.clone();
    ids.extend(snapshot.author_ids.iter().copied());

    for person in provider.persons(&ids)? {
        let last = person.last_name.trim().to_lowercase();
        if PLACEHOLDER_LAST_NAMES.contains(&last.as_str()) {
            push_unique(&mut snapshot.eliminated_person_ids, person.id);
        } else {
            snapshot.person_name.insert(person.id, person.display_name());
        }
    }
    Ok(())
}

/// Organization names, documents per organization, and organizations per
/// region, reached through the authors' affiliations.
pub(super) fn fill_organization_tables(
    provider: &dyn RowProvider,
    snapshot: &mut Snapshot,
    edges: &[DocumentPersonEdge],
) -> ConsolidationResult<()> {
    let mut person_docs: HashMap<PersonId, Vec<DocumentId>> = HashMap::new();
    for edge in edges.iter().filter(|e| e.role == PersonRole::Authorship) {
        person_docs.entry(edge.person_id).or_default().push(edge.document_id);
    }

    let persons = provider.persons(&snapshot.dup_author_ids)?;
    let affiliation_ids: Vec<u64> = persons
        .iter()
        .filter_map(|p| p.affiliation_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let affiliations: HashMap<u64, _> = provider
        .affiliations(&affiliation_ids)?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let mut org_docs: BTreeMap<u64, BTreeSet<DocumentId>> = BTreeMap::new();
    let mut state_org: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
    for person in &persons {
        let Some(affiliation) = person.affiliation_id.and_then(|id| affiliations.get(&id)) else {
            continue;
        };
        let docs = person_docs.get(&person.id).map(Vec::as_slice).unwrap_or_default();
        org_docs
            .entry(affiliation.organization_id)
            .or_default()
            .extend(docs.iter().copied());
        if let Some(state) = affiliation.state_id {
            push_unique(state_org.entry(state).or_default(), affiliation.organization_id);
        }
    }
    org_docs.retain(|_, docs| !docs.is_empty());

    let org_ids: Vec<u64> = affiliations
        .values()
        .map(|a| a.organization_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    snapshot.org_name = provider
        .organizations(&org_ids)?
        .into_iter()
        .map(|o| (o.id, o.name))
        .collect();
    snapshot.org_docs = org_docs
        .into_iter()
        .map(|(org, docs)| (org, docs.into_iter().collect()))
        .collect();
    snapshot.state_org = state_org;
    Ok(())
}
