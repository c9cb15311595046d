//! End-to-end tests for the derived-view materializer over in-memory
//! collaborators.

use consolidata::provider::{AffiliationRow, CatalogData, InMemoryCatalog, NamedRow};
use consolidata::record::{
    AliasKind, DocumentAliasLink, DocumentId, DocumentPersonEdge, DocumentRecord, PersonAliasLink,
    PersonId, PersonRecord, PersonRole,
};
use consolidata::{
    BlobStore, CacheState, ConsolidationError, Fingerprint, InMemoryBlobStore, Materializer,
    SnapshotField,
};

use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::thread;

fn params(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn doc_link(source: u64, target: u64, kind: AliasKind) -> DocumentAliasLink {
    DocumentAliasLink {
        source: DocumentId(source),
        target: DocumentId(target),
        kind,
    }
}

fn edge(doc: u64, person: u64, role: PersonRole) -> DocumentPersonEdge {
    DocumentPersonEdge {
        document_id: DocumentId(doc),
        person_id: PersonId(person),
        role,
        ordering: 1,
    }
}

fn materializer(data: CatalogData) -> (Materializer, Arc<InMemoryBlobStore>) {
    let store = Arc::new(InMemoryBlobStore::new());
    let catalog = Arc::new(InMemoryCatalog::new(data));
    (Materializer::new(store.clone(), catalog.clone(), catalog), store)
}

fn three_documents(links: Vec<DocumentAliasLink>) -> CatalogData {
    CatalogData {
        documents: (10..=12)
            .map(|id| DocumentRecord::new(id, format!("proposal {id}")).in_ddp(1))
            .collect(),
        document_aliases: links,
        ..CatalogData::default()
    }
}

fn ids(raw: &[u64]) -> Vec<DocumentId> {
    raw.iter().copied().map(DocumentId).collect()
}

#[test]
fn current_mode_drops_superseded_versions() {
    let (m, _) = materializer(three_documents(vec![doc_link(11, 10, AliasKind::Modified)]));
    let response = m.documents(&params(json!({"ddpID": 1, "mode": "current"}))).unwrap();
    assert_eq!(response.data, Some(ids(&[10, 12])));
}

#[test]
fn disambiguated_mode_collapses_collaborative_copies() {
    let mut data = three_documents(vec![doc_link(11, 10, AliasKind::Collaborative)]);
    data.documents.truncate(2);
    let (m, _) = materializer(data);

    let response = m.documents(&params(json!({"ddpID": 1}))).unwrap();
    assert_eq!(response.data, Some(ids(&[10])));

    let collab = m.documents(&params(json!({"ddpID": 1, "mode": "collab"}))).unwrap();
    assert_eq!(collab.data, Some(ids(&[10, 11])));
}

#[test]
fn every_mode_reads_the_same_snapshot() {
    let (m, store) = materializer(three_documents(vec![
        doc_link(11, 10, AliasKind::Modified),
        doc_link(12, 10, AliasKind::Collaborative),
    ]));

    let mut results = Vec::new();
    for mode in ["all", "current", "collab", "original", "disambiguated", "bogus"] {
        let response = m.documents(&params(json!({"ddpID": 1, "mode": mode}))).unwrap();
        results.push(response.data.unwrap());
    }
    assert_eq!(results[0], ids(&[10, 11, 12]));
    assert_eq!(results[1], ids(&[10, 12]));
    assert_eq!(results[2], ids(&[10, 12]));
    assert_eq!(results[3], ids(&[10, 11, 12]));
    assert_eq!(results[4], ids(&[10]));
    assert_eq!(results[5], results[4]);

    // One fingerprint regardless of mode.
    let manifests = store.keys_with_prefix("ddpid=1.manifest").unwrap();
    assert_eq!(manifests.len(), 1);
}

#[test]
fn fingerprint_ignores_case_and_order() {
    let (m, _) = materializer(three_documents(vec![]));
    let first = m
        .trigger(&params(json!({"ddpID": 1, "Title": "Proposal"})))
        .unwrap()
        .data
        .unwrap();
    let second = m
        .trigger(&params(json!({"title": "Proposal", "DDPID": 1, "userID": "x"})))
        .unwrap()
        .data
        .unwrap();
    assert!(!first.existed);
    assert!(second.existed);
    assert_eq!(first.fingerprint, second.fingerprint);
}

#[test]
fn reference_read_before_first_pass_is_not_initialized() {
    let (m, _) = materializer(three_documents(vec![]));
    let err = m.reference().unwrap_err();
    assert!(matches!(err, ConsolidationError::NotInitialized { .. }));
}

#[test]
fn deleted_reference_artifact_is_recomputed() {
    let (m, store) = materializer(three_documents(vec![doc_link(11, 10, AliasKind::Modified)]));
    m.trigger(&params(json!({"ddpID": 1}))).unwrap();

    assert!(store.delete("ddMap").unwrap());
    let reference = m.reference().unwrap();
    assert_eq!(reference.doc_alias_maps.modified.get(&DocumentId(11)), Some(DocumentId(10)));
    assert!(store.exists("ddMap").unwrap());
}

#[test]
fn concurrent_triggers_compute_once() {
    let (m, _) = materializer(three_documents(vec![doc_link(11, 10, AliasKind::Modified)]));
    let m = Arc::new(m);
    let p = params(json!({"ddpID": 1}));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let (m, p) = (Arc::clone(&m), p.clone());
            thread::spawn(move || m.trigger(&p).unwrap().data.unwrap().existed)
        })
        .collect();
    let computed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|existed| !existed)
        .count();

    assert_eq!(computed, 1);
    assert_eq!(
        m.state(&Fingerprint::from_params(&p)).unwrap(),
        CacheState::Cached
    );
}

#[test]
fn full_request_skips_query_tables() {
    let (m, store) = materializer(three_documents(vec![doc_link(11, 10, AliasKind::Modified)]));
    let p = params(json!({"logicalOp": "and", "mode": "current"}));
    let outcome = m.trigger(&p).unwrap().data.unwrap();

    for field in SnapshotField::ALL {
        let key = outcome.fingerprint.field_key(field.name());
        assert_eq!(
            store.exists(&key).unwrap(),
            !field.skipped_in_full(),
            "{field}"
        );
    }

    let current = m.documents(&p).unwrap();
    assert_eq!(current.data, Some(ids(&[10, 12])));

    let snapshot = m.load(&p, SnapshotField::ALL).unwrap().data.unwrap();
    assert!(snapshot.full);
    assert_eq!(snapshot.dup_doc_ids, ids(&[10, 11, 12]));
    assert!(snapshot.doc_title.is_empty());
    assert!(snapshot.person_name.is_empty());
}

fn people_catalog() -> CatalogData {
    let date = |y| NaiveDate::from_ymd_opt(y, 6, 1).unwrap();
    CatalogData {
        persons: vec![
            PersonRecord::new(1, "Amy", "Smith").with_middle("J").with_affiliation(100),
            PersonRecord::new(2, "Amy", "Smith").with_affiliation(100),
            PersonRecord::new(3, "Bob", "Data Not Available"),
            PersonRecord::new(4, "Carl", "Jones"),
        ],
        documents: vec![
            DocumentRecord::new(10, "Graph Mining")
                .published(date(2010))
                .in_ddp(1)
                .with_amount(500.0)
                .with_award_number("A-10"),
            DocumentRecord::new(11, "Graph Mining II").published(date(2011)).in_ddp(1),
            DocumentRecord::new(12, "Graph Theory").published(date(2011)).in_ddp(1),
        ],
        person_aliases: vec![PersonAliasLink {
            source: PersonId(2),
            target: PersonId(1),
        }],
        edges: vec![
            edge(10, 1, PersonRole::Authorship),
            edge(11, 2, PersonRole::Authorship),
            edge(12, 3, PersonRole::Authorship),
            edge(10, 4, PersonRole::ProgramOfficer),
        ],
        affiliations: vec![AffiliationRow {
            id: 100,
            organization_id: 500,
            state_id: Some(7),
        }],
        organizations: vec![NamedRow {
            id: 500,
            name: "State University".to_string(),
            abbreviation: None,
        }],
        states: vec![NamedRow {
            id: 7,
            name: "Ohio".to_string(),
            abbreviation: Some("OH".to_string()),
        }],
        ..CatalogData::default()
    }
}

#[test]
fn lookup_tables_use_canonical_persons() {
    let (m, _) = materializer(people_catalog());
    let p = params(json!({"ddpID": 1}));
    m.trigger(&p).unwrap();
    let s = m.load(&p, SnapshotField::ALL).unwrap().data.unwrap();

    assert_eq!(s.dup_author_ids, vec![PersonId(1), PersonId(2), PersonId(3)]);
    assert_eq!(s.author_ids, vec![PersonId(1), PersonId(3)]);
    assert_eq!(s.author_map.get(&PersonId(2)), Some(PersonId(1)));
    assert_eq!(s.doc_authors[&DocumentId(11)], vec![PersonId(1)]);
    assert_eq!(s.author_docs[&PersonId(1)], ids(&[10, 11]));
    assert_eq!(s.po_ids, vec![PersonId(4)]);
    assert_eq!(s.po_docs[&PersonId(4)], ids(&[10]));

    assert_eq!(s.person_name[&PersonId(1)], "Smith, Amy J.");
    assert_eq!(s.person_name[&PersonId(4)], "Jones, Carl");
    assert_eq!(s.eliminated_person_ids, vec![PersonId(3)]);

    assert_eq!(s.org_name[&500], "State University");
    assert_eq!(s.org_docs[&500], ids(&[10, 11]));
    assert_eq!(s.state_org[&7], vec![500]);

    assert_eq!(s.doc_title[&DocumentId(12)], "Graph Theory");
    assert_eq!(s.doc_award[&DocumentId(10)], "A-10");
    assert_eq!(s.year_doc_ids[&2011], ids(&[11, 12]));
    assert_eq!(s.ddp_docs[&1], ids(&[10, 11, 12]));

    let reference = m.reference().unwrap();
    assert_eq!(reference.excluded_person_ids, vec![PersonId(3)]);
    assert_eq!(reference.state_info[&7].abbr.as_deref(), Some("OH"));
}

#[test]
fn load_reads_only_requested_fields() {
    let (m, _) = materializer(people_catalog());
    let p = params(json!({"ddpID": 1}));
    m.trigger(&p).unwrap();

    let s = m
        .load(&p, &[SnapshotField::OriDocIds])
        .unwrap()
        .data
        .unwrap();
    assert_eq!(s.ori_doc_ids, ids(&[10, 11, 12]));
    assert!(s.dup_doc_ids.is_empty());
    assert!(s.person_name.is_empty());
}
