use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use consolidata::alias::AliasMap;
use consolidata::provider::{CatalogData, InMemoryCatalog};
use consolidata::record::{
    AliasKind, CandidateRow, DocumentAliasLink, DocumentId, DocumentRecord, PersonId,
};
use consolidata::{
    similarity, ConsolidationConfig, GroupingPass, InMemoryBlobStore, Materializer,
    ProposalGrouper,
};

const TOPICS: [&str; 8] = [
    "Deep Graph Learning",
    "Ocean Acoustics",
    "Quantum Error Correction",
    "Soil Microbiome Dynamics",
    "Distributed Consensus",
    "Glacier Mass Balance",
    "Protein Folding Kinetics",
    "Urban Heat Islands",
];

// 2048 rows: each topic repeated with a numbered suffix so windows see
// both near-duplicates and distinct titles.
fn candidate_rows() -> Vec<CandidateRow> {
    (0..2048u64)
        .map(|i| CandidateRow {
            document_id: DocumentId(i),
            title: format!(
                "Collaborative Research: {} {}",
                TOPICS[(i % 8) as usize],
                i / 64
            ),
            year: None,
            pi_id: PersonId(i % 5),
        })
        .collect()
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");
    group.throughput(Throughput::Elements(1));
    group.bench_function("near_duplicate_titles", |b| {
        b.iter(|| {
            similarity(
                black_box("deep graph learning for molecules"),
                black_box("deep graph learning for molecule"),
                Some(20),
            )
        });
    });
    group.bench_function("length_gated", |b| {
        b.iter(|| similarity(black_box("short"), black_box("a much longer title"), Some(4)));
    });
    group.finish();
}

fn bench_grouping(c: &mut Criterion) {
    let rows = candidate_rows();
    let catalog = InMemoryCatalog::default();
    let grouper = ProposalGrouper::new(&catalog, &catalog, ConsolidationConfig::default());
    let pis = AliasMap::new();

    let mut group = c.benchmark_group("grouping");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("collaborative_2048", |b| {
        b.iter(|| {
            grouper
                .group(&GroupingPass::collaborative(), black_box(&rows), &pis)
                .unwrap()
        });
    });
    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let documents: Vec<_> = (0..4096u64)
        .map(|i| DocumentRecord::new(i, format!("proposal {i}")).in_ddp(i % 4))
        .collect();
    let document_aliases = (1..4096u64)
        .step_by(3)
        .map(|i| DocumentAliasLink {
            source: DocumentId(i),
            target: DocumentId(i - 1),
            kind: if i % 2 == 0 { AliasKind::Modified } else { AliasKind::Collaborative },
        })
        .collect();
    let catalog = Arc::new(InMemoryCatalog::new(CatalogData {
        documents,
        document_aliases,
        ..CatalogData::default()
    }));
    let params = serde_json::json!({"ddpID": 1});
    let params = params.as_object().cloned().unwrap();

    c.bench_function("materialize/cold_4096", |b| {
        b.iter(|| {
            // Fresh store per iteration so every trigger computes.
            let m = Materializer::new(
                Arc::new(InMemoryBlobStore::new()),
                catalog.clone(),
                catalog.clone(),
            );
            m.trigger(black_box(&params)).unwrap()
        });
    });
}

criterion_group!(consolidation, bench_similarity, bench_grouping, bench_materialize);
criterion_main!(consolidation);
