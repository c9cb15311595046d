//! Proposal grouping.
//!
//! Clusters documents that represent one underlying proposal. Candidate rows
//! are normalized and sorted by title so that near-identical titles sit next
//! to each other; each row is then compared with a bounded look-ahead window
//! only. Rows joined by a title edge form a group when their canonical PIs
//! satisfy the pass's [`PiPredicate`]. Within a group every member is aliased
//! to the best-ranked one.

mod primary;
mod title;

pub use primary::PrimaryRule;
pub use title::TitleNormalizer;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alias::{AliasMap, ChainResolver};
use crate::config::ConsolidationConfig;
use crate::error::ConsolidationResult;
use crate::provider::{AliasSink, CandidateQuery, RowProvider};
use crate::record::{AliasKind, CandidateRow, DocumentAliasLink, DocumentId, PersonId};
use crate::similarity::similarity;

/// How the canonical PIs of two title-similar rows must relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiPredicate {
    /// Canonical PIs are equal.
    SamePi,
    /// Canonical PIs differ.
    DifferentPi,
}

impl PiPredicate {
    fn holds(self, a: PersonId, b: PersonId) -> bool {
        match self {
            Self::SamePi => a == b,
            Self::DifferentPi => a != b,
        }
    }
}

/// Parameters of one grouping pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingPass {
    /// Kind written on every inserted link.
    pub kind: AliasKind,
    pub pi_predicate: PiPredicate,
    pub primary_rule: PrimaryRule,
    /// Strip the collaborative-filing prefix before comparing titles.
    pub strip_prefix: bool,
    pub candidate_filter: CandidateQuery,
}

impl GroupingPass {
    /// Co-filed copies of one proposal: prefixed titles, equal canonical PI,
    /// largest award wins.
    #[must_use]
    pub const fn collaborative() -> Self {
        Self {
            kind: AliasKind::Collaborative,
            pi_predicate: PiPredicate::SamePi,
            primary_rule: PrimaryRule::Amount,
            strip_prefix: true,
            candidate_filter: CandidateQuery::CollaborativeTitles,
        }
    }

    /// Resubmissions: any proposal, different canonical PI, earliest wins.
    #[must_use]
    pub const fn modified() -> Self {
        Self {
            kind: AliasKind::Modified,
            pi_predicate: PiPredicate::DifferentPi,
            primary_rule: PrimaryRule::Date,
            strip_prefix: true,
            candidate_filter: CandidateQuery::AllProposals,
        }
    }
}

/// One discovered group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalGroup {
    /// Seed first, then the joined rows in title order.
    pub members: Vec<DocumentId>,
}

/// Counters of one grouping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingReport {
    pub rows_considered: usize,
    pub rows_excluded: usize,
    pub edges: usize,
    pub groups: usize,
    pub links_inserted: usize,
    /// Sources that already owned a link of the pass's kind.
    pub links_skipped: usize,
}

struct PreparedRow {
    document_id: DocumentId,
    title: String,
    pi: PersonId,
}

/// Batch pass that discovers document alias links.
pub struct ProposalGrouper<'a> {
    provider: &'a dyn RowProvider,
    sink: &'a dyn AliasSink,
    config: ConsolidationConfig,
}

impl<'a> ProposalGrouper<'a> {
    /// Creates a grouper using `config.grouping` and `config.alias`.
    #[must_use]
    pub fn new(
        provider: &'a dyn RowProvider,
        sink: &'a dyn AliasSink,
        config: ConsolidationConfig,
    ) -> Self {
        Self {
            provider,
            sink,
            config,
        }
    }

    /// Runs one pass end to end: read candidates, group, insert links.
    ///
    /// # Errors
    /// Aborts on the first provider, sink, pattern, or chain failure.
    pub fn run(&self, pass: &GroupingPass) -> ConsolidationResult<GroupingReport> {
        info!(kind = %pass.kind, "proposal grouping started");

        let rows = self.provider.candidate_rows(pass.candidate_filter)?;
        let pi_aliases: AliasMap<PersonId> = self
            .provider
            .person_aliases(None)?
            .into_iter()
            .map(|l| (l.source, l.target))
            .collect();

        let (groups, mut report) = self.group(pass, &rows, &pi_aliases)?;

        // Links are never rewritten; a rerun leaves linked sources alone.
        let mut linked: HashSet<DocumentId> = self
            .provider
            .document_alias_links()?
            .into_iter()
            .filter(|l| l.kind == pass.kind)
            .map(|l| l.source)
            .collect();

        let grouped: Vec<DocumentId> = groups.iter().flat_map(|g| g.members.iter().copied()).collect();
        let documents: HashMap<_, _> = self
            .provider
            .documents(&grouped)?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        for group in &groups {
            let ranked = pass.primary_rule.rank(&group.members, &documents);
            let Some((&target, rest)) = ranked.split_first() else {
                continue;
            };
            for &source in rest {
                if !linked.insert(source) {
                    report.links_skipped += 1;
                    debug!(%source, kind = %pass.kind, "document already linked, skipped");
                    continue;
                }
                self.sink.insert_document_alias(DocumentAliasLink {
                    source,
                    target,
                    kind: pass.kind,
                })?;
                report.links_inserted += 1;
                debug!(%source, %target, kind = %pass.kind, "document link inserted");
            }
        }

        info!(
            kind = %pass.kind,
            rows = report.rows_considered,
            excluded = report.rows_excluded,
            edges = report.edges,
            groups = report.groups,
            links = report.links_inserted,
            skipped = report.links_skipped,
            "proposal grouping finished"
        );
        Ok(report)
    }

    /// Forms groups from candidate rows without touching the sink.
    ///
    /// # Errors
    /// Fails on an invalid pattern or an inconsistent PI alias chain.
    pub fn group(
        &self,
        pass: &GroupingPass,
        rows: &[CandidateRow],
        pi_aliases: &AliasMap<PersonId>,
    ) -> ConsolidationResult<(Vec<ProposalGroup>, GroupingReport)> {
        let grouping = &self.config.grouping;
        let normalizer = TitleNormalizer::from_config(grouping, pass.strip_prefix)?;
        let mut resolver = ChainResolver::new(pi_aliases, self.config.alias.max_hops);
        let mut report = GroupingReport {
            rows_considered: rows.len(),
            ..GroupingReport::default()
        };

        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            if normalizer.is_excluded(&row.title) {
                report.rows_excluded += 1;
                continue;
            }
            prepared.push(PreparedRow {
                document_id: row.document_id,
                title: normalizer.normalize(&row.title),
                pi: resolver.resolve(row.pi_id)?,
            });
        }
        prepared.sort_by(|a, b| a.title.cmp(&b.title).then(a.document_id.cmp(&b.document_id)));

        let n = prepared.len();
        let mut visited = vec![false; n];
        let mut groups = Vec::new();

        for seed in 0..n {
            if visited[seed] {
                continue;
            }
            let window_end = n.min(seed + 1 + grouping.look_ahead);
            let mut members = Vec::new();

            for j in seed + 1..window_end {
                let score = similarity(&prepared[seed].title, &prepared[j].title, grouping.max_len_diff);
                if score <= grouping.similarity_threshold {
                    continue;
                }
                report.edges += 1;
                if visited[j]
                    || prepared[j].document_id == prepared[seed].document_id
                    || !pass.pi_predicate.holds(prepared[seed].pi, prepared[j].pi)
                {
                    continue;
                }
                visited[j] = true;
                members.push(prepared[j].document_id);
            }

            if members.is_empty() {
                continue;
            }
            visited[seed] = true;
            members.insert(0, prepared[seed].document_id);
            groups.push(ProposalGroup { members });
        }

        report.groups = groups.len();
        Ok((groups, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CatalogData, InMemoryCatalog};
    use crate::record::{DocumentPersonEdge, DocumentRecord, PersonRole};
    use chrono::NaiveDate;

    fn row(doc: u64, title: &str, pi: u64) -> CandidateRow {
        CandidateRow {
            document_id: DocumentId(doc),
            title: title.to_string(),
            year: None,
            pi_id: PersonId(pi),
        }
    }

    fn grouper(catalog: &InMemoryCatalog) -> ProposalGrouper<'_> {
        ProposalGrouper::new(catalog, catalog, ConsolidationConfig::default())
    }

    fn ids(groups: &[ProposalGroup]) -> Vec<Vec<u64>> {
        groups
            .iter()
            .map(|g| g.members.iter().map(|d| d.get()).collect())
            .collect()
    }

    #[test]
    fn test_same_pi_groups() {
        let c = InMemoryCatalog::default();
        let rows = vec![
            row(1, "Collaborative Research: Deep Graph Learning", 7),
            row(2, "Collaborative Research: Deep Graph Learning", 7),
            row(3, "Collaborative Research: Deep Graph Learning", 8),
            row(4, "Collaborative Research: Ocean Acoustics", 7),
        ];
        let (groups, report) = grouper(&c)
            .group(&GroupingPass::collaborative(), &rows, &AliasMap::new())
            .unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2]]);
        assert_eq!(report.rows_considered, 4);
        assert_eq!(report.groups, 1);
    }

    #[test]
    fn test_pi_canonicalized_through_chain() {
        let c = InMemoryCatalog::default();
        let rows = vec![row(1, "Deep Graph Learning", 7), row(2, "Deep Graph Learning", 9)];
        let pis: AliasMap<PersonId> = [(PersonId(9), PersonId(8)), (PersonId(8), PersonId(7))]
            .into_iter()
            .collect();
        let (groups, _) = grouper(&c)
            .group(&GroupingPass::collaborative(), &rows, &pis)
            .unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2]]);
    }

    #[test]
    fn test_different_pi_groups() {
        let c = InMemoryCatalog::default();
        let rows = vec![row(1, "Deep Graph Learning", 7), row(2, "Deep Graph Learning", 8)];
        let (groups, _) = grouper(&c)
            .group(&GroupingPass::modified(), &rows, &AliasMap::new())
            .unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2]]);
    }

    #[test]
    fn test_exclusion_and_singletons() {
        let c = InMemoryCatalog::default();
        let rows = vec![
            row(1, "Graduate Research Fellowship", 7),
            row(2, "Graduate Research Fellowship", 7),
            row(3, "Unrelated Topic", 7),
        ];
        let (groups, report) = grouper(&c)
            .group(&GroupingPass::collaborative(), &rows, &AliasMap::new())
            .unwrap();
        assert!(groups.is_empty());
        assert_eq!(report.rows_excluded, 2);
    }

    #[test]
    fn test_look_ahead_bounds_edges() {
        let c = InMemoryCatalog::new(CatalogData::default());
        let mut cfg = ConsolidationConfig::default();
        cfg.grouping.look_ahead = 1;
        let g = ProposalGrouper::new(&c, &c, cfg);
        // With a window of one, row 1 never sees row 3, and row 2 is consumed
        // as a member so it is not used as a seed.
        let rows = vec![row(1, "aaaaaaaaa x", 7), row(2, "aaaaaaaaa y", 7), row(3, "aaaaaaaaa z", 7)];
        let (groups, report) = g
            .group(&GroupingPass::collaborative(), &rows, &AliasMap::new())
            .unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2]]);
        assert_eq!(report.edges, 1);
    }

    #[test]
    fn test_groups_are_disjoint() {
        let c = InMemoryCatalog::default();
        let rows = vec![
            row(1, "Deep Graph Learning", 7),
            row(2, "Deep Graph Learning", 8),
            row(3, "Deep Graph Learning", 9),
        ];
        let (groups, _) = grouper(&c)
            .group(&GroupingPass::modified(), &rows, &AliasMap::new())
            .unwrap();
        assert_eq!(ids(&groups), vec![vec![1, 2, 3]]);
    }

    fn lead(doc: u64, pi: u64) -> DocumentPersonEdge {
        DocumentPersonEdge {
            document_id: DocumentId(doc),
            person_id: PersonId(pi),
            role: PersonRole::Authorship,
            ordering: 1,
        }
    }

    #[test]
    fn test_run_links_to_highest_amount() {
        let title = "Collaborative Research: Deep Graph Learning";
        let c = InMemoryCatalog::new(CatalogData {
            documents: vec![
                DocumentRecord::new(1, title).with_amount(50.0),
                DocumentRecord::new(2, title).with_amount(100.0),
                DocumentRecord::new(3, title).with_amount(10.0),
            ],
            edges: vec![lead(1, 7), lead(2, 7), lead(3, 7)],
            ..CatalogData::default()
        });
        let report = grouper(&c).run(&GroupingPass::collaborative()).unwrap();
        assert_eq!(report.links_inserted, 2);

        let mut links: Vec<_> = c
            .document_alias_links()
            .unwrap()
            .into_iter()
            .map(|l| (l.source.get(), l.target.get(), l.kind))
            .collect();
        links.sort_unstable();
        assert_eq!(
            links,
            vec![(1, 2, AliasKind::Collaborative), (3, 2, AliasKind::Collaborative)]
        );
    }

    #[test]
    fn test_rerun_keeps_existing_links() {
        let title = "Collaborative Research: Deep Graph Learning";
        let c = InMemoryCatalog::new(CatalogData {
            documents: vec![
                DocumentRecord::new(1, title).with_amount(100.0),
                DocumentRecord::new(2, title).with_amount(50.0),
            ],
            edges: vec![lead(1, 7), lead(2, 7)],
            ..CatalogData::default()
        });
        let g = grouper(&c);
        let first = g.run(&GroupingPass::collaborative()).unwrap();
        assert_eq!((first.links_inserted, first.links_skipped), (1, 0));

        let second = g.run(&GroupingPass::collaborative()).unwrap();
        assert_eq!((second.links_inserted, second.links_skipped), (0, 1));

        let links = c.document_alias_links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!((links[0].source, links[0].target), (DocumentId(2), DocumentId(1)));
    }

    #[test]
    fn test_run_links_to_earliest_date() {
        let day = |y| NaiveDate::from_ymd_opt(y, 3, 1).unwrap();
        let c = InMemoryCatalog::new(CatalogData {
            documents: vec![
                DocumentRecord::new(1, "Ocean Acoustics").published(day(2014)),
                DocumentRecord::new(2, "Ocean Acoustics II").published(day(2011)),
            ],
            edges: vec![lead(1, 7), lead(2, 8)],
            ..CatalogData::default()
        });
        grouper(&c).run(&GroupingPass::modified()).unwrap();
        let links = c.document_alias_links().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!((links[0].source, links[0].target), (DocumentId(1), DocumentId(2)));
        assert_eq!(links[0].kind, AliasKind::Modified);
    }
}
