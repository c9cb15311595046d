//! Author name disambiguation.
//!
//! Persons are partitioned into 26×26 buckets by the leading letters of last
//! and first name. Each bucket is read in `(last, first, middle, id desc)`
//! order and scanned once while keeping a current candidate: a record that
//! matches the candidate is linked to whichever of the two carries the longer
//! name, and that record becomes the candidate. Links are canonicalized
//! before insertion, first through the bucket's own links, then through one
//! hop of the links already stored.
//!
//! Chains can still form across buckets; [`AuthorDisambiguator::collapse`]
//! re-points every such source to its resolved root.

mod matcher;

pub use matcher::{EnglishNameMatcher, NameMatcher};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alias::{collapse_chains, resolve_chain, AliasMap, DEFAULT_MAX_HOPS};
use crate::error::ConsolidationResult;
use crate::provider::{AliasSink, RowProvider};
use crate::record::{PersonAliasLink, PersonId, PersonRecord};

/// Counters of one disambiguation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguationReport {
    pub buckets_scanned: usize,
    pub records_scanned: usize,
    pub links_inserted: usize,
    /// Proposed links dropped because the source already had one or the
    /// resolved target was the source itself.
    pub links_skipped: usize,
}

/// Batch pass that discovers person alias links from name evidence.
pub struct AuthorDisambiguator<'a, M: NameMatcher = EnglishNameMatcher> {
    provider: &'a dyn RowProvider,
    sink: &'a dyn AliasSink,
    matcher: M,
    max_hops: usize,
}

impl<'a> AuthorDisambiguator<'a, EnglishNameMatcher> {
    /// Creates a pass with the English name heuristics.
    #[must_use]
    pub fn new(provider: &'a dyn RowProvider, sink: &'a dyn AliasSink) -> Self {
        Self::with_matcher(provider, sink, EnglishNameMatcher)
    }
}

impl<'a, M: NameMatcher> AuthorDisambiguator<'a, M> {
    /// Creates a pass with a custom match predicate.
    #[must_use]
    pub fn with_matcher(provider: &'a dyn RowProvider, sink: &'a dyn AliasSink, matcher: M) -> Self {
        Self {
            provider,
            sink,
            matcher,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    /// Overrides the chain-walk bound.
    #[must_use]
    pub fn max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Scans every bucket and inserts the discovered links.
    ///
    /// # Errors
    /// Aborts on the first provider, sink, or chain failure; links inserted
    /// before the failure stay in place.
    pub fn run(&self) -> ConsolidationResult<DisambiguationReport> {
        let mut global: AliasMap<PersonId> = self
            .provider
            .person_aliases(None)?
            .into_iter()
            .map(|l| (l.source, l.target))
            .collect();

        let mut report = DisambiguationReport::default();
        for last in (b'a'..=b'z').map(char::from) {
            for first in (b'a'..=b'z').map(char::from) {
                let mut people = self.provider.people_in_bucket(last, first)?;
                people.sort_by(PersonRecord::bucket_order);

                let proposed = self.scan_bucket(&people);
                let before = report.links_inserted;
                self.insert_bucket_links(&proposed, &mut global, &mut report)?;

                report.buckets_scanned += 1;
                report.records_scanned += people.len();
                info!(
                    bucket = %format!("{last}{first}"),
                    records = people.len(),
                    links = report.links_inserted - before,
                    "author bucket disambiguated"
                );
            }
        }

        info!(
            records = report.records_scanned,
            inserted = report.links_inserted,
            skipped = report.links_skipped,
            "author disambiguation finished"
        );
        Ok(report)
    }

    /// Single linear pass over one sorted bucket. Returns proposed links in
    /// scan order.
    fn scan_bucket(&self, people: &[PersonRecord]) -> Vec<(PersonId, PersonId)> {
        let mut proposed = Vec::new();
        let mut candidate: Option<&PersonRecord> = None;

        for person in people {
            match candidate {
                Some(current) if self.matcher.matches(current, person) => {
                    if person.name_weight() > current.name_weight() {
                        proposed.push((current.id, person.id));
                        candidate = Some(person);
                    } else {
                        proposed.push((person.id, current.id));
                    }
                }
                _ => candidate = Some(person),
            }
        }
        proposed
    }

    fn insert_bucket_links(
        &self,
        proposed: &[(PersonId, PersonId)],
        global: &mut AliasMap<PersonId>,
        report: &mut DisambiguationReport,
    ) -> ConsolidationResult<()> {
        let local: AliasMap<PersonId> = proposed.iter().copied().collect();

        for &(source, target) in proposed {
            let mut root = resolve_chain(target, &local, self.max_hops)?;
            if let Some(existing) = global.get(&root) {
                root = existing;
            }

            if root == source || global.has_alias(&source) {
                debug!(%source, %root, "skipping author link");
                report.links_skipped += 1;
                continue;
            }

            self.sink.insert_person_alias(PersonAliasLink { source, target: root })?;
            global.insert(source, root);
            report.links_inserted += 1;
            debug!(%source, %root, "author link inserted");
        }
        Ok(())
    }

    /// Corrective pass: re-points every source whose target itself has an
    /// alias directly to the resolved root. Returns the number of links
    /// updated.
    ///
    /// # Errors
    /// Fails on a cyclic or over-long chain, or on a provider/sink failure.
    pub fn collapse(&self) -> ConsolidationResult<usize> {
        let map: AliasMap<PersonId> = self
            .provider
            .person_aliases(None)?
            .into_iter()
            .map(|l| (l.source, l.target))
            .collect();

        let updates = collapse_chains(&map, self.max_hops)?;
        for &(source, target) in &updates {
            self.sink.update_person_alias(PersonAliasLink { source, target })?;
            debug!(%source, %target, "author link re-pointed");
        }

        info!(updated = updates.len(), "author alias chains collapsed");
        Ok(updates.len())
    }
}
