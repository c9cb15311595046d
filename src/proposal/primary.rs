//! Primary selection inside a proposal group.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::{DocumentId, DocumentRecord};

/// Metric used to pick the alias target of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryRule {
    /// Largest total award amount first.
    Amount,
    /// Earliest publication date first.
    Date,
}

impl PrimaryRule {
    /// Orders `members` best-first. Members without the metric rank last;
    /// ties break by ascending document id. Duplicate ids are dropped.
    #[must_use]
    pub fn rank(
        self,
        members: &[DocumentId],
        documents: &HashMap<DocumentId, DocumentRecord>,
    ) -> Vec<DocumentId> {
        let mut ranked = members.to_vec();
        ranked.sort_unstable();
        ranked.dedup();

        match self {
            Self::Amount => {
                let amount = |id: &DocumentId| documents.get(id).and_then(|d| d.amount);
                ranked.sort_by(|a, b| {
                    missing_last(amount(a), amount(b), |x, y| y.total_cmp(x)).then(a.cmp(b))
                });
            }
            Self::Date => {
                let date = |id: &DocumentId| -> Option<NaiveDate> {
                    documents.get(id).and_then(|d| d.publication_date)
                };
                ranked.sort_by(|a, b| missing_last(date(a), date(b), |x, y| x.cmp(y)).then(a.cmp(b)));
            }
        }
        ranked
    }
}

fn missing_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
