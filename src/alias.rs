//! Alias-graph resolution primitives.
//!
//! An [`AliasMap`] is a directed partial map `id -> canonical id`. Links are
//! produced by the disambiguation passes and may chain. Two resolution
//! strategies coexist and are deliberately kept apart:
//!
//! - one-hop operations ([`expand_alias_closure`], [`substitute_alias_closure`],
//!   [`remove_aliased`]) used by the document views;
//! - full-chain resolution ([`resolve_chain`], [`collapse_chains`]) used for PI
//!   canonicalization and the author corrective pass.
//!
//! Every chain walk is bounded by a visited set and a hop limit.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::AliasChainError;

/// Default bound on the number of hops a chain walk may take.
pub const DEFAULT_MAX_HOPS: usize = 128;

/// Trait alias for id types usable in an alias map.
pub trait AliasId: Copy + Ord + Hash + Display {}

impl<T: Copy + Ord + Hash + Display> AliasId for T {}

/// Directed partial map from an id to its alias target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasMap<K: Ord> {
    links: BTreeMap<K, K>,
}

impl<K: Ord> Default for AliasMap<K> {
    fn default() -> Self {
        Self {
            links: BTreeMap::new(),
        }
    }
}

impl<K: AliasId> AliasMap<K> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `source -> target`, returning the previous target if any.
    pub fn insert(&mut self, source: K, target: K) -> Option<K> {
        self.links.insert(source, target)
    }

    /// Returns the direct target of `source`.
    #[must_use]
    pub fn get(&self, source: &K) -> Option<K> {
        self.links.get(source).copied()
    }

    /// Returns true if `source` has an outgoing link.
    #[must_use]
    pub fn has_alias(&self, source: &K) -> bool {
        self.links.contains_key(source)
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Returns true if there are no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Iterates `(source, target)` pairs in ascending source order.
    pub fn iter(&self) -> impl Iterator<Item = (K, K)> + '_ {
        self.links.iter().map(|(s, t)| (*s, *t))
    }

    /// Builds the `target -> sources` index.
    #[must_use]
    pub fn reverse(&self) -> HashMap<K, Vec<K>> {
        let mut rev: HashMap<K, Vec<K>> = HashMap::with_capacity(self.links.len());
        for (source, target) in &self.links {
            rev.entry(*target).or_default().push(*source);
        }
        rev
    }

    /// Adds every link of `other`; on conflicting sources `other` wins.
    pub fn extend_from(&mut self, other: &Self) {
        for (s, t) in other.iter() {
            self.links.insert(s, t);
        }
    }
}

impl<K: AliasId> FromIterator<(K, K)> for AliasMap<K> {
    fn from_iter<I: IntoIterator<Item = (K, K)>>(iter: I) -> Self {
        Self {
            links: iter.into_iter().collect(),
        }
    }
}

struct OrderedSet<K> {
    seen: HashSet<K>,
    out: Vec<K>,
}

impl<K: AliasId> OrderedSet<K> {
    fn with_capacity(n: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(n),
            out: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, id: K) {
        if self.seen.insert(id) {
            self.out.push(id);
        }
    }
}

/// One-hop forward plus one-hop backward expansion of `ids`.
///
/// Adds `alias[id]` for every input id, then every `x` with `alias[x]` equal
/// to a member present after the forward step. A single outward pass, not a
/// fixed point. Output keeps first-seen order: inputs, forward targets,
/// backward sources.
#[must_use]
pub fn expand_alias_closure<K: AliasId>(ids: &[K], alias: &AliasMap<K>) -> Vec<K> {
    let mut set = OrderedSet::with_capacity(ids.len());
    for id in ids {
        set.push(*id);
    }
    for id in ids {
        if let Some(target) = alias.get(id) {
            set.push(target);
        }
    }

    let reverse = alias.reverse();
    let present = set.out.clone();
    for id in &present {
        if let Some(sources) = reverse.get(id) {
            for source in sources {
                set.push(*source);
            }
        }
    }
    set.out
}

/// Replaces each aliased id by its direct target, exactly one hop.
///
/// A target that itself has an alias is not re-resolved. Duplicates
/// collapse; output keeps first-seen order.
#[must_use]
pub fn substitute_alias_closure<K: AliasId>(ids: &[K], alias: &AliasMap<K>) -> Vec<K> {
    let mut set = OrderedSet::with_capacity(ids.len());
    for id in ids {
        set.push(alias.get(id).unwrap_or(*id));
    }
    set.out
}

/// Drops every id that has an outgoing link; nothing is redirected.
#[must_use]
pub fn remove_aliased<K: AliasId>(ids: &[K], alias: &AliasMap<K>) -> Vec<K> {
    let mut set = OrderedSet::with_capacity(ids.len());
    for id in ids {
        if !alias.has_alias(id) {
            set.push(*id);
        }
    }
    set.out
}

/// Follows `alias` from `id` to its terminal.
///
/// # Errors
/// - [`AliasChainError::Cycle`] when an id repeats on the walk
/// - [`AliasChainError::HopLimitExceeded`] after `max_hops` hops
pub fn resolve_chain<K: AliasId>(
    id: K,
    alias: &AliasMap<K>,
    max_hops: usize,
) -> Result<K, AliasChainError> {
    let mut current = id;
    let mut visited = HashSet::new();
    let mut path = vec![current];
    visited.insert(current);

    for _ in 0..max_hops {
        let Some(next) = alias.get(&current) else {
            return Ok(current);
        };
        path.push(next);
        if !visited.insert(next) {
            return Err(AliasChainError::Cycle {
                start: id.to_string(),
                path: path.iter().map(ToString::to_string).collect(),
            });
        }
        current = next;
    }

    if alias.has_alias(&current) {
        return Err(AliasChainError::HopLimitExceeded {
            start: id.to_string(),
            limit: max_hops,
        });
    }
    Ok(current)
}

/// Computes the re-pointing updates that restore the single-hop invariant.
///
/// Returns `(source, root)` for every source whose direct target itself has
/// an outgoing link, `root` being the resolved terminal.
///
/// # Errors
/// Fails on the first chain that cycles or exceeds `max_hops`.
pub fn collapse_chains<K: AliasId>(
    alias: &AliasMap<K>,
    max_hops: usize,
) -> Result<Vec<(K, K)>, AliasChainError> {
    let mut updates = Vec::new();
    for (source, target) in alias.iter() {
        if alias.has_alias(&target) {
            let root = resolve_chain(source, alias, max_hops)?;
            updates.push((source, root));
        }
    }
    Ok(updates)
}

/// Memoizing full-chain resolver for repeated lookups against one map.
#[derive(Debug)]
pub struct ChainResolver<'a, K: AliasId> {
    alias: &'a AliasMap<K>,
    max_hops: usize,
    memo: HashMap<K, K>,
}

impl<'a, K: AliasId> ChainResolver<'a, K> {
    /// Creates a resolver over `alias`.
    #[must_use]
    pub fn new(alias: &'a AliasMap<K>, max_hops: usize) -> Self {
        Self {
            alias,
            max_hops,
            memo: HashMap::new(),
        }
    }

    /// Resolves `id` to its terminal, caching the result.
    ///
    /// # Errors
    /// Propagates [`resolve_chain`] failures.
    pub fn resolve(&mut self, id: K) -> Result<K, AliasChainError> {
        if let Some(root) = self.memo.get(&id) {
            return Ok(*root);
        }
        let root = resolve_chain(id, self.alias, self.max_hops)?;
        self.memo.insert(id, root);
        Ok(root)
    }
}
