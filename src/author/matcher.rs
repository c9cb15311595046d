//! Name-match predicates.
//!
//! The disambiguator only asks whether a scanned record denotes the same
//! person as the current candidate. Locale-specific heuristics live behind
//! [`NameMatcher`] so they can be swapped without touching the scan.

use crate::record::PersonRecord;

/// Decides whether two person records in one bucket denote the same person.
pub trait NameMatcher: Send + Sync {
    /// Returns true when `scanned` matches the current `candidate`.
    fn matches(&self, candidate: &PersonRecord, scanned: &PersonRecord) -> bool;
}

/// Western-order name heuristics.
///
/// With equal last names, two records match when
/// - the first names are equal, or
/// - the first names share their first character and either is at most two
///   characters long (an initial such as `"A"` or `"A."`), or
/// - both first names are longer than two characters and one is a prefix of
///   the other (`"Chris"` / `"Christopher"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishNameMatcher;

impl EnglishNameMatcher {
    const INITIAL_MAX_LEN: usize = 2;
}

impl NameMatcher for EnglishNameMatcher {
    fn matches(&self, candidate: &PersonRecord, scanned: &PersonRecord) -> bool {
        if candidate.last_name != scanned.last_name {
            return false;
        }

        let (a, b) = (candidate.first_name.as_str(), scanned.first_name.as_str());
        if a == b {
            return true;
        }

        let (len_a, len_b) = (a.chars().count(), b.chars().count());
        let same_initial = a.chars().next().is_some() && a.chars().next() == b.chars().next();
        if same_initial && (len_a <= Self::INITIAL_MAX_LEN || len_b <= Self::INITIAL_MAX_LEN) {
            return true;
        }

        len_a > Self::INITIAL_MAX_LEN
            && len_b > Self::INITIAL_MAX_LEN
            && (a.starts_with(b) || b.starts_with(a))
    }
}
