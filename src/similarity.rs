//! Normalized edit-distance similarity.

/// Similarity of two strings in `[0, 1]`.
///
/// Returns `1.0` iff `a == b`. When `max_len_diff` is given and the lengths
/// differ by more than it, returns `0.0` without computing the distance.
/// Otherwise `(L - levenshtein(a, b)) / L` with `L` the longer length.
/// Lengths are counted in `char`s.
///
/// ```
/// use consolidata::similarity::similarity;
///
/// assert_eq!(similarity("grant", "grant", None), 1.0);
/// assert_eq!(similarity("ab", "abcdef", Some(2)), 0.0);
/// ```
#[must_use]
pub fn similarity(a: &str, b: &str, max_len_diff: Option<usize>) -> f64 {
    if a == b {
        return 1.0;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if let Some(max) = max_len_diff {
        if len_a.abs_diff(len_b) > max {
            return 0.0;
        }
    }

    let longer = len_a.max(len_b);
    let dist = strsim::levenshtein(a, b);

    #[allow(clippy::cast_precision_loss)]
    let score = (longer - dist) as f64 / longer as f64;
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert_eq!(similarity("", "", None), 1.0);
        assert_eq!(similarity("abc", "abc", Some(0)), 1.0);
    }

    #[test]
    fn test_known_distance() {
        // kitten -> sitting: distance 3, longer length 7
        let s = similarity("kitten", "sitting", None);
        assert!((s - 4.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_gate() {
        assert_eq!(similarity("a", "abcd", Some(2)), 0.0);
        assert!(similarity("abc", "abcd", Some(2)) > 0.0);
    }

    #[test]
    fn test_one_empty() {
        assert_eq!(similarity("", "abc", None), 0.0);
    }

    #[test]
    fn test_multibyte_counts_chars() {
        // one substitution over four chars
        let s = similarity("café", "cafe", None);
        assert!((s - 0.75).abs() < 1e-12);
    }
}
