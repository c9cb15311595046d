//! Request fingerprints.
//!
//! A fingerprint is the cache key namespace of one filtered request. The
//! construction is fixed so that caches written by earlier runs stay
//! addressable:
//!
//! 1. lower-case every parameter name; on a collision the name that comes
//!    later in the request wins
//! 2. drop `userid`, `mode`, `overviewmode`, `depth`
//! 3. drop values that are not strings, sequences, or integers
//! 4. sort by name and render `name=value`, sequences concatenated
//! 5. join with `_`, apply the character substitutions, lower-case

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters that never affect the selected id set.
const IGNORED_PARAMS: [&str; 4] = ["userid", "mode", "overviewmode", "depth"];

/// Parameters that may accompany a "full" (unfiltered) request.
const FULL_REQUEST_PARAMS: [&str; 5] = ["logicalop", "userid", "mode", "overviewmode", "depth"];

const SUBSTITUTIONS: [(&str, &str); 6] = [
    ("?", "_"),
    ("/", "^"),
    ("&", "+"),
    ("%20", "_"),
    (" ", "_"),
    ("\"", "+qt"),
];

/// Deterministic cache key derived from request parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds the fingerprint of a request.
    #[must_use]
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let lowered: BTreeMap<String, &Value> = params
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();

        let rendered: Vec<String> = lowered
            .iter()
            .filter(|(k, _)| !IGNORED_PARAMS.contains(&k.as_str()))
            .filter_map(|(k, v)| render_value(v).map(|v| format!("{k}={v}")))
            .collect();

        let mut name = rendered.join("_");
        for (from, to) in SUBSTITUTIONS {
            name = name.replace(from, to);
        }
        Self(name.to_lowercase())
    }

    /// Wraps an already-computed fingerprint string.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The fingerprint text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key of one snapshot field: `<fingerprint>.<field>`.
    #[must_use]
    pub fn field_key(&self, field: &str) -> String {
        format!("{}.{field}", self.0)
    }

    /// Prefix shared by every artifact of this fingerprint.
    #[must_use]
    pub fn key_prefix(&self) -> String {
        format!("{}.", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_integer(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_i64() || n.is_u64())
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if is_integer(value) => Some(n.to_string()),
        Value::Array(items) => Some(items.iter().map(render_element).collect()),
        _ => None,
    }
}

/// Sequence elements render the way the legacy key builder stringified
/// them: `true` is "1", `false` and `null` are empty.
fn render_element(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if !is_integer(value) && f.is_finite() && f.fract() == 0.0 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Returns true when the request carries no filter parameters.
///
/// Only `logicalOp` and the parameters ignored by the fingerprint may be
/// present; names compare case-insensitively.
#[must_use]
pub fn is_full(params: &Map<String, Value>) -> bool {
    params
        .keys()
        .all(|k| FULL_REQUEST_PARAMS.contains(&k.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!("test params must be an object"),
        }
    }

    #[test]
    fn test_renders_sorted_pairs() {
        let p = params(json!({"pgmID": [1, 2], "year": 2010, "logicalOp": "and"}));
        assert_eq!(Fingerprint::from_params(&p).as_str(), "logicalop=and_pgmid=12_year=2010");
    }

    #[test]
    fn test_casing_and_order_invariance() {
        let a = params(json!({"Keyword": "Graph", "pgmID": ["7", "9"]}));
        let b = params(json!({"pgmid": ["7", "9"], "keyword": "graph"}));
        assert_eq!(Fingerprint::from_params(&a), Fingerprint::from_params(&b));
    }

    #[test]
    fn test_drops_ignored_and_untyped_params() {
        let p = params(json!({
            "userID": 42,
            "mode": "current",
            "overviewMode": "x",
            "depth": 3,
            "ratio": 0.5,
            "flag": true,
            "nothing": null,
            "nested": {"a": 1},
            "q": "x"
        }));
        assert_eq!(Fingerprint::from_params(&p).as_str(), "q=x");
    }

    #[test]
    fn test_later_colliding_name_wins() {
        let upper_last = params(json!({"title": "graph", "Title": "ocean"}));
        let lower_last = params(json!({"Title": "ocean", "title": "graph"}));
        assert_eq!(Fingerprint::from_params(&upper_last).as_str(), "title=ocean");
        assert_eq!(Fingerprint::from_params(&lower_last).as_str(), "title=graph");
    }

    #[test]
    fn test_sequence_scalars_render_like_legacy_keys() {
        let p = params(json!({"flags": [true, false, null, 2.0, 2.5, "x"]}));
        assert_eq!(Fingerprint::from_params(&p).as_str(), "flags=122.5x");
    }

    #[test]
    fn test_character_substitutions() {
        let p = params(json!({"q": "A/B?c&d%20e f\"g\""}));
        assert_eq!(
            Fingerprint::from_params(&p).as_str(),
            "q=a^b_c+d_e_f+qtg+qt"
        );
    }

    #[test]
    fn test_empty_params() {
        let fp = Fingerprint::from_params(&Map::new());
        assert_eq!(fp.as_str(), "");
        assert_eq!(fp.field_key("dupDocIDs"), ".dupDocIDs");
    }

    #[test]
    fn test_field_key() {
        let fp = Fingerprint::from_raw("q=x");
        assert_eq!(fp.field_key("oriDocIDs"), "q=x.oriDocIDs");
        assert_eq!(fp.key_prefix(), "q=x.");
    }

    #[test]
    fn test_is_full() {
        assert!(is_full(&Map::new()));
        assert!(is_full(&params(json!({"logicalOp": "and", "mode": "all", "userID": 1}))));
        assert!(!is_full(&params(json!({"logicalOp": "and", "year": 2010}))));
    }
}
