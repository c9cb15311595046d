//! Configuration for the consolidation passes and the view cache.
//!
//! Every section has working defaults; a TOML file only needs to name the
//! values it overrides.
//!
//! ```toml
//! [grouping]
//! look_ahead = 12
//! similarity_threshold = 0.85
//!
//! [cache]
//! root = "/var/lib/consolidata/cache"
//! ```

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::alias::DEFAULT_MAX_HOPS;
use crate::error::ConfigError;

/// Chain-walk limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    /// Maximum hops any chain walk may take before it is rejected.
    pub max_hops: usize,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
        }
    }
}

/// Proposal grouping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Rows examined after each row in title order.
    pub look_ahead: usize,
    /// Edge threshold; an edge needs a similarity strictly above it.
    pub similarity_threshold: f64,
    /// Optional length gate passed to the similarity scorer.
    pub max_len_diff: Option<usize>,
    /// Prefix stripped from collaborative titles (matched on lower-cased text).
    pub grouping_prefix: String,
    /// Titles matching this pattern (case-insensitive) are not grouped.
    pub exclusion: Option<String>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            look_ahead: 9,
            similarity_threshold: 0.8,
            max_len_diff: None,
            grouping_prefix: r"^collab([a-z]|\s)+(:|-)+".to_string(),
            exclusion: Some(r"research\s+fellowship".to_string()),
        }
    }
}

impl GroupingConfig {
    /// Compiles the grouping-prefix pattern.
    ///
    /// # Errors
    /// Returns `InvalidPattern` if the pattern does not compile.
    pub fn prefix_regex(&self) -> Result<Regex, ConfigError> {
        Regex::new(&self.grouping_prefix).map_err(|source| ConfigError::InvalidPattern {
            field: "grouping.grouping_prefix",
            source,
        })
    }

    /// Compiles the exclusion pattern, if any.
    ///
    /// # Errors
    /// Returns `InvalidPattern` if the pattern does not compile.
    pub fn exclusion_regex(&self) -> Result<Option<Regex>, ConfigError> {
        self.exclusion
            .as_deref()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        field: "grouping.exclusion",
                        source,
                    })
            })
            .transpose()
    }
}

/// View cache location and naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory of the file-backed cache.
    pub root: PathBuf,
    /// Keys longer than this are stored under a hashed file name.
    pub max_file_name_len: usize,
    /// Whether to fsync every published blob.
    pub sync_on_write: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("widgetcache"),
            max_file_name_len: 200,
            sync_on_write: true,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    pub alias: AliasConfig,
    pub grouping: GroupingConfig,
    pub cache: CacheConfig,
}

impl ConsolidationConfig {
    // Leaves room for the ".blob.<uuid>.tmp" staging suffix under a 255-byte limit.
    const MAX_FILE_NAME_LEN: usize = 200;
    const MIN_FILE_NAME_LEN: usize = 16;

    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    /// Returns a parse error or the first validation failure.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()
    }

    /// Reads and validates a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks ranges and compiles patterns.
    ///
    /// # Errors
    /// Returns the first invalid setting.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.alias.max_hops == 0 {
            return Err(ConfigError::OutOfRange {
                field: "alias.max_hops",
                requirement: "at least 1",
                actual: self.alias.max_hops.to_string(),
            });
        }

        if self.grouping.look_ahead == 0 {
            return Err(ConfigError::OutOfRange {
                field: "grouping.look_ahead",
                requirement: "at least 1",
                actual: self.grouping.look_ahead.to_string(),
            });
        }

        let t = self.grouping.similarity_threshold;
        if !(0.0..1.0).contains(&t) {
            return Err(ConfigError::OutOfRange {
                field: "grouping.similarity_threshold",
                requirement: "in [0.0, 1.0)",
                actual: t.to_string(),
            });
        }

        let n = self.cache.max_file_name_len;
        if !(Self::MIN_FILE_NAME_LEN..=Self::MAX_FILE_NAME_LEN).contains(&n) {
            return Err(ConfigError::OutOfRange {
                field: "cache.max_file_name_len",
                requirement: "between 16 and 200",
                actual: n.to_string(),
            });
        }

        self.grouping.prefix_regex()?;
        self.grouping.exclusion_regex()?;

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = ConsolidationConfig::default().validate().unwrap();
        assert_eq!(cfg.grouping.look_ahead, 9);
        assert!((cfg.grouping.similarity_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.alias.max_hops, DEFAULT_MAX_HOPS);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = ConsolidationConfig::from_toml_str(
            "[grouping]\nlook_ahead = 4\n\n[cache]\nroot = \"/tmp/cc\"\n",
        )
        .unwrap();
        assert_eq!(cfg.grouping.look_ahead, 4);
        assert!((cfg.grouping.similarity_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.cache.root, PathBuf::from("/tmp/cc"));
        assert_eq!(cfg.alias.max_hops, DEFAULT_MAX_HOPS);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = ConsolidationConfig::from_path(&path).unwrap_err();
        match err {
            ConfigError::Io { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_from_path_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consolidata.toml");
        std::fs::write(&path, "[grouping]\nlook_ahead = 4\n").unwrap();
        let cfg = ConsolidationConfig::from_path(&path).unwrap();
        assert_eq!(cfg.grouping.look_ahead, 4);
    }

    #[test]
    fn test_rejects_zero_look_ahead() {
        let err = ConsolidationConfig::from_toml_str("[grouping]\nlook_ahead = 0\n").unwrap_err();
        assert!(err.to_string().contains("look_ahead"));
    }

    #[test]
    fn test_rejects_threshold_of_one() {
        let mut cfg = ConsolidationConfig::default();
        cfg.grouping.similarity_threshold = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_pattern() {
        let mut cfg = ConsolidationConfig::default();
        cfg.grouping.exclusion = Some("(unclosed".to_string());
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { field: "grouping.exclusion", .. }));
    }

    #[test]
    fn test_exclusion_is_case_insensitive() {
        let re = GroupingConfig::default().exclusion_regex().unwrap().unwrap();
        assert!(re.is_match("Graduate RESEARCH   Fellowship Program"));
    }
}
