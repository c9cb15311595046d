//! Title normalization for proposal grouping.
//!
//! One policy applies everywhere titles are compared: optionally strip the
//! collaborative-filing prefix, lower-case, trim, and collapse whitespace
//! runs to a single space.

use regex::Regex;

use crate::config::GroupingConfig;
use crate::error::ConfigError;

/// Compiled normalization and exclusion rules.
#[derive(Debug, Clone)]
pub struct TitleNormalizer {
    prefix: Option<Regex>,
    exclusion: Option<Regex>,
}

impl TitleNormalizer {
    /// Compiles the rules from `config`. The prefix is only stripped when
    /// `strip_prefix` is set.
    ///
    /// # Errors
    /// Returns `InvalidPattern` if a configured pattern does not compile.
    pub fn from_config(config: &GroupingConfig, strip_prefix: bool) -> Result<Self, ConfigError> {
        let prefix = if strip_prefix {
            Some(config.prefix_regex()?)
        } else {
            None
        };
        Ok(Self {
            prefix,
            exclusion: config.exclusion_regex()?,
        })
    }

    /// Returns true when the raw title must not take part in grouping.
    #[must_use]
    pub fn is_excluded(&self, raw: &str) -> bool {
        self.exclusion.as_ref().is_some_and(|re| re.is_match(raw))
    }

    /// Normalized comparison form of `raw`.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let lowered = raw.to_lowercase();
        let stripped = match &self.prefix {
            Some(re) => re.replace(lowered.trim_start(), ""),
            None => std::borrow::Cow::Borrowed(lowered.as_str()),
        };
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
