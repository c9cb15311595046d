//! Error types for consolidata.
//!
//! Every layer has its own `thiserror` enum; they all convert into
//! [`ConsolidationError`] so callers can match on the failure class.
//! Nothing in this crate retries: every operation is one-shot.

use thiserror::Error;

use crate::storage::StorageError;

/// Alias-chain resolution failures.
///
/// Ids are rendered to strings so the error is independent of the id type
/// that was being resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasChainError {
    #[error("alias cycle starting at {start}: {}", .path.join(" -> "))]
    Cycle {
        start: String,
        path: Vec<String>,
    },

    #[error("alias chain starting at {start} exceeded hop limit {limit}")]
    HopLimitExceeded {
        start: String,
        limit: usize,
    },
}

impl AliasChainError {
    /// The id whose resolution failed.
    #[must_use]
    pub fn start(&self) -> &str {
        match self {
            Self::Cycle { start, .. } | Self::HopLimitExceeded { start, .. } => start,
        }
    }
}

/// Failures reported by the row provider collaborator.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("row provider query '{operation}' failed: {message}")]
    QueryFailed {
        operation: String,
        message: String,
    },

    #[error("row provider returned a malformed row for '{operation}': {message}")]
    MalformedRow {
        operation: String,
        message: String,
    },
}

impl UpstreamError {
    /// Creates a query failure for the named provider operation.
    #[must_use]
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed-row failure for the named provider operation.
    #[must_use]
    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRow {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'{field}' must be {requirement} (got {actual})")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        actual: String,
    },

    #[error("'{field}' is not a valid regular expression: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error type for consolidata.
#[derive(Debug, Error)]
pub enum ConsolidationError {
    /// A shared reference artifact is absent. Callers on the compute path
    /// treat this as "not computed yet".
    #[error("reference data '{artifact}' has not been computed")]
    MissingReferenceData {
        artifact: String,
    },

    /// Reference data was requested before any materialization ever ran.
    #[error("cache is not initialized: '{artifact}' requested before the first materialization")]
    NotInitialized {
        artifact: String,
    },

    /// A snapshot field was requested for a fingerprint that is not cached.
    #[error("no cached snapshot for fingerprint '{fingerprint}'")]
    SnapshotMissing {
        fingerprint: String,
    },

    #[error("inconsistent alias chain: {0}")]
    AliasChain(#[from] AliasChainError),

    #[error("upstream query failure: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ConsolidationError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for a missing shared reference artifact.
    #[must_use]
    pub const fn is_missing_reference(&self) -> bool {
        matches!(self, Self::MissingReferenceData { .. })
    }

    /// Returns true when the cache has never been initialized.
    #[must_use]
    pub const fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized { .. })
    }

    /// Returns true for cycle / hop-limit failures.
    #[must_use]
    pub const fn is_alias_chain(&self) -> bool {
        matches!(self, Self::AliasChain(_))
    }

    /// Returns true for row-provider failures.
    #[must_use]
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Always false: consolidation operations are one-shot.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for consolidata operations.
pub type ConsolidationResult<T> = Result<T, ConsolidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = AliasChainError::Cycle {
            start: "1".to_string(),
            path: vec!["1".to_string(), "2".to_string(), "1".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 -> 2 -> 1"));
        assert_eq!(err.start(), "1");
    }

    #[test]
    fn test_hop_limit_message() {
        let err = AliasChainError::HopLimitExceeded {
            start: "7".to_string(),
            limit: 4,
        };
        assert!(err.to_string().contains("hop limit 4"));
    }

    #[test]
    fn test_from_alias_chain() {
        let err: ConsolidationError = AliasChainError::HopLimitExceeded {
            start: "7".to_string(),
            limit: 4,
        }
        .into();
        assert!(err.is_alias_chain());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_upstream() {
        let err: ConsolidationError = UpstreamError::query("people_in_bucket", "timeout").into();
        assert!(err.is_upstream());
        let msg = err.to_string();
        assert!(msg.contains("people_in_bucket"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_reference_predicates() {
        let missing = ConsolidationError::MissingReferenceData {
            artifact: "concept".to_string(),
        };
        assert!(missing.is_missing_reference());
        let uninit = ConsolidationError::NotInitialized {
            artifact: "concept".to_string(),
        };
        assert!(uninit.is_not_initialized());
        assert!(uninit.to_string().contains("concept"));
    }

    #[test]
    fn test_internal() {
        let err = ConsolidationError::internal("unexpected state");
        assert!(err.to_string().contains("unexpected state"));
    }
}
