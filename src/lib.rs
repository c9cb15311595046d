//! # consolidata - Record consolidation for a bibliographic and grants catalog
//!
//! Catalog rows arrive with duplicated author identities and several
//! versions of the same proposal. This crate folds them together without
//! touching the source rows: it writes alias links and serves consolidated
//! views computed through those links.
//!
//! ## Core Concepts
//!
//! - **Alias link**: a directed `source → target` link naming the canonical
//!   record that replaces `source`
//! - **Author pass**: bucketed scan of person records that links name variants
//! - **Proposal pass**: groups near-identical proposal titles and links every
//!   member to the group's primary record
//! - **Snapshot**: per-request consolidated id sets and lookup tables, cached
//!   under a fingerprint of the request parameters
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use consolidata::provider::{CatalogData, InMemoryCatalog};
//! use consolidata::record::{AliasKind, DocumentAliasLink, DocumentId, DocumentRecord};
//! use consolidata::storage::InMemoryBlobStore;
//! use consolidata::Materializer;
//!
//! let catalog = Arc::new(InMemoryCatalog::new(CatalogData {
//!     documents: vec![
//!         DocumentRecord::new(10, "graph mining").in_ddp(1),
//!         DocumentRecord::new(11, "graph mining").in_ddp(1),
//!     ],
//!     document_aliases: vec![DocumentAliasLink {
//!         source: DocumentId(11),
//!         target: DocumentId(10),
//!         kind: AliasKind::Modified,
//!     }],
//!     ..CatalogData::default()
//! }));
//! let materializer = Materializer::new(Arc::new(InMemoryBlobStore::new()), catalog.clone(), catalog);
//!
//! let params = serde_json::json!({"ddpID": 1, "mode": "current"});
//! let response = materializer.documents(params.as_object().unwrap())?;
//! assert_eq!(response.data, Some(vec![DocumentId(10)]));
//! # Ok::<(), consolidata::ConsolidationError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod alias;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod record;
pub mod similarity;

// Collaborators and persistence
pub mod provider;
pub mod storage;

// Passes and views
pub mod author;
pub mod materializer;
pub mod proposal;

pub use alias::{
    collapse_chains, expand_alias_closure, remove_aliased, resolve_chain, substitute_alias_closure,
    AliasMap, ChainResolver,
};
pub use author::{AuthorDisambiguator, DisambiguationReport, EnglishNameMatcher, NameMatcher};
pub use config::{AliasConfig, CacheConfig, ConsolidationConfig, GroupingConfig};
pub use error::{
    AliasChainError, ConfigError, ConsolidationError, ConsolidationResult, UpstreamError,
};
pub use fingerprint::Fingerprint;
pub use materializer::{CacheState, Materializer, Response, Snapshot, SnapshotField, ViewMode};
pub use proposal::{GroupingPass, GroupingReport, ProposalGroup, ProposalGrouper};
pub use record::{AliasKind, DocumentId, PersonId};
pub use similarity::similarity;
pub use storage::{BlobStore, InMemoryBlobStore, StorageError};
