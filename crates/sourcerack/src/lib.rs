//! SourceRack: a queryable structural index of source code, keyed by
//! (repository, commit).
//!
//! The pipeline per indexed commit: the parser façade turns each file into a
//! syntax tree, the per-language extractors emit language-neutral symbol /
//! usage / import records, the store persists them under one transaction per
//! file, framework extractors contribute HTTP endpoints when a file's
//! imports suggest one, and the usage linker fills cross-references once the
//! last file is in. The query engine then serves definitions, usages,
//! hierarchy, imports, summaries, dead code, impact, and endpoints against
//! completed commits. Unchanged files are carried forward between commits by
//! the copy-forward pass.

pub mod error;
pub mod git;
pub mod indexer;
pub mod linker;
pub mod paths;
pub mod query;
pub mod store;

pub use error::{ErrorBody, FileStatus, GitError, IndexError, QueryError};
pub use git::{CommitSource, GitRepo, StaticCommitSource};
pub use indexer::{CancelFlag, IndexReport, Indexer};
pub use linker::{link_commit, LinkStats};
pub use query::{
    CodebaseSummary, DefinitionResult, DependencyGraph, EndpointStats, HierarchyDirection,
    HierarchyResult, ImpactResult, QueryEngine, RepoTagged, SymbolContext, UsagesResult,
};
pub use store::{CommitStatus, SqiStore};

// Re-export the record layer for embedders.
pub use sourcerack_core::{GrammarStore, Language, ParseError};
pub use sourcerack_endpoints::{EndpointRecord, HttpMethod};
pub use sourcerack_languages::{Extraction, SymbolKind, UsageKind};
