//! Error taxonomy for the query surface and the indexer.
//!
//! Queries never raise across the public API: every failure becomes a tagged
//! value with a stable code plus a human-readable message.

use serde::Serialize;

/// Failure of a query operation.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("repository not registered: {0}")]
    RepositoryNotRegistered(String),

    #[error("cannot resolve `{reference}`: {reason}")]
    CommitNotResolvable { reference: String, reason: String },

    #[error("commit {sha} is not indexed")]
    CommitNotIndexed { sha: String },

    #[error("commit {sha} indexing is {status}, not complete")]
    IndexingIncomplete { sha: String, status: String },

    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("no results")]
    NoResults,

    #[error("database error: {0}")]
    Database(#[from] libsql::Error),
}

impl QueryError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::RepositoryNotRegistered(_) => "repository-not-registered",
            QueryError::CommitNotResolvable { .. } => "commit-not-resolvable",
            QueryError::CommitNotIndexed { .. } => "commit-not-indexed",
            QueryError::IndexingIncomplete { .. } => "commit-indexing-incomplete",
            QueryError::SymbolNotFound(_) => "symbol-not-found",
            QueryError::NoResults => "no-results",
            QueryError::Database(_) => "database-error",
        }
    }

    /// Wire form for callers that serialize results.
    pub fn to_wire(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Serialized error: code + message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Failure of an indexing run. Per-file problems (read, grammar, parse,
/// extraction) are not errors: they are recorded as [`FileStatus`] and the
/// commit still completes.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("base commit {0} is not indexed as complete")]
    MissingBaseCommit(String),

    #[error("database error: {0}")]
    Database(#[from] libsql::Error),
}

/// Outcome of indexing one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Indexed,
    SkippedUnsupportedLanguage,
    SkippedGrammarUnavailable,
    SkippedParseFailed,
    SkippedExtractionFailed,
    SkippedReadFailed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Indexed => "indexed",
            FileStatus::SkippedUnsupportedLanguage => "unsupported language",
            FileStatus::SkippedGrammarUnavailable => "grammar unavailable",
            FileStatus::SkippedParseFailed => "parse failed",
            FileStatus::SkippedExtractionFailed => "extraction failed",
            FileStatus::SkippedReadFailed => "read failed",
        }
    }
}

/// Failure of the external git contract.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("reference not found: {0}")]
    RefNotFound(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            QueryError::RepositoryNotRegistered("x".into()).code(),
            "repository-not-registered"
        );
        assert_eq!(
            QueryError::CommitNotIndexed { sha: "abc".into() }.code(),
            "commit-not-indexed"
        );
        assert_eq!(QueryError::NoResults.code(), "no-results");
    }

    #[test]
    fn wire_form_carries_message() {
        let err = QueryError::SymbolNotFound("helper".into());
        let body = err.to_wire();
        assert_eq!(body.code, "symbol-not-found");
        assert!(body.message.contains("helper"));
    }
}
