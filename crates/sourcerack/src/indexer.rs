//! Commit indexing orchestration.
//!
//! Drives parse -> extract -> store -> endpoints per file, sequentially
//! within a commit, then runs the usage linker and marks the commit
//! complete. Per-file failures (grammar, parse, extraction) are logged and
//! skipped; the commit still completes. Cancellation is honored between
//! files: the in-flight transaction aborts with its file, the commit is
//! marked failed, and the partial state is safe to discard by deleting the
//! commit.

use crate::error::{FileStatus, IndexError};
use crate::linker::link_commit;
use crate::store::{CommitStatus, SqiStore};
use sourcerack_core::{parse_source, Language, ParseError};
use sourcerack_endpoints::{extractors_for_file, EndpointRecord};
use sourcerack_languages::{extractor_for, Extraction};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub commit_id: i64,
    pub files: Vec<(String, FileStatus)>,
    pub symbols: usize,
    pub usages: usize,
    pub imports: usize,
    pub endpoints: usize,
    pub cancelled: bool,
}

impl IndexReport {
    pub fn indexed_count(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, status)| *status == FileStatus::Indexed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.files.len() - self.indexed_count()
    }
}

pub struct Indexer<'a> {
    store: &'a SqiStore,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a SqiStore) -> Self {
        Self { store }
    }

    /// Index a batch of (path, content) pairs as one commit.
    pub async fn index_commit(
        &self,
        repo_id: i64,
        sha: &str,
        files: &[(String, String)],
        cancel: Option<&CancelFlag>,
    ) -> Result<IndexReport, IndexError> {
        let commit_id = self.store.start_indexing(repo_id, sha).await?;
        let mut report = IndexReport {
            commit_id,
            ..Default::default()
        };

        for (path, content) in files {
            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                self.store
                    .set_commit_status(commit_id, CommitStatus::Failed)
                    .await?;
                report.cancelled = true;
                tracing::debug!(sha, "indexing cancelled between files");
                return Ok(report);
            }
            let status = self.index_file(commit_id, path, content, &mut report).await?;
            report.files.push((path.clone(), status));
        }

        link_commit(self.store, commit_id).await?;
        self.store
            .set_commit_status(commit_id, CommitStatus::Complete)
            .await?;
        Ok(report)
    }

    /// Index a commit incrementally: carry unchanged data forward from a
    /// previously completed commit, then index only the changed files.
    pub async fn index_commit_incremental(
        &self,
        repo_id: i64,
        sha: &str,
        base_sha: &str,
        changed: &[(String, String)],
        deleted: &[String],
        cancel: Option<&CancelFlag>,
    ) -> Result<IndexReport, IndexError> {
        let base = self
            .store
            .get_indexed_commit(repo_id, base_sha)
            .await?
            .filter(|c| c.status == CommitStatus::Complete)
            .ok_or_else(|| IndexError::MissingBaseCommit(base_sha.to_string()))?;

        let commit_id = self.store.start_indexing(repo_id, sha).await?;
        let mut report = IndexReport {
            commit_id,
            ..Default::default()
        };

        let mut excluded: Vec<String> = changed.iter().map(|(p, _)| p.clone()).collect();
        excluded.extend(deleted.iter().cloned());
        let copied = self
            .store
            .copy_unchanged_data(base.id, commit_id, &excluded)
            .await?;
        report.symbols += copied.symbols;
        report.usages += copied.usages;
        report.imports += copied.imports;
        report.endpoints += copied.endpoints;

        for (path, content) in changed {
            if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
                self.store
                    .set_commit_status(commit_id, CommitStatus::Failed)
                    .await?;
                report.cancelled = true;
                return Ok(report);
            }
            let status = self.index_file(commit_id, path, content, &mut report).await?;
            report.files.push((path.clone(), status));
        }

        link_commit(self.store, commit_id).await?;
        self.store
            .set_commit_status(commit_id, CommitStatus::Complete)
            .await?;
        Ok(report)
    }

    async fn index_file(
        &self,
        commit_id: i64,
        path: &str,
        content: &str,
        report: &mut IndexReport,
    ) -> Result<FileStatus, IndexError> {
        let lang = match Language::from_path(Path::new(path)) {
            Some(l) => l,
            None => return Ok(FileStatus::SkippedUnsupportedLanguage),
        };

        let tree = match parse_source(lang, content) {
            Ok(t) => t,
            Err(ParseError::GrammarUnavailable(_)) => {
                tracing::warn!(path, language = lang.name(), "grammar unavailable, skipping");
                return Ok(FileStatus::SkippedGrammarUnavailable);
            }
            Err(ParseError::ParseFailed(_)) => {
                tracing::warn!(path, language = lang.name(), "parse failed, skipping");
                return Ok(FileStatus::SkippedParseFailed);
            }
        };

        let extractor = match extractor_for(lang) {
            Some(e) => e,
            None => return Ok(FileStatus::SkippedUnsupportedLanguage),
        };

        let extracted: Option<(Extraction, Vec<EndpointRecord>)> =
            std::panic::catch_unwind(AssertUnwindSafe(|| {
                let extraction = extractor.extract(&tree, path, content);
                let mut endpoints = Vec::new();
                for endpoint_extractor in extractors_for_file(path, &extraction.imports) {
                    endpoints.extend(endpoint_extractor.extract(
                        &tree,
                        path,
                        content,
                        &extraction.imports,
                    ));
                }
                (extraction, endpoints)
            }))
            .ok();

        let (extraction, endpoints) = match extracted {
            Some(result) => result,
            None => {
                tracing::warn!(path, "extraction failed, skipping");
                return Ok(FileStatus::SkippedExtractionFailed);
            }
        };

        let stats = self
            .store
            .insert_file_extraction(commit_id, path, &extraction, &endpoints)
            .await?;
        report.symbols += stats.symbols;
        report.usages += stats.usages;
        report.imports += stats.imports;
        report.endpoints += stats.endpoints;
        Ok(FileStatus::Indexed)
    }
}
