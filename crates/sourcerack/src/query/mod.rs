//! Public query surface.
//!
//! Every operation resolves (repository path, commit reference) through the
//! registry and the external commit source, rejects commits that are not
//! indexed as complete, and then delegates to the store. Failures become
//! structured [`QueryError`] values; they never cross the API as panics.

mod summary;

pub use summary::{CodebaseSummary, DependencyEdge, DependencyGraph, SummaryTotals};

use crate::error::QueryError;
use crate::git::CommitSource;
use crate::store::{
    DeadSymbol, DocstringRow, EndpointRow, FuzzyMatch, ImpactEntry, ImportRow, IndexedCommit,
    ParameterRow, Repository, SqiStore, SymbolRow, UsageRow,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Which way a hierarchy query walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyDirection {
    Children,
    Parents,
    Both,
}

/// Definition lookup result: exact matches plus, when fuzzy search is on,
/// similar names with scores. The fuzzy list never repeats the exact name.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionResult {
    pub exact: Vec<SymbolRow>,
    pub fuzzy: Vec<FuzzyMatch>,
}

/// One usage with its context snippet and enclosing symbol.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSite {
    pub usage: UsageRow,
    /// Qualified name of the enclosing symbol, when linked.
    pub enclosing: Option<String>,
    /// +-1 line of file content around the usage; empty when the file cannot
    /// be read at the commit.
    pub context: Option<String>,
}

/// Usages grouped under a similar name.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarUsages {
    pub name: String,
    pub similarity: f64,
    pub usages: Vec<UsageSite>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsagesResult {
    pub exact: Vec<UsageSite>,
    pub similar: Vec<SimilarUsages>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyResult {
    pub symbol: SymbolRow,
    pub children: Vec<SymbolRow>,
    /// Parent chain, innermost first, up to the root.
    pub parents: Vec<SymbolRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactResult {
    pub symbol: SymbolRow,
    pub direct_usages: Vec<UsageSite>,
    pub transitive_impact: Vec<ImpactEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolContext {
    pub symbol: SymbolRow,
    pub parameters: Vec<ParameterRow>,
    pub docstring: Option<DocstringRow>,
    /// Enclosing symbols, innermost first.
    pub parent_chain: Vec<SymbolRow>,
    pub usage_count: usize,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub total: usize,
    pub by_method: Vec<(String, usize)>,
    pub by_framework: Vec<(String, usize)>,
}

/// A cross-repo result row, tagged with its originating repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepoTagged<T> {
    pub repo: Repository,
    pub commit_sha: String,
    pub result: T,
}

pub(crate) struct ResolvedCommit {
    pub repo: Repository,
    pub commit: IndexedCommit,
}

pub struct QueryEngine<'a> {
    store: &'a SqiStore,
    sources: HashMap<String, Arc<dyn CommitSource>>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(store: &'a SqiStore) -> Self {
        Self {
            store,
            sources: HashMap::new(),
        }
    }

    /// Attach a commit source for a repository path. Without one, commit
    /// references are treated as opaque shas.
    pub fn register_source(&mut self, repo_path: &str, source: Arc<dyn CommitSource>) {
        self.sources.insert(repo_path.to_string(), source);
    }

    async fn resolve(
        &self,
        repo_path: &str,
        reference: &str,
    ) -> Result<ResolvedCommit, QueryError> {
        let repo = self
            .store
            .get_repository_by_path(repo_path)
            .await?
            .ok_or_else(|| QueryError::RepositoryNotRegistered(repo_path.to_string()))?;

        let sha = match self.sources.get(repo_path) {
            Some(source) => source.resolve_ref(reference).map_err(|e| {
                QueryError::CommitNotResolvable {
                    reference: reference.to_string(),
                    reason: e.to_string(),
                }
            })?,
            None => reference.to_string(),
        };

        let commit = self
            .store
            .get_indexed_commit(repo.id, &sha)
            .await?
            .ok_or_else(|| QueryError::CommitNotIndexed { sha: sha.clone() })?;
        if commit.status != crate::store::CommitStatus::Complete {
            return Err(QueryError::IndexingIncomplete {
                sha,
                status: commit.status.as_str().to_string(),
            });
        }
        Ok(ResolvedCommit { repo, commit })
    }

    // ========================================================================
    // Definitions and usages
    // ========================================================================

    pub async fn find_definition(
        &self,
        repo_path: &str,
        reference: &str,
        name: &str,
        kind: Option<&str>,
        fuzzy: bool,
        min_similarity: f64,
    ) -> Result<DefinitionResult, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let exact = self
            .store
            .find_symbols_by_name(resolved.commit.id, name, kind)
            .await?;
        let fuzzy_matches = if fuzzy {
            self.store
                .find_symbols_fuzzy(resolved.commit.id, name, min_similarity, 20, kind)
                .await?
                .into_iter()
                .filter(|m| m.symbol.name != name)
                .collect()
        } else {
            Vec::new()
        };
        Ok(DefinitionResult {
            exact,
            fuzzy: fuzzy_matches,
        })
    }

    pub async fn find_usages(
        &self,
        repo_path: &str,
        reference: &str,
        name: &str,
        file: Option<&str>,
        fuzzy: bool,
    ) -> Result<UsagesResult, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let rows = self
            .store
            .usages_by_name(resolved.commit.id, name, file)
            .await?;
        let exact = self.usage_sites(&resolved, rows).await?;

        let mut similar = Vec::new();
        if fuzzy {
            let matches = self
                .store
                .find_symbols_fuzzy(resolved.commit.id, name, 0.3, 10, None)
                .await?;
            let mut seen = std::collections::HashSet::new();
            seen.insert(name.to_string());
            for m in matches {
                if !seen.insert(m.symbol.name.clone()) {
                    continue;
                }
                let rows = self
                    .store
                    .usages_by_name(resolved.commit.id, &m.symbol.name, file)
                    .await?;
                if rows.is_empty() {
                    continue;
                }
                let usages = self.usage_sites(&resolved, rows).await?;
                similar.push(SimilarUsages {
                    name: m.symbol.name,
                    similarity: m.similarity,
                    usages,
                });
            }
        }

        Ok(UsagesResult { exact, similar })
    }

    async fn usage_sites(
        &self,
        resolved: &ResolvedCommit,
        rows: Vec<UsageRow>,
    ) -> Result<Vec<UsageSite>, QueryError> {
        let mut out = Vec::with_capacity(rows.len());
        for usage in rows {
            let enclosing = match usage.enclosing_symbol_id {
                Some(id) => self
                    .store
                    .symbol_by_id(id)
                    .await?
                    .map(|s| s.qualified_name),
                None => None,
            };
            let context = self.snippet(
                &resolved.repo.path,
                &resolved.commit.commit_sha,
                &usage.file_path,
                usage.line as usize,
            );
            out.push(UsageSite {
                usage,
                enclosing,
                context,
            });
        }
        Ok(out)
    }

    /// +-1 line of file content around a line. I/O failures yield `None`;
    /// the result is still returned.
    fn snippet(&self, repo_path: &str, sha: &str, file: &str, line: usize) -> Option<String> {
        let source = self.sources.get(repo_path)?;
        let bytes = match source.read_file(sha, file) {
            Ok(Some(b)) => b,
            _ => return None,
        };
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return None;
        }
        let start = line.saturating_sub(2);
        let end = line.min(lines.len().saturating_sub(1));
        if start > end {
            return None;
        }
        Some(lines[start..=end].join("\n"))
    }

    // ========================================================================
    // Hierarchy, imports, context
    // ========================================================================

    pub async fn find_hierarchy(
        &self,
        repo_path: &str,
        reference: &str,
        name: &str,
        direction: HierarchyDirection,
    ) -> Result<HierarchyResult, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let symbol = self
            .store
            .find_symbols_by_name(resolved.commit.id, name, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::SymbolNotFound(name.to_string()))?;

        let children = match direction {
            HierarchyDirection::Children | HierarchyDirection::Both => {
                self.store.children_of(symbol.id).await?
            }
            HierarchyDirection::Parents => Vec::new(),
        };
        let parents = match direction {
            HierarchyDirection::Parents | HierarchyDirection::Both => {
                self.parent_chain(&symbol).await?
            }
            HierarchyDirection::Children => Vec::new(),
        };

        Ok(HierarchyResult {
            symbol,
            children,
            parents,
        })
    }

    async fn parent_chain(&self, symbol: &SymbolRow) -> Result<Vec<SymbolRow>, QueryError> {
        let mut chain = Vec::new();
        let mut current = symbol.parent_symbol_id;
        while let Some(id) = current {
            match self.store.symbol_by_id(id).await? {
                Some(parent) => {
                    current = parent.parent_symbol_id;
                    chain.push(parent);
                }
                None => break,
            }
        }
        Ok(chain)
    }

    pub async fn find_imports(
        &self,
        repo_path: &str,
        reference: &str,
        file: &str,
    ) -> Result<Vec<ImportRow>, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        Ok(self.store.imports_for_file(resolved.commit.id, file).await?)
    }

    pub async fn find_importers(
        &self,
        repo_path: &str,
        reference: &str,
        module: &str,
    ) -> Result<Vec<ImportRow>, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        Ok(self.store.find_importers(resolved.commit.id, module).await?)
    }

    pub async fn get_symbol_context(
        &self,
        repo_path: &str,
        reference: &str,
        name: &str,
    ) -> Result<SymbolContext, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let symbol = self
            .store
            .find_symbols_by_name(resolved.commit.id, name, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::SymbolNotFound(name.to_string()))?;

        let parameters = self.store.parameters_for(symbol.id).await?;
        let docstring = self.store.docstring_for(symbol.id).await?;
        let parent_chain = self.parent_chain(&symbol).await?;
        let usage_count = self.store.usages_targeting(symbol.id).await?.len();
        let snippet = self.snippet(
            &resolved.repo.path,
            &resolved.commit.commit_sha,
            &symbol.file_path,
            symbol.start_line as usize,
        );

        Ok(SymbolContext {
            symbol,
            parameters,
            docstring,
            parent_chain,
            usage_count,
            snippet,
        })
    }

    // ========================================================================
    // Analyses
    // ========================================================================

    pub async fn find_dead_code(
        &self,
        repo_path: &str,
        reference: &str,
        exported_only: bool,
        limit: usize,
    ) -> Result<Vec<DeadSymbol>, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        Ok(self
            .store
            .get_dead_symbols(resolved.commit.id, exported_only, limit)
            .await?)
    }

    pub async fn analyze_change_impact(
        &self,
        repo_path: &str,
        reference: &str,
        name: &str,
        max_depth: usize,
    ) -> Result<ImpactResult, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let symbol = self
            .store
            .find_symbols_by_name(resolved.commit.id, name, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::SymbolNotFound(name.to_string()))?;

        let direct_rows = self.store.usages_targeting(symbol.id).await?;
        let direct_usages = self.usage_sites(&resolved, direct_rows).await?;
        let transitive_impact = self
            .store
            .get_transitive_impact(symbol.id, max_depth)
            .await?;

        Ok(ImpactResult {
            symbol,
            direct_usages,
            transitive_impact,
        })
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    pub async fn find_endpoints(
        &self,
        repo_path: &str,
        reference: &str,
        method: Option<&str>,
        framework: Option<&str>,
        path_contains: Option<&str>,
    ) -> Result<Vec<EndpointRow>, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        Ok(self
            .store
            .endpoints_for_commit(resolved.commit.id, method, framework, path_contains)
            .await?)
    }

    pub async fn get_endpoint_stats(
        &self,
        repo_path: &str,
        reference: &str,
    ) -> Result<EndpointStats, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let endpoints = self
            .store
            .endpoints_for_commit(resolved.commit.id, None, None, None)
            .await?;

        let mut by_method: HashMap<String, usize> = HashMap::new();
        let mut by_framework: HashMap<String, usize> = HashMap::new();
        for endpoint in &endpoints {
            *by_method.entry(endpoint.http_method.clone()).or_default() += 1;
            *by_framework.entry(endpoint.framework.clone()).or_default() += 1;
        }
        let mut by_method: Vec<(String, usize)> = by_method.into_iter().collect();
        let mut by_framework: Vec<(String, usize)> = by_framework.into_iter().collect();
        by_method.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        by_framework.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(EndpointStats {
            total: endpoints.len(),
            by_method,
            by_framework,
        })
    }

    // ========================================================================
    // Cross-repo variants
    // ========================================================================

    /// Repositories to iterate: all registered, or the named subset.
    async fn cross_repo_commits(
        &self,
        repo_ids: Option<&[i64]>,
    ) -> Result<Vec<(Repository, IndexedCommit)>, QueryError> {
        let mut out = Vec::new();
        for repo in self.store.list_repositories().await? {
            if let Some(ids) = repo_ids {
                if !ids.contains(&repo.id) {
                    continue;
                }
            }
            if let Some(commit) = self.store.latest_complete_commit(repo.id).await? {
                out.push((repo, commit));
            }
        }
        Ok(out)
    }

    pub async fn find_definition_all_repos(
        &self,
        name: &str,
        kind: Option<&str>,
        fuzzy: bool,
        min_similarity: f64,
        repo_ids: Option<&[i64]>,
    ) -> Result<Vec<RepoTagged<DefinitionResult>>, QueryError> {
        let mut out = Vec::new();
        for (repo, commit) in self.cross_repo_commits(repo_ids).await? {
            let exact = self.store.find_symbols_by_name(commit.id, name, kind).await?;
            let fuzzy_matches = if fuzzy {
                self.store
                    .find_symbols_fuzzy(commit.id, name, min_similarity, 20, kind)
                    .await?
                    .into_iter()
                    .filter(|m| m.symbol.name != name)
                    .collect()
            } else {
                Vec::new()
            };
            if exact.is_empty() && fuzzy_matches.is_empty() {
                continue;
            }
            out.push(RepoTagged {
                repo,
                commit_sha: commit.commit_sha.clone(),
                result: DefinitionResult {
                    exact,
                    fuzzy: fuzzy_matches,
                },
            });
        }
        Ok(out)
    }

    pub async fn find_endpoints_all_repos(
        &self,
        method: Option<&str>,
        framework: Option<&str>,
        repo_ids: Option<&[i64]>,
    ) -> Result<Vec<RepoTagged<Vec<EndpointRow>>>, QueryError> {
        let mut out = Vec::new();
        for (repo, commit) in self.cross_repo_commits(repo_ids).await? {
            let endpoints = self
                .store
                .endpoints_for_commit(commit.id, method, framework, None)
                .await?;
            if endpoints.is_empty() {
                continue;
            }
            out.push(RepoTagged {
                repo,
                commit_sha: commit.commit_sha.clone(),
                result: endpoints,
            });
        }
        Ok(out)
    }

    pub async fn find_dead_code_all_repos(
        &self,
        exported_only: bool,
        limit: usize,
        repo_ids: Option<&[i64]>,
    ) -> Result<Vec<RepoTagged<Vec<DeadSymbol>>>, QueryError> {
        let mut out = Vec::new();
        for (repo, commit) in self.cross_repo_commits(repo_ids).await? {
            let dead = self
                .store
                .get_dead_symbols(commit.id, exported_only, limit)
                .await?;
            if dead.is_empty() {
                continue;
            }
            out.push(RepoTagged {
                repo,
                commit_sha: commit.commit_sha.clone(),
                result: dead,
            });
        }
        Ok(out)
    }
}
