//! Codebase summary and dependency graph.

use super::{QueryEngine, RepoTagged};
use crate::error::QueryError;
use crate::store::{Hotspot, ImportRow};
use serde::Serialize;
use sourcerack_core::Language;
use std::collections::HashMap;
use std::path::Path;

const ENTRY_POINT_STEMS: &[&str] = &["index", "main", "app", "server"];

#[derive(Debug, Clone, Serialize)]
pub struct SummaryTotals {
    pub files: usize,
    pub symbols: usize,
    pub usages: usize,
    pub imports: usize,
    pub endpoints: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodebaseSummary {
    pub totals: SummaryTotals,
    /// Files per language, by extension classifier, descending.
    pub languages: Vec<(String, usize)>,
    /// Top-level module names by file count, descending.
    pub top_modules: Vec<(String, usize)>,
    /// Files whose stem marks an entry point (index/main/app/server).
    pub entry_points: Vec<String>,
    /// Symbols ranked by inbound usage count.
    pub hotspots: Vec<Hotspot>,
    /// External packages by import count; scoped `@scope/name` preserved.
    pub external_dependencies: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub count: usize,
    /// "internal" for relative/absolute file targets, "external" for bare
    /// packages.
    pub kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<DependencyEdge>,
}

impl QueryEngine<'_> {
    pub async fn codebase_summary(
        &self,
        repo_path: &str,
        reference: &str,
    ) -> Result<CodebaseSummary, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let commit_id = resolved.commit.id;
        let store = self.store;

        let files = store.files_in_commit(commit_id).await?;
        let totals = SummaryTotals {
            files: files.len(),
            symbols: store.count_rows("symbols", commit_id).await?,
            usages: store.count_rows("usages", commit_id).await?,
            imports: store.count_rows("imports", commit_id).await?,
            endpoints: store.count_rows("endpoints", commit_id).await?,
        };

        let mut languages: HashMap<&'static str, usize> = HashMap::new();
        let mut top_modules: HashMap<String, usize> = HashMap::new();
        let mut entry_points = Vec::new();
        for file in &files {
            let path = Path::new(file);
            let language = Language::from_path(path)
                .map(|l| l.name())
                .unwrap_or("other");
            *languages.entry(language).or_default() += 1;

            *top_modules.entry(top_module_of(file)).or_default() += 1;

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if ENTRY_POINT_STEMS.contains(&stem) {
                entry_points.push(file.clone());
            }
        }

        let hotspots = store.get_hotspots(commit_id, 10).await?;

        let imports = store.all_imports(commit_id).await?;
        let mut external: HashMap<String, usize> = HashMap::new();
        for import in &imports {
            if import.resolved_path.is_some() {
                continue;
            }
            if let Some(package) = external_package(import) {
                *external.entry(package).or_default() += 1;
            }
        }

        Ok(CodebaseSummary {
            totals,
            languages: sorted_counts(languages.into_iter().map(|(k, v)| (k.to_string(), v))),
            top_modules: truncate(sorted_counts(top_modules.into_iter()), 10),
            entry_points,
            hotspots,
            external_dependencies: sorted_counts(external.into_iter()),
        })
    }

    pub async fn get_dependency_graph(
        &self,
        repo_path: &str,
        reference: &str,
        max_edges: usize,
    ) -> Result<DependencyGraph, QueryError> {
        let resolved = self.resolve(repo_path, reference).await?;
        let imports = self.store.all_imports(resolved.commit.id).await?;

        let mut counts: HashMap<(String, String, &'static str), usize> = HashMap::new();
        for import in &imports {
            let from = top_module_of(&import.file_path);
            let (to, kind) = match &import.resolved_path {
                Some(resolved) => (top_module_of(resolved), "internal"),
                None => match external_package(import) {
                    Some(package) => (package, "external"),
                    None => continue,
                },
            };
            if from == to && kind == "internal" {
                continue;
            }
            *counts.entry((from, to, kind)).or_default() += 1;
        }

        let mut edges: Vec<DependencyEdge> = counts
            .into_iter()
            .map(|((from, to, kind), count)| DependencyEdge {
                from,
                to,
                count,
                kind,
            })
            .collect();
        edges.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.from.cmp(&b.from))
                .then_with(|| a.to.cmp(&b.to))
        });
        edges.truncate(max_edges);

        let mut nodes = Vec::new();
        for edge in &edges {
            if !nodes.contains(&edge.from) {
                nodes.push(edge.from.clone());
            }
            if !nodes.contains(&edge.to) {
                nodes.push(edge.to.clone());
            }
        }

        Ok(DependencyGraph { nodes, edges })
    }

    pub async fn codebase_summary_all_repos(
        &self,
        repo_ids: Option<&[i64]>,
    ) -> Result<Vec<RepoTagged<CodebaseSummary>>, QueryError> {
        let mut out = Vec::new();
        for (repo, commit) in self.cross_repo_commits(repo_ids).await? {
            let summary = self
                .codebase_summary(&repo.path, &commit.commit_sha)
                .await?;
            out.push(RepoTagged {
                repo,
                commit_sha: commit.commit_sha.clone(),
                result: summary,
            });
        }
        Ok(out)
    }
}

/// First path segment, or the bare file stem for root-level files.
fn top_module_of(file: &str) -> String {
    match file.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => Path::new(file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file)
            .to_string(),
    }
}

/// External package name from a bare specifier. Scoped `@scope/name` keeps
/// both segments; Python keeps the first dotted segment; Dart `package:`
/// URIs keep the package name.
fn external_package(import: &ImportRow) -> Option<String> {
    let spec = import.module_specifier.as_str();
    match import.import_type.as_str() {
        "es_import" | "commonjs" => {
            if spec.starts_with('.') || spec.starts_with('/') {
                return None;
            }
            if let Some(rest) = spec.strip_prefix('@') {
                let mut parts = rest.splitn(3, '/');
                let scope = parts.next()?;
                let name = parts.next()?;
                return Some(format!("@{}/{}", scope, name));
            }
            Some(spec.split('/').next().unwrap_or(spec).to_string())
        }
        "python" => {
            if spec.starts_with('.') {
                return None;
            }
            Some(spec.split('.').next().unwrap_or(spec).to_string())
        }
        "require" => Some(spec.split('/').next().unwrap_or(spec).to_string()),
        "require_relative" => None,
        "dart" => {
            if let Some(rest) = spec.strip_prefix("package:") {
                return Some(rest.split('/').next().unwrap_or(rest).to_string());
            }
            if let Some(rest) = spec.strip_prefix("dart:") {
                return Some(format!("dart:{}", rest));
            }
            None
        }
        _ => None,
    }
}

fn sorted_counts(iter: impl Iterator<Item = (String, usize)>) -> Vec<(String, usize)> {
    let mut out: Vec<(String, usize)> = iter.collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

fn truncate(mut list: Vec<(String, usize)>, n: usize) -> Vec<(String, usize)> {
    list.truncate(n);
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ImportRow;

    fn import(import_type: &str, spec: &str) -> ImportRow {
        ImportRow {
            id: 0,
            commit_id: 0,
            file_path: "src/app.ts".to_string(),
            line: 1,
            import_type: import_type.to_string(),
            module_specifier: spec.to_string(),
            resolved_path: None,
            bindings: Vec::new(),
        }
    }

    #[test]
    fn external_package_names() {
        assert_eq!(
            external_package(&import("es_import", "express")),
            Some("express".to_string())
        );
        assert_eq!(
            external_package(&import("es_import", "@nestjs/common")),
            Some("@nestjs/common".to_string())
        );
        assert_eq!(
            external_package(&import("es_import", "lodash/fp")),
            Some("lodash".to_string())
        );
        assert_eq!(external_package(&import("es_import", "./local")), None);
        assert_eq!(
            external_package(&import("python", "rest_framework.views")),
            Some("rest_framework".to_string())
        );
        assert_eq!(
            external_package(&import("dart", "package:http/http.dart")),
            Some("http".to_string())
        );
    }

    #[test]
    fn top_modules() {
        assert_eq!(top_module_of("src/app.ts"), "src");
        assert_eq!(top_module_of("main.py"), "main");
    }
}
