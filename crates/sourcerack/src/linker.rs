//! Cross-file usage linking.
//!
//! Runs once after all files of a commit are inserted. Step 1 resolves each
//! usage's enclosing symbol (the innermost definition containing its line)
//! with a single in-store UPDATE. Step 2 resolves import specifiers to file
//! paths within the commit, then resolves each usage's definition symbol
//! with the tier order: same file, import-binding match, exported candidate,
//! any candidate. Ties break on path distance then lower symbol id. Linker
//! failures are silent; unresolved usages stay queryable by name.

use crate::store::{SqiStore, SymbolRow};
use libsql::params;
use std::collections::{HashMap, HashSet};

/// Row counts written by a linking pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkStats {
    pub enclosing_linked: usize,
    pub definitions_linked: usize,
    pub imports_resolved: usize,
}

/// Link all usages of a completed commit.
pub async fn link_commit(store: &SqiStore, commit_id: i64) -> Result<LinkStats, libsql::Error> {
    let conn = store.connection();
    let mut stats = LinkStats::default();

    // Step 1: enclosing symbols, innermost wins (largest start_line).
    conn.execute(
        "UPDATE usages SET enclosing_symbol_id = (
             SELECT s.id FROM symbols s
             WHERE s.commit_id = usages.commit_id
               AND s.file_path = usages.file_path
               AND s.start_line <= usages.line
               AND s.end_line >= usages.line
             ORDER BY s.start_line DESC, s.id DESC
             LIMIT 1)
         WHERE commit_id = ?1",
        params![commit_id],
    )
    .await?;
    {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM usages WHERE commit_id = ?1 AND enclosing_symbol_id IS NOT NULL",
                params![commit_id],
            )
            .await?;
        if let Some(row) = rows.next().await? {
            stats.enclosing_linked = row.get::<i64>(0)? as usize;
        }
    }

    // Step 2a: resolve import specifiers against the commit's file set.
    let files: HashSet<String> = store.files_in_commit(commit_id).await?.into_iter().collect();
    let mut imports = store.all_imports(commit_id).await?;
    for import in &mut imports {
        if import.resolved_path.is_some() {
            continue;
        }
        let resolved = resolve_specifier(
            &import.import_type,
            &import.module_specifier,
            &import.file_path,
            &files,
        );
        if let Some(resolved) = resolved {
            store.set_import_resolved_path(import.id, &resolved).await?;
            import.resolved_path = Some(resolved);
            stats.imports_resolved += 1;
        }
    }

    // Step 2b: definition resolution per distinct (file, name) usage group.
    let symbols = store.all_symbols(commit_id).await?;
    let mut by_name: HashMap<&str, Vec<&SymbolRow>> = HashMap::new();
    for symbol in &symbols {
        by_name.entry(symbol.name.as_str()).or_default().push(symbol);
    }

    // (usage file, local name) -> file the binding's import resolves to.
    let mut binding_targets: HashMap<(String, String), String> = HashMap::new();
    for import in &imports {
        let resolved = match &import.resolved_path {
            Some(r) => r,
            None => continue,
        };
        for binding in &import.bindings {
            binding_targets.insert(
                (import.file_path.clone(), binding.local_name.clone()),
                resolved.clone(),
            );
        }
    }

    let mut groups: Vec<(String, String)> = Vec::new();
    {
        let mut rows = conn
            .query(
                "SELECT DISTINCT file_path, symbol_name FROM usages WHERE commit_id = ?1",
                params![commit_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            groups.push((row.get(0)?, row.get(1)?));
        }
    }

    for (file, name) in groups {
        let candidates = match by_name.get(name.as_str()) {
            Some(c) if !c.is_empty() => c,
            _ => continue,
        };
        let chosen = resolve_definition(candidates, &file, &name, &binding_targets);
        if let Some(symbol_id) = chosen {
            let updated = conn
                .execute(
                    "UPDATE usages SET definition_symbol_id = ?1
                     WHERE commit_id = ?2 AND file_path = ?3 AND symbol_name = ?4",
                    params![symbol_id, commit_id, file, name],
                )
                .await?;
            stats.definitions_linked += updated as usize;
        }
    }

    Ok(stats)
}

/// Tiered candidate selection: (a) same file, (b) import-binding match,
/// (c) exported anywhere, (d) any candidate. Ties break on path distance
/// then lower symbol id.
fn resolve_definition(
    candidates: &[&SymbolRow],
    usage_file: &str,
    usage_name: &str,
    binding_targets: &HashMap<(String, String), String>,
) -> Option<i64> {
    let same_file: Vec<&&SymbolRow> = candidates
        .iter()
        .filter(|c| c.file_path == usage_file)
        .collect();
    if !same_file.is_empty() {
        return pick(usage_file, &same_file);
    }

    if let Some(target_file) =
        binding_targets.get(&(usage_file.to_string(), usage_name.to_string()))
    {
        let bound: Vec<&&SymbolRow> = candidates
            .iter()
            .filter(|c| &c.file_path == target_file)
            .collect();
        if !bound.is_empty() {
            return pick(usage_file, &bound);
        }
    }

    let exported: Vec<&&SymbolRow> = candidates.iter().filter(|c| c.is_exported).collect();
    if !exported.is_empty() {
        return pick(usage_file, &exported);
    }

    let all: Vec<&&SymbolRow> = candidates.iter().collect();
    pick(usage_file, &all)
}

fn pick(usage_file: &str, candidates: &[&&SymbolRow]) -> Option<i64> {
    candidates
        .iter()
        .min_by_key(|c| (path_distance(usage_file, &c.file_path), c.id))
        .map(|c| c.id)
}

/// Number of path components not shared between two files.
fn path_distance(a: &str, b: &str) -> usize {
    let a_parts: Vec<&str> = a.split('/').collect();
    let b_parts: Vec<&str> = b.split('/').collect();
    let common = a_parts
        .iter()
        .zip(b_parts.iter())
        .take_while(|(x, y)| x == y)
        .count();
    (a_parts.len() - common) + (b_parts.len() - common)
}

// ============================================================================
// Import specifier resolution
// ============================================================================

/// Resolve a module specifier to a file path present in the commit.
fn resolve_specifier(
    import_type: &str,
    specifier: &str,
    from_file: &str,
    files: &HashSet<String>,
) -> Option<String> {
    match import_type {
        "es_import" | "commonjs" => resolve_ecmascript(specifier, from_file, files),
        "python" => resolve_python(specifier, from_file, files),
        "require" => resolve_require(specifier, files),
        "require_relative" => {
            let joined = join_relative(from_file, specifier)?;
            first_present(files, &[format!("{}.rb", joined), joined.clone()])
        }
        "dart" => resolve_dart(specifier, from_file, files),
        _ => None,
    }
}

fn resolve_ecmascript(
    specifier: &str,
    from_file: &str,
    files: &HashSet<String>,
) -> Option<String> {
    if !specifier.starts_with('.') {
        return None;
    }
    let joined = join_relative(from_file, specifier)?;
    let mut candidates = vec![joined.clone()];
    for ext in ["ts", "tsx", "js", "jsx", "mts", "mjs", "cjs"] {
        candidates.push(format!("{}.{}", joined, ext));
    }
    for ext in ["ts", "tsx", "js", "jsx"] {
        candidates.push(format!("{}/index.{}", joined, ext));
    }
    first_present(files, &candidates)
}

fn resolve_python(specifier: &str, from_file: &str, files: &HashSet<String>) -> Option<String> {
    if let Some(stripped) = specifier.strip_prefix('.') {
        // Relative: each extra leading dot walks one directory up.
        let dots = 1 + stripped.chars().take_while(|c| *c == '.').count();
        let rest = specifier.trim_start_matches('.');
        let mut base: Vec<&str> = from_file.split('/').collect();
        base.pop(); // file name
        for _ in 1..dots {
            base.pop()?;
        }
        let mut prefix = base.join("/");
        if !rest.is_empty() {
            let rel = rest.replace('.', "/");
            prefix = if prefix.is_empty() {
                rel
            } else {
                format!("{}/{}", prefix, rel)
            };
            return first_present(
                files,
                &[format!("{}.py", prefix), format!("{}/__init__.py", prefix)],
            );
        }
        return first_present(files, &[format!("{}/__init__.py", prefix)]);
    }

    let rel = specifier.replace('.', "/");
    first_present(
        files,
        &[
            format!("{}.py", rel),
            format!("{}/__init__.py", rel),
            format!("src/{}.py", rel),
            format!("src/{}/__init__.py", rel),
        ],
    )
}

fn resolve_require(specifier: &str, files: &HashSet<String>) -> Option<String> {
    first_present(
        files,
        &[
            format!("{}.rb", specifier),
            format!("lib/{}.rb", specifier),
            specifier.to_string(),
        ],
    )
}

fn resolve_dart(specifier: &str, from_file: &str, files: &HashSet<String>) -> Option<String> {
    if let Some(path_part) = specifier.strip_prefix("package:") {
        let without_pkg = path_part.splitn(2, '/').nth(1)?;
        return first_present(files, &[format!("lib/{}", without_pkg)]);
    }
    if specifier.starts_with("dart:") {
        return None;
    }
    let joined = join_relative(from_file, specifier)?;
    first_present(files, &[joined])
}

fn first_present(files: &HashSet<String>, candidates: &[String]) -> Option<String> {
    candidates.iter().find(|c| files.contains(*c)).cloned()
}

/// Join a relative specifier against the importing file's directory,
/// normalizing `.` and `..` segments.
fn join_relative(from_file: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = from_file.split('/').collect();
    parts.pop(); // file name
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn ecmascript_relative_resolution() {
        let fs = files(&["src/service.ts", "src/lib/index.ts"]);
        assert_eq!(
            resolve_specifier("es_import", "./service", "src/app.ts", &fs),
            Some("src/service.ts".to_string())
        );
        assert_eq!(
            resolve_specifier("es_import", "./lib", "src/app.ts", &fs),
            Some("src/lib/index.ts".to_string())
        );
        assert_eq!(
            resolve_specifier("es_import", "express", "src/app.ts", &fs),
            None
        );
    }

    #[test]
    fn python_module_resolution() {
        let fs = files(&["pkg/models.py", "pkg/sub/__init__.py", "src/util.py"]);
        assert_eq!(
            resolve_specifier("python", "pkg.models", "main.py", &fs),
            Some("pkg/models.py".to_string())
        );
        assert_eq!(
            resolve_specifier("python", "pkg.sub", "main.py", &fs),
            Some("pkg/sub/__init__.py".to_string())
        );
        assert_eq!(
            resolve_specifier("python", "util", "main.py", &fs),
            Some("src/util.py".to_string())
        );
        assert_eq!(
            resolve_specifier("python", ".models", "pkg/app.py", &fs),
            Some("pkg/models.py".to_string())
        );
    }

    #[test]
    fn ruby_and_dart_resolution() {
        let fs = files(&["lib/helpers.rb", "app/format.rb", "lib/src/cart.dart"]);
        assert_eq!(
            resolve_specifier("require", "helpers", "main.rb", &fs),
            Some("lib/helpers.rb".to_string())
        );
        assert_eq!(
            resolve_specifier("require_relative", "format", "app/main.rb", &fs),
            Some("app/format.rb".to_string())
        );
        assert_eq!(
            resolve_specifier("dart", "package:shop/src/cart.dart", "lib/main.dart", &fs),
            Some("lib/src/cart.dart".to_string())
        );
    }

    #[test]
    fn path_distance_prefers_siblings() {
        assert_eq!(path_distance("src/a.ts", "src/b.ts"), 2);
        assert_eq!(path_distance("src/a.ts", "src/deep/nested/b.ts"), 4);
        assert!(
            path_distance("src/a.ts", "src/b.ts") < path_distance("src/a.ts", "other/b.ts")
        );
    }

    #[test]
    fn parent_directory_join() {
        assert_eq!(
            join_relative("src/app/main.ts", "../shared/util"),
            Some("src/shared/util".to_string())
        );
        assert_eq!(join_relative("a.ts", ".."), None);
    }
}
