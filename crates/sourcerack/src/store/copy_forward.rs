//! Incremental copy-forward of unchanged per-file data between commits.
//!
//! The only operation that must rewrite ids atomically: (1) clone
//! parent-less symbol rows and build the old-to-new id map, (2) fill parent
//! links from the map, (3) clone dependent tables through the map. All under
//! one transaction. Usage links whose target lived in an excluded file are
//! dropped to NULL; the linker rebuilds them when the changed files are
//! re-indexed.

use super::{SqiStore, SymbolRow, SYMBOL_COLS};
use libsql::params;
use std::collections::{HashMap, HashSet};

/// Row counts carried forward.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyStats {
    pub symbols: usize,
    pub usages: usize,
    pub imports: usize,
    pub endpoints: usize,
}

impl SqiStore {
    /// Clone every row of `source_commit` whose file is not excluded into
    /// `target_commit`, remapping symbol and import ids.
    pub async fn copy_unchanged_data(
        &self,
        source_commit: i64,
        target_commit: i64,
        excluded_files: &[String],
    ) -> Result<CopyStats, libsql::Error> {
        let excluded: HashSet<&str> = excluded_files.iter().map(|s| s.as_str()).collect();
        let keep = |file: &str| !excluded.contains(file);

        // Read everything up front; writes happen in one transaction below.
        let symbols: Vec<SymbolRow> = self
            .all_symbols(source_commit)
            .await?
            .into_iter()
            .filter(|s| keep(&s.file_path))
            .collect();

        let mut parameters: Vec<(i64, i64, String, Option<String>, bool)> = Vec::new();
        {
            let mut rows = self
                .conn
                .query(
                    "SELECT p.symbol_id, p.position, p.name, p.type_annotation, p.is_optional
                     FROM symbol_parameters p JOIN symbols s ON s.id = p.symbol_id
                     WHERE s.commit_id = ?1",
                    params![source_commit],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                parameters.push((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get::<i64>(4)? != 0,
                ));
            }
        }

        let mut docstrings: Vec<(i64, Option<String>, String, Option<String>)> = Vec::new();
        {
            let mut rows = self
                .conn
                .query(
                    "SELECT d.symbol_id, d.doc_type, d.raw_text, d.description
                     FROM symbol_docstrings d JOIN symbols s ON s.id = d.symbol_id
                     WHERE s.commit_id = ?1",
                    params![source_commit],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                docstrings.push((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?));
            }
        }

        let mut symbol_trigrams: Vec<(i64, String)> = Vec::new();
        {
            let mut rows = self
                .conn
                .query(
                    "SELECT t.symbol_id, t.trigram
                     FROM symbol_trigrams t JOIN symbols s ON s.id = t.symbol_id
                     WHERE s.commit_id = ?1",
                    params![source_commit],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                symbol_trigrams.push((row.get(0)?, row.get(1)?));
            }
        }

        let imports = self.all_imports(source_commit).await?;
        let usages = self.all_usages(source_commit).await?;
        let endpoints = self
            .endpoints_for_commit(source_commit, None, None, None)
            .await?;

        let tx = self.conn.transaction().await?;
        let mut stats = CopyStats::default();

        // 1. Clone symbols without parent links, building the id map.
        let mut symbol_map: HashMap<i64, i64> = HashMap::new();
        for symbol in &symbols {
            tx.execute(
                &format!(
                    "INSERT INTO symbols ({})
                     SELECT NULL, ?1, name, qualified_name, kind, file_path, start_line, end_line,
                            visibility, is_async, is_static, is_exported, return_type, NULL,
                            content_hash
                     FROM symbols WHERE id = ?2",
                    SYMBOL_COLS
                ),
                params![target_commit, symbol.id],
            )
            .await?;
            symbol_map.insert(symbol.id, tx.last_insert_rowid());
            stats.symbols += 1;
        }

        // 2. Fill parent links.
        for symbol in &symbols {
            if let Some(old_parent) = symbol.parent_symbol_id {
                let new_id = symbol_map.get(&symbol.id).copied();
                let new_parent = symbol_map.get(&old_parent).copied();
                if let (Some(new_id), Some(new_parent)) = (new_id, new_parent) {
                    tx.execute(
                        "UPDATE symbols SET parent_symbol_id = ?1 WHERE id = ?2",
                        params![new_parent, new_id],
                    )
                    .await?;
                }
            }
        }

        // 3. Dependent symbol tables.
        for (symbol_id, position, name, type_annotation, is_optional) in &parameters {
            if let Some(new_id) = symbol_map.get(symbol_id) {
                tx.execute(
                    "INSERT INTO symbol_parameters (symbol_id, position, name, type_annotation, is_optional)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        *new_id,
                        *position,
                        name.clone(),
                        type_annotation.clone(),
                        *is_optional as i64
                    ],
                )
                .await?;
            }
        }
        for (symbol_id, doc_type, raw_text, description) in &docstrings {
            if let Some(new_id) = symbol_map.get(symbol_id) {
                tx.execute(
                    "INSERT INTO symbol_docstrings (symbol_id, doc_type, raw_text, description)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![*new_id, doc_type.clone(), raw_text.clone(), description.clone()],
                )
                .await?;
            }
        }
        for (symbol_id, trigram) in &symbol_trigrams {
            if let Some(new_id) = symbol_map.get(symbol_id) {
                tx.execute(
                    "INSERT OR IGNORE INTO symbol_trigrams (symbol_id, trigram) VALUES (?1, ?2)",
                    params![*new_id, trigram.clone()],
                )
                .await?;
            }
        }

        // 4. Imports and their bindings.
        for import in imports.iter().filter(|i| keep(&i.file_path)) {
            tx.execute(
                "INSERT INTO imports (commit_id, file_path, line, import_type, module_specifier, resolved_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    target_commit,
                    import.file_path.clone(),
                    import.line,
                    import.import_type.clone(),
                    import.module_specifier.clone(),
                    import.resolved_path.clone(),
                ],
            )
            .await?;
            let new_import_id = tx.last_insert_rowid();
            stats.imports += 1;
            for (position, binding) in import.bindings.iter().enumerate() {
                tx.execute(
                    "INSERT INTO import_bindings (import_id, position, imported_name, local_name, is_type_only)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        new_import_id,
                        position as i64,
                        binding.imported_name.clone(),
                        binding.local_name.clone(),
                        binding.is_type_only as i64,
                    ],
                )
                .await?;
            }
        }

        // 5. Usages with remapped links.
        for usage in usages.iter().filter(|u| keep(&u.file_path)) {
            let enclosing = usage
                .enclosing_symbol_id
                .and_then(|id| symbol_map.get(&id).copied());
            let definition = usage
                .definition_symbol_id
                .and_then(|id| symbol_map.get(&id).copied());
            tx.execute(
                "INSERT INTO usages (commit_id, file_path, line, column_number, usage_kind,
                     symbol_name, enclosing_symbol_id, definition_symbol_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    target_commit,
                    usage.file_path.clone(),
                    usage.line,
                    usage.column,
                    usage.usage_kind.clone(),
                    usage.symbol_name.clone(),
                    enclosing,
                    definition,
                ],
            )
            .await?;
            stats.usages += 1;
        }

        // 6. Endpoints and their params.
        for endpoint in endpoints.iter().filter(|e| keep(&e.file_path)) {
            tx.execute(
                "INSERT INTO endpoints (commit_id, http_method, path, file_path, start_line,
                     end_line, framework, handler, handler_type, summary, description, tags,
                     middleware, dependencies, response_model, response_status, body_schema)
                 SELECT ?1, http_method, path, file_path, start_line, end_line, framework,
                        handler, handler_type, summary, description, tags, middleware,
                        dependencies, response_model, response_status, body_schema
                 FROM endpoints WHERE id = ?2",
                params![target_commit, endpoint.id],
            )
            .await?;
            let new_endpoint_id = tx.last_insert_rowid();
            stats.endpoints += 1;
            for (position, param) in endpoint.params.iter().enumerate() {
                tx.execute(
                    "INSERT INTO endpoint_params (endpoint_id, position, name, location, param_type, required)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        new_endpoint_id,
                        position as i64,
                        param.name.clone(),
                        param.location.clone(),
                        param.param_type.clone(),
                        param.required as i64,
                    ],
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(stats)
    }
}
