//! SQI store: relational persistence for symbols, usages, imports, and
//! endpoints, keyed by (repository, commit).
//!
//! A single libsql database holds everything. All multi-row writes are
//! wrapped in a transaction so the database never observes a torn file or a
//! torn commit. On corruption the database is deleted and recreated.

mod analysis;
mod copy_forward;
mod fuzzy;
mod schema;

pub use analysis::{DeadSymbol, Hotspot, ImpactEntry};
pub use copy_forward::CopyStats;
pub use fuzzy::{trigrams, FuzzyMatch};

use libsql::{params, Connection, Database};
use schema::{COMMIT_DATA_TABLES, SCHEMA, SCHEMA_VERSION};
use serde::Serialize;
use sourcerack_endpoints::EndpointRecord;
use sourcerack_languages::Extraction;
use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A registered repository.
#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    pub id: i64,
    pub path: String,
    pub name: String,
}

/// Indexing state of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    InProgress,
    Complete,
    Failed,
}

impl CommitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStatus::InProgress => "in_progress",
            CommitStatus::Complete => "complete",
            CommitStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "complete" => CommitStatus::Complete,
            "failed" => CommitStatus::Failed,
            _ => CommitStatus::InProgress,
        }
    }
}

/// One indexed commit.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedCommit {
    pub id: i64,
    pub repo_id: i64,
    pub commit_sha: String,
    pub status: CommitStatus,
    pub indexed_at: i64,
}

/// A stored symbol row.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolRow {
    pub id: i64,
    pub commit_id: i64,
    pub name: String,
    pub qualified_name: String,
    pub kind: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub visibility: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_exported: bool,
    pub return_type: Option<String>,
    pub parent_symbol_id: Option<i64>,
    pub content_hash: Option<String>,
}

pub(crate) const SYMBOL_COLS: &str = "id, commit_id, name, qualified_name, kind, file_path, \
     start_line, end_line, visibility, is_async, is_static, is_exported, return_type, \
     parent_symbol_id, content_hash";

impl SymbolRow {
    pub(crate) fn from_row(row: &libsql::Row) -> Result<Self, libsql::Error> {
        Ok(SymbolRow {
            id: row.get(0)?,
            commit_id: row.get(1)?,
            name: row.get(2)?,
            qualified_name: row.get(3)?,
            kind: row.get(4)?,
            file_path: row.get(5)?,
            start_line: row.get(6)?,
            end_line: row.get(7)?,
            visibility: row.get(8)?,
            is_async: row.get::<i64>(9)? != 0,
            is_static: row.get::<i64>(10)? != 0,
            is_exported: row.get::<i64>(11)? != 0,
            return_type: row.get(12)?,
            parent_symbol_id: row.get(13)?,
            content_hash: row.get(14)?,
        })
    }
}

/// A stored usage row.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRow {
    pub id: i64,
    pub commit_id: i64,
    pub file_path: String,
    pub line: i64,
    pub column: i64,
    pub usage_kind: String,
    pub symbol_name: String,
    pub enclosing_symbol_id: Option<i64>,
    pub definition_symbol_id: Option<i64>,
}

pub(crate) const USAGE_COLS: &str = "id, commit_id, file_path, line, column_number, usage_kind, \
     symbol_name, enclosing_symbol_id, definition_symbol_id";

impl UsageRow {
    pub(crate) fn from_row(row: &libsql::Row) -> Result<Self, libsql::Error> {
        Ok(UsageRow {
            id: row.get(0)?,
            commit_id: row.get(1)?,
            file_path: row.get(2)?,
            line: row.get(3)?,
            column: row.get(4)?,
            usage_kind: row.get(5)?,
            symbol_name: row.get(6)?,
            enclosing_symbol_id: row.get(7)?,
            definition_symbol_id: row.get(8)?,
        })
    }
}

/// A stored import row with its bindings.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRow {
    pub id: i64,
    pub commit_id: i64,
    pub file_path: String,
    pub line: i64,
    pub import_type: String,
    pub module_specifier: String,
    pub resolved_path: Option<String>,
    pub bindings: Vec<ImportBindingRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportBindingRow {
    pub imported_name: String,
    pub local_name: String,
    pub is_type_only: bool,
}

/// A stored endpoint row with its parameters.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointRow {
    pub id: i64,
    pub commit_id: i64,
    pub http_method: String,
    pub path: String,
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
    pub framework: String,
    pub handler: Option<String>,
    pub handler_type: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub middleware: Vec<String>,
    pub dependencies: Vec<String>,
    pub response_model: Option<String>,
    pub response_status: Option<i64>,
    pub body_schema: Option<String>,
    pub params: Vec<EndpointParamRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointParamRow {
    pub name: String,
    pub location: String,
    pub param_type: Option<String>,
    pub required: bool,
}

/// A stored parameter row.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterRow {
    pub position: i64,
    pub name: String,
    pub type_annotation: Option<String>,
    pub is_optional: bool,
}

/// A stored docstring row.
#[derive(Debug, Clone, Serialize)]
pub struct DocstringRow {
    pub doc_type: Option<String>,
    pub raw_text: String,
    pub description: Option<String>,
}

/// Row counts inserted for one file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileInsertStats {
    pub symbols: usize,
    pub usages: usize,
    pub imports: usize,
    pub endpoints: usize,
}

pub struct SqiStore {
    conn: Connection,
    #[allow(dead_code)]
    db: Database,
}

impl SqiStore {
    /// Open or create the index database. On corruption the database file is
    /// deleted and recreated.
    pub async fn open(db_path: &Path) -> Result<Self, libsql::Error> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        match Self::try_open(db_path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                let is_corruption = err_str.contains("corrupt")
                    || err_str.contains("malformed")
                    || err_str.contains("not a database")
                    || err_str.contains("database disk image")
                    || err_str.contains("integrity check failed");
                if is_corruption {
                    tracing::warn!("index corrupted, rebuilding: {}", e);
                    let _ = std::fs::remove_file(db_path);
                    let _ = std::fs::remove_file(db_path.with_extension("sqlite-wal"));
                    let _ = std::fs::remove_file(db_path.with_extension("sqlite-shm"));
                    Self::try_open(db_path).await
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn try_open(db_path: &Path) -> Result<Self, libsql::Error> {
        let db = libsql::Builder::new_local(db_path).build().await?;
        let conn = db.connect()?;

        let mut rows = conn.query("PRAGMA quick_check(1)", ()).await?;
        let integrity: String = match rows.next().await? {
            Some(row) => row.get(0).unwrap_or_else(|_| "error".to_string()),
            None => "error".to_string(),
        };
        if integrity != "ok" {
            return Err(libsql::Error::SqliteFailure(
                11, // SQLITE_CORRUPT
                format!("integrity check failed: {}", integrity),
            ));
        }

        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        for statement in SCHEMA {
            conn.execute(statement, ()).await?;
        }

        let mut rows = conn
            .query(
                "SELECT CAST(value AS INTEGER) FROM meta WHERE key = 'schema_version'",
                (),
            )
            .await?;
        let version: i64 = match rows.next().await? {
            Some(row) => row.get(0).unwrap_or(0),
            None => 0,
        };
        if version != SCHEMA_VERSION {
            for table in COMMIT_DATA_TABLES {
                conn.execute(&format!("DELETE FROM {}", table), ()).await.ok();
            }
            conn.execute("DELETE FROM indexed_commits", ()).await.ok();
            conn.execute("DELETE FROM repositories", ()).await.ok();
            conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )
            .await?;
        }

        Ok(Self { conn, db })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========================================================================
    // Commit registry
    // ========================================================================

    pub async fn register_repository(&self, path: &str, name: &str) -> Result<i64, libsql::Error> {
        self.conn
            .execute(
                "INSERT INTO repositories (path, name) VALUES (?1, ?2)
                 ON CONFLICT(path) DO UPDATE SET name = excluded.name",
                params![path, name],
            )
            .await?;
        let mut rows = self
            .conn
            .query("SELECT id FROM repositories WHERE path = ?1", params![path])
            .await?;
        match rows.next().await? {
            Some(row) => row.get(0),
            None => Err(libsql::Error::QueryReturnedNoRows),
        }
    }

    pub async fn get_repository_by_path(
        &self,
        path: &str,
    ) -> Result<Option<Repository>, libsql::Error> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, path, name FROM repositories WHERE path = ?1",
                params![path],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Repository {
                id: row.get(0)?,
                path: row.get(1)?,
                name: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn list_repositories(&self) -> Result<Vec<Repository>, libsql::Error> {
        let mut rows = self
            .conn
            .query("SELECT id, path, name FROM repositories ORDER BY id", ())
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Repository {
                id: row.get(0)?,
                path: row.get(1)?,
                name: row.get(2)?,
            });
        }
        Ok(out)
    }

    /// Begin indexing a commit. Re-indexing an existing commit discards its
    /// previous data and reuses the commit id.
    pub async fn start_indexing(&self, repo_id: i64, sha: &str) -> Result<i64, libsql::Error> {
        if let Some(existing) = self.get_indexed_commit(repo_id, sha).await? {
            self.delete_commit_data(existing.id).await?;
            self.set_commit_status(existing.id, CommitStatus::InProgress)
                .await?;
            return Ok(existing.id);
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.conn
            .execute(
                "INSERT INTO indexed_commits (repo_id, commit_sha, status, indexed_at)
                 VALUES (?1, ?2, 'in_progress', ?3)",
                params![repo_id, sha, now],
            )
            .await?;
        Ok(self.conn.last_insert_rowid())
    }

    pub async fn get_indexed_commit(
        &self,
        repo_id: i64,
        sha: &str,
    ) -> Result<Option<IndexedCommit>, libsql::Error> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, repo_id, commit_sha, status, indexed_at
                 FROM indexed_commits WHERE repo_id = ?1 AND commit_sha = ?2",
                params![repo_id, sha],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(commit_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_indexed_commits(
        &self,
        repo_id: Option<i64>,
    ) -> Result<Vec<IndexedCommit>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = match repo_id {
            Some(id) => {
                self.conn
                    .query(
                        "SELECT id, repo_id, commit_sha, status, indexed_at
                         FROM indexed_commits WHERE repo_id = ?1 ORDER BY id",
                        params![id],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        "SELECT id, repo_id, commit_sha, status, indexed_at
                         FROM indexed_commits ORDER BY id",
                        (),
                    )
                    .await?
            }
        };
        while let Some(row) = rows.next().await? {
            out.push(commit_from_row(&row)?);
        }
        Ok(out)
    }

    /// Most recent complete commit for a repository.
    pub async fn latest_complete_commit(
        &self,
        repo_id: i64,
    ) -> Result<Option<IndexedCommit>, libsql::Error> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, repo_id, commit_sha, status, indexed_at
                 FROM indexed_commits
                 WHERE repo_id = ?1 AND status = 'complete'
                 ORDER BY indexed_at DESC, id DESC LIMIT 1",
                params![repo_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(commit_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn set_commit_status(
        &self,
        commit_id: i64,
        status: CommitStatus,
    ) -> Result<(), libsql::Error> {
        self.conn
            .execute(
                "UPDATE indexed_commits SET status = ?1 WHERE id = ?2",
                params![status.as_str(), commit_id],
            )
            .await?;
        Ok(())
    }

    /// Delete a commit and everything it owns.
    pub async fn delete_commit(&self, commit_id: i64) -> Result<(), libsql::Error> {
        self.delete_commit_data(commit_id).await?;
        self.conn
            .execute(
                "DELETE FROM indexed_commits WHERE id = ?1",
                params![commit_id],
            )
            .await?;
        Ok(())
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Insert one file's extraction (and endpoints) under a single
    /// transaction. Parent links resolve through qualified names: parents are
    /// emitted before their children.
    pub async fn insert_file_extraction(
        &self,
        commit_id: i64,
        file_path: &str,
        extraction: &Extraction,
        endpoints: &[EndpointRecord],
    ) -> Result<FileInsertStats, libsql::Error> {
        let tx = self.conn.transaction().await?;
        let mut stats = FileInsertStats::default();

        let mut ids: HashMap<String, i64> = HashMap::new();
        for symbol in &extraction.symbols {
            let parent_id = symbol
                .parent
                .as_ref()
                .and_then(|p| ids.get(p))
                .copied();
            tx.execute(
                "INSERT INTO symbols (commit_id, name, qualified_name, kind, file_path,
                     start_line, end_line, visibility, is_async, is_static, is_exported,
                     return_type, parent_symbol_id, content_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    commit_id,
                    symbol.name.clone(),
                    symbol.qualified_name.clone(),
                    symbol.kind.as_str(),
                    file_path,
                    symbol.start_line as i64,
                    symbol.end_line as i64,
                    symbol.visibility.map(|v| v.as_str()),
                    symbol.is_async as i64,
                    symbol.is_static as i64,
                    symbol.is_exported as i64,
                    symbol.return_type.clone(),
                    parent_id,
                    symbol.content_hash.clone(),
                ],
            )
            .await?;
            let symbol_id = tx.last_insert_rowid();
            ids.insert(symbol.qualified_name.clone(), symbol_id);
            stats.symbols += 1;

            for (position, parameter) in symbol.parameters.iter().enumerate() {
                tx.execute(
                    "INSERT INTO symbol_parameters (symbol_id, position, name, type_annotation, is_optional)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        symbol_id,
                        position as i64,
                        parameter.name.clone(),
                        parameter.type_annotation.clone(),
                        parameter.is_optional as i64,
                    ],
                )
                .await?;
            }

            if let Some(docstring) = &symbol.docstring {
                tx.execute(
                    "INSERT OR REPLACE INTO symbol_docstrings (symbol_id, doc_type, raw_text, description)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        symbol_id,
                        docstring.doc_type.clone(),
                        docstring.raw_text.clone(),
                        docstring.description.clone(),
                    ],
                )
                .await?;
            }

            for trigram in trigrams(&symbol.name) {
                tx.execute(
                    "INSERT OR IGNORE INTO symbol_trigrams (symbol_id, trigram) VALUES (?1, ?2)",
                    params![symbol_id, trigram],
                )
                .await?;
            }
        }

        for usage in &extraction.usages {
            tx.execute(
                "INSERT INTO usages (commit_id, file_path, line, column_number, usage_kind, symbol_name)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    commit_id,
                    file_path,
                    usage.line as i64,
                    usage.column as i64,
                    usage.kind.as_str(),
                    usage.name.clone(),
                ],
            )
            .await?;
            stats.usages += 1;
        }

        for import in &extraction.imports {
            tx.execute(
                "INSERT INTO imports (commit_id, file_path, line, import_type, module_specifier)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    commit_id,
                    file_path,
                    import.line as i64,
                    import.import_type.as_str(),
                    import.module_specifier.clone(),
                ],
            )
            .await?;
            let import_id = tx.last_insert_rowid();
            stats.imports += 1;

            for (position, binding) in import.bindings.iter().enumerate() {
                tx.execute(
                    "INSERT INTO import_bindings (import_id, position, imported_name, local_name, is_type_only)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        import_id,
                        position as i64,
                        binding.imported_name.clone(),
                        binding.local_name.clone(),
                        binding.is_type_only as i64,
                    ],
                )
                .await?;
            }
        }

        for endpoint in endpoints {
            tx.execute(
                "INSERT INTO endpoints (commit_id, http_method, path, file_path, start_line,
                     end_line, framework, handler, handler_type, summary, description, tags,
                     middleware, dependencies, response_model, response_status, body_schema)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    commit_id,
                    endpoint.method.as_str(),
                    endpoint.path.clone(),
                    file_path,
                    endpoint.start_line as i64,
                    endpoint.end_line as i64,
                    endpoint.framework.clone(),
                    endpoint.handler.clone(),
                    endpoint.handler_type.as_str(),
                    endpoint.summary.clone(),
                    endpoint.description.clone(),
                    string_list_json(&endpoint.tags),
                    string_list_json(&endpoint.middleware),
                    string_list_json(&endpoint.dependencies),
                    endpoint.response_model.clone(),
                    endpoint.response_status,
                    endpoint.body_schema.clone(),
                ],
            )
            .await?;
            let endpoint_id = tx.last_insert_rowid();
            stats.endpoints += 1;

            for (position, param) in endpoint.params.iter().enumerate() {
                tx.execute(
                    "INSERT INTO endpoint_params (endpoint_id, position, name, location, param_type, required)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        endpoint_id,
                        position as i64,
                        param.name.clone(),
                        param.location.as_str(),
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

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Remove every row scoped to one file, in dependency order.
    pub async fn delete_file_data(
        &self,
        commit_id: i64,
        file_path: &str,
    ) -> Result<(), libsql::Error> {
        let tx = self.conn.transaction().await?;
        let symbol_scope =
            "(SELECT id FROM symbols WHERE commit_id = ?1 AND file_path = ?2)";
        for table in ["symbol_parameters", "symbol_docstrings", "symbol_trigrams"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE symbol_id IN {}", table, symbol_scope),
                params![commit_id, file_path],
            )
            .await?;
        }
        tx.execute(
            "DELETE FROM endpoint_params WHERE endpoint_id IN
                 (SELECT id FROM endpoints WHERE commit_id = ?1 AND file_path = ?2)",
            params![commit_id, file_path],
        )
        .await?;
        tx.execute(
            "DELETE FROM endpoints WHERE commit_id = ?1 AND file_path = ?2",
            params![commit_id, file_path],
        )
        .await?;
        tx.execute(
            "DELETE FROM import_bindings WHERE import_id IN
                 (SELECT id FROM imports WHERE commit_id = ?1 AND file_path = ?2)",
            params![commit_id, file_path],
        )
        .await?;
        tx.execute(
            "DELETE FROM usages WHERE commit_id = ?1 AND file_path = ?2",
            params![commit_id, file_path],
        )
        .await?;
        tx.execute(
            "DELETE FROM imports WHERE commit_id = ?1 AND file_path = ?2",
            params![commit_id, file_path],
        )
        .await?;
        tx.execute(
            "DELETE FROM symbols WHERE commit_id = ?1 AND file_path = ?2",
            params![commit_id, file_path],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove every per-commit row, leaving the commit registry entry.
    pub async fn delete_commit_data(&self, commit_id: i64) -> Result<(), libsql::Error> {
        let tx = self.conn.transaction().await?;
        for table in COMMIT_DATA_TABLES {
            let sql = match *table {
                "symbol_parameters" | "symbol_docstrings" | "symbol_trigrams" => format!(
                    "DELETE FROM {} WHERE symbol_id IN (SELECT id FROM symbols WHERE commit_id = ?1)",
                    table
                ),
                "import_bindings" => format!(
                    "DELETE FROM {} WHERE import_id IN (SELECT id FROM imports WHERE commit_id = ?1)",
                    table
                ),
                "endpoint_params" => format!(
                    "DELETE FROM {} WHERE endpoint_id IN (SELECT id FROM endpoints WHERE commit_id = ?1)",
                    table
                ),
                _ => format!("DELETE FROM {} WHERE commit_id = ?1", table),
            };
            tx.execute(&sql, params![commit_id]).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ========================================================================
    // Reads shared by the linker and the query engine
    // ========================================================================

    pub async fn find_symbols_by_name(
        &self,
        commit_id: i64,
        name: &str,
        kind: Option<&str>,
    ) -> Result<Vec<SymbolRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = match kind {
            Some(kind) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {} FROM symbols WHERE commit_id = ?1 AND name = ?2 AND kind = ?3 ORDER BY id",
                            SYMBOL_COLS
                        ),
                        params![commit_id, name, kind],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {} FROM symbols WHERE commit_id = ?1 AND name = ?2 ORDER BY id",
                            SYMBOL_COLS
                        ),
                        params![commit_id, name],
                    )
                    .await?
            }
        };
        while let Some(row) = rows.next().await? {
            out.push(SymbolRow::from_row(&row)?);
        }
        Ok(out)
    }

    pub async fn symbol_by_id(&self, id: i64) -> Result<Option<SymbolRow>, libsql::Error> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {} FROM symbols WHERE id = ?1", SYMBOL_COLS),
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(SymbolRow::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn children_of(&self, symbol_id: i64) -> Result<Vec<SymbolRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM symbols WHERE parent_symbol_id = ?1 ORDER BY start_line",
                    SYMBOL_COLS
                ),
                params![symbol_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(SymbolRow::from_row(&row)?);
        }
        Ok(out)
    }

    pub async fn all_symbols(&self, commit_id: i64) -> Result<Vec<SymbolRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM symbols WHERE commit_id = ?1 ORDER BY id",
                    SYMBOL_COLS
                ),
                params![commit_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(SymbolRow::from_row(&row)?);
        }
        Ok(out)
    }

    pub async fn usages_by_name(
        &self,
        commit_id: i64,
        name: &str,
        file: Option<&str>,
    ) -> Result<Vec<UsageRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = match file {
            Some(file) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {} FROM usages WHERE commit_id = ?1 AND symbol_name = ?2 AND file_path = ?3
                             ORDER BY file_path, line, column_number",
                            USAGE_COLS
                        ),
                        params![commit_id, name, file],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {} FROM usages WHERE commit_id = ?1 AND symbol_name = ?2
                             ORDER BY file_path, line, column_number",
                            USAGE_COLS
                        ),
                        params![commit_id, name],
                    )
                    .await?
            }
        };
        while let Some(row) = rows.next().await? {
            out.push(UsageRow::from_row(&row)?);
        }
        Ok(out)
    }

    pub async fn all_usages(&self, commit_id: i64) -> Result<Vec<UsageRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM usages WHERE commit_id = ?1 ORDER BY id",
                    USAGE_COLS
                ),
                params![commit_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(UsageRow::from_row(&row)?);
        }
        Ok(out)
    }

    /// Usages resolved to a definition symbol.
    pub async fn usages_targeting(
        &self,
        definition_symbol_id: i64,
    ) -> Result<Vec<UsageRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {} FROM usages WHERE definition_symbol_id = ?1
                     ORDER BY file_path, line, column_number",
                    USAGE_COLS
                ),
                params![definition_symbol_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(UsageRow::from_row(&row)?);
        }
        Ok(out)
    }

    pub async fn imports_for_file(
        &self,
        commit_id: i64,
        file_path: &str,
    ) -> Result<Vec<ImportRow>, libsql::Error> {
        self.load_imports(
            "SELECT id, commit_id, file_path, line, import_type, module_specifier, resolved_path
             FROM imports WHERE commit_id = ?1 AND file_path = ?2 ORDER BY line",
            params![commit_id, file_path],
        )
        .await
    }

    pub async fn all_imports(&self, commit_id: i64) -> Result<Vec<ImportRow>, libsql::Error> {
        self.load_imports(
            "SELECT id, commit_id, file_path, line, import_type, module_specifier, resolved_path
             FROM imports WHERE commit_id = ?1 ORDER BY id",
            params![commit_id],
        )
        .await
    }

    /// Files importing a module (prefix match on the specifier).
    pub async fn find_importers(
        &self,
        commit_id: i64,
        module: &str,
    ) -> Result<Vec<ImportRow>, libsql::Error> {
        let pattern = format!("{}%", module);
        self.load_imports(
            "SELECT id, commit_id, file_path, line, import_type, module_specifier, resolved_path
             FROM imports WHERE commit_id = ?1 AND (module_specifier = ?2 OR module_specifier LIKE ?3)
             ORDER BY file_path, line",
            params![commit_id, module, pattern],
        )
        .await
    }

    async fn load_imports(
        &self,
        sql: &str,
        query_params: impl libsql::params::IntoParams,
    ) -> Result<Vec<ImportRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self.conn.query(sql, query_params).await?;
        while let Some(row) = rows.next().await? {
            out.push(ImportRow {
                id: row.get(0)?,
                commit_id: row.get(1)?,
                file_path: row.get(2)?,
                line: row.get(3)?,
                import_type: row.get(4)?,
                module_specifier: row.get(5)?,
                resolved_path: row.get(6)?,
                bindings: Vec::new(),
            });
        }
        for import in &mut out {
            let mut rows = self
                .conn
                .query(
                    "SELECT imported_name, local_name, is_type_only FROM import_bindings
                     WHERE import_id = ?1 ORDER BY position",
                    params![import.id],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                import.bindings.push(ImportBindingRow {
                    imported_name: row.get(0)?,
                    local_name: row.get(1)?,
                    is_type_only: row.get::<i64>(2)? != 0,
                });
            }
        }
        Ok(out)
    }

    pub async fn set_import_resolved_path(
        &self,
        import_id: i64,
        resolved_path: &str,
    ) -> Result<(), libsql::Error> {
        self.conn
            .execute(
                "UPDATE imports SET resolved_path = ?1 WHERE id = ?2",
                params![resolved_path, import_id],
            )
            .await?;
        Ok(())
    }

    pub async fn parameters_for(
        &self,
        symbol_id: i64,
    ) -> Result<Vec<ParameterRow>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT position, name, type_annotation, is_optional FROM symbol_parameters
                 WHERE symbol_id = ?1 ORDER BY position",
                params![symbol_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(ParameterRow {
                position: row.get(0)?,
                name: row.get(1)?,
                type_annotation: row.get(2)?,
                is_optional: row.get::<i64>(3)? != 0,
            });
        }
        Ok(out)
    }

    pub async fn docstring_for(
        &self,
        symbol_id: i64,
    ) -> Result<Option<DocstringRow>, libsql::Error> {
        let mut rows = self
            .conn
            .query(
                "SELECT doc_type, raw_text, description FROM symbol_docstrings WHERE symbol_id = ?1",
                params![symbol_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(DocstringRow {
                doc_type: row.get(0)?,
                raw_text: row.get(1)?,
                description: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    /// Every file path contributing rows to a commit.
    pub async fn files_in_commit(&self, commit_id: i64) -> Result<Vec<String>, libsql::Error> {
        let mut out = Vec::new();
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT file_path FROM symbols WHERE commit_id = ?1
                 UNION SELECT DISTINCT file_path FROM usages WHERE commit_id = ?1
                 UNION SELECT DISTINCT file_path FROM imports WHERE commit_id = ?1
                 UNION SELECT DISTINCT file_path FROM endpoints WHERE commit_id = ?1
                 ORDER BY file_path",
                params![commit_id],
            )
            .await?;
        while let Some(row) = rows.next().await? {
            out.push(row.get(0)?);
        }
        Ok(out)
    }

    pub async fn count_rows(
        &self,
        table: &str,
        commit_id: i64,
    ) -> Result<usize, libsql::Error> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT COUNT(*) FROM {} WHERE commit_id = ?1", table),
                params![commit_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as usize),
            None => Ok(0),
        }
    }

    pub async fn endpoints_for_commit(
        &self,
        commit_id: i64,
        method: Option<&str>,
        framework: Option<&str>,
        path_contains: Option<&str>,
    ) -> Result<Vec<EndpointRow>, libsql::Error> {
        let mut sql = String::from(
            "SELECT id, commit_id, http_method, path, file_path, start_line, end_line, framework,
                    handler, handler_type, summary, description, tags, middleware, dependencies,
                    response_model, response_status, body_schema
             FROM endpoints WHERE commit_id = ?1",
        );
        let mut values: Vec<libsql::Value> = vec![libsql::Value::from(commit_id)];
        if let Some(method) = method {
            values.push(libsql::Value::from(method.to_uppercase()));
            sql.push_str(&format!(" AND http_method = ?{}", values.len()));
        }
        if let Some(framework) = framework {
            values.push(libsql::Value::from(framework.to_lowercase()));
            sql.push_str(&format!(" AND framework = ?{}", values.len()));
        }
        if let Some(fragment) = path_contains {
            values.push(libsql::Value::from(format!("%{}%", fragment)));
            sql.push_str(&format!(" AND path LIKE ?{}", values.len()));
        }
        sql.push_str(" ORDER BY path, http_method");

        let mut out = Vec::new();
        let mut rows = self.conn.query(&sql, values).await?;
        while let Some(row) = rows.next().await? {
            out.push(EndpointRow {
                id: row.get(0)?,
                commit_id: row.get(1)?,
                http_method: row.get(2)?,
                path: row.get(3)?,
                file_path: row.get(4)?,
                start_line: row.get(5)?,
                end_line: row.get(6)?,
                framework: row.get(7)?,
                handler: row.get(8)?,
                handler_type: row.get(9)?,
                summary: row.get(10)?,
                description: row.get(11)?,
                tags: json_string_list(row.get(12)?),
                middleware: json_string_list(row.get(13)?),
                dependencies: json_string_list(row.get(14)?),
                response_model: row.get(15)?,
                response_status: row.get(16)?,
                body_schema: row.get(17)?,
                params: Vec::new(),
            });
        }
        for endpoint in &mut out {
            let mut rows = self
                .conn
                .query(
                    "SELECT name, location, param_type, required FROM endpoint_params
                     WHERE endpoint_id = ?1 ORDER BY position",
                    params![endpoint.id],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                endpoint.params.push(EndpointParamRow {
                    name: row.get(0)?,
                    location: row.get(1)?,
                    param_type: row.get(2)?,
                    required: row.get::<i64>(3)? != 0,
                });
            }
        }
        Ok(out)
    }
}

/// Symbol columns qualified with the `s` alias for joined queries.
pub(crate) fn symbol_cols_qualified() -> String {
    SYMBOL_COLS
        .split(',')
        .map(|c| format!("s.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn commit_from_row(row: &libsql::Row) -> Result<IndexedCommit, libsql::Error> {
    let status: String = row.get(3)?;
    Ok(IndexedCommit {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        commit_sha: row.get(2)?,
        status: CommitStatus::parse(&status),
        indexed_at: row.get(4)?,
    })
}

fn string_list_json(list: &[String]) -> Option<String> {
    if list.is_empty() {
        None
    } else {
        serde_json::to_string(list).ok()
    }
}

fn json_string_list(value: Option<String>) -> Vec<String> {
    value
        .and_then(|v| serde_json::from_str(&v).ok())
        .unwrap_or_default()
}
