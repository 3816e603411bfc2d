//! Relational schema.
//!
//! All per-commit tables carry `commit_id` and cascade on commit deletion.
//! The covering indexes back the prepared queries of the linker, the
//! analyses, and the query engine.

// Delete the database file on schema changes; no migrations.
pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT
    )",
    "CREATE TABLE IF NOT EXISTS repositories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS indexed_commits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        repo_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        commit_sha TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'in_progress',
        indexed_at INTEGER NOT NULL,
        UNIQUE(repo_id, commit_sha)
    )",
    "CREATE TABLE IF NOT EXISTS symbols (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id INTEGER NOT NULL REFERENCES indexed_commits(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        qualified_name TEXT NOT NULL,
        kind TEXT NOT NULL,
        file_path TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        visibility TEXT,
        is_async INTEGER NOT NULL DEFAULT 0,
        is_static INTEGER NOT NULL DEFAULT 0,
        is_exported INTEGER NOT NULL DEFAULT 0,
        return_type TEXT,
        parent_symbol_id INTEGER REFERENCES symbols(id),
        content_hash TEXT
    )",
    "CREATE TABLE IF NOT EXISTS symbol_parameters (
        symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        type_annotation TEXT,
        is_optional INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (symbol_id, position)
    )",
    "CREATE TABLE IF NOT EXISTS symbol_docstrings (
        symbol_id INTEGER PRIMARY KEY REFERENCES symbols(id) ON DELETE CASCADE,
        doc_type TEXT,
        raw_text TEXT NOT NULL,
        description TEXT
    )",
    "CREATE TABLE IF NOT EXISTS symbol_trigrams (
        symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
        trigram TEXT NOT NULL,
        PRIMARY KEY (symbol_id, trigram)
    )",
    "CREATE TABLE IF NOT EXISTS usages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id INTEGER NOT NULL REFERENCES indexed_commits(id) ON DELETE CASCADE,
        file_path TEXT NOT NULL,
        line INTEGER NOT NULL,
        column_number INTEGER NOT NULL,
        usage_kind TEXT NOT NULL,
        symbol_name TEXT NOT NULL,
        enclosing_symbol_id INTEGER REFERENCES symbols(id),
        definition_symbol_id INTEGER REFERENCES symbols(id)
    )",
    "CREATE TABLE IF NOT EXISTS imports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id INTEGER NOT NULL REFERENCES indexed_commits(id) ON DELETE CASCADE,
        file_path TEXT NOT NULL,
        line INTEGER NOT NULL,
        import_type TEXT NOT NULL,
        module_specifier TEXT NOT NULL,
        resolved_path TEXT
    )",
    "CREATE TABLE IF NOT EXISTS import_bindings (
        import_id INTEGER NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        imported_name TEXT NOT NULL,
        local_name TEXT NOT NULL,
        is_type_only INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (import_id, position)
    )",
    "CREATE TABLE IF NOT EXISTS endpoints (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commit_id INTEGER NOT NULL REFERENCES indexed_commits(id) ON DELETE CASCADE,
        http_method TEXT NOT NULL,
        path TEXT NOT NULL,
        file_path TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        framework TEXT NOT NULL,
        handler TEXT,
        handler_type TEXT NOT NULL,
        summary TEXT,
        description TEXT,
        tags TEXT,
        middleware TEXT,
        dependencies TEXT,
        response_model TEXT,
        response_status INTEGER,
        body_schema TEXT
    )",
    "CREATE TABLE IF NOT EXISTS endpoint_params (
        endpoint_id INTEGER NOT NULL REFERENCES endpoints(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        name TEXT NOT NULL,
        location TEXT NOT NULL,
        param_type TEXT,
        required INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (endpoint_id, position)
    )",
    // Covering secondary indexes.
    "CREATE INDEX IF NOT EXISTS idx_symbols_commit_name ON symbols(commit_id, name)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_commit_qualified ON symbols(commit_id, qualified_name)",
    "CREATE INDEX IF NOT EXISTS idx_symbols_commit_file ON symbols(commit_id, file_path)",
    "CREATE INDEX IF NOT EXISTS idx_usages_commit_name ON usages(commit_id, symbol_name)",
    "CREATE INDEX IF NOT EXISTS idx_usages_commit_file ON usages(commit_id, file_path)",
    "CREATE INDEX IF NOT EXISTS idx_usages_definition ON usages(definition_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_usages_enclosing ON usages(enclosing_symbol_id)",
    "CREATE INDEX IF NOT EXISTS idx_imports_commit_file ON imports(commit_id, file_path)",
    "CREATE INDEX IF NOT EXISTS idx_imports_commit_module ON imports(commit_id, module_specifier)",
    "CREATE INDEX IF NOT EXISTS idx_trigrams_trigram ON symbol_trigrams(trigram)",
    "CREATE INDEX IF NOT EXISTS idx_endpoints_commit ON endpoints(commit_id)",
];

/// Tables holding per-commit data, in child-before-parent delete order.
pub const COMMIT_DATA_TABLES: &[&str] = &[
    "endpoint_params",
    "endpoints",
    "import_bindings",
    "imports",
    "usages",
    "symbol_trigrams",
    "symbol_docstrings",
    "symbol_parameters",
    "symbols",
];
