//! End-to-end indexing: extraction, linking, invariants, incremental
//! copy-forward.

use sourcerack::error::FileStatus;
use sourcerack::indexer::{CancelFlag, Indexer};
use sourcerack::store::{CommitStatus, SqiStore};
use tempfile::TempDir;

/// Capture per-file skip warnings in test output (RUST_LOG controls level).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn open_store() -> (TempDir, SqiStore) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = SqiStore::open(&dir.path().join("sqi.sqlite")).await.unwrap();
    (dir, store)
}

fn ts_two_file_commit() -> Vec<(String, String)> {
    vec![
        (
            "src/service.ts".to_string(),
            "export class UserService { async getUser(id: string) {} }\n".to_string(),
        ),
        (
            "src/app.ts".to_string(),
            "import { UserService } from './service';\nnew UserService().getUser(\"x\");\n"
                .to_string(),
        ),
    ]
}

#[tokio::test]
async fn typescript_two_file_commit_links_usages() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let report = indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), None)
        .await
        .unwrap();
    assert_eq!(report.indexed_count(), 2);
    assert!(!report.cancelled);

    let commit = store.get_indexed_commit(repo_id, "c1").await.unwrap().unwrap();
    assert_eq!(commit.status, CommitStatus::Complete);

    let classes = store
        .find_symbols_by_name(commit.id, "UserService", Some("class"))
        .await
        .unwrap();
    assert_eq!(classes.len(), 1);
    assert!(classes[0].is_exported);

    let methods = store
        .find_symbols_by_name(commit.id, "getUser", Some("method"))
        .await
        .unwrap();
    assert_eq!(methods.len(), 1);
    let get_user = &methods[0];
    assert!(get_user.is_async);
    assert_eq!(get_user.qualified_name, "UserService.getUser");
    assert_eq!(get_user.parent_symbol_id, Some(classes[0].id));

    // Usages in app.ts: instantiate + call, both linked, module level.
    let instantiate = store
        .usages_by_name(commit.id, "UserService", Some("src/app.ts"))
        .await
        .unwrap();
    assert!(instantiate.iter().any(|u| u.usage_kind == "instantiate"));

    let calls = store
        .usages_by_name(commit.id, "getUser", Some("src/app.ts"))
        .await
        .unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].usage_kind, "call");
    assert_eq!(calls[0].definition_symbol_id, Some(get_user.id));
    assert_eq!(calls[0].enclosing_symbol_id, None);
}

#[tokio::test]
async fn parent_child_invariants_hold() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let files = vec![(
        "pkg/models.py".to_string(),
        "class Order:\n    STATUSES = ['new']\n\n    def __init__(self, total):\n        self.total = total\n\n    def cancel(self):\n        self.refund()\n\n    def refund(self):\n        pass\n".to_string(),
    )];
    let report = indexer.index_commit(repo_id, "c1", &files, None).await.unwrap();
    let commit_id = report.commit_id;

    let symbols = store.all_symbols(commit_id).await.unwrap();
    for symbol in &symbols {
        if let Some(parent_id) = symbol.parent_symbol_id {
            let parent = store.symbol_by_id(parent_id).await.unwrap().unwrap();
            assert_eq!(parent.commit_id, symbol.commit_id);
            assert_eq!(parent.file_path, symbol.file_path);
            assert!(symbol.start_line > parent.start_line);
            assert!(symbol.end_line <= parent.end_line);
        }
    }

    // Linked usages stay inside their enclosing symbol's line range.
    let usages = store.all_usages(commit_id).await.unwrap();
    assert!(!usages.is_empty());
    for usage in &usages {
        if let Some(enclosing_id) = usage.enclosing_symbol_id {
            let enclosing = store.symbol_by_id(enclosing_id).await.unwrap().unwrap();
            assert_eq!(enclosing.commit_id, usage.commit_id);
            assert_eq!(enclosing.file_path, usage.file_path);
            assert!(usage.line >= enclosing.start_line);
            assert!(usage.line <= enclosing.end_line);
        }
    }

    // refund() call inside cancel resolves to the method and encloses in it.
    let refund_calls = store.usages_by_name(commit_id, "refund", None).await.unwrap();
    let call = refund_calls.iter().find(|u| u.usage_kind == "call").unwrap();
    let enclosing = store
        .symbol_by_id(call.enclosing_symbol_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enclosing.qualified_name, "Order.cancel");
}

#[tokio::test]
async fn unsupported_and_unparseable_files_are_skipped() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let files = vec![
        ("README.md".to_string(), "# docs\n".to_string()),
        ("main.py".to_string(), "def ok():\n    pass\n".to_string()),
        // Dart grammar is optional and absent in the test environment.
        ("lib/app.dart".to_string(), "class App {}\n".to_string()),
    ];
    let report = indexer.index_commit(repo_id, "c1", &files, None).await.unwrap();

    let status_of = |path: &str| {
        report
            .files
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, s)| *s)
            .unwrap()
    };
    assert_eq!(status_of("README.md"), FileStatus::SkippedUnsupportedLanguage);
    assert_eq!(status_of("main.py"), FileStatus::Indexed);

    // The commit still completes regardless of skips.
    let commit = store.get_indexed_commit(repo_id, "c1").await.unwrap().unwrap();
    assert_eq!(commit.status, CommitStatus::Complete);
}

#[tokio::test]
async fn cancellation_marks_commit_failed() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), Some(&cancel))
        .await
        .unwrap();
    assert!(report.cancelled);

    let commit = store.get_indexed_commit(repo_id, "c1").await.unwrap().unwrap();
    assert_eq!(commit.status, CommitStatus::Failed);

    // Partial state is safe to discard.
    store.delete_commit(commit.id).await.unwrap();
    assert!(store
        .get_indexed_commit(repo_id, "c1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn reindexing_is_idempotent() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let first = indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), None)
        .await
        .unwrap();
    let snapshot_a = logical_snapshot(&store, first.commit_id).await;

    let second = indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), None)
        .await
        .unwrap();
    assert_eq!(first.commit_id, second.commit_id);
    let snapshot_b = logical_snapshot(&store, second.commit_id).await;

    assert_eq!(snapshot_a, snapshot_b);
}

#[tokio::test]
async fn copy_forward_preserves_logical_content() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let report = indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), None)
        .await
        .unwrap();
    let c1 = report.commit_id;

    let c2 = store.start_indexing(repo_id, "c2").await.unwrap();
    let stats = store.copy_unchanged_data(c1, c2, &[]).await.unwrap();
    assert!(stats.symbols > 0);
    store
        .set_commit_status(c2, CommitStatus::Complete)
        .await
        .unwrap();

    assert_eq!(
        logical_snapshot(&store, c1).await,
        logical_snapshot(&store, c2).await
    );

    // Remapped links still resolve within the new commit.
    let calls = store.usages_by_name(c2, "getUser", None).await.unwrap();
    let definition_id = calls[0].definition_symbol_id.unwrap();
    let definition = store.symbol_by_id(definition_id).await.unwrap().unwrap();
    assert_eq!(definition.commit_id, c2);
    assert_eq!(definition.qualified_name, "UserService.getUser");
}

#[tokio::test]
async fn incremental_indexing_reindexes_only_changed_files() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), None)
        .await
        .unwrap();

    let changed = vec![(
        "src/app.ts".to_string(),
        "import { UserService } from './service';\nconst service = new UserService();\n"
            .to_string(),
    )];
    let report = indexer
        .index_commit_incremental(repo_id, "c2", "c1", &changed, &[], None)
        .await
        .unwrap();

    let commit = store.get_indexed_commit(repo_id, "c2").await.unwrap().unwrap();
    assert_eq!(commit.status, CommitStatus::Complete);

    // Carried-forward file is present without reparsing it.
    let classes = store
        .find_symbols_by_name(commit.id, "UserService", Some("class"))
        .await
        .unwrap();
    assert_eq!(classes.len(), 1);

    // The changed file's new content is what is indexed.
    let old_call = store
        .usages_by_name(commit.id, "getUser", Some("src/app.ts"))
        .await
        .unwrap();
    assert!(old_call.is_empty());
    assert_eq!(report.files.len(), 1);

    // The base commit is required to exist and be complete.
    let missing = indexer
        .index_commit_incremental(repo_id, "c3", "nope", &[], &[], None)
        .await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn delete_file_data_removes_only_that_file() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let report = indexer
        .index_commit(repo_id, "c1", &ts_two_file_commit(), None)
        .await
        .unwrap();
    let commit_id = report.commit_id;

    store
        .delete_file_data(commit_id, "src/app.ts")
        .await
        .unwrap();

    let files = store.files_in_commit(commit_id).await.unwrap();
    assert_eq!(files, vec!["src/service.ts".to_string()]);
    assert!(store
        .usages_by_name(commit_id, "getUser", Some("src/app.ts"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .find_symbols_by_name(commit_id, "UserService", None)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn trigram_rows_match_symbol_names() {
    let (_dir, store) = open_store().await;
    let repo_id = store.register_repository("/repo", "repo").await.unwrap();
    let indexer = Indexer::new(&store);

    let files = vec![(
        "auth.py".to_string(),
        "def authenticate():\n    pass\n".to_string(),
    )];
    let report = indexer.index_commit(repo_id, "c1", &files, None).await.unwrap();

    let symbol = store
        .find_symbols_by_name(report.commit_id, "authenticate", None)
        .await
        .unwrap()
        .remove(0);

    let mut rows = store
        .connection()
        .query(
            "SELECT trigram FROM symbol_trigrams WHERE symbol_id = ?1",
            libsql::params![symbol.id],
        )
        .await
        .unwrap();
    let expected = sourcerack::store::trigrams("authenticate");
    let mut stored = std::collections::BTreeSet::new();
    while let Some(row) = rows.next().await.unwrap() {
        let trigram: String = row.get(0).unwrap();
        assert_eq!(trigram.chars().count(), 3);
        stored.insert(trigram);
    }
    assert_eq!(stored, expected);
}

/// Logical (order-independent) content of a commit, ids erased.
async fn logical_snapshot(
    store: &SqiStore,
    commit_id: i64,
) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut symbols: Vec<String> = store
        .all_symbols(commit_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| {
            format!(
                "{}|{}|{}|{}|{}|{}|{}",
                s.qualified_name, s.kind, s.file_path, s.start_line, s.end_line, s.is_exported,
                s.content_hash.unwrap_or_default()
            )
        })
        .collect();
    symbols.sort();

    let mut usages: Vec<String> = store
        .all_usages(commit_id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| {
            format!(
                "{}|{}|{}|{}|{}",
                u.file_path, u.line, u.column, u.usage_kind, u.symbol_name
            )
        })
        .collect();
    usages.sort();

    let mut imports: Vec<String> = store
        .all_imports(commit_id)
        .await
        .unwrap()
        .into_iter()
        .map(|i| {
            let bindings: Vec<String> = i
                .bindings
                .iter()
                .map(|b| format!("{}={}", b.imported_name, b.local_name))
                .collect();
            format!(
                "{}|{}|{}|{}|{}",
                i.file_path,
                i.line,
                i.import_type,
                i.module_specifier,
                bindings.join(",")
            )
        })
        .collect();
    imports.sort();

    (symbols, usages, imports)
}
