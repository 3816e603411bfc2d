//! Query engine behavior against indexed commits: endpoints, fuzzy search,
//! dead code, impact, summaries, and the structured error surface.

use sourcerack::indexer::Indexer;
use sourcerack::query::{HierarchyDirection, QueryEngine};
use sourcerack::store::SqiStore;
use sourcerack::{QueryError, StaticCommitSource};
use std::sync::Arc;
use tempfile::TempDir;

/// Capture engine/store tracing in test output (RUST_LOG controls level).
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

async fn index(store: &SqiStore, repo: &str, sha: &str, files: &[(&str, &str)]) -> i64 {
    let repo_id = store.register_repository(repo, "repo").await.unwrap();
    let owned: Vec<(String, String)> = files
        .iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect();
    Indexer::new(store)
        .index_commit(repo_id, sha, &owned, None)
        .await
        .unwrap();
    repo_id
}

#[tokio::test]
async fn flask_route_endpoint() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/api",
        "c1",
        &[(
            "app.py",
            "from flask import Flask\n\napp = Flask(__name__)\n\n@app.route('/users/<int:uid>', methods=['GET', 'POST'])\ndef users(uid):\n    \"List or create.\"\n",
        )],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let endpoints = engine
        .find_endpoints("/api", "c1", None, None, None)
        .await
        .unwrap();

    assert_eq!(endpoints.len(), 1);
    let e = &endpoints[0];
    assert_eq!(e.http_method, "ALL");
    assert_eq!(e.path, "/users/<int:uid>");
    assert_eq!(e.framework, "flask");
    assert_eq!(e.summary.as_deref(), Some("List or create."));
    assert_eq!(e.params.len(), 1);
    assert_eq!(e.params[0].name, "uid");
    assert_eq!(e.params[0].location, "path");

    // Path params stay a subset of the template placeholders.
    for param in e.params.iter().filter(|p| p.location == "path") {
        assert!(e.path.contains(&param.name));
    }

    let stats = engine.get_endpoint_stats("/api", "c1").await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_framework[0].0, "flask");
}

#[tokio::test]
async fn rails_namespaced_resources() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/rails",
        "c1",
        &[(
            "config/routes.rb",
            "Rails.application.routes.draw do\n  namespace :api do\n    resources :posts, only: [:index, :show]\n  end\nend\n",
        )],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let endpoints = engine
        .find_endpoints("/rails", "c1", None, None, None)
        .await
        .unwrap();

    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].http_method, "GET");
    assert_eq!(endpoints[0].path, "/api/posts");
    assert_eq!(endpoints[0].handler.as_deref(), Some("posts#index"));
    assert_eq!(endpoints[1].http_method, "GET");
    assert_eq!(endpoints[1].path, "/api/posts/:id");
    assert_eq!(endpoints[1].handler.as_deref(), Some("posts#show"));
}

#[tokio::test]
async fn fuzzy_definition_lookup() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/auth",
        "c1",
        &[(
            "auth.py",
            "def authenticate():\n    pass\n\ndef authorize():\n    pass\n\ndef authentication():\n    pass\n",
        )],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let result = engine
        .find_definition("/auth", "c1", "autenticate", None, true, 0.4)
        .await
        .unwrap();

    assert!(result.exact.is_empty());
    assert!(!result.fuzzy.is_empty());
    assert_eq!(result.fuzzy[0].symbol.name, "authenticate");
    let authenticate_pos = result
        .fuzzy
        .iter()
        .position(|m| m.symbol.name == "authenticate")
        .unwrap();
    if let Some(authentication_pos) = result
        .fuzzy
        .iter()
        .position(|m| m.symbol.name == "authentication")
    {
        assert!(authenticate_pos < authentication_pos);
    }
    // No fuzzy row repeats the query as an exact name.
    assert!(result.fuzzy.iter().all(|m| m.symbol.name != "autenticate"));

    // The exact list is a subset of itself under fuzzy mode.
    let plain = engine
        .find_definition("/auth", "c1", "authenticate", None, false, 0.0)
        .await
        .unwrap();
    let with_fuzzy = engine
        .find_definition("/auth", "c1", "authenticate", None, true, 0.4)
        .await
        .unwrap();
    assert_eq!(plain.exact.len(), with_fuzzy.exact.len());
    assert!(with_fuzzy.fuzzy.iter().all(|m| m.symbol.name != "authenticate"));

    // Empty query returns empty, never an error.
    let empty = engine
        .find_definition("/auth", "c1", "", None, true, 0.4)
        .await
        .unwrap();
    assert!(empty.exact.is_empty());
    assert!(empty.fuzzy.is_empty());
}

#[tokio::test]
async fn dead_code_detection() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/dead",
        "c1",
        &[
            (
                "src/util.ts",
                "export function helper() {}\nexport function used() {}\n",
            ),
            ("src/app.ts", "import { used } from './util';\nused();\n"),
        ],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let dead = engine
        .find_dead_code("/dead", "c1", true, 50)
        .await
        .unwrap();

    let names: Vec<&str> = dead.iter().map(|d| d.symbol.name.as_str()).collect();
    assert!(names.contains(&"helper"));
    assert!(!names.contains(&"used"));
}

#[tokio::test]
async fn impact_walks_enclosing_chain() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/impact",
        "c1",
        &[(
            "chain.py",
            "def c():\n    pass\n\ndef b():\n    c()\n\ndef a():\n    b()\n",
        )],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let impact = engine
        .analyze_change_impact("/impact", "c1", "c", 2)
        .await
        .unwrap();

    assert_eq!(impact.symbol.name, "c");
    assert_eq!(impact.direct_usages.len(), 1);
    assert_eq!(impact.direct_usages[0].enclosing.as_deref(), Some("b"));

    let at_depth = |d: usize| -> Vec<&str> {
        impact
            .transitive_impact
            .iter()
            .filter(|e| e.depth == d)
            .map(|e| e.symbol.name.as_str())
            .collect()
    };
    assert_eq!(at_depth(1), vec!["b"]);
    assert_eq!(at_depth(2), vec!["a"]);

    // Depth 0 keeps direct usages but an empty transitive set.
    let shallow = engine
        .analyze_change_impact("/impact", "c1", "c", 0)
        .await
        .unwrap();
    assert!(shallow.transitive_impact.is_empty());
    assert_eq!(shallow.direct_usages.len(), 1);

    // Unknown symbols are a structured error for this strict query.
    let missing = engine
        .analyze_change_impact("/impact", "c1", "zz", 2)
        .await;
    assert!(matches!(missing, Err(QueryError::SymbolNotFound(_))));
}

#[tokio::test]
async fn usages_with_context_snippets() {
    let (_dir, store) = open_store().await;
    let app = "import { UserService } from './service';\nnew UserService().getUser(\"x\");\n";
    let service = "export class UserService { async getUser(id: string) {} }\n";
    index(
        &store,
        "/ctx",
        "c1",
        &[("src/service.ts", service), ("src/app.ts", app)],
    )
    .await;

    let mut source = StaticCommitSource::new();
    source.add_file("c1", "src/app.ts", app);
    source.add_file("c1", "src/service.ts", service);
    source.add_ref("main", "c1");

    let mut engine = QueryEngine::new(&store);
    engine.register_source("/ctx", Arc::new(source));

    // A symbolic ref resolves through the commit source.
    let usages = engine
        .find_usages("/ctx", "main", "getUser", None, false)
        .await
        .unwrap();
    // The definition site in service.ts is not a usage; only the call is.
    assert_eq!(usages.exact.len(), 1);
    let app_usage = usages
        .exact
        .iter()
        .find(|u| u.usage.file_path == "src/app.ts")
        .unwrap();
    assert!(app_usage.context.as_ref().unwrap().contains("getUser(\"x\")"));

    // Without readable content the result still comes back, snippet empty.
    let plain_engine = QueryEngine::new(&store);
    let usages = plain_engine
        .find_usages("/ctx", "c1", "getUser", None, false)
        .await
        .unwrap();
    assert!(usages.exact.iter().all(|u| u.context.is_none()));
}

#[tokio::test]
async fn hierarchy_directions() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/hier",
        "c1",
        &[(
            "shop.py",
            "class Cart:\n    def add(self):\n        pass\n\n    def total(self):\n        pass\n",
        )],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let hierarchy = engine
        .find_hierarchy("/hier", "c1", "Cart", HierarchyDirection::Both)
        .await
        .unwrap();
    let child_names: Vec<&str> = hierarchy
        .children
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(child_names, vec!["add", "total"]);
    assert!(hierarchy.parents.is_empty());

    let parents = engine
        .find_hierarchy("/hier", "c1", "add", HierarchyDirection::Parents)
        .await
        .unwrap();
    assert_eq!(parents.parents.len(), 1);
    assert_eq!(parents.parents[0].name, "Cart");

    let missing = engine
        .find_hierarchy("/hier", "c1", "Missing", HierarchyDirection::Both)
        .await;
    assert!(matches!(missing, Err(QueryError::SymbolNotFound(_))));
}

#[tokio::test]
async fn summary_and_dependency_graph() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/sum",
        "c1",
        &[
            (
                "src/app.ts",
                "import express from 'express';\nimport { helper } from './util';\nhelper();\n",
            ),
            ("src/util.ts", "export function helper() {}\n"),
            ("tools/check.py", "import json\n\ndef main():\n    pass\n"),
        ],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let summary = engine.codebase_summary("/sum", "c1").await.unwrap();

    assert_eq!(summary.totals.files, 3);
    assert!(summary.totals.symbols >= 2);
    assert!(summary
        .languages
        .iter()
        .any(|(lang, count)| lang == "TypeScript" && *count == 2));
    assert!(summary.entry_points.contains(&"src/app.ts".to_string()));
    assert!(summary
        .external_dependencies
        .iter()
        .any(|(name, _)| name == "express"));
    assert!(summary
        .hotspots
        .iter()
        .any(|h| h.symbol.name == "helper" && h.usage_count >= 1));

    let graph = engine.get_dependency_graph("/sum", "c1", 10).await.unwrap();
    assert!(graph
        .edges
        .iter()
        .any(|e| e.from == "src" && e.to == "express" && e.kind == "external"));
    assert!(graph.nodes.contains(&"src".to_string()));
}

#[tokio::test]
async fn symbol_context() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/ctx2",
        "c1",
        &[(
            "lib.py",
            "class Repo:\n    def fetch(self, key: str, default=None):\n        \"Fetch a key.\"\n        return key\n\n\ndef caller():\n    Repo().fetch('x')\n",
        )],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let context = engine.get_symbol_context("/ctx2", "c1", "fetch").await.unwrap();

    assert_eq!(context.symbol.qualified_name, "Repo.fetch");
    assert_eq!(context.parent_chain.len(), 1);
    assert_eq!(context.parent_chain[0].name, "Repo");
    assert!(context.parameters.iter().any(|p| p.name == "key"));
    assert!(context
        .parameters
        .iter()
        .any(|p| p.name == "default" && p.is_optional));
    assert_eq!(
        context.docstring.as_ref().and_then(|d| d.description.as_deref()),
        Some("Fetch a key.")
    );
    assert_eq!(context.usage_count, 1);
}

#[tokio::test]
async fn structured_errors_for_unresolvable_targets() {
    let (_dir, store) = open_store().await;
    let engine = QueryEngine::new(&store);

    let unregistered = engine
        .find_definition("/nope", "c1", "x", None, false, 0.0)
        .await;
    match unregistered {
        Err(err) => assert_eq!(err.code(), "repository-not-registered"),
        Ok(_) => panic!("expected error"),
    }

    store.register_repository("/repo", "repo").await.unwrap();
    let not_indexed = engine
        .find_definition("/repo", "c1", "x", None, false, 0.0)
        .await;
    match not_indexed {
        Err(err) => assert_eq!(err.code(), "commit-not-indexed"),
        Ok(_) => panic!("expected error"),
    }

    // An in-progress commit is rejected until it completes.
    let repo = store.get_repository_by_path("/repo").await.unwrap().unwrap();
    store.start_indexing(repo.id, "c1").await.unwrap();
    let incomplete = engine
        .find_definition("/repo", "c1", "x", None, false, 0.0)
        .await;
    match incomplete {
        Err(err) => assert_eq!(err.code(), "commit-indexing-incomplete"),
        Ok(_) => panic!("expected error"),
    }
}

#[tokio::test]
async fn cross_repo_queries_tag_results() {
    let (_dir, store) = open_store().await;
    index(
        &store,
        "/one",
        "a1",
        &[("a.py", "def shared():\n    pass\n")],
    )
    .await;
    index(
        &store,
        "/two",
        "b1",
        &[("b.py", "def shared():\n    pass\n\ndef only_here():\n    pass\n")],
    )
    .await;

    let engine = QueryEngine::new(&store);
    let results = engine
        .find_definition_all_repos("shared", None, false, 0.0, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let paths: Vec<&str> = results.iter().map(|r| r.repo.path.as_str()).collect();
    assert!(paths.contains(&"/one"));
    assert!(paths.contains(&"/two"));

    let two = store.get_repository_by_path("/two").await.unwrap().unwrap();
    let subset = engine
        .find_definition_all_repos("only_here", None, false, 0.0, Some(&[two.id]))
        .await
        .unwrap();
    assert_eq!(subset.len(), 1);
    assert_eq!(subset[0].repo.path, "/two");
}
