//! Grammar loading and the parse façade.
//!
//! Core grammars come from statically linked crates. Optional grammars are
//! loaded from shared libraries (.so/.dylib/.dll) found in the search paths:
//!
//! 1. `SOURCERACK_GRAMMAR_PATH` environment variable (colon-separated)
//! 2. `~/.config/sourcerack/grammars/`
//!
//! Probe results (including failures) are cached so a missing grammar is
//! only looked up once per process.

use crate::Language;
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use tree_sitter::Parser;
use tree_sitter_language::LanguageFn;

/// Why a file could not be parsed. Both variants are non-fatal: the indexer
/// skips the file and the commit still completes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no grammar available for {}", .0.name())]
    GrammarUnavailable(Language),
    #[error("{} parse produced no tree", .0.name())]
    ParseFailed(Language),
}

/// Loaded dynamic grammar. The library must stay alive while the Language is
/// in use.
struct LoadedGrammar {
    _library: Library,
    language: tree_sitter::Language,
}

/// Grammar store: static core grammars plus dynamically probed optional ones.
pub struct GrammarStore {
    search_paths: Vec<PathBuf>,
    cache: RwLock<HashMap<Language, Option<Arc<LoadedGrammar>>>>,
}

impl GrammarStore {
    pub fn new() -> Self {
        let mut paths = Vec::new();

        if let Ok(env_path) = std::env::var("SOURCERACK_GRAMMAR_PATH") {
            for p in env_path.split(':') {
                if !p.is_empty() {
                    paths.push(PathBuf::from(p));
                }
            }
        }

        if let Some(config) = dirs::config_dir() {
            paths.push(config.join("sourcerack/grammars"));
        }

        Self {
            search_paths: paths,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store with explicit search paths.
    pub fn with_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths: paths,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get the tree-sitter language for a tag, if available.
    pub fn get(&self, lang: Language) -> Option<tree_sitter::Language> {
        if let Some(language) = static_grammar(lang) {
            return Some(language);
        }

        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(&lang) {
                return cached.as_ref().map(|g| g.language.clone());
            }
        }

        let loaded = self.probe(lang);
        let language = loaded.as_ref().map(|g| g.language.clone());
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(lang, loaded);
        }
        language
    }

    /// Whether a grammar can be obtained for this language.
    pub fn is_available(&self, lang: Language) -> bool {
        self.get(lang).is_some()
    }

    /// Languages with a usable grammar right now.
    pub fn available(&self) -> Vec<Language> {
        [
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Python,
            Language::Ruby,
            Language::Dart,
            Language::Go,
            Language::Rust,
            Language::Java,
        ]
        .into_iter()
        .filter(|l| self.is_available(*l))
        .collect()
    }

    /// Look for a shared library in the search paths.
    fn probe(&self, lang: Language) -> Option<Arc<LoadedGrammar>> {
        let lib_name = format!("{}{}", lang.grammar_name(), grammar_extension());

        for search_path in &self.search_paths {
            let lib_path = search_path.join(&lib_name);
            if lib_path.exists() {
                if let Some(loaded) = load_from_path(lang, &lib_path) {
                    return Some(loaded);
                }
            }
        }

        tracing::debug!(language = lang.name(), "grammar library not found");
        None
    }
}

impl Default for GrammarStore {
    fn default() -> Self {
        Self::new()
    }
}

fn static_grammar(lang: Language) -> Option<tree_sitter::Language> {
    match lang {
        Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        Language::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
        _ => None,
    }
}

fn load_from_path(lang: Language, path: &Path) -> Option<Arc<LoadedGrammar>> {
    // Safety: loading shared libraries is inherently unsafe. Grammars in the
    // search paths are trusted.
    let library = unsafe { Library::new(path).ok()? };

    let symbol_name = format!("tree_sitter_{}", lang.grammar_name().replace('-', "_"));
    let language = unsafe {
        let func: Symbol<unsafe extern "C" fn() -> *const ()> =
            library.get(symbol_name.as_bytes()).ok()?;
        let lang_fn = LanguageFn::from_raw(*func);
        tree_sitter::Language::new(lang_fn)
    };

    Some(Arc::new(LoadedGrammar {
        _library: library,
        language,
    }))
}

/// Shared library extension for the current platform.
fn grammar_extension() -> &'static str {
    if cfg!(target_os = "macos") {
        ".dylib"
    } else if cfg!(target_os = "windows") {
        ".dll"
    } else {
        ".so"
    }
}

/// Global grammar store singleton - avoids re-probing for each parse.
static GRAMMAR_STORE: OnceLock<GrammarStore> = OnceLock::new();

fn grammar_store() -> &'static GrammarStore {
    GRAMMAR_STORE.get_or_init(GrammarStore::new)
}

/// Create a parser for a language, if its grammar is available.
pub fn parser_for(lang: Language) -> Option<Parser> {
    let language = grammar_store().get(lang)?;
    let mut parser = Parser::new();
    parser.set_language(&language).ok()?;
    Some(parser)
}

/// Parse source code for a language.
pub fn parse_source(lang: Language, source: &str) -> Result<tree_sitter::Tree, ParseError> {
    let mut parser = parser_for(lang).ok_or(ParseError::GrammarUnavailable(lang))?;
    parser
        .parse(source, None)
        .ok_or(ParseError::ParseFailed(lang))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_grammars_parse() {
        let tree = parse_source(Language::Python, "def foo():\n    pass\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");

        let tree = parse_source(Language::TypeScript, "export class A {}\n").unwrap();
        assert_eq!(tree.root_node().kind(), "program");

        let tree = parse_source(Language::Ruby, "def foo\nend\n").unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn optional_grammar_reports_unavailable() {
        let store = GrammarStore::with_paths(vec![PathBuf::from("/nonexistent")]);
        assert!(store.get(Language::Dart).is_none());
        assert!(!store.is_available(Language::Go));
    }

    #[test]
    fn available_includes_core() {
        let store = GrammarStore::with_paths(Vec::new());
        let available = store.available();
        assert!(available.contains(&Language::Python));
        assert!(available.contains(&Language::TypeScript));
        assert!(available.contains(&Language::Ruby));
    }
}
