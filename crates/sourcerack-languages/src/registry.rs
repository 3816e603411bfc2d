//! Extractor registry with language-tag lookup.

use crate::SymbolExtractor;
use sourcerack_core::Language;
use std::sync::{OnceLock, RwLock};

/// Global extractor registry.
static EXTRACTORS: RwLock<Vec<&'static dyn SymbolExtractor>> = RwLock::new(Vec::new());
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Register an extractor. Built-ins are registered automatically on first
/// lookup; call this before first use to add custom extractors.
pub fn register(extractor: &'static dyn SymbolExtractor) {
    EXTRACTORS.write().unwrap().push(extractor);
}

fn init_builtin() {
    INITIALIZED.get_or_init(|| {
        register(&crate::ecmascript::Ecmascript);
        register(&crate::python::Python);
        register(&crate::ruby::Ruby);
        register(&crate::dart::Dart);
    });
}

/// Find the extractor handling a language.
pub fn extractor_for(lang: Language) -> Option<&'static dyn SymbolExtractor> {
    init_builtin();
    EXTRACTORS
        .read()
        .unwrap()
        .iter()
        .find(|e| e.handles(lang))
        .copied()
}

/// Find an extractor by language tag or alias (e.g. "ts", "typescript").
pub fn extractor_for_tag(tag: &str) -> Option<&'static dyn SymbolExtractor> {
    let tag = tag.to_lowercase();
    let lang = [
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
    .find(|l| l.tags().contains(&tag.as_str()))?;
    extractor_for(lang)
}

/// Languages covered by some registered extractor.
pub fn supported_languages() -> Vec<Language> {
    init_builtin();
    let extractors = EXTRACTORS.read().unwrap();
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
    .filter(|l| extractors.iter().any(|e| e.handles(*l)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        assert!(extractor_for(Language::TypeScript).is_some());
        assert!(extractor_for(Language::Tsx).is_some());
        assert!(extractor_for(Language::JavaScript).is_some());
        assert!(extractor_for(Language::Python).is_some());
        assert!(extractor_for(Language::Ruby).is_some());
        assert!(extractor_for(Language::Dart).is_some());
        assert!(extractor_for(Language::Go).is_none());
    }

    #[test]
    fn tag_aliases() {
        assert!(extractor_for_tag("ts").is_some());
        assert!(extractor_for_tag("TypeScript").is_some());
        assert!(extractor_for_tag("py").is_some());
        assert!(extractor_for_tag("rb").is_some());
        assert!(extractor_for_tag("cobol").is_none());
    }

    #[test]
    fn supported_covers_all_four_families() {
        let langs = supported_languages();
        assert!(langs.contains(&Language::TypeScript));
        assert!(langs.contains(&Language::Python));
        assert!(langs.contains(&Language::Ruby));
        assert!(langs.contains(&Language::Dart));
    }
}
