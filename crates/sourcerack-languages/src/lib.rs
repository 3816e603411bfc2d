//! Language-neutral extraction records and per-language extractors.
//!
//! Each supported language implements [`SymbolExtractor`]: given a parsed
//! syntax tree, a file path, and the source text, it emits the triple of
//! symbol, usage, and import records that the store persists. Extractors are
//! looked up through a registry keyed by language tag plus aliases.

mod records;
mod registry;
mod walk;

pub mod dart;
pub mod ecmascript;
pub mod python;
pub mod ruby;

pub use records::{
    content_hash, DocstringRecord, Extraction, ImportBindingRecord, ImportRecord, ImportType,
    ParameterRecord, SymbolKind, SymbolRecord, UsageKind, UsageRecord, UsageSink, Visibility,
};
pub use registry::{extractor_for, extractor_for_tag, register, supported_languages};
pub use walk::{
    children_of_kind, descendants_of_kind, end_line, field_text, first_child_of_kind, has_ancestor,
    has_keyword, node_text, start_column, start_line,
};

use sourcerack_core::Language;
use tree_sitter::Tree;

/// Per-language extraction capability.
///
/// Implementations walk the tree with the shared helpers in [`walk`] rather
/// than generated visitors; node kinds are the grammar's node names.
pub trait SymbolExtractor: Send + Sync {
    /// Primary language this extractor is registered for.
    fn language(&self) -> Language;

    /// All languages this extractor handles (e.g. the ECMAScript extractor
    /// covers TypeScript, TSX, and JavaScript).
    fn handles(&self, lang: Language) -> bool {
        lang == self.language()
    }

    /// Extract symbols, usages, and imports from one file.
    fn extract(&self, tree: &Tree, path: &str, source: &str) -> Extraction;
}
