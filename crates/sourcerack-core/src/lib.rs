//! Language detection and tree-sitter grammar management for SourceRack.
//!
//! The parser façade maps file paths to language tags and parses source into
//! syntax trees. Grammars for the core languages (TypeScript, JavaScript,
//! Python, Ruby) are linked statically; optional grammars (Dart, Go, Rust,
//! Java) are probed from shared libraries on demand and may be absent, in
//! which case parsing reports `ParseError::GrammarUnavailable` and callers
//! skip the file.

mod grammars;
mod language;

pub use grammars::{parse_source, parser_for, GrammarStore, ParseError};
pub use language::Language;
