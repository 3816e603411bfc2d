//! Language-neutral record stream emitted by extractors.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Symbol kind classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Constructor,
    Class,
    Interface,
    Enum,
    TypeAlias,
    Trait,
    Namespace,
    Module,
    Getter,
    Setter,
    Field,
    Property,
    Variable,
    Constant,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Enum => "enum",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Trait => "trait",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Module => "module",
            SymbolKind::Getter => "getter",
            SymbolKind::Setter => "setter",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "constructor" => Some(SymbolKind::Constructor),
            "class" => Some(SymbolKind::Class),
            "interface" => Some(SymbolKind::Interface),
            "enum" => Some(SymbolKind::Enum),
            "type_alias" => Some(SymbolKind::TypeAlias),
            "trait" => Some(SymbolKind::Trait),
            "namespace" => Some(SymbolKind::Namespace),
            "module" => Some(SymbolKind::Module),
            "getter" => Some(SymbolKind::Getter),
            "setter" => Some(SymbolKind::Setter),
            "field" => Some(SymbolKind::Field),
            "property" => Some(SymbolKind::Property),
            "variable" => Some(SymbolKind::Variable),
            "constant" => Some(SymbolKind::Constant),
            _ => None,
        }
    }
}

/// Symbol visibility. `None` on a record means the language has no applicable
/// notion for that symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            _ => None,
        }
    }
}

/// How a reference site uses a name, determined by syntactic context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Read,
    Write,
    Call,
    Instantiate,
    Extend,
    Implement,
    TypeRef,
    Decorator,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Read => "read",
            UsageKind::Write => "write",
            UsageKind::Call => "call",
            UsageKind::Instantiate => "instantiate",
            UsageKind::Extend => "extend",
            UsageKind::Implement => "implement",
            UsageKind::TypeRef => "type_ref",
            UsageKind::Decorator => "decorator",
        }
    }
}

/// The statement form an import was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    EsImport,
    Commonjs,
    Python,
    Require,
    RequireRelative,
    Dart,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::EsImport => "es_import",
            ImportType::Commonjs => "commonjs",
            ImportType::Python => "python",
            ImportType::Require => "require",
            ImportType::RequireRelative => "require_relative",
            ImportType::Dart => "dart",
        }
    }
}

/// One declared parameter, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterRecord {
    pub name: String,
    pub type_annotation: Option<String>,
    pub is_optional: bool,
}

/// Documentation attached to a symbol; at most one per symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocstringRecord {
    /// Documentation convention: "docstring", "jsdoc", "dartdoc", "comment".
    pub doc_type: String,
    pub raw_text: String,
    /// First sentence/line, cleaned of comment markers.
    pub description: String,
}

/// A named definition extracted from one file. Parent linkage uses the
/// parent's qualified name; the store resolves it to a row id at insert time
/// (parents are always emitted before their children).
#[derive(Debug, Clone, Serialize)]
pub struct SymbolRecord {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub start_line: usize,
    pub end_line: usize,
    pub visibility: Option<Visibility>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_exported: bool,
    pub return_type: Option<String>,
    /// Qualified name of the enclosing symbol, if any.
    pub parent: Option<String>,
    /// Content-derived digest of the symbol's source span.
    pub content_hash: String,
    pub parameters: Vec<ParameterRecord>,
    pub docstring: Option<DocstringRecord>,
}

/// A reference to a name at a source location.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub name: String,
    pub line: usize,
    pub column: usize,
    pub kind: UsageKind,
}

/// One name bound by an import; `imported_name == "*"` is a namespace or
/// wildcard binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportBindingRecord {
    pub imported_name: String,
    pub local_name: String,
    pub is_type_only: bool,
}

/// One import statement.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRecord {
    pub line: usize,
    pub import_type: ImportType,
    pub module_specifier: String,
    pub bindings: Vec<ImportBindingRecord>,
}

/// Everything an extractor produces for one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    pub symbols: Vec<SymbolRecord>,
    pub usages: Vec<UsageRecord>,
    pub imports: Vec<ImportRecord>,
}

/// Collects usages while deduplicating on (line, column, name): when the
/// same identifier is seen twice at one location, the first classification
/// wins.
#[derive(Debug, Default)]
pub struct UsageSink {
    seen: std::collections::HashSet<(usize, usize, String)>,
    usages: Vec<UsageRecord>,
}

impl UsageSink {
    pub fn push(&mut self, name: &str, line: usize, column: usize, kind: UsageKind) {
        if name.is_empty() {
            return;
        }
        if self.seen.insert((line, column, name.to_string())) {
            self.usages.push(UsageRecord {
                name: name.to_string(),
                line,
                column,
                kind,
            });
        }
    }

    pub fn into_usages(self) -> Vec<UsageRecord> {
        self.usages
    }
}

/// Digest of a symbol's source span, used to detect unchanged symbols
/// between commits.
pub fn content_hash(span: &str) -> String {
    let digest = Sha256::digest(span.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in [
            SymbolKind::Function,
            SymbolKind::TypeAlias,
            SymbolKind::Getter,
            SymbolKind::Constant,
        ] {
            assert_eq!(SymbolKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(SymbolKind::parse("unknown"), None);
    }

    #[test]
    fn content_hash_is_stable_and_short() {
        let a = content_hash("def foo(): pass");
        let b = content_hash("def foo(): pass");
        let c = content_hash("def bar(): pass");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }
}
