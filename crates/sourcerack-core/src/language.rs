//! Language detection and metadata.

use std::path::Path;

/// Languages the index understands.
///
/// Core languages always have a grammar available; optional languages depend
/// on a dynamically loaded grammar library being present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Ruby,
    Dart,
    Go,
    Rust,
    Java,
}

impl Language {
    /// Detect language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
            "py" | "pyi" | "pyw" => Some(Language::Python),
            "rb" => Some(Language::Ruby),
            "dart" => Some(Language::Dart),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Detect language from a file path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// File extensions this language handles.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => &["ts", "mts", "cts"],
            Language::Tsx => &["tsx"],
            Language::JavaScript => &["js", "mjs", "cjs", "jsx"],
            Language::Python => &["py", "pyi", "pyw"],
            Language::Ruby => &["rb"],
            Language::Dart => &["dart"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
            Language::Java => &["java"],
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
            Language::JavaScript => "JavaScript",
            Language::Python => "Python",
            Language::Ruby => "Ruby",
            Language::Dart => "Dart",
            Language::Go => "Go",
            Language::Rust => "Rust",
            Language::Java => "Java",
        }
    }

    /// Grammar name, matching tree-sitter grammar naming.
    pub fn grammar_name(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Ruby => "ruby",
            Language::Dart => "dart",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
        }
    }

    /// Short tags accepted wherever a language is named (e.g. extractor
    /// registries). The first entry is the canonical tag.
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            Language::TypeScript => &["typescript", "ts"],
            Language::Tsx => &["tsx"],
            Language::JavaScript => &["javascript", "js"],
            Language::Python => &["python", "py"],
            Language::Ruby => &["ruby", "rb"],
            Language::Dart => &["dart"],
            Language::Go => &["go", "golang"],
            Language::Rust => &["rust", "rs"],
            Language::Java => &["java"],
        }
    }

    /// Whether the grammar is linked into the binary. Optional grammars are
    /// probed from shared libraries at runtime instead.
    pub fn is_core(&self) -> bool {
        matches!(
            self,
            Language::TypeScript
                | Language::Tsx
                | Language::JavaScript
                | Language::Python
                | Language::Ruby
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_mapping() {
        assert_eq!(Language::from_extension("ts"), Some(Language::TypeScript));
        assert_eq!(Language::from_extension("tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("jsx"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("rb"), Some(Language::Ruby));
        assert_eq!(Language::from_extension("dart"), Some(Language::Dart));
        assert_eq!(Language::from_extension("txt"), None);
    }

    #[test]
    fn path_mapping_is_case_insensitive() {
        let path = PathBuf::from("src/App.TSX");
        assert_eq!(Language::from_path(&path), Some(Language::Tsx));
    }

    #[test]
    fn core_languages() {
        assert!(Language::Python.is_core());
        assert!(Language::TypeScript.is_core());
        assert!(!Language::Dart.is_core());
        assert!(!Language::Go.is_core());
    }
}
