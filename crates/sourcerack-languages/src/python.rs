//! Python extraction.

use crate::records::UsageSink;
use crate::walk::{
    end_line, field_text, first_child_of_kind, has_ancestor, node_text, start_column, start_line,
};
use crate::{
    content_hash, DocstringRecord, Extraction, ImportBindingRecord, ImportRecord, ImportType,
    ParameterRecord, SymbolExtractor, SymbolKind, SymbolRecord, UsageKind, Visibility,
};
use sourcerack_core::Language;
use tree_sitter::{Node, Tree};

const BUILTINS: &[&str] = &[
    "self",
    "cls",
    "print",
    "len",
    "range",
    "str",
    "int",
    "float",
    "bool",
    "bytes",
    "list",
    "dict",
    "set",
    "tuple",
    "frozenset",
    "type",
    "object",
    "isinstance",
    "issubclass",
    "super",
    "staticmethod",
    "classmethod",
    "property",
    "enumerate",
    "zip",
    "map",
    "filter",
    "sorted",
    "reversed",
    "sum",
    "min",
    "max",
    "abs",
    "round",
    "any",
    "all",
    "open",
    "getattr",
    "setattr",
    "hasattr",
    "delattr",
    "repr",
    "hash",
    "id",
    "iter",
    "next",
    "vars",
    "callable",
    "format",
    "input",
    "Exception",
    "BaseException",
    "ValueError",
    "TypeError",
    "KeyError",
    "IndexError",
    "AttributeError",
    "RuntimeError",
    "NotImplementedError",
    "StopIteration",
    "__name__",
    "__file__",
    "__doc__",
];

pub struct Python;

impl SymbolExtractor for Python {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, tree: &Tree, _path: &str, source: &str) -> Extraction {
        let mut out = Extraction::default();
        let root = tree.root_node();
        let mut scope = Vec::new();
        collect_declarations(&root, source, &mut scope, false, &mut out);

        let mut sink = UsageSink::default();
        collect_usages(&root, source, &mut sink);
        out.usages = sink.into_usages();
        out
    }
}

// ============================================================================
// Symbols and imports
// ============================================================================

fn collect_declarations(
    node: &Node,
    source: &str,
    scope: &mut Vec<String>,
    in_class: bool,
    out: &mut Extraction,
) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    drop(cursor);

    for child in children {
        match child.kind() {
            "decorated_definition" => {
                let decorators = decorator_names(&child, source);
                if let Some(definition) = child.child_by_field_name("definition") {
                    collect_definition(&definition, source, scope, in_class, &decorators, out);
                }
            }
            "function_definition" | "class_definition" => {
                collect_definition(&child, source, scope, in_class, &[], out);
            }
            "expression_statement" => {
                collect_assignment(&child, source, scope, in_class, out);
            }
            "import_statement" | "import_from_statement" => {
                out.imports.extend(python_imports(&child, source));
            }
            // if __name__ == "__main__" blocks and similar wrappers
            "if_statement" | "try_statement" | "with_statement" => {
                collect_declarations(&child, source, scope, in_class, out);
            }
            "block" => {
                collect_declarations(&child, source, scope, in_class, out);
            }
            _ => {}
        }
    }
}

fn collect_definition(
    node: &Node,
    source: &str,
    scope: &mut Vec<String>,
    in_class: bool,
    decorators: &[String],
    out: &mut Extraction,
) {
    let name = match field_text(node, "name", source) {
        Some(n) => n,
        None => return,
    };

    match node.kind() {
        "function_definition" => {
            let kind = if decorators.iter().any(|d| d == "property") {
                SymbolKind::Getter
            } else if decorators.iter().any(|d| d.ends_with(".setter")) {
                SymbolKind::Setter
            } else if in_class && name == "__init__" {
                SymbolKind::Constructor
            } else if in_class {
                SymbolKind::Method
            } else {
                SymbolKind::Function
            };
            let is_static = decorators
                .iter()
                .any(|d| d == "staticmethod" || d == "classmethod");
            let is_async = node
                .child(0)
                .map(|c| node_text(&c, source) == "async")
                .unwrap_or(false);

            let mut record = base_record(node, source, scope, &name, kind);
            record.is_async = is_async;
            record.is_static = is_static;
            record.parameters = python_parameters(node, source);
            record.return_type = field_text(node, "return_type", source);
            record.docstring = python_docstring(node, source);
            out.symbols.push(record);

            scope.push(name);
            if let Some(body) = node.child_by_field_name("body") {
                collect_declarations(&body, source, scope, false, out);
            }
            scope.pop();
        }
        "class_definition" => {
            let mut record = base_record(node, source, scope, &name, SymbolKind::Class);
            record.docstring = python_docstring(node, source);
            out.symbols.push(record);

            scope.push(name);
            if let Some(body) = node.child_by_field_name("body") {
                collect_declarations(&body, source, scope, true, out);
            }
            scope.pop();
        }
        _ => {}
    }
}

/// Module-level assignments become variables/constants; class-level become
/// fields.
fn collect_assignment(
    statement: &Node,
    source: &str,
    scope: &mut Vec<String>,
    in_class: bool,
    out: &mut Extraction,
) {
    let assignment = match statement.named_child(0) {
        Some(a) if a.kind() == "assignment" => a,
        _ => return,
    };
    let left = match assignment.child_by_field_name("left") {
        Some(l) if l.kind() == "identifier" => l,
        _ => return,
    };
    let name = node_text(&left, source).to_string();
    let kind = if in_class {
        SymbolKind::Field
    } else if name.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit()) {
        SymbolKind::Constant
    } else {
        SymbolKind::Variable
    };

    let mut record = base_record(&assignment, source, scope, &name, kind);
    record.return_type = field_text(&assignment, "type", source);
    out.symbols.push(record);
}

fn base_record(
    node: &Node,
    source: &str,
    scope: &[String],
    name: &str,
    kind: SymbolKind,
) -> SymbolRecord {
    let qualified_name = if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope.join("."), name)
    };
    SymbolRecord {
        name: name.to_string(),
        qualified_name,
        kind,
        start_line: start_line(node),
        end_line: end_line(node),
        visibility: Some(python_visibility(name)),
        is_async: false,
        is_static: false,
        is_exported: !name.starts_with('_'),
        return_type: None,
        parent: if scope.is_empty() {
            None
        } else {
            Some(scope.join("."))
        },
        content_hash: content_hash(node_text(node, source)),
        parameters: Vec::new(),
        docstring: None,
    }
}

/// Name-convention visibility: `_name` private, `__dunder__` public,
/// `__name` (not dunder) private.
fn python_visibility(name: &str) -> Visibility {
    if name.starts_with("__") && name.ends_with("__") {
        Visibility::Public
    } else if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn decorator_names(decorated: &Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = decorated.walk();
    for child in decorated.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        if let Some(inner) = child.named_child(0) {
            let text = match inner.kind() {
                // @app.route(...) -> app.route
                "call" => inner
                    .child_by_field_name("function")
                    .map(|f| node_text(&f, source).to_string())
                    .unwrap_or_default(),
                _ => node_text(&inner, source).to_string(),
            };
            names.push(text);
        }
    }
    names
}

fn python_parameters(node: &Node, source: &str) -> Vec<ParameterRecord> {
    let params = match node.child_by_field_name("parameters") {
        Some(p) => p,
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "identifier" => out.push(ParameterRecord {
                name: node_text(&child, source).to_string(),
                type_annotation: None,
                is_optional: false,
            }),
            "typed_parameter" => {
                let name = child
                    .named_child(0)
                    .map(|n| node_text(&n, source).to_string())
                    .unwrap_or_default();
                out.push(ParameterRecord {
                    name,
                    type_annotation: field_text(&child, "type", source),
                    is_optional: false,
                });
            }
            "default_parameter" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(ParameterRecord {
                        name,
                        type_annotation: None,
                        is_optional: true,
                    });
                }
            }
            "typed_default_parameter" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(ParameterRecord {
                        name,
                        type_annotation: field_text(&child, "type", source),
                        is_optional: true,
                    });
                }
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => out.push(ParameterRecord {
                name: node_text(&child, source).to_string(),
                type_annotation: None,
                is_optional: true,
            }),
            _ => {}
        }
    }
    out
}

/// First statement of the body when it is a string literal.
fn python_docstring(node: &Node, source: &str) -> Option<DocstringRecord> {
    let body = node.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    let string_node = match first.kind() {
        "string" => first,
        "expression_statement" => first
            .named_child(0)
            .filter(|n| n.kind() == "string")?,
        _ => return None,
    };

    let raw = first_child_of_kind(&string_node, "string_content")
        .map(|c| node_text(&c, source).trim().to_string())
        .unwrap_or_else(|| {
            node_text(&string_node, source)
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string()
        });
    if raw.is_empty() {
        return None;
    }
    let description = raw.lines().next().unwrap_or("").trim().to_string();
    Some(DocstringRecord {
        doc_type: "docstring".to_string(),
        raw_text: raw,
        description,
    })
}

fn python_imports(node: &Node, source: &str) -> Vec<ImportRecord> {
    let line = start_line(node);
    let mut out = Vec::new();

    match node.kind() {
        "import_statement" => {
            // import a.b / import a.b as c : binds the top-level (or aliased) name
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => {
                        let module = node_text(&child, source).to_string();
                        let local = module.split('.').next().unwrap_or(&module).to_string();
                        out.push(ImportRecord {
                            line,
                            import_type: ImportType::Python,
                            module_specifier: module,
                            bindings: vec![ImportBindingRecord {
                                imported_name: "*".to_string(),
                                local_name: local,
                                is_type_only: false,
                            }],
                        });
                    }
                    "aliased_import" => {
                        let module = field_text(&child, "name", source).unwrap_or_default();
                        let alias = field_text(&child, "alias", source).unwrap_or_default();
                        out.push(ImportRecord {
                            line,
                            import_type: ImportType::Python,
                            module_specifier: module,
                            bindings: vec![ImportBindingRecord {
                                imported_name: "*".to_string(),
                                local_name: alias,
                                is_type_only: false,
                            }],
                        });
                    }
                    _ => {}
                }
            }
        }
        "import_from_statement" => {
            let module_node = node.child_by_field_name("module_name");
            let module = module_node
                .map(|m| node_text(&m, source).to_string())
                .unwrap_or_default();
            let module_end = module_node.map(|m| m.end_byte()).unwrap_or(0);

            let mut bindings = Vec::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" | "identifier" => {
                        if child.start_byte() > module_end {
                            let name = node_text(&child, source).to_string();
                            bindings.push(ImportBindingRecord {
                                imported_name: name.clone(),
                                local_name: name,
                                is_type_only: false,
                            });
                        }
                    }
                    "aliased_import" => {
                        let name = field_text(&child, "name", source).unwrap_or_default();
                        let alias = field_text(&child, "alias", source).unwrap_or_default();
                        bindings.push(ImportBindingRecord {
                            imported_name: name,
                            local_name: alias,
                            is_type_only: false,
                        });
                    }
                    "wildcard_import" => {
                        bindings.push(ImportBindingRecord {
                            imported_name: "*".to_string(),
                            local_name: "*".to_string(),
                            is_type_only: false,
                        });
                    }
                    _ => {}
                }
            }

            out.push(ImportRecord {
                line,
                import_type: ImportType::Python,
                module_specifier: module,
                bindings,
            });
        }
        _ => {}
    }

    out
}

// ============================================================================
// Usages
// ============================================================================

fn collect_usages(root: &Node, source: &str, sink: &mut UsageSink) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if node.kind() == "identifier" {
            let name = node_text(&node, source);
            if !BUILTINS.contains(&name) {
                if let Some(kind) = classify(&node, source) {
                    sink.push(name, start_line(&node), start_column(&node), kind);
                }
            }
        }
        for i in (0..node.named_child_count()).rev() {
            if let Some(child) = node.named_child(i) {
                stack.push(child);
            }
        }
    }
}

fn field_is(parent: &Node, field: &str, node: &Node) -> bool {
    parent
        .child_by_field_name(field)
        .map(|c| c.id() == node.id())
        .unwrap_or(false)
}

fn classify(node: &Node, _source: &str) -> Option<UsageKind> {
    let parent = node.parent()?;
    let pk = parent.kind();

    // Definition names and parameter declarations.
    if matches!(
        pk,
        "function_definition"
            | "class_definition"
            | "parameters"
            | "typed_parameter"
            | "default_parameter"
            | "typed_default_parameter"
            | "list_splat_pattern"
            | "dictionary_splat_pattern"
            | "lambda_parameters"
            | "keyword_argument"
            | "global_statement"
            | "nonlocal_statement"
    ) {
        if pk == "keyword_argument" && field_is(&parent, "value", node) {
            return Some(UsageKind::Read);
        }
        return None;
    }

    // Import machinery.
    if has_ancestor(node, &["import_statement", "import_from_statement"], 6) {
        return None;
    }

    // Decorator attachment.
    if has_ancestor(node, &["decorator"], 3) {
        return Some(UsageKind::Decorator);
    }

    // Base-class list of a class definition.
    if pk == "argument_list" {
        if let Some(grand) = parent.parent() {
            if grand.kind() == "class_definition" {
                return Some(UsageKind::Extend);
            }
        }
    }

    // Annotation positions.
    if pk == "type" || has_ancestor(node, &["type"], 3) {
        return Some(UsageKind::TypeRef);
    }

    if pk == "call" && field_is(&parent, "function", node) {
        return Some(UsageKind::Call);
    }

    if pk == "attribute" && field_is(&parent, "attribute", node) {
        if let Some(grand) = parent.parent() {
            if grand.kind() == "call" && field_is(&grand, "function", &parent) {
                return Some(UsageKind::Call);
            }
            if grand.kind() == "assignment" && field_is(&grand, "left", &parent) {
                return Some(UsageKind::Write);
            }
        }
        return Some(UsageKind::Read);
    }

    if (pk == "assignment" || pk == "augmented_assignment") && field_is(&parent, "left", node) {
        // Module- and class-level assignments are definitions, not usages.
        if pk == "assignment" && is_definition_assignment(&parent) {
            return None;
        }
        return Some(UsageKind::Write);
    }

    Some(UsageKind::Read)
}

fn is_definition_assignment(assignment: &Node) -> bool {
    let statement = match assignment.parent() {
        Some(s) if s.kind() == "expression_statement" => s,
        _ => return false,
    };
    match statement.parent() {
        Some(container) if container.kind() == "module" => true,
        Some(container) if container.kind() == "block" => container
            .parent()
            .map(|p| p.kind() == "class_definition")
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    fn extract(source: &str) -> Extraction {
        let tree = parse_source(Language::Python, source).unwrap();
        Python.extract(&tree, "test.py", source)
    }

    #[test]
    fn functions_and_methods() {
        let source = "class Store:\n    def __init__(self, path):\n        self.path = path\n\n    @staticmethod\n    def _migrate(db):\n        pass\n\nasync def run():\n    pass\n";
        let extraction = extract(source);

        let store = &extraction.symbols[0];
        assert_eq!(store.kind, SymbolKind::Class);
        assert!(store.is_exported);

        let init = extraction
            .symbols
            .iter()
            .find(|s| s.name == "__init__")
            .unwrap();
        assert_eq!(init.kind, SymbolKind::Constructor);
        assert_eq!(init.qualified_name, "Store.__init__");
        assert_eq!(init.visibility, Some(Visibility::Public));
        assert_eq!(init.parameters.len(), 2);

        let migrate = extraction
            .symbols
            .iter()
            .find(|s| s.name == "_migrate")
            .unwrap();
        assert!(migrate.is_static);
        assert_eq!(migrate.visibility, Some(Visibility::Private));
        assert!(!migrate.is_exported);

        let run = extraction.symbols.iter().find(|s| s.name == "run").unwrap();
        assert!(run.is_async);
        assert_eq!(run.kind, SymbolKind::Function);
    }

    #[test]
    fn docstring_and_constants() {
        let source = "LIMIT = 100\n\ndef users(uid):\n    \"List or create.\"\n    return uid\n";
        let extraction = extract(source);

        let limit = extraction.symbols.iter().find(|s| s.name == "LIMIT").unwrap();
        assert_eq!(limit.kind, SymbolKind::Constant);

        let users = extraction.symbols.iter().find(|s| s.name == "users").unwrap();
        let doc = users.docstring.as_ref().unwrap();
        assert_eq!(doc.doc_type, "docstring");
        assert_eq!(doc.description, "List or create.");
    }

    #[test]
    fn usage_kinds() {
        let source = "import os\nfrom models import Base\n\nclass User(Base):\n    pass\n\ndef main():\n    user = User()\n    user.save()\n    count = 0\n    count = count + 1\n";
        let extraction = extract(source);

        let find_all = |name: &str| -> Vec<UsageKind> {
            extraction
                .usages
                .iter()
                .filter(|u| u.name == name)
                .map(|u| u.kind)
                .collect()
        };

        assert!(find_all("Base").contains(&UsageKind::Extend));
        // User() is a call site syntactically; Python has no `new`.
        assert!(find_all("User").contains(&UsageKind::Call));
        assert!(find_all("save").contains(&UsageKind::Call));
        assert!(find_all("count").contains(&UsageKind::Write));
        // import names never surface as usages
        assert!(find_all("os").is_empty());
    }

    #[test]
    fn from_import_with_alias() {
        let source = "from pkg.mod import helper as h, Other\nimport json\n";
        let extraction = extract(source);

        assert_eq!(extraction.imports.len(), 2);
        let from_import = &extraction.imports[0];
        assert_eq!(from_import.module_specifier, "pkg.mod");
        assert_eq!(from_import.bindings.len(), 2);
        assert_eq!(from_import.bindings[0].imported_name, "helper");
        assert_eq!(from_import.bindings[0].local_name, "h");
        assert_eq!(from_import.bindings[1].imported_name, "Other");

        let plain = &extraction.imports[1];
        assert_eq!(plain.module_specifier, "json");
        assert_eq!(plain.bindings[0].imported_name, "*");
        assert_eq!(plain.bindings[0].local_name, "json");
    }

    #[test]
    fn wildcard_import() {
        let source = "from helpers import *\n";
        let extraction = extract(source);
        assert_eq!(extraction.imports[0].bindings[0].imported_name, "*");
        assert_eq!(extraction.imports[0].bindings[0].local_name, "*");
    }

    #[test]
    fn property_decorators() {
        let source = "class C:\n    @property\n    def value(self):\n        return self._v\n\n    @value.setter\n    def value(self, v):\n        self._v = v\n";
        let extraction = extract(source);
        let kinds: Vec<SymbolKind> = extraction
            .symbols
            .iter()
            .filter(|s| s.name == "value")
            .map(|s| s.kind)
            .collect();
        assert_eq!(kinds, vec![SymbolKind::Getter, SymbolKind::Setter]);
    }
}
