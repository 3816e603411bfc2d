//! Shared ECMAScript (TypeScript/TSX/JavaScript) extraction.
//!
//! One extractor covers all three grammars: the TypeScript grammar is a
//! superset of JavaScript's for every node kind we touch, and TSX only adds
//! JSX expression nodes that fall through to the default classification.

use crate::records::UsageSink;
use crate::walk::{
    end_line, field_text, first_child_of_kind, has_ancestor, has_keyword, node_text, start_column,
    start_line,
};
use crate::{
    content_hash, DocstringRecord, Extraction, ImportBindingRecord, ImportRecord, ImportType,
    ParameterRecord, SymbolExtractor, SymbolKind, SymbolRecord, UsageKind, Visibility,
};
use sourcerack_core::Language;
use tree_sitter::{Node, Tree};

/// Names that refer to the runtime, not to project symbols.
const BUILTINS: &[&str] = &[
    "this",
    "super",
    "arguments",
    "undefined",
    "null",
    "NaN",
    "Infinity",
    "console",
    "require",
    "module",
    "exports",
    "process",
    "globalThis",
    "window",
    "document",
    "Object",
    "Array",
    "String",
    "Number",
    "Boolean",
    "Symbol",
    "Function",
    "Promise",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "Date",
    "RegExp",
    "Error",
    "TypeError",
    "RangeError",
    "JSON",
    "Math",
    "parseInt",
    "parseFloat",
    "isNaN",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
    "fetch",
];

pub struct Ecmascript;

impl SymbolExtractor for Ecmascript {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn handles(&self, lang: Language) -> bool {
        matches!(
            lang,
            Language::TypeScript | Language::Tsx | Language::JavaScript
        )
    }

    fn extract(&self, tree: &Tree, _path: &str, source: &str) -> Extraction {
        let mut out = Extraction::default();
        let root = tree.root_node();
        let mut scope = Vec::new();
        collect_declarations(&root, source, &mut scope, false, true, &mut out);

        let mut sink = UsageSink::default();
        collect_usages(&root, source, &mut sink);
        out.usages = sink.into_usages();
        out
    }
}

fn field_is(parent: &Node, field: &str, node: &Node) -> bool {
    parent
        .child_by_field_name(field)
        .map(|c| c.id() == node.id())
        .unwrap_or(false)
}

// ============================================================================
// Symbols and imports
// ============================================================================

fn collect_declarations(
    node: &Node,
    source: &str,
    scope: &mut Vec<String>,
    exported: bool,
    module_level: bool,
    out: &mut Extraction,
) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    drop(cursor);

    for child in children {
        match child.kind() {
            "export_statement" => {
                collect_declarations(&child, source, scope, true, module_level, out);
            }
            "import_statement" => {
                if let Some(import) = es_import(&child, source) {
                    out.imports.push(import);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let record = function_record(&child, source, scope, &name, exported, false);
                    out.symbols.push(record);
                    scope.push(name);
                    if let Some(body) = child.child_by_field_name("body") {
                        collect_declarations(&body, source, scope, false, false, out);
                    }
                    scope.pop();
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                collect_class(&child, source, scope, exported, out);
            }
            "interface_declaration" => {
                collect_interface(&child, source, scope, exported, out);
            }
            "enum_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.symbols
                        .push(plain_record(&child, source, scope, &name, SymbolKind::Enum, exported));
                }
            }
            "type_alias_declaration" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.symbols.push(plain_record(
                        &child,
                        source,
                        scope,
                        &name,
                        SymbolKind::TypeAlias,
                        exported,
                    ));
                }
            }
            "internal_module" | "module" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.symbols.push(plain_record(
                        &child,
                        source,
                        scope,
                        &name,
                        SymbolKind::Namespace,
                        exported,
                    ));
                    scope.push(name);
                    if let Some(body) = child.child_by_field_name("body") {
                        collect_declarations(&body, source, scope, false, true, out);
                    }
                    scope.pop();
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                collect_variable_declaration(&child, source, scope, exported, module_level, out);
            }
            "expression_statement" => {
                // Bare require('x') for side effects.
                if let Some(import) = bare_require(&child, source) {
                    out.imports.push(import);
                }
            }
            _ => {
                collect_declarations(&child, source, scope, false, false, out);
            }
        }
    }
}

fn collect_class(
    node: &Node,
    source: &str,
    scope: &mut Vec<String>,
    exported: bool,
    out: &mut Extraction,
) {
    let name = match field_text(node, "name", source) {
        Some(n) => n,
        None => return,
    };
    out.symbols
        .push(plain_record(node, source, scope, &name, SymbolKind::Class, exported));
    scope.push(name);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        let members: Vec<Node> = body.named_children(&mut cursor).collect();
        drop(cursor);
        for member in members {
            match member.kind() {
                "method_definition" | "abstract_method_signature" => {
                    if let Some(method_name) = field_text(&member, "name", source) {
                        let kind = if method_name == "constructor" {
                            SymbolKind::Constructor
                        } else if has_keyword(&member, source, "get") {
                            SymbolKind::Getter
                        } else if has_keyword(&member, source, "set") {
                            SymbolKind::Setter
                        } else {
                            SymbolKind::Method
                        };
                        let mut record =
                            function_record(&member, source, scope, &method_name, false, true);
                        record.kind = kind;
                        out.symbols.push(record);
                        scope.push(method_name);
                        if let Some(body) = member.child_by_field_name("body") {
                            collect_declarations(&body, source, scope, false, false, out);
                        }
                        scope.pop();
                    }
                }
                "public_field_definition" | "field_definition" => {
                    if let Some(field_name) = field_text(&member, "name", source) {
                        let function_value = member.child_by_field_name("value").filter(|v| {
                            v.kind() == "arrow_function" || v.kind() == "function_expression"
                        });
                        if let Some(value) = function_value {
                            let mut record =
                                function_record(&member, source, scope, &field_name, false, true);
                            record.kind = SymbolKind::Method;
                            record.is_async = has_keyword(&value, source, "async");
                            record.parameters = es_parameters(&value, source);
                            record.return_type = es_return_type(&value, source);
                            out.symbols.push(record);
                        } else {
                            let mut record = plain_record(
                                &member,
                                source,
                                scope,
                                &field_name,
                                SymbolKind::Field,
                                false,
                            );
                            record.is_static = has_keyword(&member, source, "static");
                            record.visibility = es_visibility(&member, source);
                            record.return_type = es_type_annotation(&member, source);
                            out.symbols.push(record);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    scope.pop();
}

fn collect_interface(
    node: &Node,
    source: &str,
    scope: &mut Vec<String>,
    exported: bool,
    out: &mut Extraction,
) {
    let name = match field_text(node, "name", source) {
        Some(n) => n,
        None => return,
    };
    out.symbols.push(plain_record(
        node,
        source,
        scope,
        &name,
        SymbolKind::Interface,
        exported,
    ));
    scope.push(name);

    if let Some(body) = node.child_by_field_name("body") {
        let mut cursor = body.walk();
        let members: Vec<Node> = body.named_children(&mut cursor).collect();
        drop(cursor);
        for member in members {
            match member.kind() {
                "method_signature" => {
                    if let Some(member_name) = field_text(&member, "name", source) {
                        let mut record =
                            function_record(&member, source, scope, &member_name, false, true);
                        record.kind = SymbolKind::Method;
                        out.symbols.push(record);
                    }
                }
                "property_signature" => {
                    if let Some(member_name) = field_text(&member, "name", source) {
                        let mut record = plain_record(
                            &member,
                            source,
                            scope,
                            &member_name,
                            SymbolKind::Property,
                            false,
                        );
                        record.return_type = es_type_annotation(&member, source);
                        out.symbols.push(record);
                    }
                }
                _ => {}
            }
        }
    }

    scope.pop();
}

fn collect_variable_declaration(
    node: &Node,
    source: &str,
    scope: &mut Vec<String>,
    exported: bool,
    module_level: bool,
    out: &mut Extraction,
) {
    let is_const = node
        .child(0)
        .map(|c| node_text(&c, source) == "const")
        .unwrap_or(false);

    let mut cursor = node.walk();
    let declarators: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "variable_declarator")
        .collect();
    drop(cursor);

    for declarator in declarators {
        // `const x = require('y')` is an import binding, not a symbol.
        if let Some(import) = commonjs_import(&declarator, source) {
            out.imports.push(import);
            continue;
        }
        if !module_level {
            continue;
        }
        let name = match declarator.child_by_field_name("name") {
            Some(n) if n.kind() == "identifier" => node_text(&n, source).to_string(),
            _ => continue,
        };
        let function_value = declarator
            .child_by_field_name("value")
            .filter(|v| v.kind() == "arrow_function" || v.kind() == "function_expression");
        if let Some(value) = function_value {
            let mut record = function_record(&declarator, source, scope, &name, exported, false);
            record.kind = SymbolKind::Function;
            record.is_async = has_keyword(&value, source, "async");
            record.parameters = es_parameters(&value, source);
            record.return_type = es_return_type(&value, source);
            record.end_line = end_line(&declarator);
            out.symbols.push(record);
            scope.push(name);
            if let Some(body) = value.child_by_field_name("body") {
                collect_declarations(&body, source, scope, false, false, out);
            }
            scope.pop();
        } else {
            let kind = if is_const {
                SymbolKind::Constant
            } else {
                SymbolKind::Variable
            };
            let mut record = plain_record(&declarator, source, scope, &name, kind, exported);
            record.return_type = es_type_annotation(&declarator, source);
            out.symbols.push(record);
        }
    }
}

fn function_record(
    node: &Node,
    source: &str,
    scope: &[String],
    name: &str,
    exported: bool,
    in_container: bool,
) -> SymbolRecord {
    let kind = if in_container {
        SymbolKind::Method
    } else {
        SymbolKind::Function
    };
    let mut record = plain_record(node, source, scope, name, kind, exported);
    record.is_async = has_keyword(node, source, "async");
    record.is_static = has_keyword(node, source, "static");
    record.visibility = es_visibility(node, source);
    record.parameters = es_parameters(node, source);
    record.return_type = es_return_type(node, source);
    record
}

fn plain_record(
    node: &Node,
    source: &str,
    scope: &[String],
    name: &str,
    kind: SymbolKind,
    exported: bool,
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
        visibility: es_visibility(node, source),
        is_async: false,
        is_static: false,
        is_exported: exported,
        return_type: None,
        parent: if scope.is_empty() {
            None
        } else {
            Some(scope.join("."))
        },
        content_hash: content_hash(node_text(node, source)),
        parameters: Vec::new(),
        docstring: jsdoc(node, source),
    }
}

fn es_visibility(node: &Node, source: &str) -> Option<Visibility> {
    first_child_of_kind(node, "accessibility_modifier")
        .and_then(|m| Visibility::parse(node_text(&m, source)))
}

fn es_parameters(node: &Node, source: &str) -> Vec<ParameterRecord> {
    let params = match node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter"))
    {
        Some(p) => p,
        None => return Vec::new(),
    };
    if params.kind() == "identifier" {
        // Single arrow parameter without parentheses.
        return vec![ParameterRecord {
            name: node_text(&params, source).to_string(),
            type_annotation: None,
            is_optional: false,
        }];
    }

    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.named_children(&mut cursor) {
        match child.kind() {
            "required_parameter" | "optional_parameter" => {
                let name = child
                    .child_by_field_name("pattern")
                    .map(|p| node_text(&p, source).to_string());
                if let Some(name) = name {
                    if name == "this" {
                        continue;
                    }
                    out.push(ParameterRecord {
                        name,
                        type_annotation: es_type_annotation(&child, source),
                        is_optional: child.kind() == "optional_parameter"
                            || child.child_by_field_name("value").is_some(),
                    });
                }
            }
            "identifier" => out.push(ParameterRecord {
                name: node_text(&child, source).to_string(),
                type_annotation: None,
                is_optional: false,
            }),
            "assignment_pattern" => {
                if let Some(left) = child.child_by_field_name("left") {
                    out.push(ParameterRecord {
                        name: node_text(&left, source).to_string(),
                        type_annotation: None,
                        is_optional: true,
                    });
                }
            }
            "rest_pattern" | "object_pattern" | "array_pattern" => out.push(ParameterRecord {
                name: node_text(&child, source).to_string(),
                type_annotation: None,
                is_optional: false,
            }),
            _ => {}
        }
    }
    out
}

fn es_return_type(node: &Node, source: &str) -> Option<String> {
    node.child_by_field_name("return_type")
        .map(|t| clean_type(node_text(&t, source)))
}

fn es_type_annotation(node: &Node, source: &str) -> Option<String> {
    node.child_by_field_name("type")
        .map(|t| clean_type(node_text(&t, source)))
}

fn clean_type(text: &str) -> String {
    text.trim_start_matches(':').trim().to_string()
}

/// JSDoc comment immediately preceding a declaration (or its export wrapper).
fn jsdoc(node: &Node, source: &str) -> Option<DocstringRecord> {
    let anchor = match node.parent() {
        Some(p) if p.kind() == "export_statement" => p,
        _ => *node,
    };
    let prev = anchor.prev_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    let raw = node_text(&prev, source);
    if !raw.starts_with("/**") {
        return None;
    }
    let description = raw
        .lines()
        .map(|l| l.trim().trim_start_matches("/**").trim_end_matches("*/").trim_start_matches('*').trim())
        .find(|l| !l.is_empty() && !l.starts_with('@'))
        .unwrap_or("")
        .to_string();
    Some(DocstringRecord {
        doc_type: "jsdoc".to_string(),
        raw_text: raw.to_string(),
        description,
    })
}

// ============================================================================
// Imports
// ============================================================================

fn es_import(node: &Node, source: &str) -> Option<ImportRecord> {
    let source_node = node.child_by_field_name("source")?;
    let module = node_text(&source_node, source)
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    let statement_type_only = has_keyword(node, source, "type");

    let mut bindings = Vec::new();
    if let Some(clause) = first_child_of_kind(node, "import_clause") {
        let mut cursor = clause.walk();
        for child in clause.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => bindings.push(ImportBindingRecord {
                    imported_name: "default".to_string(),
                    local_name: node_text(&child, source).to_string(),
                    is_type_only: statement_type_only,
                }),
                "named_imports" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let name = match field_text(&spec, "name", source) {
                            Some(n) => n,
                            None => continue,
                        };
                        let alias = field_text(&spec, "alias", source);
                        bindings.push(ImportBindingRecord {
                            imported_name: name.clone(),
                            local_name: alias.unwrap_or(name),
                            is_type_only: statement_type_only
                                || has_keyword(&spec, source, "type"),
                        });
                    }
                }
                "namespace_import" => {
                    if let Some(ns) = first_child_of_kind(&child, "identifier") {
                        bindings.push(ImportBindingRecord {
                            imported_name: "*".to_string(),
                            local_name: node_text(&ns, source).to_string(),
                            is_type_only: statement_type_only,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    Some(ImportRecord {
        line: start_line(node),
        import_type: ImportType::EsImport,
        module_specifier: module,
        bindings,
    })
}

/// `const x = require('y')` / `const { a, b } = require('y')`.
fn commonjs_import(declarator: &Node, source: &str) -> Option<ImportRecord> {
    let value = declarator.child_by_field_name("value")?;
    let module = require_specifier(&value, source)?;
    let name_node = declarator.child_by_field_name("name")?;

    let mut bindings = Vec::new();
    match name_node.kind() {
        "identifier" => bindings.push(ImportBindingRecord {
            imported_name: "*".to_string(),
            local_name: node_text(&name_node, source).to_string(),
            is_type_only: false,
        }),
        "object_pattern" => {
            let mut cursor = name_node.walk();
            for child in name_node.named_children(&mut cursor) {
                match child.kind() {
                    "shorthand_property_identifier_pattern" => {
                        let name = node_text(&child, source).to_string();
                        bindings.push(ImportBindingRecord {
                            imported_name: name.clone(),
                            local_name: name,
                            is_type_only: false,
                        });
                    }
                    "pair_pattern" => {
                        let key = field_text(&child, "key", source);
                        let local = field_text(&child, "value", source);
                        if let (Some(key), Some(local)) = (key, local) {
                            bindings.push(ImportBindingRecord {
                                imported_name: key,
                                local_name: local,
                                is_type_only: false,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => return None,
    }

    Some(ImportRecord {
        line: start_line(declarator),
        import_type: ImportType::Commonjs,
        module_specifier: module,
        bindings,
    })
}

fn bare_require(statement: &Node, source: &str) -> Option<ImportRecord> {
    let expr = statement.named_child(0)?;
    let module = require_specifier(&expr, source)?;
    Some(ImportRecord {
        line: start_line(statement),
        import_type: ImportType::Commonjs,
        module_specifier: module,
        bindings: Vec::new(),
    })
}

fn require_specifier(node: &Node, source: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    let function = node.child_by_field_name("function")?;
    if node_text(&function, source) != "require" {
        return None;
    }
    let args = node.child_by_field_name("arguments")?;
    let arg = args.named_child(0)?;
    if arg.kind() != "string" {
        return None;
    }
    Some(
        node_text(&arg, source)
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string(),
    )
}

// ============================================================================
// Usages
// ============================================================================

fn collect_usages(root: &Node, source: &str, sink: &mut UsageSink) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if matches!(
            node.kind(),
            "identifier" | "property_identifier" | "type_identifier"
        ) {
            let name = node_text(&node, source);
            if !BUILTINS.contains(&name) {
                if let Some(kind) = classify(&node) {
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

/// Usage kind from syntactic context; `None` when the identifier is a
/// definition name or import machinery rather than a reference.
fn classify(node: &Node) -> Option<UsageKind> {
    let parent = node.parent()?;
    let pk = parent.kind();

    // Definition names, parameter patterns, and member declarations.
    match pk {
        "function_declaration"
        | "generator_function_declaration"
        | "class_declaration"
        | "abstract_class_declaration"
        | "interface_declaration"
        | "enum_declaration"
        | "type_alias_declaration"
        | "internal_module"
        | "module"
        | "method_definition"
        | "abstract_method_signature"
        | "public_field_definition"
        | "field_definition"
        | "property_signature"
        | "method_signature"
        | "enum_assignment"
        | "required_parameter"
        | "optional_parameter"
        | "formal_parameters"
        | "assignment_pattern"
        | "rest_pattern"
        | "object_pattern"
        | "array_pattern"
        | "shorthand_property_identifier_pattern"
        | "pair_pattern"
        | "type_parameter"
        | "label" => return None,
        "variable_declarator" => {
            if field_is(&parent, "name", node) {
                return None;
            }
        }
        "pair" => {
            if field_is(&parent, "key", node) {
                return None;
            }
        }
        _ => {}
    }

    // Import/export machinery binds names; the import records carry them.
    if has_ancestor(
        node,
        &[
            "import_statement",
            "import_clause",
            "named_imports",
            "namespace_import",
            "export_specifier",
        ],
        4,
    ) {
        return None;
    }

    if pk == "decorator" {
        return Some(UsageKind::Decorator);
    }
    if pk == "call_expression" && field_is(&parent, "function", node) {
        if parent
            .parent()
            .map(|g| g.kind() == "decorator")
            .unwrap_or(false)
        {
            return Some(UsageKind::Decorator);
        }
        return Some(UsageKind::Call);
    }
    if pk == "new_expression" && field_is(&parent, "constructor", node) {
        return Some(UsageKind::Instantiate);
    }
    if (pk == "assignment_expression" || pk == "augmented_assignment_expression")
        && field_is(&parent, "left", node)
    {
        return Some(UsageKind::Write);
    }
    if pk == "member_expression" && field_is(&parent, "property", node) {
        if let Some(grand) = parent.parent() {
            match grand.kind() {
                "call_expression" if field_is(&grand, "function", &parent) => {
                    if grand
                        .parent()
                        .map(|g| g.kind() == "decorator")
                        .unwrap_or(false)
                    {
                        return Some(UsageKind::Decorator);
                    }
                    return Some(UsageKind::Call);
                }
                "new_expression" if field_is(&grand, "constructor", &parent) => {
                    return Some(UsageKind::Instantiate);
                }
                "assignment_expression" | "augmented_assignment_expression"
                    if field_is(&grand, "left", &parent) =>
                {
                    return Some(UsageKind::Write);
                }
                _ => {}
            }
        }
        return Some(UsageKind::Read);
    }

    if has_ancestor(
        node,
        &["extends_clause", "extends_type_clause", "class_heritage"],
        3,
    ) {
        // `implements` wins over the heritage wrapper when both are present.
        if has_ancestor(node, &["implements_clause"], 2) {
            return Some(UsageKind::Implement);
        }
        return Some(UsageKind::Extend);
    }
    if has_ancestor(node, &["implements_clause"], 3) {
        return Some(UsageKind::Implement);
    }
    if node.kind() == "type_identifier" {
        return Some(UsageKind::TypeRef);
    }

    Some(UsageKind::Read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    fn extract(lang: Language, source: &str) -> Extraction {
        let tree = parse_source(lang, source).unwrap();
        Ecmascript.extract(&tree, "test.ts", source)
    }

    #[test]
    fn exported_class_with_async_method() {
        let source = "export class UserService {\n  async getUser(id: string) {}\n}\n";
        let extraction = extract(Language::TypeScript, source);

        let class = &extraction.symbols[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.kind, SymbolKind::Class);
        assert!(class.is_exported);
        assert!(class.parent.is_none());

        let method = &extraction.symbols[1];
        assert_eq!(method.name, "getUser");
        assert_eq!(method.qualified_name, "UserService.getUser");
        assert_eq!(method.kind, SymbolKind::Method);
        assert!(method.is_async);
        assert_eq!(method.parent.as_deref(), Some("UserService"));
        assert_eq!(method.parameters.len(), 1);
        assert_eq!(method.parameters[0].name, "id");
        assert_eq!(method.parameters[0].type_annotation.as_deref(), Some("string"));
    }

    #[test]
    fn instantiate_and_call_usages() {
        let source = "import { UserService } from './service';\nnew UserService().getUser(\"x\");\n";
        let extraction = extract(Language::TypeScript, source);

        assert_eq!(extraction.imports.len(), 1);
        let import = &extraction.imports[0];
        assert_eq!(import.module_specifier, "./service");
        assert_eq!(import.bindings[0].imported_name, "UserService");
        assert_eq!(import.bindings[0].local_name, "UserService");

        let find = |name: &str| {
            extraction
                .usages
                .iter()
                .find(|u| u.name == name)
                .unwrap_or_else(|| panic!("no usage for {name}"))
        };
        assert_eq!(find("UserService").kind, UsageKind::Instantiate);
        assert_eq!(find("getUser").kind, UsageKind::Call);
    }

    #[test]
    fn extend_implement_and_type_refs() {
        let source = "interface Repo {}\nclass Base {}\nclass UserRepo extends Base implements Repo {\n  find(id: UserId): User { return load(id); }\n}\n";
        let extraction = extract(Language::TypeScript, source);

        let kinds: Vec<(String, UsageKind)> = extraction
            .usages
            .iter()
            .map(|u| (u.name.clone(), u.kind))
            .collect();
        assert!(kinds.contains(&("Base".to_string(), UsageKind::Extend)));
        assert!(kinds.contains(&("Repo".to_string(), UsageKind::Implement)));
        assert!(kinds.contains(&("UserId".to_string(), UsageKind::TypeRef)));
        assert!(kinds.contains(&("load".to_string(), UsageKind::Call)));
    }

    #[test]
    fn default_and_namespace_imports() {
        let source = "import express from 'express';\nimport * as path from 'path';\nimport type { Config } from './config';\n";
        let extraction = extract(Language::TypeScript, source);

        assert_eq!(extraction.imports.len(), 3);
        assert_eq!(extraction.imports[0].bindings[0].imported_name, "default");
        assert_eq!(extraction.imports[0].bindings[0].local_name, "express");
        assert_eq!(extraction.imports[1].bindings[0].imported_name, "*");
        assert_eq!(extraction.imports[1].bindings[0].local_name, "path");
        assert!(extraction.imports[2].bindings[0].is_type_only);
    }

    #[test]
    fn commonjs_require() {
        let source = "const express = require('express');\nconst { Router } = require('express');\n";
        let extraction = extract(Language::JavaScript, source);

        assert_eq!(extraction.imports.len(), 2);
        assert_eq!(extraction.imports[0].import_type, ImportType::Commonjs);
        assert_eq!(extraction.imports[0].bindings[0].imported_name, "*");
        assert_eq!(extraction.imports[0].bindings[0].local_name, "express");
        assert_eq!(extraction.imports[1].bindings[0].imported_name, "Router");
        // require bindings are imports, not symbols
        assert!(extraction.symbols.is_empty());
    }

    #[test]
    fn module_level_arrow_is_function() {
        let source = "export const handler = async (req: Request) => {};\nconst LIMIT = 10;\n";
        let extraction = extract(Language::TypeScript, source);

        let handler = extraction
            .symbols
            .iter()
            .find(|s| s.name == "handler")
            .unwrap();
        assert_eq!(handler.kind, SymbolKind::Function);
        assert!(handler.is_async);
        assert!(handler.is_exported);

        let limit = extraction.symbols.iter().find(|s| s.name == "LIMIT").unwrap();
        assert_eq!(limit.kind, SymbolKind::Constant);
        assert!(!limit.is_exported);
    }

    #[test]
    fn writes_and_decorators() {
        let source = "@Injectable()\nclass Service {}\nlet counter = 0;\nfunction bump() { counter = counter + 1; }\n";
        let extraction = extract(Language::TypeScript, source);

        let writes: Vec<&str> = extraction
            .usages
            .iter()
            .filter(|u| u.kind == UsageKind::Write)
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(writes, vec!["counter"]);

        let decorators: Vec<&str> = extraction
            .usages
            .iter()
            .filter(|u| u.kind == UsageKind::Decorator)
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(decorators, vec!["Injectable"]);
    }

    #[test]
    fn duplicate_site_emits_one_usage() {
        let source = "doWork(doWork);\n";
        let extraction = extract(Language::JavaScript, source);
        let count = extraction
            .usages
            .iter()
            .filter(|u| u.name == "doWork" && u.line == 1 && u.column == 0)
            .count();
        assert_eq!(count, 1);
    }
}
