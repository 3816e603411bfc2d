//! Dart extraction.
//!
//! The Dart grammar is optional (loaded from a shared library); when it is
//! missing the indexer never reaches this extractor. Dart expression nesting
//! is deeper than the other grammars, so call/instantiation detection leans
//! on the `selector` structure around an identifier.

use crate::records::UsageSink;
use crate::walk::{
    end_line, field_text, has_ancestor, node_text, start_column, start_line,
};
use crate::{
    content_hash, DocstringRecord, Extraction, ImportBindingRecord, ImportRecord, ImportType,
    ParameterRecord, SymbolExtractor, SymbolKind, SymbolRecord, UsageKind, Visibility,
};
use sourcerack_core::Language;
use tree_sitter::{Node, Tree};

const BUILTINS: &[&str] = &[
    "print",
    "identical",
    "override",
    "required",
    "super",
    "this",
    "dynamic",
    "void",
    "Object",
    "String",
    "int",
    "double",
    "num",
    "bool",
    "List",
    "Map",
    "Set",
    "Iterable",
    "Future",
    "Stream",
    "Duration",
    "DateTime",
    "RegExp",
    "Exception",
    "Error",
    "StateError",
    "ArgumentError",
    "UnimplementedError",
    "toString",
    "hashCode",
    "runtimeType",
];

const CONTAINER_KINDS: &[&str] = &[
    "class_definition",
    "enum_declaration",
    "mixin_declaration",
    "extension_declaration",
];

const SIGNATURE_KINDS: &[&str] = &[
    "function_signature",
    "getter_signature",
    "setter_signature",
    "constructor_signature",
    "factory_constructor_signature",
    "constant_constructor_signature",
];

pub struct Dart;

impl SymbolExtractor for Dart {
    fn language(&self) -> Language {
        Language::Dart
    }

    fn extract(&self, tree: &Tree, _path: &str, source: &str) -> Extraction {
        let mut out = Extraction::default();
        let root = tree.root_node();
        collect_top_level(&root, source, &mut out);

        let mut sink = UsageSink::default();
        collect_usages(&root, source, &mut sink);
        out.usages = sink.into_usages();
        out
    }
}

// ============================================================================
// Symbols and imports
// ============================================================================

fn collect_top_level(root: &Node, source: &str, out: &mut Extraction) {
    let mut cursor = root.walk();
    let children: Vec<Node> = root.named_children(&mut cursor).collect();
    drop(cursor);

    let scope: Vec<String> = Vec::new();
    for child in children {
        match child.kind() {
            "import_or_export" | "library_import" | "import_specification" => {
                if let Some(import) = dart_import(&child, source) {
                    out.imports.push(import);
                }
            }
            kind if CONTAINER_KINDS.contains(&kind) => {
                collect_container(&child, source, &scope, out);
            }
            "function_signature" => {
                if let Some(record) =
                    signature_record(&child, source, &scope, None, false)
                {
                    out.symbols.push(record);
                }
            }
            kind if kind.contains("variable") || kind == "static_final_declaration_list" => {
                collect_variables(&child, source, &scope, out);
            }
            _ => {}
        }
    }
}

fn collect_container(node: &Node, source: &str, scope: &[String], out: &mut Extraction) {
    let name = match field_text(node, "name", source) {
        Some(n) => n,
        None => return,
    };
    let kind = match node.kind() {
        "enum_declaration" => SymbolKind::Enum,
        _ => SymbolKind::Class,
    };
    let mut record = base_record(node, source, scope, &name, kind);
    record.docstring = dartdoc(node, source);
    out.symbols.push(record);

    let mut inner_scope = scope.to_vec();
    inner_scope.push(name.clone());

    let body = match node.child_by_field_name("body") {
        Some(b) => b,
        None => return,
    };
    let mut cursor = body.walk();
    let members: Vec<Node> = body.named_children(&mut cursor).collect();
    drop(cursor);

    for member in members {
        // Member declarations wrap the actual signature one level down.
        let signature = if SIGNATURE_KINDS.contains(&member.kind()) {
            Some(member)
        } else {
            find_signature(&member)
        };
        if let Some(signature) = signature {
            let is_static = member_has_token(&member, source, "static");
            if let Some(mut record) =
                signature_record(&signature, source, &inner_scope, Some(&name), is_static)
            {
                record.end_line = record.end_line.max(end_line(&member));
                record.content_hash = content_hash(node_text(&member, source));
                out.symbols.push(record);
            }
        } else if member.kind().contains("variable") || member.kind() == "declaration" {
            collect_fields(&member, source, &inner_scope, out);
        }
    }
}

/// Find a function/getter/setter/constructor signature within a member
/// declaration (at most two levels down).
fn find_signature<'t>(member: &Node<'t>) -> Option<Node<'t>> {
    let mut cursor = member.walk();
    let children: Vec<Node<'t>> = member.named_children(&mut cursor).collect();
    drop(cursor);
    for child in &children {
        if SIGNATURE_KINDS.contains(&child.kind()) {
            return Some(*child);
        }
    }
    for child in &children {
        let mut inner = child.walk();
        let grandchildren: Vec<Node<'t>> = child.named_children(&mut inner).collect();
        drop(inner);
        for grandchild in grandchildren {
            if SIGNATURE_KINDS.contains(&grandchild.kind()) {
                return Some(grandchild);
            }
        }
    }
    None
}

fn signature_record(
    signature: &Node,
    source: &str,
    scope: &[String],
    container: Option<&str>,
    is_static: bool,
) -> Option<SymbolRecord> {
    let name = field_text(signature, "name", source)
        .or_else(|| first_identifier(signature, source))?;

    let kind = match signature.kind() {
        "getter_signature" => SymbolKind::Getter,
        "setter_signature" => SymbolKind::Setter,
        "constructor_signature" | "constant_constructor_signature" => SymbolKind::Constructor,
        "factory_constructor_signature" => SymbolKind::Constructor,
        _ if container.is_some() => SymbolKind::Method,
        _ => SymbolKind::Function,
    };
    // Factory constructors behave like static creators.
    let is_static = is_static || signature.kind() == "factory_constructor_signature";

    let mut record = base_record(signature, source, scope, &name, kind);
    record.is_static = is_static;
    record.parameters = dart_parameters(signature, source);
    record.return_type = dart_return_type(signature, source);
    record.docstring = dartdoc(signature, source);

    // The body is a sibling of the signature; fold it into the span.
    if let Some(body) = signature.next_named_sibling() {
        if body.kind() == "function_body" {
            record.end_line = end_line(&body);
            record.is_async = node_text(&body, source).trim_start().starts_with("async");
        }
    }
    Some(record)
}

fn collect_variables(node: &Node, source: &str, scope: &[String], out: &mut Extraction) {
    let text = node_text(node, source);
    let kind = if text.contains("const ") || text.contains("final ") {
        SymbolKind::Constant
    } else {
        SymbolKind::Variable
    };
    for identifier in declared_identifiers(node, source) {
        out.symbols
            .push(base_record(node, source, scope, &identifier, kind));
    }
}

fn collect_fields(node: &Node, source: &str, scope: &[String], out: &mut Extraction) {
    for identifier in declared_identifiers(node, source) {
        out.symbols
            .push(base_record(node, source, scope, &identifier, SymbolKind::Field));
    }
}

/// Names introduced by a variable/field declaration.
fn declared_identifiers(node: &Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if matches!(
            current.kind(),
            "initialized_identifier" | "static_final_declaration"
        ) {
            if let Some(name) = first_identifier(&current, source) {
                out.push(name);
                continue;
            }
        }
        for i in (0..current.named_child_count()).rev() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    out
}

fn first_identifier(node: &Node, source: &str) -> Option<String> {
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if current.kind() == "identifier" {
            return Some(node_text(&current, source).to_string());
        }
        for i in (0..current.named_child_count()).rev() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    None
}

fn member_has_token(node: &Node, source: &str, token: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if node_text(&child, source) == token {
            return true;
        }
    }
    false
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
    let visibility = if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    };
    SymbolRecord {
        name: name.to_string(),
        qualified_name,
        kind,
        start_line: start_line(node),
        end_line: end_line(node),
        visibility: Some(visibility),
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

fn dart_parameters(signature: &Node, source: &str) -> Vec<ParameterRecord> {
    let list = match signature
        .child_by_field_name("parameters")
        .or_else(|| {
            let mut cursor = signature.walk();
            let found = signature
                .named_children(&mut cursor)
                .find(|c| c.kind() == "formal_parameter_list");
            found
        }) {
        Some(l) => l,
        None => return Vec::new(),
    };

    let mut out = Vec::new();
    let mut stack = vec![(list, false)];
    while let Some((current, optional)) = stack.pop() {
        for i in (0..current.named_child_count()).rev() {
            let child = match current.named_child(i) {
                Some(c) => c,
                None => continue,
            };
            match child.kind() {
                "optional_formal_parameters" => stack.push((child, true)),
                "formal_parameter" | "super_formal_parameter" | "constructor_param" => {
                    if let Some(name) = last_identifier(&child, source) {
                        out.push(ParameterRecord {
                            name,
                            type_annotation: parameter_type(&child, source),
                            is_optional: optional,
                        });
                    }
                }
                _ => stack.push((child, optional)),
            }
        }
    }
    out.reverse();
    out
}

fn last_identifier(node: &Node, source: &str) -> Option<String> {
    let mut last = None;
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if current.kind() == "identifier" {
            let text = node_text(&current, source);
            match &last {
                Some((byte, _)) if *byte > current.start_byte() => {}
                _ => last = Some((current.start_byte(), text.to_string())),
            }
        }
        for i in 0..current.named_child_count() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    last.map(|(_, name)| name)
}

fn parameter_type(node: &Node, source: &str) -> Option<String> {
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if matches!(current.kind(), "type_identifier" | "void_type" | "function_type") {
            return Some(node_text(&current, source).to_string());
        }
        for i in (0..current.named_child_count()).rev() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    None
}

fn dart_return_type(signature: &Node, source: &str) -> Option<String> {
    if let Some(t) = signature.child_by_field_name("return_type") {
        return Some(node_text(&t, source).to_string());
    }
    // The return type precedes the name in the signature.
    let name_start = signature
        .child_by_field_name("name")
        .map(|n| n.start_byte())
        .unwrap_or(usize::MAX);
    let mut cursor = signature.walk();
    let found = signature
        .named_children(&mut cursor)
        .find(|c| {
            c.start_byte() < name_start
                && matches!(c.kind(), "type_identifier" | "void_type" | "function_type")
        })
        .map(|t| node_text(&t, source).to_string());
    found
}

/// `///` doc comment block above a declaration.
fn dartdoc(node: &Node, source: &str) -> Option<DocstringRecord> {
    let mut lines = Vec::new();
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        let text = node_text(&sibling, source);
        if sibling.kind() == "documentation_comment" || text.starts_with("///") {
            lines.push(text.trim_start_matches("///").trim().to_string());
            prev = sibling.prev_sibling();
        } else {
            break;
        }
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let raw = lines.join("\n");
    let description = lines.first().cloned().unwrap_or_default();
    Some(DocstringRecord {
        doc_type: "dartdoc".to_string(),
        raw_text: raw,
        description,
    })
}

/// `import 'package:x/y.dart' as z show a, b;`
fn dart_import(node: &Node, source: &str) -> Option<ImportRecord> {
    let text = node_text(node, source);
    if !text.trim_start().starts_with("import") && !text.trim_start().starts_with("export") {
        return None;
    }
    let start = text.find('\'').or_else(|| text.find('"'))?;
    let quote = text.chars().nth(start)?;
    let rest = &text[start + 1..];
    let uri_end = rest.find(quote)?;
    let module = rest[..uri_end].to_string();
    let after = &rest[uri_end + 1..];

    let mut bindings = Vec::new();
    if let Some(alias_part) = after.split(" as ").nth(1) {
        let alias = alias_part
            .split(|c: char| c == ';' || c.is_whitespace())
            .next()
            .unwrap_or("")
            .to_string();
        if !alias.is_empty() {
            bindings.push(ImportBindingRecord {
                imported_name: "*".to_string(),
                local_name: alias,
                is_type_only: false,
            });
        }
    }
    if let Some(show_part) = after.split(" show ").nth(1) {
        let names = show_part.split(';').next().unwrap_or("");
        for name in names.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                bindings.push(ImportBindingRecord {
                    imported_name: name.to_string(),
                    local_name: name.to_string(),
                    is_type_only: false,
                });
            }
        }
    }
    if bindings.is_empty() {
        let stem = module
            .rsplit('/')
            .next()
            .unwrap_or(&module)
            .trim_end_matches(".dart")
            .to_string();
        bindings.push(ImportBindingRecord {
            imported_name: "*".to_string(),
            local_name: stem,
            is_type_only: false,
        });
    }

    Some(ImportRecord {
        line: start_line(node),
        import_type: ImportType::Dart,
        module_specifier: module,
        bindings,
    })
}

// ============================================================================
// Usages
// ============================================================================

fn collect_usages(root: &Node, source: &str, sink: &mut UsageSink) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "identifier" | "type_identifier") {
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

fn classify(node: &Node, source: &str) -> Option<UsageKind> {
    let parent = node.parent()?;
    let pk = parent.kind();

    // Definition names, declared identifiers, parameters, imports.
    if SIGNATURE_KINDS.contains(&pk)
        || CONTAINER_KINDS.contains(&pk)
        || matches!(
            pk,
            "formal_parameter"
                | "super_formal_parameter"
                | "constructor_param"
                | "typed_identifier"
                | "initialized_identifier"
                | "static_final_declaration"
                | "label"
                | "library_name"
                | "dotted_identifier_list"
        )
    {
        return None;
    }
    if has_ancestor(
        node,
        &["import_or_export", "import_specification", "library_import"],
        4,
    ) {
        return None;
    }

    if has_ancestor(node, &["annotation"], 2) {
        return Some(UsageKind::Decorator);
    }
    if has_ancestor(node, &["superclass"], 2) {
        return Some(UsageKind::Extend);
    }
    if has_ancestor(node, &["interfaces", "mixins"], 2) {
        return Some(UsageKind::Implement);
    }
    if has_ancestor(node, &["new_expression", "constructor_invocation"], 3) {
        return Some(UsageKind::Instantiate);
    }

    // `Foo(...)` / `foo(...)`: the identifier is followed by a selector that
    // opens an argument list. Uppercase names are constructor calls.
    if let Some(next) = node.next_named_sibling() {
        if next.kind() == "selector" {
            let selector_text = node_text(&next, source);
            if selector_text.starts_with('(') || selector_text.starts_with("<") {
                let first = node_text(node, source).chars().next().unwrap_or('a');
                if first.is_ascii_uppercase() {
                    return Some(UsageKind::Instantiate);
                }
                return Some(UsageKind::Call);
            }
        }
    }

    // `obj.method(...)`: identifier inside a selector followed by arguments.
    let mut ancestor = node.parent();
    for _ in 0..3 {
        let current = match ancestor {
            Some(a) => a,
            None => break,
        };
        if current.kind() == "selector" {
            if let Some(next) = current.next_named_sibling() {
                if next.kind() == "selector" && node_text(&next, source).starts_with('(') {
                    return Some(UsageKind::Call);
                }
            }
            return Some(UsageKind::Read);
        }
        ancestor = current.parent();
    }

    if pk == "assignment_expression" || pk == "assignment_expression_without_cascade" {
        if parent
            .named_child(0)
            .map(|c| c.id() == node.id())
            .unwrap_or(false)
        {
            return Some(UsageKind::Write);
        }
        return Some(UsageKind::Read);
    }
    if has_ancestor(node, &["assignable_expression"], 2) {
        // Left side of an assignment.
        if let Some(assignment) = parent.parent() {
            if assignment.kind().starts_with("assignment_expression") {
                return Some(UsageKind::Write);
            }
        }
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

    fn try_extract(source: &str) -> Option<Extraction> {
        match parse_source(Language::Dart, source) {
            Ok(tree) => Some(Dart.extract(&tree, "test.dart", source)),
            Err(_) => {
                eprintln!("skipping: dart grammar not installed");
                None
            }
        }
    }

    #[test]
    fn classes_and_methods() {
        let source = "class Cart {\n  final List<String> items = [];\n\n  void add(String item) {\n    items.add(item);\n  }\n\n  static Cart empty() => Cart();\n}\n\nString _format(Cart cart) => '';\n";
        let extraction = match try_extract(source) {
            Some(e) => e,
            None => return,
        };

        let cart = extraction.symbols.iter().find(|s| s.name == "Cart");
        assert!(cart.is_some());
        assert_eq!(cart.map(|c| c.kind), Some(SymbolKind::Class));

        if let Some(add) = extraction.symbols.iter().find(|s| s.name == "add") {
            assert_eq!(add.kind, SymbolKind::Method);
            assert_eq!(add.parent.as_deref(), Some("Cart"));
        }

        if let Some(format) = extraction.symbols.iter().find(|s| s.name == "_format") {
            assert_eq!(format.visibility, Some(Visibility::Private));
            assert!(!format.is_exported);
        }
    }

    #[test]
    fn imports() {
        let source = "import 'package:http/http.dart' as http;\nimport 'models.dart' show User, Order;\n";
        let extraction = match try_extract(source) {
            Some(e) => e,
            None => return,
        };

        assert_eq!(extraction.imports.len(), 2);
        assert_eq!(extraction.imports[0].import_type, ImportType::Dart);
        assert_eq!(extraction.imports[0].module_specifier, "package:http/http.dart");
        assert_eq!(extraction.imports[0].bindings[0].local_name, "http");
        assert_eq!(extraction.imports[1].bindings.len(), 2);
        assert_eq!(extraction.imports[1].bindings[0].imported_name, "User");
    }

    #[test]
    fn inheritance_usages() {
        let source = "class Admin extends User with Loggable implements Comparable {\n}\n";
        let extraction = match try_extract(source) {
            Some(e) => e,
            None => return,
        };

        let find = |name: &str| -> Vec<UsageKind> {
            extraction
                .usages
                .iter()
                .filter(|u| u.name == name)
                .map(|u| u.kind)
                .collect()
        };
        assert!(find("User").contains(&UsageKind::Extend));
        assert!(find("Comparable").contains(&UsageKind::Implement));
    }
}
