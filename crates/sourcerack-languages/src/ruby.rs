//! Ruby extraction.

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

/// Kernel/core names that are not project symbols.
const BUILTINS: &[&str] = &[
    "puts",
    "print",
    "p",
    "pp",
    "require",
    "require_relative",
    "load",
    "raise",
    "lambda",
    "proc",
    "loop",
    "new",
    "freeze",
    "dup",
    "clone",
    "send",
    "public_send",
    "respond_to?",
    "instance_variable_get",
    "instance_variable_set",
    "define_method",
    "attr_accessor",
    "attr_reader",
    "attr_writer",
    "private",
    "public",
    "protected",
    "module_function",
    "include",
    "extend",
    "prepend",
    "each",
    "map",
    "select",
    "reject",
    "reduce",
    "inject",
    "to_s",
    "to_i",
    "to_a",
    "to_h",
    "to_sym",
    "is_a?",
    "kind_of?",
    "nil?",
    "empty?",
    "length",
    "size",
    "first",
    "last",
    "push",
    "pop",
    "join",
    "split",
    "block_given?",
    "yield",
    "super",
    "self",
];

pub struct Ruby;

impl SymbolExtractor for Ruby {
    fn language(&self) -> Language {
        Language::Ruby
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
            "class" | "module" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if child.kind() == "module" {
                        SymbolKind::Module
                    } else {
                        SymbolKind::Class
                    };
                    let mut record = base_record(&child, source, scope, &name, kind);
                    record.docstring = leading_comments(&child, source);
                    out.symbols.push(record);

                    scope.push(name);
                    collect_declarations(&child, source, scope, true, out);
                    scope.pop();
                }
            }
            "method" | "singleton_method" => {
                if let Some(name) = field_text(&child, "name", source) {
                    let kind = if in_class && name == "initialize" {
                        SymbolKind::Constructor
                    } else {
                        SymbolKind::Method
                    };
                    let mut record = base_record(&child, source, scope, &name, kind);
                    record.is_static = child.kind() == "singleton_method";
                    record.parameters = ruby_parameters(&child, source);
                    record.docstring = leading_comments(&child, source);
                    out.symbols.push(record);
                }
            }
            "call" => {
                if let Some(import) = ruby_require(&child, source) {
                    out.imports.push(import);
                } else if in_class {
                    collect_accessors(&child, source, scope, out);
                }
            }
            "assignment" => {
                if scope.is_empty() {
                    if let Some(left) = child.child_by_field_name("left") {
                        if left.kind() == "constant" {
                            let name = node_text(&left, source).to_string();
                            out.symbols.push(base_record(
                                &child,
                                source,
                                scope,
                                &name,
                                SymbolKind::Constant,
                            ));
                        }
                    }
                }
            }
            "body_statement" | "begin" | "then" | "do_block" => {
                collect_declarations(&child, source, scope, in_class, out);
            }
            _ => {}
        }
    }
}

/// attr_accessor/attr_reader/attr_writer declare properties.
fn collect_accessors(call: &Node, source: &str, scope: &mut Vec<String>, out: &mut Extraction) {
    let method = match field_text(call, "method", source) {
        Some(m) => m,
        None => return,
    };
    let kind = match method.as_str() {
        "attr_accessor" => SymbolKind::Property,
        "attr_reader" => SymbolKind::Getter,
        "attr_writer" => SymbolKind::Setter,
        _ => return,
    };
    let args = match call.child_by_field_name("arguments") {
        Some(a) => a,
        None => return,
    };
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() == "simple_symbol" {
            let name = node_text(&arg, source).trim_start_matches(':').to_string();
            out.symbols.push(base_record(call, source, scope, &name, kind));
        }
    }
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

fn ruby_parameters(node: &Node, source: &str) -> Vec<ParameterRecord> {
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
            "optional_parameter" | "keyword_parameter" => {
                if let Some(name) = field_text(&child, "name", source) {
                    out.push(ParameterRecord {
                        name,
                        type_annotation: None,
                        is_optional: true,
                    });
                }
            }
            "splat_parameter" | "hash_splat_parameter" | "block_parameter" => {
                out.push(ParameterRecord {
                    name: node_text(&child, source).to_string(),
                    type_annotation: None,
                    is_optional: true,
                });
            }
            _ => {}
        }
    }
    out
}

/// Comment block directly above a definition.
fn leading_comments(node: &Node, source: &str) -> Option<DocstringRecord> {
    let mut lines = Vec::new();
    let mut prev = node.prev_sibling();
    while let Some(sibling) = prev {
        if sibling.kind() != "comment" {
            break;
        }
        lines.push(
            node_text(&sibling, source)
                .trim_start_matches('#')
                .trim()
                .to_string(),
        );
        prev = sibling.prev_sibling();
    }
    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    let raw = lines.join("\n");
    let description = lines.first().cloned().unwrap_or_default();
    Some(DocstringRecord {
        doc_type: "comment".to_string(),
        raw_text: raw,
        description,
    })
}

/// `require 'x'` / `require_relative 'x'` / `load 'x'`.
fn ruby_require(call: &Node, source: &str) -> Option<ImportRecord> {
    let method = field_text(call, "method", source)?;
    let import_type = match method.as_str() {
        "require" | "load" => ImportType::Require,
        "require_relative" => ImportType::RequireRelative,
        _ => return None,
    };
    if call.child_by_field_name("receiver").is_some() {
        return None;
    }
    let args = call.child_by_field_name("arguments")?;
    let arg = args.named_child(0)?;
    if arg.kind() != "string" {
        return None;
    }
    let module = node_text(&arg, source)
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    let stem = module.rsplit('/').next().unwrap_or(&module).to_string();

    Some(ImportRecord {
        line: start_line(call),
        import_type,
        module_specifier: module,
        bindings: vec![ImportBindingRecord {
            imported_name: "*".to_string(),
            local_name: stem,
            is_type_only: false,
        }],
    })
}

// ============================================================================
// Usages
// ============================================================================

fn collect_usages(root: &Node, source: &str, sink: &mut UsageSink) {
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if matches!(node.kind(), "identifier" | "constant") {
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

fn classify(node: &Node, source: &str) -> Option<UsageKind> {
    let parent = node.parent()?;
    let pk = parent.kind();

    // Definition names and parameters.
    if matches!(
        pk,
        "class" | "module" | "method" | "singleton_method" | "method_parameters"
            | "block_parameters" | "lambda_parameters" | "optional_parameter"
            | "keyword_parameter" | "splat_parameter" | "hash_splat_parameter"
            | "block_parameter"
    ) {
        return None;
    }

    // `class A < B` puts B inside a superclass node.
    if has_ancestor(node, &["superclass"], 2) {
        return Some(UsageKind::Extend);
    }

    if pk == "call" {
        if field_is(&parent, "method", node) {
            return Some(UsageKind::Call);
        }
        if field_is(&parent, "receiver", node) {
            // X.new is instantiation of X.
            let method = field_text(&parent, "method", source);
            if node.kind() == "constant" && method.as_deref() == Some("new") {
                return Some(UsageKind::Instantiate);
            }
            return Some(UsageKind::Read);
        }
    }

    // include/extend/prepend arguments mix a module in.
    if pk == "argument_list" {
        if let Some(grand) = parent.parent() {
            if grand.kind() == "call" && grand.child_by_field_name("receiver").is_none() {
                let method = field_text(&grand, "method", source).unwrap_or_default();
                if matches!(method.as_str(), "include" | "extend" | "prepend") {
                    return Some(UsageKind::Implement);
                }
            }
        }
    }

    if matches!(pk, "assignment" | "operator_assignment") && field_is(&parent, "left", node) {
        // Top-level constant assignment is a definition.
        if node.kind() == "constant" && parent.parent().map(|p| p.kind()) == Some("program") {
            return None;
        }
        return Some(UsageKind::Write);
    }

    Some(UsageKind::Read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    fn extract(source: &str) -> Extraction {
        let tree = parse_source(Language::Ruby, source).unwrap();
        Ruby.extract(&tree, "test.rb", source)
    }

    #[test]
    fn classes_modules_and_methods() {
        let source = "module Billing\n  class Invoice\n    attr_reader :total\n\n    def initialize(total)\n      @total = total\n    end\n\n    def self.build(total)\n      new(total)\n    end\n\n    def _internal\n    end\n  end\nend\n";
        let extraction = extract(source);

        let billing = &extraction.symbols[0];
        assert_eq!(billing.kind, SymbolKind::Module);

        let invoice = extraction
            .symbols
            .iter()
            .find(|s| s.name == "Invoice")
            .unwrap();
        assert_eq!(invoice.kind, SymbolKind::Class);
        assert_eq!(invoice.qualified_name, "Billing.Invoice");
        assert_eq!(invoice.parent.as_deref(), Some("Billing"));

        let total = extraction.symbols.iter().find(|s| s.name == "total").unwrap();
        assert_eq!(total.kind, SymbolKind::Getter);

        let init = extraction
            .symbols
            .iter()
            .find(|s| s.name == "initialize")
            .unwrap();
        assert_eq!(init.kind, SymbolKind::Constructor);

        let build = extraction.symbols.iter().find(|s| s.name == "build").unwrap();
        assert!(build.is_static);

        let internal = extraction
            .symbols
            .iter()
            .find(|s| s.name == "_internal")
            .unwrap();
        assert_eq!(internal.visibility, Some(Visibility::Private));
        assert!(!internal.is_exported);
    }

    #[test]
    fn requires_become_imports() {
        let source = "require 'json'\nrequire_relative 'helpers/format'\n";
        let extraction = extract(source);

        assert_eq!(extraction.imports.len(), 2);
        assert_eq!(extraction.imports[0].import_type, ImportType::Require);
        assert_eq!(extraction.imports[0].module_specifier, "json");
        assert_eq!(
            extraction.imports[1].import_type,
            ImportType::RequireRelative
        );
        assert_eq!(extraction.imports[1].bindings[0].local_name, "format");
    }

    #[test]
    fn usage_kinds() {
        let source = "class Report < Document\n  include Printable\n\n  def render\n    builder = Builder.new\n    builder.run\n  end\nend\n";
        let extraction = extract(source);

        let find = |name: &str| -> Vec<UsageKind> {
            extraction
                .usages
                .iter()
                .filter(|u| u.name == name)
                .map(|u| u.kind)
                .collect()
        };

        assert!(find("Document").contains(&UsageKind::Extend));
        assert!(find("Printable").contains(&UsageKind::Implement));
        assert!(find("Builder").contains(&UsageKind::Instantiate));
        assert!(find("run").contains(&UsageKind::Call));
        assert!(find("builder").contains(&UsageKind::Write));
    }

    #[test]
    fn top_level_constant() {
        let source = "VERSION = '1.0'\n";
        let extraction = extract(source);
        let version = &extraction.symbols[0];
        assert_eq!(version.kind, SymbolKind::Constant);
        // definition site is not a usage
        assert!(extraction.usages.iter().all(|u| u.name != "VERSION"));
    }
}
