//! Shared helpers for Python decorator-routed frameworks.

use sourcerack_languages::{field_text, node_text};
use tree_sitter::Node;

/// Decorator calls attached to a decorated definition:
/// (call node, "object.attr" target text).
pub(crate) fn decorator_calls<'t>(
    decorated: &Node<'t>,
    source: &str,
) -> Vec<(Node<'t>, String)> {
    let mut out = Vec::new();
    let mut cursor = decorated.walk();
    for child in decorated.named_children(&mut cursor) {
        if child.kind() != "decorator" {
            continue;
        }
        if let Some(inner) = child.named_child(0) {
            match inner.kind() {
                "call" => {
                    if let Some(target) = field_text(&inner, "function", source) {
                        out.push((inner, target));
                    }
                }
                "identifier" | "attribute" => {
                    out.push((inner, node_text(&inner, source).to_string()));
                }
                _ => {}
            }
        }
    }
    out
}

/// First positional string argument of a call.
pub(crate) fn positional_string_arg(call: &Node, source: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let found = args
        .named_children(&mut cursor)
        .find(|a| a.kind() == "string")
        .map(|a| string_content(&a, source));
    found
}

/// Keyword argument value node by name.
pub(crate) fn keyword_arg<'t>(call: &Node<'t>, name: &str, source: &str) -> Option<Node<'t>> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let found = args
        .named_children(&mut cursor)
        .filter(|a| a.kind() == "keyword_argument")
        .find(|a| field_text(a, "name", source).as_deref() == Some(name))
        .and_then(|a| a.child_by_field_name("value"));
    found
}

/// String elements of a list literal.
pub(crate) fn list_strings(node: &Node, source: &str) -> Vec<String> {
    if node.kind() != "list" && node.kind() != "tuple" && node.kind() != "set" {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for element in node.named_children(&mut cursor) {
        if element.kind() == "string" {
            out.push(string_content(&element, source));
        }
    }
    out
}

/// Inner text of a Python string literal.
pub(crate) fn string_content(node: &Node, source: &str) -> String {
    let text = node_text(node, source);
    text.trim_start_matches(['r', 'f', 'b', 'u'])
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

/// First line of a function's docstring.
pub(crate) fn docstring_summary(function: &Node, source: &str) -> Option<String> {
    let body = function.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    let string_node = match first.kind() {
        "string" => first,
        "expression_statement" => first.named_child(0).filter(|n| n.kind() == "string")?,
        _ => return None,
    };
    let raw = string_content(&string_node, source);
    let summary = raw.lines().next().unwrap_or("").trim().to_string();
    if summary.is_empty() {
        None
    } else {
        Some(summary)
    }
}

/// The wrapped function definition of a decorated definition.
pub(crate) fn decorated_function<'t>(decorated: &Node<'t>) -> Option<Node<'t>> {
    decorated
        .child_by_field_name("definition")
        .filter(|d| d.kind() == "function_definition")
}
