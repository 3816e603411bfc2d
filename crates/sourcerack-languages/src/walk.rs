//! Shared tree-walk vocabulary.
//!
//! Node kinds are the grammar's node names; these small helpers keep each
//! extractor short instead of generating visitor code per language.

use tree_sitter::Node;

/// Source text of a node.
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Text of a named field, if present.
pub fn field_text(node: &Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, source).to_string())
}

/// First named child with the given kind.
pub fn first_child_of_kind<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// All named children with the given kind.
pub fn children_of_kind<'t>(node: &Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() == kind)
        .collect()
}

/// All descendants (including the node itself) with one of the given kinds,
/// in document order.
pub fn descendants_of_kind<'t>(node: &Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut out = Vec::new();
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if kinds.contains(&current.kind()) {
            out.push(current);
        }
        for i in (0..current.named_child_count()).rev() {
            if let Some(child) = current.named_child(i) {
                stack.push(child);
            }
        }
    }
    out.sort_by_key(|n| n.start_byte());
    out
}

/// Whether any ancestor within `max_depth` levels has one of the given kinds.
pub fn has_ancestor(node: &Node, kinds: &[&str], max_depth: usize) -> bool {
    let mut current = node.parent();
    let mut depth = 0;
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return true;
        }
        depth += 1;
        if depth >= max_depth {
            return false;
        }
        current = n.parent();
    }
    false
}

/// Whether the node has an unnamed child token with this text (e.g. `async`,
/// `static`, access modifiers).
pub fn has_keyword(node: &Node, source: &str, keyword: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if !child.is_named() && node_text(&child, source) == keyword {
            return true;
        }
        // Modifier tokens sometimes surface as named nodes.
        if child.is_named() && child.kind() == keyword {
            return true;
        }
    }
    false
}

/// 1-indexed line of a node's start.
pub fn start_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// 1-indexed line of a node's end.
pub fn end_line(node: &Node) -> usize {
    node.end_position().row + 1
}

/// 0-indexed column of a node's start.
pub fn start_column(node: &Node) -> usize {
    node.start_position().column
}
