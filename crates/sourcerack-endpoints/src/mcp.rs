//! MCP tool registrations, treated as endpoints under `/tools/{name}`.
//!
//! Covers TypeScript `server.tool('name', ..., handler)` registrations and
//! Python FastMCP `@mcp.tool()` decorators.

use crate::pycommon::{decorated_function, decorator_calls, docstring_summary};
use crate::{EndpointExtractor, EndpointRecord, HandlerType, HttpMethod};
use sourcerack_core::Language;
use sourcerack_languages::{
    descendants_of_kind, end_line, field_text, node_text, start_line, ImportRecord,
};
use tree_sitter::{Node, Tree};

pub struct McpTools;
pub struct FastMcp;

impl EndpointExtractor for McpTools {
    fn framework(&self) -> &'static str {
        "mcp"
    }

    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["@modelcontextprotocol/sdk", "fastmcp"])
    }

    fn extract(
        &self,
        tree: &Tree,
        _path: &str,
        source: &str,
        _imports: &[ImportRecord],
    ) -> Vec<EndpointRecord> {
        let root = tree.root_node();
        let mut endpoints = Vec::new();

        for call in descendants_of_kind(&root, &["call_expression"]) {
            let function = match call.child_by_field_name("function") {
                Some(f) if f.kind() == "member_expression" => f,
                _ => continue,
            };
            if field_text(&function, "property", source).as_deref() != Some("tool") {
                continue;
            }
            let args = match call.child_by_field_name("arguments") {
                Some(a) => a,
                None => continue,
            };
            let name = match args.named_child(0) {
                Some(first) if first.kind() == "string" => node_text(&first, source)
                    .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                    .to_string(),
                _ => continue,
            };

            let mut endpoint = EndpointRecord::new(
                HttpMethod::Post,
                format!("/tools/{}", name),
                self.framework(),
                start_line(&call),
                end_line(&call),
            );
            let last = last_named_child(&args);
            if let Some(last) = last {
                if matches!(last.kind(), "identifier" | "member_expression") {
                    endpoint.handler = Some(node_text(&last, source).to_string());
                    endpoint.handler_type = HandlerType::Reference;
                } else {
                    endpoint.handler_type = HandlerType::Inline;
                }
            }
            endpoints.push(endpoint);
        }

        endpoints
    }
}

impl EndpointExtractor for FastMcp {
    fn framework(&self) -> &'static str {
        "mcp"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["fastmcp"]
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["mcp", "fastmcp"])
    }

    fn extract(
        &self,
        tree: &Tree,
        _path: &str,
        source: &str,
        _imports: &[ImportRecord],
    ) -> Vec<EndpointRecord> {
        let root = tree.root_node();
        let mut endpoints = Vec::new();

        for decorated in descendants_of_kind(&root, &["decorated_definition"]) {
            let function = match decorated_function(&decorated) {
                Some(f) => f,
                None => continue,
            };
            for (_, target) in decorator_calls(&decorated, source) {
                let attr = target.rsplit('.').next().unwrap_or(&target);
                if attr != "tool" {
                    continue;
                }
                let name = match field_text(&function, "name", source) {
                    Some(n) => n,
                    None => continue,
                };
                let mut endpoint = EndpointRecord::new(
                    HttpMethod::Post,
                    format!("/tools/{}", name),
                    self.framework(),
                    start_line(&decorated),
                    end_line(&function),
                );
                endpoint.handler = Some(name);
                endpoint.handler_type = HandlerType::Reference;
                endpoint.summary = docstring_summary(&function, source);
                endpoints.push(endpoint);
            }
        }

        endpoints
    }
}

fn last_named_child<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    let count = node.named_child_count();
    if count == 0 {
        None
    } else {
        node.named_child(count - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    #[test]
    fn ts_tool_registration() {
        let source = "server.tool('search_code', schema, handleSearch);\n";
        let tree = parse_source(Language::TypeScript, source).unwrap();
        let endpoints = McpTools.extract(&tree, "server.ts", source, &[]);

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/tools/search_code");
        assert_eq!(endpoints[0].method, HttpMethod::Post);
        assert_eq!(endpoints[0].handler.as_deref(), Some("handleSearch"));
    }

    #[test]
    fn fastmcp_tool_decorator() {
        let source = "@mcp.tool()\ndef lookup(symbol: str):\n    \"Find a symbol.\"\n";
        let tree = parse_source(Language::Python, source).unwrap();
        let endpoints = FastMcp.extract(&tree, "server.py", source, &[]);

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/tools/lookup");
        assert_eq!(endpoints[0].handler.as_deref(), Some("lookup"));
        assert_eq!(endpoints[0].summary.as_deref(), Some("Find a symbol."));
    }
}
