//! Flask route extraction.
//!
//! `@app.route(path, methods=[...])` plus the 2.x shorthands `@app.get(path)`
//! etc. A heterogeneous method list collapses to `ALL` on a single endpoint
//! row; the function docstring's first line becomes the summary.

use crate::pycommon::{
    decorated_function, decorator_calls, docstring_summary, keyword_arg, list_strings,
    positional_string_arg,
};
use crate::{
    collapse_methods, normalize_http_method, EndpointExtractor, EndpointRecord, HandlerType,
    HttpMethod,
};
use sourcerack_core::Language;
use sourcerack_languages::{
    descendants_of_kind, end_line, field_text, start_line, ImportRecord,
};
use tree_sitter::Tree;

const SHORTHANDS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head"];

pub struct Flask;

impl EndpointExtractor for Flask {
    fn framework(&self) -> &'static str {
        "flask"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["flask"])
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
            let handler = field_text(&function, "name", source);

            for (call, target) in decorator_calls(&decorated, source) {
                if call.kind() != "call" {
                    continue;
                }
                let attr = target.rsplit('.').next().unwrap_or(&target);

                let method = if attr == "route" {
                    let methods: Vec<HttpMethod> = keyword_arg(&call, "methods", source)
                        .map(|v| {
                            list_strings(&v, source)
                                .iter()
                                .map(|m| normalize_http_method(m))
                                .collect()
                        })
                        .unwrap_or_default();
                    if methods.is_empty() {
                        HttpMethod::Get
                    } else {
                        collapse_methods(&methods)
                    }
                } else if SHORTHANDS.contains(&attr) {
                    normalize_http_method(attr)
                } else {
                    continue;
                };

                let path = match positional_string_arg(&call, source) {
                    Some(p) => p,
                    None => continue,
                };

                let mut endpoint = EndpointRecord::new(
                    method,
                    path,
                    self.framework(),
                    start_line(&decorated),
                    end_line(&function),
                );
                endpoint.handler = handler.clone();
                endpoint.handler_type = HandlerType::Reference;
                endpoint.summary = docstring_summary(&function, source);
                endpoints.push(endpoint);
            }
        }

        endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    fn extract(source: &str) -> Vec<EndpointRecord> {
        let tree = parse_source(Language::Python, source).unwrap();
        Flask.extract(&tree, "app.py", source, &[])
    }

    #[test]
    fn route_with_mixed_methods_collapses_to_all() {
        let source = "@app.route('/users/<int:uid>', methods=['GET', 'POST'])\ndef users(uid):\n    \"List or create.\"\n";
        let endpoints = extract(source);

        assert_eq!(endpoints.len(), 1);
        let e = &endpoints[0];
        assert_eq!(e.method, HttpMethod::All);
        assert_eq!(e.path, "/users/<int:uid>");
        assert_eq!(e.framework, "flask");
        assert_eq!(e.handler.as_deref(), Some("users"));
        assert_eq!(e.summary.as_deref(), Some("List or create."));
        assert_eq!(e.params.len(), 1);
        assert_eq!(e.params[0].name, "uid");
    }

    #[test]
    fn single_method_list_keeps_method() {
        let source = "@app.route('/health', methods=['GET'])\ndef health():\n    pass\n";
        let endpoints = extract(source);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
    }

    #[test]
    fn shorthand_decorators() {
        let source = "@bp.post('/orders')\ndef create_order():\n    pass\n";
        let endpoints = extract(source);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::Post);
        assert_eq!(endpoints[0].path, "/orders");
    }

    #[test]
    fn bare_route_defaults_to_get() {
        let source = "@app.route('/')\ndef index():\n    pass\n";
        let endpoints = extract(source);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
    }
}
