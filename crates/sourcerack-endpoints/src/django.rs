//! Django REST Framework extraction.
//!
//! Covers `@api_view([...])` function views, ViewSet action methods
//! (list/create/retrieve/update/partial_update/destroy with `{id}` inserted
//! for detail actions), `@action(detail, methods, url_path)`, and explicit
//! APIView HTTP methods. Routing lives in urls.py, so paths are derived from
//! the view name.

use crate::pycommon::{
    decorated_function, decorator_calls, docstring_summary, keyword_arg, list_strings,
    string_content,
};
use crate::{
    collapse_methods, join_paths, normalize_http_method, EndpointExtractor, EndpointRecord,
    HandlerType, HttpMethod,
};
use sourcerack_core::Language;
use sourcerack_languages::{
    children_of_kind, descendants_of_kind, end_line, field_text, node_text, start_line,
    ImportRecord,
};
use tree_sitter::{Node, Tree};

/// (action, method, detail route).
const VIEWSET_ACTIONS: &[(&str, HttpMethod, bool)] = &[
    ("list", HttpMethod::Get, false),
    ("create", HttpMethod::Post, false),
    ("retrieve", HttpMethod::Get, true),
    ("update", HttpMethod::Put, true),
    ("partial_update", HttpMethod::Patch, true),
    ("destroy", HttpMethod::Delete, true),
];

const APIVIEW_VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head"];

pub struct DjangoRest;

impl EndpointExtractor for DjangoRest {
    fn framework(&self) -> &'static str {
        "django"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["drf", "django-rest-framework"]
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["rest_framework", "django"])
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

        // @api_view(['GET', 'POST']) function views.
        for decorated in descendants_of_kind(&root, &["decorated_definition"]) {
            if decorated.parent().map(|p| p.kind()) != Some("module") {
                continue;
            }
            let function = match decorated_function(&decorated) {
                Some(f) => f,
                None => continue,
            };
            for (call, target) in decorator_calls(&decorated, source) {
                if call.kind() != "call" || target != "api_view" {
                    continue;
                }
                let methods: Vec<HttpMethod> = call
                    .child_by_field_name("arguments")
                    .and_then(|args| args.named_child(0))
                    .map(|list| {
                        list_strings(&list, source)
                            .iter()
                            .map(|m| normalize_http_method(m))
                            .collect()
                    })
                    .unwrap_or_default();
                let name = field_text(&function, "name", source).unwrap_or_default();
                let method = if methods.is_empty() {
                    HttpMethod::Get
                } else {
                    collapse_methods(&methods)
                };
                let mut endpoint = EndpointRecord::new(
                    method,
                    format!("/{}", name),
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

        // Class-based views.
        for class in descendants_of_kind(&root, &["class_definition"]) {
            let bases = superclass_names(&class, source);
            let class_name = match field_text(&class, "name", source) {
                Some(n) => n,
                None => continue,
            };
            if bases.iter().any(|b| b.ends_with("ViewSet")) {
                endpoints.extend(viewset_endpoints(&class, &class_name, source, self.framework()));
            } else if bases.iter().any(|b| b.ends_with("APIView")) {
                endpoints.extend(apiview_endpoints(&class, &class_name, source, self.framework()));
            }
        }

        endpoints
    }
}

fn superclass_names(class: &Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(bases) = class.child_by_field_name("superclasses") {
        let mut cursor = bases.walk();
        for base in bases.named_children(&mut cursor) {
            if matches!(base.kind(), "identifier" | "attribute") {
                out.push(node_text(&base, source).to_string());
            }
        }
    }
    out
}

/// Resource base path from a view class name: `UserViewSet` -> `/user`.
fn resource_base(class_name: &str) -> String {
    let stem = class_name
        .trim_end_matches("ViewSet")
        .trim_end_matches("APIView")
        .trim_end_matches("View");
    format!("/{}", to_snake_case(stem))
}

fn to_snake_case(s: &str) -> String {
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn viewset_endpoints(
    class: &Node,
    class_name: &str,
    source: &str,
    framework: &str,
) -> Vec<EndpointRecord> {
    let base = resource_base(class_name);
    let mut endpoints = Vec::new();
    let body = match class.child_by_field_name("body") {
        Some(b) => b,
        None => return endpoints,
    };

    let mut cursor = body.walk();
    let members: Vec<Node> = body.named_children(&mut cursor).collect();
    drop(cursor);

    for member in members {
        let (function, decorated) = match member.kind() {
            "function_definition" => (member, None),
            "decorated_definition" => match decorated_function(&member) {
                Some(f) => (f, Some(member)),
                None => continue,
            },
            _ => continue,
        };
        let name = match field_text(&function, "name", source) {
            Some(n) => n,
            None => continue,
        };

        // Standard ViewSet actions.
        if let Some((_, method, detail)) =
            VIEWSET_ACTIONS.iter().find(|(action, _, _)| *action == name)
        {
            let path = if *detail {
                join_paths(&base, "{id}")
            } else {
                base.clone()
            };
            let mut endpoint = EndpointRecord::new(
                *method,
                path,
                framework,
                start_line(&function),
                end_line(&function),
            );
            endpoint.handler = Some(format!("{}.{}", class_name, name));
            endpoint.handler_type = HandlerType::ClassMethod;
            endpoint.summary = docstring_summary(&function, source);
            endpoints.push(endpoint);
            continue;
        }

        // Custom @action(detail=..., methods=[...], url_path=...).
        if let Some(decorated) = decorated {
            for (call, target) in decorator_calls(&decorated, source) {
                if call.kind() != "call" || target != "action" {
                    continue;
                }
                let detail = keyword_arg(&call, "detail", source)
                    .map(|v| node_text(&v, source) == "True")
                    .unwrap_or(false);
                let methods: Vec<HttpMethod> = keyword_arg(&call, "methods", source)
                    .map(|v| {
                        list_strings(&v, source)
                            .iter()
                            .map(|m| normalize_http_method(m))
                            .collect()
                    })
                    .unwrap_or_default();
                let url_path = keyword_arg(&call, "url_path", source)
                    .map(|v| string_content(&v, source))
                    .unwrap_or_else(|| name.clone());

                let mut path = base.clone();
                if detail {
                    path = join_paths(&path, "{id}");
                }
                path = join_paths(&path, &url_path);

                let method = if methods.is_empty() {
                    HttpMethod::Get
                } else {
                    collapse_methods(&methods)
                };
                let mut endpoint = EndpointRecord::new(
                    method,
                    path,
                    framework,
                    start_line(&decorated),
                    end_line(&function),
                );
                endpoint.handler = Some(format!("{}.{}", class_name, name));
                endpoint.handler_type = HandlerType::ClassMethod;
                endpoint.summary = docstring_summary(&function, source);
                endpoints.push(endpoint);
            }
        }
    }

    endpoints
}

fn apiview_endpoints(
    class: &Node,
    class_name: &str,
    source: &str,
    framework: &str,
) -> Vec<EndpointRecord> {
    let base = resource_base(class_name);
    let mut endpoints = Vec::new();
    let body = match class.child_by_field_name("body") {
        Some(b) => b,
        None => return endpoints,
    };

    for function in children_of_kind(&body, "function_definition") {
        let name = match field_text(&function, "name", source) {
            Some(n) => n,
            None => continue,
        };
        if !APIVIEW_VERBS.contains(&name.as_str()) {
            continue;
        }
        let mut endpoint = EndpointRecord::new(
            normalize_http_method(&name),
            base.clone(),
            framework,
            start_line(&function),
            end_line(&function),
        );
        endpoint.handler = Some(format!("{}.{}", class_name, name));
        endpoint.handler_type = HandlerType::ClassMethod;
        endpoint.summary = docstring_summary(&function, source);
        endpoints.push(endpoint);
    }

    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    fn extract(source: &str) -> Vec<EndpointRecord> {
        let tree = parse_source(Language::Python, source).unwrap();
        DjangoRest.extract(&tree, "views.py", source, &[])
    }

    #[test]
    fn api_view_function() {
        let source = "@api_view(['GET', 'POST'])\ndef user_list(request):\n    \"List users.\"\n";
        let endpoints = extract(source);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::All);
        assert_eq!(endpoints[0].path, "/user_list");
        assert_eq!(endpoints[0].summary.as_deref(), Some("List users."));
    }

    #[test]
    fn viewset_actions() {
        let source = "class OrderViewSet(ModelViewSet):\n    def list(self, request):\n        pass\n\n    def retrieve(self, request, pk):\n        pass\n\n    def destroy(self, request, pk):\n        pass\n";
        let endpoints = extract(source);

        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
        assert_eq!(endpoints[0].path, "/order");
        assert_eq!(endpoints[1].method, HttpMethod::Get);
        assert_eq!(endpoints[1].path, "/order/{id}");
        assert_eq!(endpoints[2].method, HttpMethod::Delete);
        assert_eq!(
            endpoints[2].handler.as_deref(),
            Some("OrderViewSet.destroy")
        );
        assert_eq!(endpoints[2].handler_type, HandlerType::ClassMethod);
    }

    #[test]
    fn custom_action() {
        let source = "class OrderViewSet(ViewSet):\n    @action(detail=True, methods=['post'], url_path='cancel')\n    def cancel(self, request, pk):\n        pass\n";
        let endpoints = extract(source);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::Post);
        assert_eq!(endpoints[0].path, "/order/{id}/cancel");
    }

    #[test]
    fn apiview_verbs() {
        let source = "class HealthAPIView(APIView):\n    def get(self, request):\n        pass\n";
        let endpoints = extract(source);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
        assert_eq!(endpoints[0].path, "/health");
    }
}
