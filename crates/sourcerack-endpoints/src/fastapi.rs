//! FastAPI route extraction.
//!
//! `@router.METHOD(path, response_model=..., status_code=..., tags=...,
//! dependencies=[Depends(dep)])` with keyword-argument extraction; function
//! parameters whose default is `Query(...)`/`Path(...)`/`Header(...)`/
//! `Cookie(...)`/`Body(...)` populate endpoint params with the corresponding
//! location, and a bare `...` default means required.

use crate::pycommon::{
    decorated_function, decorator_calls, docstring_summary, keyword_arg, list_strings,
    positional_string_arg, string_content,
};
use crate::{
    normalize_http_method, EndpointExtractor, EndpointParamRecord, EndpointRecord, HandlerType,
    ParamLocation,
};
use sourcerack_core::Language;
use sourcerack_languages::{
    descendants_of_kind, end_line, field_text, node_text, start_line, ImportRecord,
};
use tree_sitter::{Node, Tree};

const VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head"];

pub struct FastApi;

impl EndpointExtractor for FastApi {
    fn framework(&self) -> &'static str {
        "fastapi"
    }

    fn language(&self) -> Language {
        Language::Python
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["fastapi"])
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

            for (call, target) in decorator_calls(&decorated, source) {
                if call.kind() != "call" {
                    continue;
                }
                let attr = target.rsplit('.').next().unwrap_or(&target);
                if !VERBS.contains(&attr) {
                    continue;
                }
                let path = match positional_string_arg(&call, source) {
                    Some(p) => p,
                    None => continue,
                };

                let mut endpoint = EndpointRecord::new(
                    normalize_http_method(attr),
                    path,
                    self.framework(),
                    start_line(&decorated),
                    end_line(&function),
                );
                endpoint.handler = field_text(&function, "name", source);
                endpoint.handler_type = HandlerType::Reference;
                endpoint.summary = keyword_arg(&call, "summary", source)
                    .map(|v| string_content(&v, source))
                    .or_else(|| docstring_summary(&function, source));
                endpoint.description = keyword_arg(&call, "description", source)
                    .map(|v| string_content(&v, source));
                endpoint.response_model =
                    keyword_arg(&call, "response_model", source).map(|v| {
                        node_text(&v, source).to_string()
                    });
                endpoint.response_status = keyword_arg(&call, "status_code", source)
                    .and_then(|v| node_text(&v, source).parse::<i64>().ok());
                endpoint.tags = keyword_arg(&call, "tags", source)
                    .map(|v| list_strings(&v, source))
                    .unwrap_or_default();
                endpoint.dependencies = keyword_arg(&call, "dependencies", source)
                    .map(|v| depends_names(&v, source))
                    .unwrap_or_default();

                merge_function_params(&mut endpoint, &function, source);
                endpoints.push(endpoint);
            }
        }

        endpoints
    }
}

/// Names inside `dependencies=[Depends(x), Depends(y)]`.
fn depends_names(list: &Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    for call in descendants_of_kind(list, &["call"]) {
        let function = match field_text(&call, "function", source) {
            Some(f) => f,
            None => continue,
        };
        if function != "Depends" && !function.ends_with(".Depends") {
            continue;
        }
        if let Some(args) = call.child_by_field_name("arguments") {
            if let Some(first) = args.named_child(0) {
                out.push(node_text(&first, source).to_string());
            }
        }
    }
    out
}

/// Fold `Query(...)`/`Path(...)`/`Header(...)`/`Cookie(...)`/`Body(...)`
/// parameter defaults into endpoint params.
fn merge_function_params(endpoint: &mut EndpointRecord, function: &Node, source: &str) {
    let params = match function.child_by_field_name("parameters") {
        Some(p) => p,
        None => return,
    };
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let (name, type_annotation, default) = match param.kind() {
            "typed_default_parameter" | "default_parameter" => (
                field_text(&param, "name", source),
                field_text(&param, "type", source),
                param.child_by_field_name("value"),
            ),
            "typed_parameter" => (
                param
                    .named_child(0)
                    .map(|n| node_text(&n, source).to_string()),
                field_text(&param, "type", source),
                None,
            ),
            _ => continue,
        };
        let name = match name {
            Some(n) => n,
            None => continue,
        };

        let location_call = default.filter(|d| d.kind() == "call");
        let (location, required) = match location_call {
            Some(call) => {
                let function_name = field_text(&call, "function", source).unwrap_or_default();
                let location = match function_name.as_str() {
                    "Query" => ParamLocation::Query,
                    "Path" => ParamLocation::Path,
                    "Header" => ParamLocation::Header,
                    "Cookie" => ParamLocation::Cookie,
                    "Body" => ParamLocation::Body,
                    _ => continue,
                };
                (location, first_arg_is_ellipsis(&call))
            }
            None => continue,
        };

        if let Some(existing) = endpoint
            .params
            .iter_mut()
            .find(|p| p.name == name && p.location == ParamLocation::Path)
        {
            // Path(...) on a template placeholder refines the existing param.
            existing.param_type = type_annotation;
            continue;
        }
        endpoint.params.push(EndpointParamRecord {
            name,
            location,
            param_type: type_annotation,
            required,
        });
    }
}

/// `Query(...)` with a literal `...` first argument means required.
fn first_arg_is_ellipsis(call: &Node) -> bool {
    call.child_by_field_name("arguments")
        .and_then(|args| args.named_child(0))
        .map(|first| first.kind() == "ellipsis")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;
    use sourcerack_core::parse_source;

    fn extract(source: &str) -> Vec<EndpointRecord> {
        let tree = parse_source(Language::Python, source).unwrap();
        FastApi.extract(&tree, "api.py", source, &[])
    }

    #[test]
    fn keyword_arguments() {
        let source = "@router.post('/items', response_model=Item, status_code=201, tags=['items'], dependencies=[Depends(get_db)])\nasync def create_item(item: Item):\n    \"Create an item.\"\n";
        let endpoints = extract(source);

        assert_eq!(endpoints.len(), 1);
        let e = &endpoints[0];
        assert_eq!(e.method, HttpMethod::Post);
        assert_eq!(e.response_model.as_deref(), Some("Item"));
        assert_eq!(e.response_status, Some(201));
        assert_eq!(e.tags, vec!["items"]);
        assert_eq!(e.dependencies, vec!["get_db"]);
        assert_eq!(e.summary.as_deref(), Some("Create an item."));
    }

    #[test]
    fn parameter_locations() {
        let source = "@app.get('/items/{item_id}')\nasync def read_item(item_id: int = Path(...), q: str = Query(None), token: str = Header(...)):\n    pass\n";
        let endpoints = extract(source);

        let e = &endpoints[0];
        let find = |name: &str| e.params.iter().find(|p| p.name == name).unwrap();

        // item_id comes from the template and is refined by Path(...)
        let item_id = find("item_id");
        assert_eq!(item_id.location, ParamLocation::Path);
        assert_eq!(item_id.param_type.as_deref(), Some("int"));
        assert!(item_id.required);

        let q = find("q");
        assert_eq!(q.location, ParamLocation::Query);
        assert!(!q.required);

        let token = find("token");
        assert_eq!(token.location, ParamLocation::Header);
        assert!(token.required);
    }

    #[test]
    fn ignores_plain_defaults() {
        let source = "@app.get('/search')\nasync def search(limit: int = 10):\n    pass\n";
        let endpoints = extract(source);
        assert!(endpoints[0].params.is_empty());
    }
}
