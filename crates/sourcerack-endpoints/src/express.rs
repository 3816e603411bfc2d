//! Express, Koa, and Fastify route extraction.
//!
//! All three register routes as `app.METHOD(path, ...handlers)`; Fastify
//! additionally supports `fastify.route({ method, url, handler, schema })`.

use crate::{
    normalize_http_method, EndpointExtractor, EndpointRecord, HandlerType, HttpMethod,
};
use sourcerack_core::Language;
use sourcerack_languages::{
    descendants_of_kind, end_line, field_text, node_text, start_line, ImportRecord,
};
use tree_sitter::{Node, Tree};

const VERBS: &[&str] = &[
    "get", "post", "put", "patch", "delete", "options", "head", "all",
];

pub struct Express;
pub struct Koa;
pub struct Fastify;

impl EndpointExtractor for Express {
    fn framework(&self) -> &'static str {
        "express"
    }

    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["express.js", "expressjs"]
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["express"])
    }

    fn extract(
        &self,
        tree: &Tree,
        _path: &str,
        source: &str,
        _imports: &[ImportRecord],
    ) -> Vec<EndpointRecord> {
        verb_call_routes(tree, source, self.framework())
    }
}

impl EndpointExtractor for Koa {
    fn framework(&self) -> &'static str {
        "koa"
    }

    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["koa-router", "@koa/router"]
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["koa", "koa-router", "@koa/router"])
    }

    fn extract(
        &self,
        tree: &Tree,
        _path: &str,
        source: &str,
        _imports: &[ImportRecord],
    ) -> Vec<EndpointRecord> {
        verb_call_routes(tree, source, self.framework())
    }
}

impl EndpointExtractor for Fastify {
    fn framework(&self) -> &'static str {
        "fastify"
    }

    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["fastify"])
    }

    fn extract(
        &self,
        tree: &Tree,
        _path: &str,
        source: &str,
        _imports: &[ImportRecord],
    ) -> Vec<EndpointRecord> {
        let mut endpoints = verb_call_routes(tree, source, self.framework());
        endpoints.extend(fastify_route_objects(tree, source, self.framework()));
        endpoints
    }
}

/// `app.get('/path', middleware..., handler)` and friends.
fn verb_call_routes(tree: &Tree, source: &str, framework: &str) -> Vec<EndpointRecord> {
    let root = tree.root_node();
    let mut endpoints = Vec::new();

    for call in descendants_of_kind(&root, &["call_expression"]) {
        let function = match call.child_by_field_name("function") {
            Some(f) if f.kind() == "member_expression" => f,
            _ => continue,
        };
        let verb = match field_text(&function, "property", source) {
            Some(v) if VERBS.contains(&v.as_str()) => v,
            _ => continue,
        };
        let args = match call.child_by_field_name("arguments") {
            Some(a) => a,
            None => continue,
        };
        let mut cursor = args.walk();
        let arg_nodes: Vec<Node> = args.named_children(&mut cursor).collect();
        drop(cursor);

        let path = match arg_nodes.first() {
            Some(first) if first.kind() == "string" => string_content(first, source),
            _ => continue,
        };

        let mut endpoint = EndpointRecord::new(
            normalize_http_method(&verb),
            path,
            framework,
            start_line(&call),
            end_line(&call),
        );

        let handlers = &arg_nodes[1..];
        if let Some((last, middleware)) = handlers.split_last() {
            match last.kind() {
                "identifier" | "member_expression" => {
                    endpoint.handler = Some(node_text(last, source).to_string());
                    endpoint.handler_type = HandlerType::Reference;
                }
                _ => {
                    endpoint.handler_type = HandlerType::Inline;
                }
            }
            for m in middleware {
                if matches!(m.kind(), "identifier" | "member_expression") {
                    endpoint.middleware.push(node_text(m, source).to_string());
                }
            }
        }

        endpoints.push(endpoint);
    }

    endpoints
}

/// `fastify.route({ method: 'GET', url: '/x', handler, schema })`.
fn fastify_route_objects(tree: &Tree, source: &str, framework: &str) -> Vec<EndpointRecord> {
    let root = tree.root_node();
    let mut endpoints = Vec::new();

    for call in descendants_of_kind(&root, &["call_expression"]) {
        let function = match call.child_by_field_name("function") {
            Some(f) if f.kind() == "member_expression" => f,
            _ => continue,
        };
        if field_text(&function, "property", source).as_deref() != Some("route") {
            continue;
        }
        let args = match call.child_by_field_name("arguments") {
            Some(a) => a,
            None => continue,
        };
        let object = match args.named_child(0) {
            Some(o) if o.kind() == "object" => o,
            _ => continue,
        };

        let mut methods: Vec<HttpMethod> = Vec::new();
        let mut url = None;
        let mut handler = None;
        let mut schema = None;

        let mut cursor = object.walk();
        for pair in object.named_children(&mut cursor) {
            if pair.kind() != "pair" {
                continue;
            }
            let key = match field_text(&pair, "key", source) {
                Some(k) => k,
                None => continue,
            };
            let value = match pair.child_by_field_name("value") {
                Some(v) => v,
                None => continue,
            };
            match key.as_str() {
                "method" => match value.kind() {
                    "string" => methods.push(normalize_http_method(&string_content(&value, source))),
                    "array" => {
                        let mut inner = value.walk();
                        for element in value.named_children(&mut inner) {
                            if element.kind() == "string" {
                                methods
                                    .push(normalize_http_method(&string_content(&element, source)));
                            }
                        }
                    }
                    _ => {}
                },
                "url" | "path" => {
                    if value.kind() == "string" {
                        url = Some(string_content(&value, source));
                    }
                }
                "handler" => {
                    if matches!(value.kind(), "identifier" | "member_expression") {
                        handler = Some(node_text(&value, source).to_string());
                    }
                }
                "schema" => {
                    schema = Some(node_text(&value, source).to_string());
                }
                _ => {}
            }
        }

        let url = match url {
            Some(u) => u,
            None => continue,
        };
        let method = crate::collapse_methods(&methods);
        let mut endpoint = EndpointRecord::new(
            method,
            url,
            framework,
            start_line(&call),
            end_line(&call),
        );
        endpoint.handler_type = if handler.is_some() {
            HandlerType::Reference
        } else {
            HandlerType::Inline
        };
        endpoint.handler = handler;
        endpoint.body_schema = schema;
        endpoints.push(endpoint);
    }

    endpoints
}

fn string_content(node: &Node, source: &str) -> String {
    node_text(node, source)
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;
    use sourcerack_languages::{extractor_for, ImportType};

    fn imports(spec: &str) -> Vec<ImportRecord> {
        vec![ImportRecord {
            line: 1,
            import_type: ImportType::EsImport,
            module_specifier: spec.to_string(),
            bindings: Vec::new(),
        }]
    }

    #[test]
    fn can_handle_matches_imports() {
        assert!(Express.can_handle("src/app.ts", &imports("express")));
        assert!(!Express.can_handle("src/app.ts", &imports("fastify")));
        assert!(Koa.can_handle("src/app.ts", &imports("@koa/router")));
        assert!(Fastify.can_handle("src/app.ts", &imports("fastify")));
    }

    #[test]
    fn express_verb_routes() {
        let source = "import express from 'express';\nconst app = express();\napp.get('/users/:id', auth, getUser);\napp.post('/users', (req, res) => {});\n";
        let tree = parse_source(Language::TypeScript, source).unwrap();
        let endpoints = Express.extract(&tree, "src/app.ts", source, &[]);

        assert_eq!(endpoints.len(), 2);
        let get = &endpoints[0];
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.path, "/users/:id");
        assert_eq!(get.handler.as_deref(), Some("getUser"));
        assert_eq!(get.handler_type, HandlerType::Reference);
        assert_eq!(get.middleware, vec!["auth"]);
        assert_eq!(get.params.len(), 1);
        assert_eq!(get.params[0].name, "id");

        let post = &endpoints[1];
        assert_eq!(post.method, HttpMethod::Post);
        assert_eq!(post.handler_type, HandlerType::Inline);
        assert!(post.handler.is_none());
    }

    #[test]
    fn fastify_route_object() {
        let source = "fastify.route({ method: 'PUT', url: '/items/:itemId', handler: updateItem, schema: { body: itemSchema } });\n";
        let tree = parse_source(Language::JavaScript, source).unwrap();
        let endpoints = Fastify.extract(&tree, "src/routes.js", source, &[]);

        assert_eq!(endpoints.len(), 1);
        let route = &endpoints[0];
        assert_eq!(route.method, HttpMethod::Put);
        assert_eq!(route.path, "/items/:itemId");
        assert_eq!(route.handler.as_deref(), Some("updateItem"));
        assert!(route.body_schema.is_some());
    }

    #[test]
    fn extraction_registry_sees_routes() {
        // The symbol extractor and the endpoint extractor agree on imports.
        let source = "const express = require('express');\nconst app = express();\napp.delete('/sessions/:sid', endSession);\n";
        let tree = parse_source(Language::JavaScript, source).unwrap();
        let extraction = extractor_for(Language::JavaScript)
            .unwrap()
            .extract(&tree, "app.js", source);
        assert!(Express.can_handle("app.js", &extraction.imports));

        let endpoints = Express.extract(&tree, "app.js", source, &extraction.imports);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, HttpMethod::Delete);
    }
}
