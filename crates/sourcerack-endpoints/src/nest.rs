//! NestJS controller extraction.
//!
//! `@Controller(prefix)` classes whose methods carry `@Get|@Post|...(path)`;
//! the endpoint path is the normalized join of controller prefix and method
//! path.

use crate::{
    join_paths, normalize_http_method, EndpointExtractor, EndpointRecord, HandlerType,
};
use sourcerack_core::Language;
use sourcerack_languages::{
    children_of_kind, descendants_of_kind, field_text, node_text, start_line, end_line,
    ImportRecord,
};
use tree_sitter::{Node, Tree};

const VERB_DECORATORS: &[&str] = &[
    "Get", "Post", "Put", "Patch", "Delete", "Options", "Head", "All",
];

pub struct NestJs;

impl EndpointExtractor for NestJs {
    fn framework(&self) -> &'static str {
        "nestjs"
    }

    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["nest"]
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["@nestjs/common", "@nestjs/core"])
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

        for class in descendants_of_kind(&root, &["class_declaration", "abstract_class_declaration"])
        {
            let prefix = match controller_prefix(&class, source) {
                Some(p) => p,
                None => continue,
            };
            let class_name = field_text(&class, "name", source).unwrap_or_default();
            let body = match class.child_by_field_name("body") {
                Some(b) => b,
                None => continue,
            };

            for method in children_of_kind(&body, "method_definition") {
                let method_name = match field_text(&method, "name", source) {
                    Some(n) => n,
                    None => continue,
                };
                let mut route = None;
                let mut middleware = Vec::new();

                for decorator in children_of_kind(&method, "decorator") {
                    let (name, args) = match decorator_call(&decorator, source) {
                        Some(d) => d,
                        None => continue,
                    };
                    if VERB_DECORATORS.contains(&name.as_str()) {
                        let sub_path = args
                            .first()
                            .filter(|a| a.kind() == "string")
                            .map(|a| string_content(a, source))
                            .unwrap_or_default();
                        route = Some((name, sub_path));
                    } else if name == "UseGuards" || name == "UseInterceptors" || name == "UsePipes"
                    {
                        for arg in &args {
                            if matches!(arg.kind(), "identifier" | "member_expression") {
                                middleware.push(node_text(arg, source).to_string());
                            }
                        }
                    }
                }

                let (verb, sub_path) = match route {
                    Some(r) => r,
                    None => continue,
                };
                let full_path = join_paths(&join_paths("", &prefix), &sub_path);
                let mut endpoint = EndpointRecord::new(
                    normalize_http_method(&verb),
                    full_path,
                    self.framework(),
                    start_line(&method),
                    end_line(&method),
                );
                endpoint.handler = Some(format!("{}.{}", class_name, method_name));
                endpoint.handler_type = HandlerType::ClassMethod;
                endpoint.middleware = middleware;
                endpoints.push(endpoint);
            }
        }

        endpoints
    }
}

/// Prefix of an `@Controller(...)` decorator on the class, if present.
fn controller_prefix(class: &Node, source: &str) -> Option<String> {
    let mut decorators = children_of_kind(class, "decorator");
    // Decorators on exported classes hang off the export statement.
    if decorators.is_empty() {
        if let Some(parent) = class.parent() {
            if parent.kind() == "export_statement" {
                decorators = children_of_kind(&parent, "decorator");
            }
        }
    }
    for decorator in decorators {
        if let Some((name, args)) = decorator_call(&decorator, source) {
            if name == "Controller" {
                let prefix = args
                    .first()
                    .filter(|a| a.kind() == "string")
                    .map(|a| string_content(a, source))
                    .unwrap_or_default();
                return Some(prefix);
            }
        }
    }
    None
}

/// `@Name(...)` or bare `@Name` -> (name, args).
fn decorator_call<'t>(decorator: &Node<'t>, source: &str) -> Option<(String, Vec<Node<'t>>)> {
    let inner = decorator.named_child(0)?;
    match inner.kind() {
        "call_expression" => {
            let name = field_text(&inner, "function", source)?;
            let mut args = Vec::new();
            if let Some(arg_list) = inner.child_by_field_name("arguments") {
                let mut cursor = arg_list.walk();
                args.extend(arg_list.named_children(&mut cursor));
            }
            Some((name, args))
        }
        "identifier" => Some((node_text(&inner, source).to_string(), Vec::new())),
        _ => None,
    }
}

fn string_content(node: &Node, source: &str) -> String {
    node_text(node, source)
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpMethod;
    use sourcerack_core::parse_source;

    #[test]
    fn controller_with_verb_decorators() {
        let source = "import { Controller, Get, Post, UseGuards } from '@nestjs/common';\n\n@Controller('users')\nexport class UsersController {\n  @Get(':id')\n  findOne(id: string) {}\n\n  @Post()\n  @UseGuards(AuthGuard)\n  create(dto: CreateUserDto) {}\n}\n";
        let tree = parse_source(Language::TypeScript, source).unwrap();
        let endpoints = NestJs.extract(&tree, "users.controller.ts", source, &[]);

        assert_eq!(endpoints.len(), 2);

        let find_one = &endpoints[0];
        assert_eq!(find_one.method, HttpMethod::Get);
        assert_eq!(find_one.path, "/users/:id");
        assert_eq!(find_one.handler.as_deref(), Some("UsersController.findOne"));
        assert_eq!(find_one.handler_type, HandlerType::ClassMethod);
        assert_eq!(find_one.params[0].name, "id");

        let create = &endpoints[1];
        assert_eq!(create.method, HttpMethod::Post);
        assert_eq!(create.path, "/users");
        assert_eq!(create.middleware, vec!["AuthGuard"]);
    }
}
