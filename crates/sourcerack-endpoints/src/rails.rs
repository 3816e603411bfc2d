//! Rails route and controller extraction.
//!
//! `config/routes.rb` supplies the route table: verb routes, `resources`
//! (expanded to the RESTful actions, honoring `only:`/`except:`),
//! `namespace` (prefixes the path), and `scope` (path prefix only).
//! Controller files contribute Apipie-documented endpoints enriched with
//! strong parameters, `before_action` middleware, and YARD tags as fallback
//! documentation.

use crate::{
    join_paths, normalize_http_method, EndpointExtractor, EndpointParamRecord, EndpointRecord,
    HandlerType, HttpMethod, ParamLocation,
};
use sourcerack_core::Language;
use sourcerack_languages::{
    descendants_of_kind, end_line, field_text, node_text, start_line, ImportRecord,
};
use tree_sitter::{Node, Tree};

const ROUTE_VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "match"];

/// The seven RESTful actions `resources` expands to.
const RESOURCE_ACTIONS: &[(&str, HttpMethod, &str)] = &[
    ("index", HttpMethod::Get, ""),
    ("create", HttpMethod::Post, ""),
    ("new", HttpMethod::Get, "new"),
    ("edit", HttpMethod::Get, ":id/edit"),
    ("show", HttpMethod::Get, ":id"),
    ("update", HttpMethod::Put, ":id"),
    ("destroy", HttpMethod::Delete, ":id"),
];

pub struct RailsRoutes;
pub struct RailsController;

impl EndpointExtractor for RailsRoutes {
    fn framework(&self) -> &'static str {
        "rails"
    }

    fn language(&self) -> Language {
        Language::Ruby
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ruby-on-rails"]
    }

    fn can_handle(&self, path: &str, _imports: &[ImportRecord]) -> bool {
        path.ends_with("config/routes.rb") || path == "routes.rb"
    }

    fn extract(
        &self,
        tree: &Tree,
        _path: &str,
        source: &str,
        _imports: &[ImportRecord],
    ) -> Vec<EndpointRecord> {
        let mut endpoints = Vec::new();
        collect_routes(&tree.root_node(), source, "", self.framework(), &mut endpoints);
        endpoints
    }
}

fn collect_routes(
    node: &Node,
    source: &str,
    prefix: &str,
    framework: &str,
    out: &mut Vec<EndpointRecord>,
) {
    let mut stack = vec![(*node, prefix.to_string())];
    while let Some((current, prefix)) = stack.pop() {
        let mut handled_block = false;
        if current.kind() == "call" {
            let method_name = field_text(&current, "method", source).unwrap_or_default();
            match method_name.as_str() {
                "namespace" | "scope" => {
                    let segment = first_argument_name(&current, source).unwrap_or_default();
                    let new_prefix = join_paths(&prefix, &segment);
                    if let Some(block) = current.child_by_field_name("block") {
                        stack.push((block, new_prefix));
                    }
                    handled_block = true;
                }
                "resources" | "resource" => {
                    collect_resources(&current, source, &prefix, framework, out);
                    handled_block = true;
                }
                verb if ROUTE_VERBS.contains(&verb) => {
                    if let Some(endpoint) = verb_route(&current, source, &prefix, framework) {
                        out.push(endpoint);
                    }
                    handled_block = true;
                }
                _ => {}
            }
        }
        if handled_block {
            continue;
        }
        for i in (0..current.named_child_count()).rev() {
            if let Some(child) = current.named_child(i) {
                stack.push((child, prefix.clone()));
            }
        }
    }
}

/// `get 'path', to: 'controller#action'` or `get 'path' => 'controller#action'`.
fn verb_route(
    call: &Node,
    source: &str,
    prefix: &str,
    framework: &str,
) -> Option<EndpointRecord> {
    let verb = field_text(call, "method", source)?;
    let args = call.child_by_field_name("arguments")?;

    let mut path = None;
    let mut target = None;

    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "string" => {
                if path.is_none() {
                    path = Some(string_content(&arg, source));
                }
            }
            "pair" => {
                let key = arg
                    .child_by_field_name("key")
                    .map(|k| node_text(&k, source).trim_end_matches(':').trim_start_matches(':').to_string());
                let value = arg.child_by_field_name("value");
                match (key.as_deref(), value) {
                    (Some("to"), Some(v)) if v.kind() == "string" => {
                        target = Some(string_content(&v, source));
                    }
                    // Hash-rocket form: 'path' => 'controller#action'
                    (Some(k), Some(v)) if v.kind() == "string" && k.contains('/') => {
                        path = Some(k.trim_matches(|c| c == '"' || c == '\'').to_string());
                        target = Some(string_content(&v, source));
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // `get 'path' => 'c#a'` parses the whole thing as a pair in some trees.
    if path.is_none() {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() == "pair" {
                if let Some(k) = arg.child_by_field_name("key") {
                    if k.kind() == "string" {
                        path = Some(string_content(&k, source));
                        if let Some(v) = arg.child_by_field_name("value") {
                            if v.kind() == "string" {
                                target = Some(string_content(&v, source));
                            }
                        }
                    }
                }
            }
        }
    }

    let path = path?;
    let full = join_paths(prefix, &path);
    let mut endpoint = EndpointRecord::new(
        normalize_http_method(&verb),
        full,
        framework,
        start_line(call),
        end_line(call),
    );
    endpoint.handler = target;
    endpoint.handler_type = HandlerType::ControllerAction;
    Some(endpoint)
}

/// `resources :posts, only: [:index, :show]` expansion.
fn collect_resources(
    call: &Node,
    source: &str,
    prefix: &str,
    framework: &str,
    out: &mut Vec<EndpointRecord>,
) {
    let resource = match first_argument_name(call, source) {
        Some(r) => r,
        None => return,
    };
    let only = symbol_list_option(call, "only", source);
    let except = symbol_list_option(call, "except", source);

    let base = join_paths(prefix, &resource);
    for (action, method, suffix) in RESOURCE_ACTIONS {
        if let Some(only) = &only {
            if !only.iter().any(|a| a == action) {
                continue;
            }
        }
        if let Some(except) = &except {
            if except.iter().any(|a| a == action) {
                continue;
            }
        }
        let path = if suffix.is_empty() {
            base.clone()
        } else {
            join_paths(&base, suffix)
        };
        let mut endpoint = EndpointRecord::new(
            *method,
            path,
            framework,
            start_line(call),
            end_line(call),
        );
        endpoint.handler = Some(format!("{}#{}", resource, action));
        endpoint.handler_type = HandlerType::ControllerAction;
        out.push(endpoint);
    }

    // Nested routes inside the resources block keep the member prefix out;
    // collection-level nesting is rare enough to treat as a plain prefix.
    if let Some(block) = call.child_by_field_name("block") {
        collect_routes(&block, source, &base, framework, out);
    }
}

/// First symbol or string argument: `:api` -> "api", `'/admin'` -> "admin".
fn first_argument_name(call: &Node, source: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let found = args.named_children(&mut cursor).find_map(|arg| match arg.kind() {
        "simple_symbol" => Some(node_text(&arg, source).trim_start_matches(':').to_string()),
        "string" => Some(string_content(&arg, source).trim_matches('/').to_string()),
        _ => None,
    });
    found
}

/// `only: [:index, :show]` -> Some(["index", "show"]).
fn symbol_list_option(call: &Node, key: &str, source: &str) -> Option<Vec<String>> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() != "pair" {
            continue;
        }
        let pair_key = arg
            .child_by_field_name("key")
            .map(|k| {
                node_text(&k, source)
                    .trim_end_matches(':')
                    .trim_start_matches(':')
                    .to_string()
            })
            .unwrap_or_default();
        if pair_key != key {
            continue;
        }
        let value = arg.child_by_field_name("value")?;
        if value.kind() != "array" {
            return None;
        }
        let mut names = Vec::new();
        let mut inner = value.walk();
        for element in value.named_children(&mut inner) {
            if element.kind() == "simple_symbol" {
                names.push(node_text(&element, source).trim_start_matches(':').to_string());
            }
        }
        return Some(names);
    }
    None
}

fn string_content(node: &Node, source: &str) -> String {
    node_text(node, source)
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

fn first_string_arg(call: &Node, source: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let found = args
        .named_children(&mut cursor)
        .find(|a| a.kind() == "string")
        .map(|a| string_content(&a, source));
    found
}

// ============================================================================
// Controllers: Apipie DSL, strong parameters, before_action, YARD fallback
// ============================================================================

impl EndpointExtractor for RailsController {
    fn framework(&self) -> &'static str {
        "rails"
    }

    fn language(&self) -> Language {
        Language::Ruby
    }

    fn can_handle(&self, path: &str, _imports: &[ImportRecord]) -> bool {
        path.contains("app/controllers/") && path.ends_with("_controller.rb")
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

        let permitted = strong_parameters(&root, source);
        let middleware = before_actions(&root, source);

        for class in descendants_of_kind(&root, &["class"]) {
            let body = match class.child_by_field_name("body") {
                Some(b) => b,
                None => continue,
            };
            let mut cursor = body.walk();
            let members: Vec<Node> = body.named_children(&mut cursor).collect();
            drop(cursor);

            // Apipie calls accumulate until the next method definition.
            let mut pending: Option<EndpointRecord> = None;
            let mut pending_params: Vec<EndpointParamRecord> = Vec::new();
            let mut pending_description: Option<String> = None;

            for member in members {
                match member.kind() {
                    "call" => {
                        let method_name =
                            field_text(&member, "method", source).unwrap_or_default();
                        match method_name.as_str() {
                            "api" => {
                                pending = apipie_endpoint(&member, source, self.framework());
                            }
                            "param" => {
                                if let Some(param) = apipie_param(&member, source) {
                                    pending_params.push(param);
                                }
                            }
                            "desc" => {
                                pending_description = first_string_arg(&member, source);
                            }
                            "returns" => {
                                if let Some(endpoint) = pending.as_mut() {
                                    apply_returns(endpoint, &member, source);
                                }
                            }
                            _ => {}
                        }
                    }
                    "method" => {
                        let action = field_text(&member, "name", source).unwrap_or_default();
                        if let Some(mut endpoint) = pending.take() {
                            endpoint.handler = Some(action.clone());
                            endpoint.handler_type = HandlerType::ControllerAction;
                            endpoint.end_line = end_line(&member);
                            endpoint.description = pending_description.take();
                            attach_params(&mut endpoint, std::mem::take(&mut pending_params));
                            if endpoint.params.iter().all(|p| p.location == ParamLocation::Path)
                            {
                                // YARD fallback when no Apipie params were given.
                                endpoint
                                    .params
                                    .extend(yard_params(&member, source));
                            }
                            if matches!(
                                endpoint.method,
                                HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::All
                            ) {
                                for name in &permitted {
                                    if !endpoint.params.iter().any(|p| &p.name == name) {
                                        endpoint.params.push(EndpointParamRecord {
                                            name: name.clone(),
                                            location: ParamLocation::Body,
                                            param_type: None,
                                            required: false,
                                        });
                                    }
                                }
                            }
                            endpoint.middleware = middleware.clone();
                            endpoints.push(endpoint);
                        } else {
                            pending_params.clear();
                            pending_description = None;
                        }
                    }
                    _ => {}
                }
            }
        }

        endpoints
    }
}

/// `api :GET, '/users/:id', 'Show a user'`.
fn apipie_endpoint(call: &Node, source: &str, framework: &str) -> Option<EndpointRecord> {
    let args = call.child_by_field_name("arguments")?;
    let mut method = None;
    let mut path = None;
    let mut summary = None;

    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "simple_symbol" => {
                if method.is_none() {
                    method = Some(normalize_http_method(
                        node_text(&arg, source).trim_start_matches(':'),
                    ));
                }
            }
            "string" => {
                if path.is_none() {
                    path = Some(string_content(&arg, source));
                } else if summary.is_none() {
                    summary = Some(string_content(&arg, source));
                }
            }
            _ => {}
        }
    }

    let mut endpoint = EndpointRecord::new(
        method?,
        path?,
        framework,
        start_line(call),
        end_line(call),
    );
    endpoint.summary = summary;
    Some(endpoint)
}

/// `param :name, :type, desc: '...', required: true`.
fn apipie_param(call: &Node, source: &str) -> Option<EndpointParamRecord> {
    let args = call.child_by_field_name("arguments")?;
    let mut symbols = Vec::new();
    let mut required = false;

    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "simple_symbol" => {
                symbols.push(node_text(&arg, source).trim_start_matches(':').to_string())
            }
            "pair" => {
                let key = arg
                    .child_by_field_name("key")
                    .map(|k| {
                        node_text(&k, source)
                            .trim_end_matches(':')
                            .trim_start_matches(':')
                            .to_string()
                    })
                    .unwrap_or_default();
                if key == "required" {
                    required = arg
                        .child_by_field_name("value")
                        .map(|v| node_text(&v, source) == "true")
                        .unwrap_or(false);
                }
            }
            _ => {}
        }
    }

    let name = symbols.first()?.clone();
    Some(EndpointParamRecord {
        name,
        location: ParamLocation::Body,
        param_type: symbols.get(1).cloned(),
        required,
    })
}

/// `returns code: 200, desc: 'ok'`.
fn apply_returns(endpoint: &mut EndpointRecord, call: &Node, source: &str) {
    let args = match call.child_by_field_name("arguments") {
        Some(a) => a,
        None => return,
    };
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() != "pair" {
            continue;
        }
        let key = arg
            .child_by_field_name("key")
            .map(|k| {
                node_text(&k, source)
                    .trim_end_matches(':')
                    .trim_start_matches(':')
                    .to_string()
            })
            .unwrap_or_default();
        let value = match arg.child_by_field_name("value") {
            Some(v) => v,
            None => continue,
        };
        match key.as_str() {
            "code" => {
                endpoint.response_status = node_text(&value, source).parse::<i64>().ok();
            }
            "desc" => {
                if value.kind() == "string" {
                    endpoint.response_model = Some(string_content(&value, source));
                }
            }
            _ => {}
        }
    }
}

/// Apipie params keep template path params in place; the rest append.
fn attach_params(endpoint: &mut EndpointRecord, params: Vec<EndpointParamRecord>) {
    for mut param in params {
        if let Some(existing) = endpoint
            .params
            .iter_mut()
            .find(|p| p.name == param.name && p.location == ParamLocation::Path)
        {
            existing.param_type = param.param_type.take();
            existing.required = true;
            continue;
        }
        endpoint.params.push(param);
    }
}

/// `params.require(:user).permit(:name, :email)` anywhere in the file.
fn strong_parameters(root: &Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    for call in descendants_of_kind(root, &["call"]) {
        if field_text(&call, "method", source).as_deref() != Some("permit") {
            continue;
        }
        let receiver_text = call
            .child_by_field_name("receiver")
            .map(|r| node_text(&r, source).to_string())
            .unwrap_or_default();
        if !receiver_text.starts_with("params.require") {
            continue;
        }
        if let Some(args) = call.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                if arg.kind() == "simple_symbol" {
                    let name = node_text(&arg, source).trim_start_matches(':').to_string();
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
            }
        }
    }
    out
}

/// `before_action :authenticate_user!` names.
fn before_actions(root: &Node, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    for call in descendants_of_kind(root, &["call"]) {
        if field_text(&call, "method", source).as_deref() != Some("before_action") {
            continue;
        }
        if let Some(args) = call.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                if arg.kind() == "simple_symbol" {
                    let name = node_text(&arg, source).trim_start_matches(':').to_string();
                    if !out.contains(&name) {
                        out.push(name);
                    }
                }
            }
        }
    }
    out
}

/// YARD `@param name [Type] desc` / `@return [Type]` from the comment block
/// above a method.
fn yard_params(method: &Node, source: &str) -> Vec<EndpointParamRecord> {
    let mut comments = Vec::new();
    let mut prev = method.prev_sibling();
    while let Some(sibling) = prev {
        if sibling.kind() != "comment" {
            break;
        }
        comments.push(node_text(&sibling, source).to_string());
        prev = sibling.prev_sibling();
    }

    let mut out = Vec::new();
    for comment in comments.iter().rev() {
        let text = comment.trim_start_matches('#').trim();
        if let Some(rest) = text.strip_prefix("@param ") {
            let mut parts = rest.splitn(2, ' ');
            let name = parts.next().unwrap_or("").to_string();
            let param_type = parts
                .next()
                .and_then(|r| r.split('[').nth(1))
                .and_then(|r| r.split(']').next())
                .map(|t| t.to_string());
            if !name.is_empty() {
                out.push(EndpointParamRecord {
                    name,
                    location: ParamLocation::Body,
                    param_type,
                    required: false,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sourcerack_core::parse_source;

    fn routes(source: &str) -> Vec<EndpointRecord> {
        let tree = parse_source(Language::Ruby, source).unwrap();
        RailsRoutes.extract(&tree, "config/routes.rb", source, &[])
    }

    #[test]
    fn namespaced_resources_with_only() {
        let source = "Rails.application.routes.draw do\n  namespace :api do\n    resources :posts, only: [:index, :show]\n  end\nend\n";
        let mut endpoints = routes(source);
        endpoints.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
        assert_eq!(endpoints[0].path, "/api/posts");
        assert_eq!(endpoints[0].handler.as_deref(), Some("posts#index"));
        assert_eq!(endpoints[1].method, HttpMethod::Get);
        assert_eq!(endpoints[1].path, "/api/posts/:id");
        assert_eq!(endpoints[1].handler.as_deref(), Some("posts#show"));
    }

    #[test]
    fn full_resources_expansion() {
        let source = "resources :orders\n";
        let endpoints = routes(source);
        assert_eq!(endpoints.len(), 7);
        let methods: Vec<HttpMethod> = endpoints.iter().map(|e| e.method).collect();
        assert!(methods.contains(&HttpMethod::Post));
        assert!(methods.contains(&HttpMethod::Delete));
        assert!(endpoints.iter().any(|e| e.path == "/orders/new"));
        assert!(endpoints.iter().any(|e| e.path == "/orders/:id/edit"));
    }

    #[test]
    fn except_filter() {
        let source = "resources :users, except: [:destroy, :new, :edit]\n";
        let endpoints = routes(source);
        assert_eq!(endpoints.len(), 4);
        assert!(endpoints.iter().all(|e| e.method != HttpMethod::Delete));
    }

    #[test]
    fn verb_route_with_to() {
        let source = "get 'profile', to: 'users#show'\n";
        let endpoints = routes(source);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/profile");
        assert_eq!(endpoints[0].handler.as_deref(), Some("users#show"));
        assert_eq!(endpoints[0].handler_type, HandlerType::ControllerAction);
    }

    #[test]
    fn controller_requires_controller_path() {
        assert!(RailsController.can_handle("app/controllers/users_controller.rb", &[]));
        assert!(!RailsController.can_handle("app/models/user.rb", &[]));
    }

    #[test]
    fn apipie_controller() {
        let source = "class UsersController < ApplicationController\n  before_action :authenticate_user!\n\n  api :GET, '/users/:id', 'Show a user'\n  param :id, :number, required: true\n  returns code: 200, desc: 'the user'\n  def show\n  end\n\n  api :POST, '/users', 'Create a user'\n  def create\n    user_params\n  end\n\n  private\n\n  def user_params\n    params.require(:user).permit(:name, :email)\n  end\nend\n";
        let tree = parse_source(Language::Ruby, source).unwrap();
        let endpoints =
            RailsController.extract(&tree, "app/controllers/users_controller.rb", source, &[]);

        assert_eq!(endpoints.len(), 2);

        let show = &endpoints[0];
        assert_eq!(show.method, HttpMethod::Get);
        assert_eq!(show.path, "/users/:id");
        assert_eq!(show.summary.as_deref(), Some("Show a user"));
        assert_eq!(show.handler.as_deref(), Some("show"));
        assert_eq!(show.response_status, Some(200));
        assert_eq!(show.middleware, vec!["authenticate_user!"]);
        let id = show.params.iter().find(|p| p.name == "id").unwrap();
        assert_eq!(id.location, ParamLocation::Path);
        assert_eq!(id.param_type.as_deref(), Some("number"));

        let create = &endpoints[1];
        assert_eq!(create.method, HttpMethod::Post);
        let body_names: Vec<&str> = create
            .params
            .iter()
            .filter(|p| p.location == ParamLocation::Body)
            .map(|p| p.name.as_str())
            .collect();
        assert!(body_names.contains(&"name"));
        assert!(body_names.contains(&"email"));
    }
}
