//! Framework-aware HTTP endpoint extraction.
//!
//! Each extractor declares a framework tag, a primary language, and a
//! `can_handle` predicate over the file path and its detected imports; only
//! matching extractors run for a file. Recognized patterns are
//! framework-specific, but path parameters and HTTP method normalization are
//! shared.

mod pycommon;
mod registry;

pub mod django;
pub mod express;
pub mod fastapi;
pub mod flask;
pub mod mcp;
pub mod nest;
pub mod rails;
pub mod sinatra;

pub use registry::{extractors_for_file, register, registered_frameworks};

use serde::Serialize;
use sourcerack_core::Language;
use sourcerack_languages::ImportRecord;
use tree_sitter::Tree;

/// HTTP methods an endpoint can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
    All,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::All => "ALL",
        }
    }
}

/// Normalize an HTTP method string. Unknown methods fall back to `ALL`
/// rather than erroring.
pub fn normalize_http_method(raw: &str) -> HttpMethod {
    match raw.trim().to_uppercase().as_str() {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        "OPTIONS" => HttpMethod::Options,
        "HEAD" => HttpMethod::Head,
        _ => HttpMethod::All,
    }
}

/// Collapse a method list: one element keeps its method, a heterogeneous
/// list becomes `ALL`.
pub fn collapse_methods(methods: &[HttpMethod]) -> HttpMethod {
    match methods {
        [] => HttpMethod::All,
        [single] => *single,
        rest => {
            let first = rest[0];
            if rest.iter().all(|m| *m == first) {
                first
            } else {
                HttpMethod::All
            }
        }
    }
}

/// How the endpoint's handler is referenced in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    Reference,
    Inline,
    ClassMethod,
    ControllerAction,
}

impl HandlerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerType::Reference => "reference",
            HandlerType::Inline => "inline",
            HandlerType::ClassMethod => "class_method",
            HandlerType::ControllerAction => "controller_action",
        }
    }
}

/// Where an endpoint parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl ParamLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
            ParamLocation::Body => "body",
        }
    }
}

/// One endpoint parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointParamRecord {
    pub name: String,
    pub location: ParamLocation,
    pub param_type: Option<String>,
    pub required: bool,
}

/// An HTTP route discovered in source.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointRecord {
    pub method: HttpMethod,
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub framework: String,
    pub handler: Option<String>,
    pub handler_type: HandlerType,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub middleware: Vec<String>,
    pub dependencies: Vec<String>,
    pub response_model: Option<String>,
    pub response_status: Option<i64>,
    pub body_schema: Option<String>,
    pub params: Vec<EndpointParamRecord>,
}

impl EndpointRecord {
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        framework: &str,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        let path = path.into();
        let params = path_params(&path);
        Self {
            method,
            path,
            start_line,
            end_line,
            framework: framework.to_string(),
            handler: None,
            handler_type: HandlerType::Inline,
            summary: None,
            description: None,
            tags: Vec::new(),
            middleware: Vec::new(),
            dependencies: Vec::new(),
            response_model: None,
            response_status: None,
            body_schema: None,
            params,
        }
    }
}

/// A framework-specific endpoint extraction pass.
pub trait EndpointExtractor: Send + Sync {
    /// Framework tag stored on every emitted endpoint.
    fn framework(&self) -> &'static str;

    /// Primary language of the framework.
    fn language(&self) -> Language;

    /// Other names this framework answers to.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether this extractor should run for a file, judged from its path
    /// and detected imports.
    fn can_handle(&self, path: &str, imports: &[ImportRecord]) -> bool;

    /// Emit endpoints for one file.
    fn extract(
        &self,
        tree: &Tree,
        path: &str,
        source: &str,
        imports: &[ImportRecord],
    ) -> Vec<EndpointRecord>;
}

/// Parse path parameters from a template. Accepted syntaxes: `:name`,
/// `{name}`, `<name>`, `<converter:name>`.
pub fn path_params(path: &str) -> Vec<EndpointParamRecord> {
    let mut params = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        params.push(EndpointParamRecord {
            name: name.to_string(),
            location: ParamLocation::Path,
            param_type: None,
            required: true,
        });
    };

    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b':' => {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > start {
                    push(&path[start..end]);
                }
                i = end;
            }
            b'{' => {
                if let Some(close) = path[i..].find('}') {
                    let inner = &path[i + 1..i + close];
                    // {name} or {name:converter} (Starlette style)
                    push(inner.split(':').next().unwrap_or(inner));
                    i += close + 1;
                } else {
                    i += 1;
                }
            }
            b'<' => {
                if let Some(close) = path[i..].find('>') {
                    let inner = &path[i + 1..i + close];
                    // <name> or <converter:name>
                    push(inner.rsplit(':').next().unwrap_or(inner));
                    i += close + 1;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    params
}

/// Join a route prefix and a sub-path into a normalized template.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let joined = if path.is_empty() {
        prefix.to_string()
    } else if prefix.is_empty() {
        format!("/{}", path)
    } else {
        format!("{}/{}", prefix, path)
    };
    if joined.is_empty() {
        "/".to_string()
    } else if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}

/// Whether any import's module specifier names one of the given packages
/// (exactly, or as a subpath like `express/router` or `rest_framework.views`).
pub fn imports_any(imports: &[ImportRecord], packages: &[&str]) -> bool {
    imports.iter().any(|import| {
        packages.iter().any(|pkg| {
            let spec = import.module_specifier.as_str();
            spec == *pkg
                || spec.starts_with(&format!("{}/", pkg))
                || spec.starts_with(&format!("{}.", pkg))
                || spec.starts_with(&format!("{}:", pkg))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_normalization() {
        assert_eq!(normalize_http_method("get"), HttpMethod::Get);
        assert_eq!(normalize_http_method("DELETE"), HttpMethod::Delete);
        assert_eq!(normalize_http_method("TRACE"), HttpMethod::All);
        assert_eq!(normalize_http_method("purge"), HttpMethod::All);
    }

    #[test]
    fn collapse_rules() {
        assert_eq!(collapse_methods(&[HttpMethod::Get]), HttpMethod::Get);
        assert_eq!(
            collapse_methods(&[HttpMethod::Get, HttpMethod::Post]),
            HttpMethod::All
        );
        assert_eq!(collapse_methods(&[]), HttpMethod::All);
    }

    #[test]
    fn path_param_syntaxes() {
        let names = |p: &str| -> Vec<String> {
            path_params(p).into_iter().map(|p| p.name).collect()
        };
        assert_eq!(names("/users/:id/posts/:postId"), vec!["id", "postId"]);
        assert_eq!(names("/users/{user_id}"), vec!["user_id"]);
        assert_eq!(names("/users/<int:uid>"), vec!["uid"]);
        assert_eq!(names("/users/<name>"), vec!["name"]);
        assert!(names("/plain/path").is_empty());
        for p in path_params("/users/<int:uid>") {
            assert_eq!(p.location, ParamLocation::Path);
            assert!(p.required);
        }
    }

    #[test]
    fn path_joining() {
        assert_eq!(join_paths("/api", "users"), "/api/users");
        assert_eq!(join_paths("/api/", "/users"), "/api/users");
        assert_eq!(join_paths("", "/users"), "/users");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("", ""), "/");
    }
}
