//! Sinatra route DSL extraction.
//!
//! Top-level `get '/path' do ... end` blocks (and the other verbs).

use crate::{normalize_http_method, EndpointExtractor, EndpointRecord, HandlerType};
use sourcerack_core::Language;
use sourcerack_languages::{
    descendants_of_kind, end_line, field_text, node_text, start_line, ImportRecord,
};
use tree_sitter::{Node, Tree};

const VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head"];

pub struct Sinatra;

impl EndpointExtractor for Sinatra {
    fn framework(&self) -> &'static str {
        "sinatra"
    }

    fn language(&self) -> Language {
        Language::Ruby
    }

    fn can_handle(&self, _path: &str, imports: &[ImportRecord]) -> bool {
        crate::imports_any(imports, &["sinatra"])
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

        for call in descendants_of_kind(&root, &["call"]) {
            let verb = match field_text(&call, "method", source) {
                Some(v) if VERBS.contains(&v.as_str()) => v,
                _ => continue,
            };
            if call.child_by_field_name("receiver").is_some() {
                continue;
            }
            // Routes carry a block body; plain verb-named method calls don't.
            if call.child_by_field_name("block").is_none() {
                continue;
            }
            let path = match first_string_arg(&call, source) {
                Some(p) => p,
                None => continue,
            };

            let mut endpoint = EndpointRecord::new(
                normalize_http_method(&verb),
                path,
                self.framework(),
                start_line(&call),
                end_line(&call),
            );
            endpoint.handler_type = HandlerType::Inline;
            endpoints.push(endpoint);
        }

        endpoints
    }
}

fn first_string_arg(call: &Node, source: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let found = args
        .named_children(&mut cursor)
        .find(|a| a.kind() == "string")
        .map(|a| {
            node_text(&a, source)
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpMethod, ParamLocation};
    use sourcerack_core::parse_source;
    use sourcerack_languages::{ImportBindingRecord, ImportType};

    #[test]
    fn routes_with_blocks() {
        let source = "require 'sinatra'\n\nget '/notes/:id' do\n  'note'\nend\n\npost '/notes' do\n  'created'\nend\n";
        let tree = parse_source(Language::Ruby, source).unwrap();
        let endpoints = Sinatra.extract(&tree, "app.rb", source, &[]);

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].method, HttpMethod::Get);
        assert_eq!(endpoints[0].path, "/notes/:id");
        assert_eq!(endpoints[0].params[0].name, "id");
        assert_eq!(endpoints[0].params[0].location, ParamLocation::Path);
        assert_eq!(endpoints[1].method, HttpMethod::Post);
    }

    #[test]
    fn can_handle_requires_sinatra_import() {
        let imports = vec![ImportRecord {
            line: 1,
            import_type: ImportType::Require,
            module_specifier: "sinatra".to_string(),
            bindings: vec![ImportBindingRecord {
                imported_name: "*".to_string(),
                local_name: "sinatra".to_string(),
                is_type_only: false,
            }],
        }];
        assert!(Sinatra.can_handle("app.rb", &imports));
        assert!(!Sinatra.can_handle("app.rb", &[]));
    }
}
