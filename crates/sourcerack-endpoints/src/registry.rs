//! Endpoint extractor registry.

use crate::EndpointExtractor;
use sourcerack_languages::ImportRecord;
use std::sync::{OnceLock, RwLock};

static EXTRACTORS: RwLock<Vec<&'static dyn EndpointExtractor>> = RwLock::new(Vec::new());
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Register an endpoint extractor. Built-ins register automatically on first
/// lookup.
pub fn register(extractor: &'static dyn EndpointExtractor) {
    EXTRACTORS.write().unwrap().push(extractor);
}

fn init_builtin() {
    INITIALIZED.get_or_init(|| {
        register(&crate::express::Express);
        register(&crate::express::Koa);
        register(&crate::express::Fastify);
        register(&crate::nest::NestJs);
        register(&crate::flask::Flask);
        register(&crate::fastapi::FastApi);
        register(&crate::django::DjangoRest);
        register(&crate::rails::RailsRoutes);
        register(&crate::rails::RailsController);
        register(&crate::sinatra::Sinatra);
        register(&crate::mcp::McpTools);
        register(&crate::mcp::FastMcp);
    });
}

/// Extractors whose `can_handle` predicate accepts this file.
pub fn extractors_for_file(
    path: &str,
    imports: &[ImportRecord],
) -> Vec<&'static dyn EndpointExtractor> {
    init_builtin();
    EXTRACTORS
        .read()
        .unwrap()
        .iter()
        .filter(|e| e.can_handle(path, imports))
        .copied()
        .collect()
}

/// All registered framework tags.
pub fn registered_frameworks() -> Vec<&'static str> {
    init_builtin();
    EXTRACTORS
        .read()
        .unwrap()
        .iter()
        .map(|e| e.framework())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_builtins_registered() {
        let frameworks = registered_frameworks();
        for expected in [
            "express", "koa", "fastify", "nestjs", "flask", "fastapi", "django", "rails",
            "sinatra", "mcp",
        ] {
            assert!(
                frameworks.contains(&expected),
                "missing framework {expected}"
            );
        }
    }

    #[test]
    fn no_match_without_imports() {
        assert!(extractors_for_file("src/app.ts", &[]).is_empty());
    }
}
