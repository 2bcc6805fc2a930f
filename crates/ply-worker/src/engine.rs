//! Per-dialect bundlers behind a single request handler.

use ply_bundler::{Bundler, BundlerConfig, ScriptPlugin};
use ply_plugin_css::CssPlugin;
use ply_plugin_svelte::{ComponentCompiler, SveltePlugin, TemplateFallbackCompiler};

use crate::protocol::{BundleRequest, BundleResponse, Dialect};

/// Holds one configured [`Bundler`] per dialect and turns requests into
/// responses. Every request yields exactly one response.
#[derive(Debug)]
pub struct Engine {
    script: Bundler,
    component: Bundler,
}

impl Engine {
    /// Engine whose component dialect uses [`TemplateFallbackCompiler`].
    pub fn new(config: BundlerConfig) -> Self {
        Self::with_compiler(config, TemplateFallbackCompiler)
    }

    /// Engine whose component dialect compiles `.svelte` files with
    /// `compiler`.
    ///
    /// # Arguments
    ///
    /// * `config` - Shared by both dialects
    /// * `compiler` - Called synchronously for every component
    pub fn with_compiler<C: ComponentCompiler + 'static>(config: BundlerConfig, compiler: C) -> Self {
        Self {
            script: Bundler::new(config.clone())
                .plugin(CssPlugin::new())
                .plugin(ScriptPlugin::new()),
            component: Bundler::new(config)
                .plugin(SveltePlugin::with_compiler(compiler))
                .plugin(CssPlugin::new())
                .plugin(ScriptPlugin::new()),
        }
    }

    pub fn bundler(&self, dialect: Dialect) -> &Bundler {
        match dialect {
            Dialect::Script => &self.script,
            Dialect::Component => &self.component,
        }
    }

    pub fn handle(&self, request: BundleRequest) -> BundleResponse {
        self.handle_observed(request, |_, _| {})
    }

    /// Like [`handle`](Self::handle), but calls `started` with the request id
    /// and the file failures will be attributed to, just before the pass runs.
    pub fn handle_observed(
        &self,
        request: BundleRequest,
        started: impl FnOnce(Option<u64>, &str),
    ) -> BundleResponse {
        let id = request.id;
        let dialect = request.dialect;
        let span = tracing::debug_span!("bundle_request", id = ?id, dialect = %dialect);
        let _enter = span.enter();

        tracing::debug!(files = request.files.len(), "received snapshot");
        let files = request.into_flat_files();
        let bundler = self.bundler(dialect);
        started(id, &bundler.entry_hint(&files));
        let response = BundleResponse::from_result(id, bundler.bundle(&files));
        tracing::debug!(success = response.is_success(), "posting response");
        response
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(BundlerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::protocol::SnapshotFile;

    fn request(dialect: Dialect, files: &[(&str, &str)]) -> BundleRequest {
        BundleRequest {
            id: Some(1),
            dialect,
            files: files
                .iter()
                .map(|(path, value)| {
                    (
                        path.to_string(),
                        SnapshotFile {
                            value: value.to_string(),
                            modifiable: true,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_plugin_order_per_dialect() {
        let engine = Engine::default();
        assert_eq!(engine.bundler(Dialect::Script).registry().names(), ["css", "script"]);
        assert_eq!(
            engine.bundler(Dialect::Component).registry().names(),
            ["svelte", "css", "script"]
        );
    }

    #[test]
    fn test_script_dialect_rejects_components() {
        let files = [
            ("package.json", r#"{"main":"main.js"}"#),
            ("main.js", "import App from './App.svelte';"),
            ("App.svelte", "<p>hi</p>"),
        ];
        let engine = Engine::default();

        let response = engine.handle(request(Dialect::Script, &files));
        assert_eq!(response.id, Some(1));
        assert_eq!(response.error.map(|e| e.name).as_deref(), Some("GenericBundleError"));

        let response = engine.handle(request(Dialect::Component, &files));
        assert!(response.is_success(), "{:?}", response.error);
        assert!(response.js.contains("<p>hi</p>"));
    }

    struct ClassCompiler;

    impl ComponentCompiler for ClassCompiler {
        fn compile(
            &self,
            _id: &str,
            source: &str,
        ) -> Result<ply_plugin_svelte::CompiledComponent, ply_plugin_svelte::CompileFailure> {
            Ok(ply_plugin_svelte::CompiledComponent {
                js: format!(
                    "export default class Component {{ constructor({{ target }}) {{ target.innerHTML = {source:?}; }} }}"
                ),
                css: Some("p { margin: 0; }".to_string()),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_component_dialect_uses_supplied_compiler() {
        let engine = Engine::with_compiler(BundlerConfig::default(), ClassCompiler);
        let response = engine.handle(request(
            Dialect::Component,
            &[
                ("package.json", r#"{"main":"main.js"}"#),
                ("main.js", "import App from './App.svelte';
new App({ target: document.body });"),
                ("App.svelte", "<p>hi</p>"),
            ],
        ));
        assert!(response.is_success(), "{:?}", response.error);
        assert!(response.js.contains("class Component"));
        assert!(response.js.contains("target.innerHTML = \"<p>hi</p>\""));
        assert!(!response.js.contains("template"));
        assert_eq!(response.css, "p { margin: 0; }");
    }

    #[test]
    fn test_observer_sees_id_and_entry_before_the_pass() {
        let mut seen = None;
        let response = Engine::default().handle_observed(
            request(Dialect::Script, &[("package.json", r#"{"main":"./src/index.js"}"#), ("src/index.js", "")]),
            |id, entry| seen = Some((id, entry.to_string())),
        );
        assert!(response.is_success());
        assert_eq!(seen, Some((Some(1), "src/index.js".to_string())));
    }

    #[test]
    fn test_public_files_come_back() {
        let response = Engine::default().handle(request(
            Dialect::Script,
            &[("public/index.html", "<!doctype html>")],
        ));
        assert!(response.is_success());
        assert!(response.js.is_empty());
        assert_eq!(response.public["public/index.html"], "<!doctype html>");
    }
}
