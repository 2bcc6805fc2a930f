//! Bundle orchestration.
//!
//! One call to [`Bundler::bundle`] is one pass over an immutable snapshot:
//!
//! ```text
//! Idle -> ReadingManifest -> Resolved(entry) -> GraphBuilding -> Generating -> Success
//!              |                   |                  |               |
//!              +-------------------+------------------+---------------+--> Failed
//! ```
//!
//! Nothing survives a pass: the graph, the plugin context and the stylesheets
//! are rebuilt from the snapshot every time.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use ply_vfs::{FlatFiles, ModulePath};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BundlerConfig;
use crate::descriptor::PackageDescriptor;
use crate::diagnostics::{ErrorRecord, NON_JS_IMPORT_NOTE, sanitize, sanitize_panic};
use crate::emit::emit_bundle;
use crate::error::{BundleError, Result};
use crate::external::ExternalResolver;
use crate::graph::{ModuleGraph, ModuleGraphNode};
use crate::linker::ModuleRecord;
use crate::plugins::{Plugin, PluginContext, PluginRegistry, ResolvedId, SharedPlugin};
use crate::resolver;

/// Where a pass currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PassState {
    #[default]
    Idle,
    ReadingManifest,
    /// The entry point is known and exists.
    Resolved(String),
    GraphBuilding,
    Generating,
    Success,
    Failed,
}

impl PassState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PassState::Success | PassState::Failed)
    }
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassState::Idle => f.write_str("idle"),
            PassState::ReadingManifest => f.write_str("reading-manifest"),
            PassState::Resolved(entry) => write!(f, "resolved({entry})"),
            PassState::GraphBuilding => f.write_str("graph-building"),
            PassState::Generating => f.write_str("generating"),
            PassState::Success => f.write_str("success"),
            PassState::Failed => f.write_str("failed"),
        }
    }
}

/// Successful pass output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOutput {
    pub js: String,
    pub css: String,
    /// Files copied verbatim, keyed by project path.
    pub public_assets: BTreeMap<String, String>,
}

/// What a pass hands back to the caller: output or a sanitized error, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResult {
    pub js: String,
    pub css: String,
    pub public_assets: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl BundleResult {
    pub fn success(output: BundleOutput) -> Self {
        Self {
            js: output.js,
            css: output.css,
            public_assets: output.public_assets,
            error: None,
        }
    }

    pub fn failure(error: ErrorRecord) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Builds preview bundles with an ordered set of dialect plugins.
///
/// ```
/// use ply_bundler::{Bundler, BundlerConfig, ScriptPlugin};
/// use ply_vfs::VirtualFileStore;
///
/// let mut store = VirtualFileStore::new();
/// let _ = store.create_file("package.json", r#"{ "main": "index.js" }"#).unwrap();
/// let _ = store.create_file("index.js", "export const answer = 42;").unwrap();
///
/// let bundler = Bundler::new(BundlerConfig::default()).plugin(ScriptPlugin::new());
/// let result = bundler.bundle(&store.flatten());
/// assert!(result.error.is_none());
/// assert!(result.js.contains("answer"));
/// ```
#[derive(Debug, Clone)]
pub struct Bundler {
    registry: PluginRegistry,
    config: BundlerConfig,
    external: ExternalResolver,
}

impl Bundler {
    pub fn new(config: BundlerConfig) -> Self {
        Self {
            registry: PluginRegistry::new(),
            external: ExternalResolver::new(config.cdn_base_url.clone()),
            config,
        }
    }

    /// Appends a plugin; earlier plugins get the first chance to claim.
    pub fn plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.registry.add(plugin);
        self
    }

    pub fn shared_plugin(mut self, plugin: SharedPlugin) -> Self {
        self.registry.add_shared(plugin);
        self
    }

    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BundlerConfig {
        &self.config
    }

    /// Runs a pass and sanitizes any failure, panics included.
    ///
    /// Panics are caught with `catch_unwind`, which needs an unwinding target.
    /// Where panics abort (`wasm32-unknown-unknown`) the pass cannot return;
    /// `ply-worker` records the sanitized panic through a panic hook instead.
    pub fn bundle(&self, files: &FlatFiles) -> BundleResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_bundle(files)));
        match outcome {
            Ok(Ok(output)) => BundleResult::success(output),
            Ok(Err(error)) => BundleResult::failure(sanitize(&error, &self.entry_hint(files))),
            Err(payload) => {
                warn!("plugin panicked during bundling");
                BundleResult::failure(sanitize_panic(payload.as_ref(), &self.entry_hint(files)))
            }
        }
    }

    /// Runs a pass and returns the first failure unsanitized.
    pub fn try_bundle(&self, files: &FlatFiles) -> Result<BundleOutput> {
        let mut pass = Pass::default();
        let result = self.run(files, &mut pass);
        match &result {
            Ok(output) => {
                pass.advance(PassState::Success);
                info!(
                    js_bytes = output.js.len(),
                    css_bytes = output.css.len(),
                    public = output.public_assets.len(),
                    "bundle complete"
                );
            }
            Err(error) => {
                pass.advance(PassState::Failed);
                warn!(error = %error, kind = error.name(), "bundle failed");
            }
        }
        result
    }

    fn run(&self, files: &FlatFiles, pass: &mut Pass) -> Result<BundleOutput> {
        pass.advance(PassState::ReadingManifest);
        let descriptor_file = self.config.descriptor_file.as_str();
        let Some(leaf) = files.get(descriptor_file) else {
            debug!(descriptor = descriptor_file, "no descriptor, serving a static preview");
            return Ok(BundleOutput {
                public_assets: self.static_assets(files),
                ..BundleOutput::default()
            });
        };

        let descriptor = PackageDescriptor::parse(descriptor_file, &leaf.content).map_err(|e| {
            BundleError::Generic {
                message: e.to_string(),
                id: Some(descriptor_file.to_string()),
                pos: None,
            }
        })?;
        let entry = descriptor
            .entry_point()
            .ok_or_else(|| BundleError::EntryPointMissing {
                descriptor: descriptor_file.to_string(),
            })?;
        if !files.contains_key(entry) {
            return Err(BundleError::EntryPointNotFound {
                entry: entry.to_string(),
                descriptor: descriptor_file.to_string(),
            });
        }
        pass.advance(PassState::Resolved(entry.to_string()));

        let manifest = descriptor.manifest();
        let ctx = PluginContext::new(files, &manifest, &self.external, &self.config);

        pass.advance(PassState::GraphBuilding);
        let graph = self.build_graph(&ctx, entry)?;

        pass.advance(PassState::Generating);
        let js = emit_bundle(&graph)?;
        let css = self.collect_stylesheets(&ctx)?;

        Ok(BundleOutput {
            js,
            css,
            public_assets: self.public_assets(files),
        })
    }

    /// Breadth-first walk from the entry point. The first diagnostic aborts.
    fn build_graph(&self, ctx: &PluginContext<'_>, entry: &str) -> Result<ModuleGraph> {
        let (owner, entry) = match self.registry.resolve_id(ctx, entry, "")? {
            Some((owner, ResolvedId::Local(path))) => (owner, path),
            _ => {
                return Err(BundleError::Generic {
                    message: format!("No plugin handles the entry point '{entry}'"),
                    id: Some(entry.to_string()),
                    pos: None,
                });
            }
        };

        let mut graph = ModuleGraph::new(entry.clone());
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        visited.insert(entry.clone());
        queue.push_back((owner, entry));

        while let Some((owner, id)) = queue.pop_front() {
            if graph.len() >= self.config.max_modules {
                return Err(BundleError::generic(format!(
                    "The project imports more than {} modules",
                    self.config.max_modules
                )));
            }

            let (node, dependencies) = self.process_module(ctx, owner, id)?;
            for (owner, path) in dependencies {
                if visited.insert(path.clone()) {
                    queue.push_back((owner, path));
                }
            }
            graph.insert(node);
        }

        debug!(
            modules = graph.len(),
            externals = graph.externals().count(),
            "module graph built"
        );
        Ok(graph)
    }

    /// Load, transform and analyze one module, then resolve its imports.
    ///
    /// Returns the node and its local dependencies with their owning plugin.
    fn process_module(
        &self,
        ctx: &PluginContext<'_>,
        owner: usize,
        id: ModulePath,
    ) -> Result<(ModuleGraphNode, Vec<(usize, ModulePath)>)> {
        let plugin = self
            .registry
            .get(owner)
            .ok_or_else(|| BundleError::generic(format!("No plugin at index {owner}")))?;

        let loaded = plugin.load(ctx, &id)?;
        let code = plugin.transform(ctx, loaded, &id)?;
        let record = ModuleRecord::analyze(&code, id.as_str())?;

        let mut edges = IndexMap::new();
        let mut dependencies = Vec::new();
        for specifier in record.requests() {
            match self.registry.resolve_id(ctx, specifier, id.as_str())? {
                Some((dep_owner, resolved)) => {
                    if let ResolvedId::Local(path) = &resolved {
                        dependencies.push((dep_owner, path.clone()));
                    }
                    edges.insert(specifier.clone(), resolved);
                }
                None => return Err(self.diagnose_unclaimed(ctx, specifier, id.as_str())),
            }
        }

        debug!(id = %id, plugin = %plugin.name(), imports = edges.len(), "module processed");
        let node = ModuleGraphNode {
            id,
            owner,
            code,
            record,
            edges,
        };
        Ok((node, dependencies))
    }

    /// Explains why no plugin claimed `specifier`.
    fn diagnose_unclaimed(&self, ctx: &PluginContext<'_>, specifier: &str, importer: &str) -> BundleError {
        if !resolver::is_relative(specifier) && !ctx.files().contains_key(specifier) {
            return BundleError::Dependency {
                specifier: specifier.to_string(),
                importer: importer.to_string(),
                descriptor: self.config.descriptor_file.clone(),
            };
        }

        match ctx.resolve_local(specifier, importer) {
            Err(error) => error.into(),
            Ok(None) => BundleError::FileNotFound {
                importee: specifier.to_string(),
                importer: importer.to_string(),
                reason: "no such file in the project".to_string(),
            },
            Ok(Some(path)) if path.is_under(&self.config.public_prefix) => BundleError::Generic {
                message: format!("'{path}' is a public asset and cannot be imported"),
                id: Some(importer.to_string()),
                pos: None,
            },
            Ok(Some(path)) => BundleError::Generic {
                message: format!("No plugin handles '{path}'{NON_JS_IMPORT_NOTE}"),
                id: Some(importer.to_string()),
                pos: None,
            },
        }
    }

    fn collect_stylesheets(&self, ctx: &PluginContext<'_>) -> Result<String> {
        let mut sheets = Vec::new();
        for plugin in self.registry.iter() {
            if let Some(css) = plugin.generate_bundle(ctx)? {
                if !css.is_empty() {
                    sheets.push(css);
                }
            }
        }
        Ok(sheets.join("\n"))
    }

    fn public_assets(&self, files: &FlatFiles) -> BTreeMap<String, String> {
        files
            .iter()
            .filter(|(path, _)| path.is_under(&self.config.public_prefix))
            .map(|(path, leaf)| (path.to_string(), leaf.content.clone()))
            .collect()
    }

    /// Public files plus root-level HTML, for projects without a descriptor.
    fn static_assets(&self, files: &FlatFiles) -> BTreeMap<String, String> {
        files
            .iter()
            .filter(|(path, _)| {
                path.is_under(&self.config.public_prefix)
                    || (path.parent().is_none() && path.extension() == Some("html"))
            })
            .map(|(path, leaf)| (path.to_string(), leaf.content.clone()))
            .collect()
    }

    /// Best-effort entry point used to locate errors that carry no file.
    pub fn entry_hint(&self, files: &FlatFiles) -> String {
        files
            .get(self.config.descriptor_file.as_str())
            .and_then(|leaf| PackageDescriptor::parse(&self.config.descriptor_file, &leaf.content).ok())
            .and_then(|descriptor| descriptor.entry_point().map(str::to_string))
            .unwrap_or_default()
    }
}

/// State tracker for one pass.
#[derive(Debug, Default)]
struct Pass {
    state: PassState,
}

impl Pass {
    fn advance(&mut self, next: PassState) {
        debug!(from = %self.state, to = %next, "pass state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use ply_vfs::FileLeaf;

    use super::*;
    use crate::plugins::ScriptPlugin;

    fn files(entries: &[(&str, &str)]) -> FlatFiles {
        entries
            .iter()
            .map(|(path, content)| (ModulePath::from(*path), FileLeaf::new(*content)))
            .collect()
    }

    fn bundler() -> Bundler {
        Bundler::new(BundlerConfig::default()).plugin(ScriptPlugin::new())
    }

    struct Panicking;

    impl Plugin for Panicking {
        fn name(&self) -> std::borrow::Cow<'static, str> {
            "panicking".into()
        }

        fn resolve_id(&self, _ctx: &PluginContext<'_>, _importee: &str, _importer: &str) -> Result<Option<ResolvedId>> {
            panic!("resolver exploded");
        }
    }

    #[test]
    fn test_pass_state_display() {
        assert_eq!(PassState::Resolved("src/index.js".into()).to_string(), "resolved(src/index.js)");
        assert!(PassState::Failed.is_terminal());
        assert!(!PassState::GraphBuilding.is_terminal());
        assert_eq!(PassState::default(), PassState::Idle);
    }

    #[test]
    fn test_invalid_descriptor_is_generic_error_naming_descriptor() {
        let err = bundler()
            .try_bundle(&files(&[("package.json", "{ main: nope")]))
            .unwrap_err();
        assert_eq!(err.name(), "GenericBundleError");
        assert_eq!(err.location(), Some("package.json"));
    }

    #[test]
    fn test_entry_point_with_dot_slash() {
        let result = bundler().bundle(&files(&[
            ("package.json", r#"{ "main": "./index.js" }"#),
            ("index.js", "console.log('hi');"),
        ]));
        assert!(result.is_success(), "{:?}", result.error);
    }

    #[test]
    fn test_empty_main_is_missing_entry_point() {
        let err = bundler()
            .try_bundle(&files(&[("package.json", r#"{ "main": "" }"#), ("index.js", "")]))
            .unwrap_err();
        assert_eq!(err.name(), "EntryPointMissingError");
        assert_eq!(err.location(), Some("package.json"));
    }

    #[test]
    fn test_dependency_error_names_configured_descriptor() {
        let config = BundlerConfig {
            descriptor_file: "project.json".to_string(),
            ..BundlerConfig::default()
        };
        let err = Bundler::new(config)
            .plugin(ScriptPlugin::new())
            .try_bundle(&files(&[
                ("project.json", r#"{ "main": "index.js" }"#),
                ("index.js", "import pad from 'left-pad';"),
            ]))
            .unwrap_err();
        assert_eq!(err.name(), "DependencyError");
        assert!(err.message().ends_with("dependencies of project.json"), "{}", err.message());
    }

    #[test]
    fn test_unknown_file_type_is_generic_error_at_importer() {
        let result = bundler().bundle(&files(&[
            ("package.json", r#"{ "main": "index.js" }"#),
            ("index.js", "import notes from './notes.txt';"),
            ("notes.txt", "hello"),
        ]));
        let error = result.error.unwrap();
        assert_eq!(error.name, "GenericBundleError");
        assert_eq!(error.source_path, "index.js");
        assert!(error.message.contains("notes.txt"));
        assert!(!error.message.contains("Note that"));
    }

    #[test]
    fn test_public_files_cannot_be_imported() {
        let result = bundler().bundle(&files(&[
            ("package.json", r#"{ "main": "index.js" }"#),
            ("index.js", "import './public/data.js';"),
            ("public/data.js", "export default 1;"),
        ]));
        let error = result.error.unwrap();
        assert!(error.message.contains("public asset"));
    }

    #[test]
    fn test_module_limit() {
        let config = BundlerConfig {
            max_modules: 1,
            ..BundlerConfig::default()
        };
        let err = Bundler::new(config)
            .plugin(ScriptPlugin::new())
            .try_bundle(&files(&[
                ("package.json", r#"{ "main": "a.js" }"#),
                ("a.js", "import './b.js';"),
                ("b.js", ""),
            ]))
            .unwrap_err();
        assert!(err.message().contains("more than 1 modules"));
    }

    #[test]
    fn test_panic_is_sanitized() {
        let result = Bundler::new(BundlerConfig::default()).plugin(Panicking).bundle(&files(&[
            ("package.json", r#"{ "main": "index.js" }"#),
            ("index.js", ""),
        ]));
        let error = result.error.unwrap();
        assert_eq!(error.name, "GenericBundleError");
        assert_eq!(error.message, "resolver exploded");
        assert_eq!(error.source_path, "index.js");
        assert!(result.js.is_empty());
    }

    #[test]
    fn test_cycles_are_visited_once() {
        let output = bundler()
            .try_bundle(&files(&[
                ("package.json", r#"{ "main": "a.js" }"#),
                ("a.js", "import { b } from './b.js'; export const a = 1;"),
                ("b.js", "import { a } from './a.js'; export const b = 2;"),
            ]))
            .unwrap();
        assert_eq!(output.js.matches("\"a.js\": function").count(), 1);
        assert_eq!(output.js.matches("\"b.js\": function").count(), 1);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let json = serde_json::to_value(BundleResult::default()).unwrap();
        assert!(json.get("publicAssets").is_some());
        assert!(json.get("error").is_none());
    }
}
