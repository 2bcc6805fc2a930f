//! Dialect plugins.
//!
//! A plugin owns one source dialect. During a pass the bundler asks the
//! registry to resolve every specifier; the first plugin that claims it also
//! loads and transforms it.
//!
//! ```text
//! specifier --resolve_id (in registry order)--> ResolvedId
//!                                                 |
//!                       owner.load --> owner.transform --> module code
//! ```

mod registry;
mod script;

pub use registry::PluginRegistry;
pub use script::{SCRIPT_EXTENSIONS, ScriptPlugin};

use std::borrow::Cow;
use std::cell::RefCell;
use std::sync::Arc;

use ply_vfs::{FlatFiles, ModulePath};

use crate::config::BundlerConfig;
use crate::descriptor::DependencyManifest;
use crate::error::{BundleError, Result};
use crate::external::{ExternalRef, ExternalResolver};
use crate::resolver::{self, ResolveError};

/// Shared plugin handle, the form the registry stores.
pub type SharedPlugin = Arc<dyn Plugin>;

/// What a plugin resolved a specifier to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedId {
    /// A project file, bundled.
    Local(ModulePath),
    /// A CDN module, imported at runtime.
    External(ExternalRef),
}

impl ResolvedId {
    /// Graph key: the module path or the CDN URL.
    pub fn key(&self) -> &str {
        match self {
            ResolvedId::Local(path) => path.as_str(),
            ResolvedId::External(external) => &external.url,
        }
    }
}

/// A dialect plugin.
///
/// Hooks run synchronously and in sequence within a pass. A returned error
/// aborts the pass.
pub trait Plugin: Send + Sync {
    fn name(&self) -> Cow<'static, str>;

    /// Claims `importee` or returns `None` to let the next plugin try.
    fn resolve_id(
        &self,
        ctx: &PluginContext<'_>,
        importee: &str,
        importer: &str,
    ) -> Result<Option<ResolvedId>>;

    /// Raw source of a module this plugin resolved. Defaults to the file content.
    fn load(&self, ctx: &PluginContext<'_>, id: &ModulePath) -> Result<String> {
        ctx.source(id.as_str()).map(str::to_string).ok_or_else(|| {
            BundleError::compile(id.as_str(), "File disappeared during the build", None)
        })
    }

    /// Turns loaded source into JavaScript. Defaults to the identity.
    fn transform(&self, _ctx: &PluginContext<'_>, code: String, _id: &ModulePath) -> Result<String> {
        Ok(code)
    }

    /// Stylesheet text this plugin contributes to the bundle.
    fn generate_bundle(&self, _ctx: &PluginContext<'_>) -> Result<Option<String>> {
        Ok(None)
    }
}

/// A stylesheet recorded during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedStylesheet {
    pub plugin: String,
    pub id: String,
    pub css: String,
}

/// Per-pass state shared with plugin hooks.
///
/// Everything is read-only apart from the stylesheet sink, which only grows.
pub struct PluginContext<'a> {
    files: &'a FlatFiles,
    manifest: &'a DependencyManifest,
    external: &'a ExternalResolver,
    config: &'a BundlerConfig,
    stylesheets: RefCell<Vec<EmittedStylesheet>>,
}

impl<'a> PluginContext<'a> {
    pub fn new(
        files: &'a FlatFiles,
        manifest: &'a DependencyManifest,
        external: &'a ExternalResolver,
        config: &'a BundlerConfig,
    ) -> Self {
        Self {
            files,
            manifest,
            external,
            config,
            stylesheets: RefCell::new(Vec::new()),
        }
    }

    pub fn files(&self) -> &'a FlatFiles {
        self.files
    }

    pub fn manifest(&self) -> &'a DependencyManifest {
        self.manifest
    }

    pub fn config(&self) -> &'a BundlerConfig {
        self.config
    }

    pub fn source(&self, id: &str) -> Option<&'a str> {
        self.files.get(id).map(|leaf| leaf.content.as_str())
    }

    /// Runs the path resolver with the configured options.
    pub fn resolve_local(&self, importee: &str, importer: &str) -> std::result::Result<Option<ModulePath>, ResolveError> {
        resolver::resolve_with(importee, importer, self.files, self.config.resolve_options())
    }

    /// Local resolution restricted to files with one of `extensions`.
    ///
    /// Resolver failures count as "not mine": the bundler re-diagnoses
    /// specifiers that no plugin claims.
    pub fn claim_local(&self, importee: &str, importer: &str, extensions: &[&str]) -> Option<ModulePath> {
        let path = self.resolve_local(importee, importer).ok().flatten()?;
        if path.is_under(&self.config.public_prefix) {
            return None;
        }
        let extension = path.extension()?;
        extensions.contains(&extension).then_some(path)
    }

    pub fn resolve_external(&self, specifier: &str) -> Option<ExternalRef> {
        self.external.resolve(specifier, self.manifest)
    }

    /// Records a stylesheet for the bundle's CSS output.
    pub fn emit_stylesheet(&self, plugin: &str, id: &str, css: impl Into<String>) {
        self.stylesheets.borrow_mut().push(EmittedStylesheet {
            plugin: plugin.to_string(),
            id: id.to_string(),
            css: css.into(),
        });
    }

    /// Stylesheets emitted by `plugin`, in emission order.
    pub fn stylesheets_from(&self, plugin: &str) -> Vec<EmittedStylesheet> {
        self.stylesheets
            .borrow()
            .iter()
            .filter(|sheet| sheet.plugin == plugin)
            .cloned()
            .collect()
    }
}
