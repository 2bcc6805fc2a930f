//! Component dialect for the ply bundler
//!
//! Claims `.svelte` files and turns each into a JavaScript module through a
//! [`ComponentCompiler`]. Component styles go to the bundle's stylesheet; the
//! compiled script then runs through the same TypeScript/JSX transform as the
//! script dialect.
//!
//! ## Architecture
//!
//! ```text
//! .svelte file -> transform() -> ComponentCompiler -> script transform -> JavaScript
//!                                        \
//!                                         +-> <style> -> stylesheet sink -> generate_bundle()
//! ```
//!
//! ## Handling Multiple Scripts
//!
//! A component can have a `<script context="module">` block (runs once per
//! import) and an instance `<script>` block. The built-in
//! [`TemplateFallbackCompiler`] emits the module block first. If either block
//! is `lang="ts"` the whole component is treated as TypeScript.
//!
//! ## Compilers
//!
//! [`TemplateFallbackCompiler`] does not compile markup; it exports it as a
//! `template` string. Runnable components need a real compiler supplied with
//! [`SveltePlugin::with_compiler`]. In the browser, `ply-worker` wires the
//! host page's Svelte `compile` function in that way.
//!
//! ## Example Usage
//!
//! ```rust
//! use ply_bundler::{Bundler, BundlerConfig, ScriptPlugin};
//! use ply_plugin_svelte::SveltePlugin;
//! use ply_vfs::VirtualFileStore;
//!
//! let mut store = VirtualFileStore::new();
//! let _ = store.create_file("package.json", r#"{ "main": "main.js" }"#).unwrap();
//! let _ = store.create_file("main.js", "import App from './App.svelte';\nconsole.log(App.template);").unwrap();
//! let _ = store.create_file("App.svelte", "<script>let name = 'world';</script>\n<h1>Hello {name}!</h1>").unwrap();
//!
//! let result = Bundler::new(BundlerConfig::default())
//!     .plugin(SveltePlugin::new())
//!     .plugin(ScriptPlugin::new())
//!     .bundle(&store.flatten());
//! assert!(result.error.is_none());
//! assert!(result.js.contains("Hello {name}!"));
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use ply_bundler::{BundleError, JsxPragma, Plugin, PluginContext, ResolvedId, Result, ScriptKind, transform_script};
use ply_vfs::ModulePath;

pub mod compiler;
pub mod extractor;

pub use compiler::{CompileFailure, CompiledComponent, ComponentCompiler, TemplateFallbackCompiler, ScriptSpan};
pub use extractor::{ExtractorError, MAX_BLOCKS, MAX_FILE_SIZE};

/// Name the plugin registers and emits stylesheets under.
pub const PLUGIN_NAME: &str = "svelte";

/// Svelte component plugin.
///
/// Claims `.svelte` files in `resolve_id` and compiles them in `transform`.
/// Loading is left to the script plugin's snapshot reader.
///
/// # Architecture
///
/// ```text
/// resolve_id(./App.svelte) -> transform() -> compiler.compile() -> transform_script() -> JS
///                                                  \
///                                                   +-> css -> emit_stylesheet("svelte")
/// ```
///
/// # Security
///
/// The built-in compiler enforces limits on untrusted input:
/// - Max file size: 10MB
/// - Max `<script>`/`<style>` blocks: 100
/// - Uses memchr (not regex) for tag scanning
#[derive(Clone)]
pub struct SveltePlugin {
    compiler: Arc<dyn ComponentCompiler>,
}

impl SveltePlugin {
    /// Plugin backed by [`TemplateFallbackCompiler`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use ply_plugin_svelte::SveltePlugin;
    ///
    /// let plugin = SveltePlugin::new();
    /// ```
    pub fn new() -> Self {
        Self::with_compiler(TemplateFallbackCompiler)
    }

    /// Plugin backed by a custom compiler, typically one that calls the real
    /// Svelte compiler.
    ///
    /// # Arguments
    ///
    /// * `compiler` - Called synchronously for every component in a pass
    ///
    /// # Example
    ///
    /// ```rust
    /// use ply_plugin_svelte::{CompileFailure, CompiledComponent, ComponentCompiler, SveltePlugin};
    ///
    /// struct Static;
    ///
    /// impl ComponentCompiler for Static {
    ///     fn compile(&self, _id: &str, _source: &str) -> Result<CompiledComponent, CompileFailure> {
    ///         Ok(CompiledComponent {
    ///             js: "export default class Component {}".to_string(),
    ///             ..CompiledComponent::default()
    ///         })
    ///     }
    /// }
    ///
    /// let plugin = SveltePlugin::with_compiler(Static);
    /// ```
    pub fn with_compiler<C: ComponentCompiler + 'static>(compiler: C) -> Self {
        Self {
            compiler: Arc::new(compiler),
        }
    }
}

impl Default for SveltePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SveltePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SveltePlugin").finish_non_exhaustive()
    }
}

impl Plugin for SveltePlugin {
    fn name(&self) -> Cow<'static, str> {
        PLUGIN_NAME.into()
    }

    fn resolve_id(
        &self,
        ctx: &PluginContext<'_>,
        importee: &str,
        importer: &str,
    ) -> Result<Option<ResolvedId>> {
        Ok(ctx
            .claim_local(importee, importer, &["svelte"])
            .map(ResolvedId::Local))
    }

    /// Transform hook - compiles a component into a script module
    ///
    /// 1. Runs the component compiler over `code`
    /// 2. Sends the component's styles to the stylesheet sink
    /// 3. Strips TypeScript and JSX from the compiled script
    ///
    /// # Returns
    ///
    /// - `Ok(js)` - Executable module code
    /// - `Err(CompileError)` - Compiler or script failure, positioned in the
    ///   component source when the position maps back
    fn transform(&self, ctx: &PluginContext<'_>, code: String, id: &ModulePath) -> Result<String> {
        let compiled = self
            .compiler
            .compile(id.as_str(), &code)
            .map_err(|failure| BundleError::compile(id.as_str(), failure.message, failure.pos))?;

        if let Some(css) = &compiled.css {
            ctx.emit_stylesheet(PLUGIN_NAME, id.as_str(), css.clone());
        }

        let kind = if compiled.typescript {
            ScriptKind::Ts
        } else {
            ScriptKind::Js
        };
        let config = ctx.config();
        let pragma = JsxPragma {
            factory: config.jsx_pragma.clone(),
            fragment: config.jsx_pragma_frag.clone(),
        };

        transform_script(&compiled.js, id.as_str(), kind, &pragma).map_err(|error| match error {
            BundleError::Compile { id, message, pos } => {
                let pos = pos.and_then(|pos| compiled.source_position(pos));
                BundleError::Compile { id, message, pos }
            }
            other => other,
        })
    }

    /// Joins component styles in load order, or `None` when no component
    /// had any.
    fn generate_bundle(&self, ctx: &PluginContext<'_>) -> Result<Option<String>> {
        let sheets = ctx.stylesheets_from(PLUGIN_NAME);
        if sheets.is_empty() {
            return Ok(None);
        }
        let css: Vec<String> = sheets.into_iter().map(|sheet| sheet.css).collect();
        Ok(Some(css.join("\n")))
    }
}
