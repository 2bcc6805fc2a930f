//! Stylesheet dialect for the ply bundler
//!
//! Claims `.css` files, minifies them with lightningcss and turns each into a
//! module whose default export is the processed text. The stylesheets loaded
//! during a pass are concatenated, in load order, into the bundle's `css`
//! output.
//!
//! ```text
//! .css file -> load() -> lightningcss parse -> minify -> print -> export default "<css>"
//!                                                          \
//!                                                           +-> stylesheet sink -> generate_bundle()
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use ply_bundler::{Bundler, BundlerConfig, ScriptPlugin};
//! use ply_plugin_css::{CssPlugin, CssPluginOptions};
//!
//! let bundler = Bundler::new(BundlerConfig::default())
//!     .plugin(CssPlugin::with_options(CssPluginOptions::new().exclude("vendor/")))
//!     .plugin(ScriptPlugin::new());
//! assert_eq!(bundler.registry().names(), ["css", "script"]);
//! ```

use std::borrow::Cow;

use anyhow::anyhow;
use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
};
use ply_bundler::{BundleError, Plugin, PluginContext, ResolvedId, Result, line_col_to_offset};
use ply_vfs::ModulePath;

mod config;
pub use config::CssPluginOptions;

/// Name the plugin registers and emits stylesheets under.
pub const PLUGIN_NAME: &str = "css";

/// Plugin that processes stylesheets with lightningcss
///
/// Claims relative `.css` imports that resolve to project files, loads them
/// from the snapshot and emits each as a module exporting the processed text.
/// The same text goes to the pass's stylesheet sink, so importing a
/// stylesheet for its side effect is enough to style the preview.
///
/// # Architecture
///
/// ```text
/// resolve_id(./a.css) -> load() -> process_css() -> export default "<css>"
///                                        \
///                                         +-> emit_stylesheet("css") -> generate_bundle()
/// ```
#[derive(Debug, Clone, Default)]
pub struct CssPlugin {
    /// Configuration options for stylesheet processing
    options: CssPluginOptions,
}

impl CssPlugin {
    /// Create a new CssPlugin with default options (minify, claim all `.css`)
    ///
    /// # Example
    ///
    /// ```rust
    /// use ply_plugin_css::CssPlugin;
    ///
    /// let plugin = CssPlugin::new();
    /// assert!(plugin.options().minify);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new CssPlugin with custom options
    ///
    /// # Example
    ///
    /// ```rust
    /// use ply_plugin_css::{CssPlugin, CssPluginOptions};
    ///
    /// let options = CssPluginOptions::new()
    ///     .with_minify(false)
    ///     .exclude("vendor/");
    ///
    /// let plugin = CssPlugin::with_options(options);
    /// assert!(!plugin.options().minify);
    /// ```
    pub fn with_options(options: CssPluginOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CssPluginOptions {
        &self.options
    }

    /// Process one stylesheet through lightningcss
    ///
    /// # Arguments
    ///
    /// * `id` - Project path of the stylesheet, used in errors
    /// * `source` - Stylesheet source text
    ///
    /// # Returns
    ///
    /// The printed stylesheet, minified when the options ask for it. Parse
    /// errors become a `CompileError` whose position is a byte offset into
    /// `source`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ply_plugin_css::CssPlugin;
    ///
    /// let css = CssPlugin::new().process_css("a.css", "h1 {\n  color: #ff0000;\n}").unwrap();
    /// assert_eq!(css, "h1{color:red}");
    /// ```
    pub fn process_css(&self, id: &str, source: &str) -> Result<String> {
        let mut stylesheet = StyleSheet::parse(
            source,
            ParserOptions {
                filename: id.to_string(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| {
            let pos = e
                .loc
                .as_ref()
                .and_then(|loc| line_col_to_offset(source, loc.line, loc.column));
            BundleError::compile(id, e.kind.to_string(), pos)
        })?;

        self.print(&mut stylesheet)
            .map_err(|e| BundleError::compile(id, format!("{e:#}"), None))
    }

    fn print(&self, stylesheet: &mut StyleSheet<'_>) -> anyhow::Result<String> {
        if self.options.minify {
            stylesheet
                .minify(MinifyOptions::default())
                .map_err(|e| anyhow!("Failed to minify stylesheet: {}", e.kind))?;
        }
        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: self.options.minify,
                ..PrinterOptions::default()
            })
            .map_err(|e| anyhow!("Failed to print stylesheet: {}", e.kind))?;
        Ok(printed.code)
    }
}

impl Plugin for CssPlugin {
    fn name(&self) -> Cow<'static, str> {
        PLUGIN_NAME.into()
    }

    /// Claims `.css` imports that resolve to a project file and pass the
    /// include/exclude filters.
    fn resolve_id(
        &self,
        ctx: &PluginContext<'_>,
        importee: &str,
        importer: &str,
    ) -> Result<Option<ResolvedId>> {
        Ok(ctx
            .claim_local(importee, importer, &["css"])
            .filter(|path| self.options.matches(path.as_str()))
            .map(ResolvedId::Local))
    }

    /// Load hook - reads a claimed stylesheet and processes it
    ///
    /// 1. Reads the stylesheet from the snapshot
    /// 2. Processes it with [`process_css`](CssPlugin::process_css)
    /// 3. Sends the result to the stylesheet sink
    /// 4. Returns a module whose default export is the processed text
    ///
    /// # Returns
    ///
    /// - `Ok(module)` - Module code for the stylesheet
    /// - `Err(CompileError)` - The stylesheet does not parse
    fn load(&self, ctx: &PluginContext<'_>, id: &ModulePath) -> Result<String> {
        let source = ctx
            .source(id.as_str())
            .ok_or_else(|| BundleError::compile(id.as_str(), "File disappeared during the build", None))?;

        let css = self.process_css(id.as_str(), source)?;
        tracing::debug!(
            id = %id,
            source_bytes = source.len(),
            css_bytes = css.len(),
            minify = self.options.minify,
            "processed stylesheet"
        );

        let module = format!("export default {};\n", serde_json::Value::from(css.as_str()));
        ctx.emit_stylesheet(PLUGIN_NAME, id.as_str(), css);
        Ok(module)
    }

    /// Joins the pass's stylesheets in load order, one per line.
    fn generate_bundle(&self, ctx: &PluginContext<'_>) -> Result<Option<String>> {
        let sheets = ctx.stylesheets_from(PLUGIN_NAME);
        if sheets.is_empty() {
            return Ok(None);
        }
        let css: Vec<String> = sheets.into_iter().map(|sheet| sheet.css).collect();
        Ok(Some(css.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use ply_bundler::{BundlerConfig, DependencyManifest, ExternalResolver};
    use ply_vfs::{FileLeaf, FlatFiles};

    use super::*;

    fn with_ctx(files: &[(&str, &str)], f: impl FnOnce(&PluginContext<'_>)) {
        let files: FlatFiles = files
            .iter()
            .map(|(path, content)| (ModulePath::from(*path), FileLeaf::new(*content)))
            .collect();
        let manifest = DependencyManifest::default();
        let external = ExternalResolver::new("https://esm.sh");
        let config = BundlerConfig::default();
        f(&PluginContext::new(&files, &manifest, &external, &config));
    }

    #[test]
    fn test_plugin_name() {
        assert_eq!(CssPlugin::new().name(), "css");
    }

    #[test]
    fn test_process_with_minification() {
        let css = "body {\n  color: #ff0000;\n  margin: 0px;\n}\n";
        let out = CssPlugin::new().process_css("a.css", css).unwrap();
        assert_eq!(out, "body{color:red;margin:0}");
    }

    #[test]
    fn test_process_without_minification() {
        let plugin = CssPlugin::with_options(CssPluginOptions::new().with_minify(false));
        let out = plugin.process_css("a.css", "body{color:red}").unwrap();
        assert!(out.contains("body {"));
        assert!(out.contains("color: red"));
    }

    #[test]
    fn test_parse_error_has_offset() {
        let source = "h1 {}\n.a..b { color: red; }\n";
        let err = CssPlugin::new().process_css("src/a.css", source).unwrap_err();
        assert_eq!(err.name(), "CompileError");
        assert_eq!(err.location(), Some("src/a.css"));
        let pos = err.position().unwrap();
        assert!(pos >= 6, "offset {pos} should be on the second line");
    }

    #[test]
    fn test_resolve_only_matching_stylesheets() {
        let plugin = CssPlugin::with_options(CssPluginOptions::new().exclude("vendor/"));
        with_ctx(
            &[("src/index.js", ""), ("src/a.css", ""), ("src/vendor/b.css", "")],
            |ctx| {
                assert_eq!(
                    plugin.resolve_id(ctx, "./a.css", "src/index.js").unwrap(),
                    Some(ResolvedId::Local("src/a.css".into()))
                );
                assert_eq!(plugin.resolve_id(ctx, "./vendor/b.css", "src/index.js").unwrap(), None);
                assert_eq!(plugin.resolve_id(ctx, "./index.js", "src/index.js").unwrap(), None);
                assert_eq!(plugin.resolve_id(ctx, "react", "src/index.js").unwrap(), None);
            },
        );
    }

    #[test]
    fn test_load_emits_module_and_stylesheet() {
        with_ctx(&[("a.css", "a { margin: 0px }"), ("b.css", "b { padding: 0px }")], |ctx| {
            let plugin = CssPlugin::new();
            assert_eq!(plugin.generate_bundle(ctx).unwrap(), None);

            let module = plugin.load(ctx, &"a.css".into()).unwrap();
            assert_eq!(module, "export default \"a{margin:0}\";\n");
            plugin.load(ctx, &"b.css".into()).unwrap();

            assert_eq!(
                plugin.generate_bundle(ctx).unwrap().as_deref(),
                Some("a{margin:0}\nb{padding:0}")
            );
        });
    }
}
