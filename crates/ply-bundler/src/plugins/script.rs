use std::borrow::Cow;

use ply_vfs::ModulePath;

use super::{Plugin, PluginContext, ResolvedId};
use crate::diagnostics::line_col_to_offset;
use crate::error::{BundleError, Result};
use crate::resolver::is_relative;
use crate::transform::{JsxPragma, ScriptKind, transform_script};

/// Extensions owned by the script dialect.
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "json"];

/// JavaScript, TypeScript and JSX, plus CDN dependencies and JSON data files.
///
/// Register it last: it claims every bare specifier listed in the manifest.
#[derive(Debug, Clone, Default)]
pub struct ScriptPlugin;

impl ScriptPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for ScriptPlugin {
    fn name(&self) -> Cow<'static, str> {
        "script".into()
    }

    fn resolve_id(
        &self,
        ctx: &PluginContext<'_>,
        importee: &str,
        importer: &str,
    ) -> Result<Option<ResolvedId>> {
        if let Some(path) = ctx.claim_local(importee, importer, SCRIPT_EXTENSIONS) {
            return Ok(Some(ResolvedId::Local(path)));
        }
        if is_relative(importee) || ctx.files().contains_key(importee) {
            return Ok(None);
        }
        Ok(ctx.resolve_external(importee).map(ResolvedId::External))
    }

    fn load(&self, ctx: &PluginContext<'_>, id: &ModulePath) -> Result<String> {
        let source = ctx
            .source(id.as_str())
            .ok_or_else(|| BundleError::compile(id.as_str(), "File disappeared during the build", None))?;

        if id.extension() != Some("json") {
            return Ok(source.to_string());
        }

        // JSON is valid JS expression syntax once it parses as JSON.
        serde_json::from_str::<serde_json::Value>(source).map_err(|e| {
            let line = u32::try_from(e.line().saturating_sub(1)).unwrap_or(0);
            let column = u32::try_from(e.column()).unwrap_or(0);
            BundleError::compile(id.as_str(), format!("Invalid JSON: {e}"), line_col_to_offset(source, line, column))
        })?;
        Ok(format!("export default {};\n", source.trim()))
    }

    fn transform(&self, ctx: &PluginContext<'_>, code: String, id: &ModulePath) -> Result<String> {
        let Some(kind) = id.extension().and_then(ScriptKind::from_extension) else {
            return Ok(code);
        };
        let config = ctx.config();
        let pragma = JsxPragma {
            factory: config.jsx_pragma.clone(),
            fragment: config.jsx_pragma_frag.clone(),
        };
        transform_script(&code, id.as_str(), kind, &pragma)
    }
}
