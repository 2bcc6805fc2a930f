//! Component compilers.
//!
//! The plugin hands every `.svelte` file to a [`ComponentCompiler`]. The call
//! blocks the pass until it returns and has no timeout, so an implementation
//! that never returns stalls the bundle.

use memchr::memmem;

use crate::extractor::{self, Block};

/// A compiler rejected the component.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileFailure {
    pub message: String,
    /// Byte offset into the component source.
    pub pos: Option<u32>,
}

impl CompileFailure {
    pub fn new(message: impl Into<String>, pos: Option<u32>) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

/// Maps a stretch of the generated script back to the component source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSpan {
    pub generated: u32,
    pub source: u32,
    pub len: u32,
}

/// Compiler output for one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledComponent {
    /// Module code. May still contain TypeScript when `typescript` is set.
    pub js: String,
    pub typescript: bool,
    /// Scoped styles, if the component has any.
    pub css: Option<String>,
    /// Verbatim copies of component source inside `js`.
    pub spans: Vec<ScriptSpan>,
}

impl CompiledComponent {
    /// Translates an offset in `js` into an offset in the component.
    pub fn source_position(&self, generated: u32) -> Option<u32> {
        self.spans
            .iter()
            .find(|span| generated >= span.generated && generated <= span.generated + span.len)
            .map(|span| span.source + (generated - span.generated))
    }
}

/// Turns a component into a JavaScript module.
///
/// Implementations are called once per `.svelte` module in a pass, on the
/// thread running the pass.
pub trait ComponentCompiler: Send + Sync {
    /// Compiles one component.
    ///
    /// # Arguments
    ///
    /// * `id` - Project path of the component, for error messages
    /// * `source` - Component source text
    ///
    /// # Errors
    ///
    /// Returns [`CompileFailure`] with a byte offset into `source` when the
    /// compiler reports one.
    fn compile(&self, id: &str, source: &str) -> Result<CompiledComponent, CompileFailure>;
}

/// Fallback used when no real Svelte compiler is installed.
///
/// Emits the module script, then the instance script, then a default export
/// carrying the raw markup as `template` when the scripts have none. Styles
/// are concatenated in source order.
///
/// The markup is not compiled, so the default export is a plain object and
/// not a mountable component. It keeps native hosts and tests working without
/// a JavaScript runtime; browser hosts install the real compiler through
/// `ply-worker`'s `setComponentCompiler`.
///
/// # Example
///
/// ```rust
/// use ply_plugin_svelte::{ComponentCompiler, TemplateFallbackCompiler};
///
/// let out = TemplateFallbackCompiler
///     .compile("App.svelte", "<script>let n = 1;</script>\n<h1>{n}</h1>")
///     .unwrap();
/// assert_eq!(out.js, "let n = 1;\nexport default { template: \"<h1>{n}</h1>\" };\n");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFallbackCompiler;

impl ComponentCompiler for TemplateFallbackCompiler {
    fn compile(&self, _id: &str, source: &str) -> Result<CompiledComponent, CompileFailure> {
        let parts = extractor::extract(source).map_err(|e| {
            CompileFailure::new(e.to_string(), e.position().and_then(|pos| u32::try_from(pos).ok()))
        })?;

        let scripts: Vec<&Block<'_>> = parts.scripts().collect();
        let (mut js, typescript, spans) = combine_scripts(&scripts);

        if memmem::find(js.as_bytes(), b"export default").is_none() {
            if !js.is_empty() && !js.ends_with('\n') {
                js.push('\n');
            }
            js.push_str(&format!(
                "export default {{ template: {} }};\n",
                serde_json::Value::from(parts.markup.as_str())
            ));
        }

        let styles: Vec<&str> = parts
            .styles()
            .map(|style| style.content.trim())
            .filter(|css| !css.is_empty())
            .collect();
        let css = (!styles.is_empty()).then(|| styles.join("\n"));

        Ok(CompiledComponent {
            js,
            typescript,
            css,
            spans,
        })
    }
}

/// Module-context scripts first, then instance scripts, separated by a blank
/// line. `lang="ts"` on any script makes the whole component TypeScript.
fn combine_scripts(scripts: &[&Block<'_>]) -> (String, bool, Vec<ScriptSpan>) {
    let ordered = scripts
        .iter()
        .filter(|script| script.module_context)
        .chain(scripts.iter().filter(|script| !script.module_context));

    let mut combined = String::new();
    let mut spans = Vec::new();
    let mut typescript = false;
    for script in ordered {
        if !combined.is_empty() {
            combined.push_str("\n\n");
        }
        if let (Ok(generated), Ok(source), Ok(len)) = (
            u32::try_from(combined.len()),
            u32::try_from(script.content_start),
            u32::try_from(script.content.len()),
        ) {
            spans.push(ScriptSpan { generated, source, len });
        }
        combined.push_str(script.content);
        typescript |= is_typescript(script.lang);
    }
    (combined, typescript, spans)
}

fn is_typescript(lang: &str) -> bool {
    matches!(lang, "ts" | "typescript")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> CompiledComponent {
        TemplateFallbackCompiler.compile("App.svelte", source).unwrap()
    }

    #[test]
    fn test_module_script_comes_first() {
        let out = compile(
            "<script>let count = 0;</script>\n<script context=\"module\">export const shared = 1;</script>\n<p>{count}</p>",
        );
        assert!(out.js.starts_with("export const shared = 1;\n\nlet count = 0;"));
        assert!(!out.typescript);
    }

    #[test]
    fn test_typescript_upgrades_component() {
        let out = compile("<script context=\"module\">export const a = 1;</script><script lang=\"ts\">let b: number = 2;</script>");
        assert!(out.typescript);
        assert!(is_typescript("typescript"));
        assert!(!is_typescript("js"));
    }

    #[test]
    fn test_markup_becomes_template_export() {
        let out = compile("<script>let name = 'world';</script>\n<h1>Hello {name}!</h1>");
        assert!(out.js.contains(r#"export default { template: "<h1>Hello {name}!</h1>" };"#));
    }

    #[test]
    fn test_existing_default_export_is_kept() {
        let out = compile("<script>export default { render() {} };</script><p>x</p>");
        assert_eq!(out.js.matches("export default").count(), 1);
    }

    #[test]
    fn test_no_scripts() {
        let out = compile("<p>static</p>");
        assert_eq!(out.js, "export default { template: \"<p>static</p>\" };\n");
        assert!(out.spans.is_empty());
        assert!(out.css.is_none());
    }

    #[test]
    fn test_styles_are_collected() {
        let out = compile("<p>a</p><style> p { color: red; } </style><style></style><style>a{}</style>");
        assert_eq!(out.css.as_deref(), Some("p { color: red; }\na{}"));
    }

    #[test]
    fn test_positions_map_back_to_component() {
        let source = "<p>x</p>\n<script>let a = 1;</script>";
        let out = compile(source);
        let script_start = source.find("let a").unwrap() as u32;
        assert_eq!(out.source_position(4), Some(script_start + 4));
        assert_eq!(out.source_position(500), None);
    }

    #[test]
    fn test_extraction_errors_become_failures() {
        let err = TemplateFallbackCompiler
            .compile("App.svelte", "<p></p><script>let a")
            .unwrap_err();
        assert!(err.message.contains("Unclosed <script>"));
        assert_eq!(err.pos, Some(7));
    }
}
