//! Script dialect source transform.
//!
//! ```text
//! source --parse--> AST --semantic--> scoping --transform--> AST --codegen--> JS
//!                        (TypeScript stripped, JSX to pragma calls)
//! ```

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{JsxRuntime, TransformOptions, Transformer};

use crate::error::{BundleError, Result};

/// Script flavours accepted by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Plain JavaScript. JSX is accepted as well, as most playground
    /// templates put components in `.js` files.
    Js,
    Jsx,
    Ts,
    Tsx,
}

impl ScriptKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "js" | "mjs" | "cjs" => Some(ScriptKind::Js),
            "jsx" => Some(ScriptKind::Jsx),
            "ts" | "mts" | "cts" => Some(ScriptKind::Ts),
            "tsx" => Some(ScriptKind::Tsx),
            _ => None,
        }
    }

    fn source_type(self) -> SourceType {
        match self {
            ScriptKind::Js | ScriptKind::Jsx => SourceType::jsx(),
            ScriptKind::Ts => SourceType::ts(),
            ScriptKind::Tsx => SourceType::tsx(),
        }
    }
}

/// JSX factory names used by the classic runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsxPragma {
    pub factory: String,
    pub fragment: String,
}

impl Default for JsxPragma {
    fn default() -> Self {
        Self {
            factory: "React.createElement".to_string(),
            fragment: "React.Fragment".to_string(),
        }
    }
}

/// Strips types and compiles JSX; `id` labels errors.
pub fn transform_script(source: &str, id: &str, kind: ScriptKind, pragma: &JsxPragma) -> Result<String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, kind.source_type()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(diagnostic_to_error(id, error));
    }
    if parsed.panicked {
        return Err(BundleError::compile(id, "Failed to parse script", None));
    }

    let mut program = parsed.program;
    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();

    let mut options = TransformOptions::default();
    options.jsx.runtime = JsxRuntime::Classic;
    options.jsx.pragma = Some(pragma.factory.clone());
    options.jsx.pragma_frag = Some(pragma.fragment.clone());

    let transformed =
        Transformer::new(&allocator, Path::new(id), &options).build_with_scoping(scoping, &mut program);
    if let Some(error) = transformed.errors.first() {
        return Err(diagnostic_to_error(id, error));
    }

    Ok(Codegen::new().build(&program).code)
}

/// First label of an oxc diagnostic becomes the error offset.
pub(crate) fn diagnostic_to_error(id: &str, diagnostic: &OxcDiagnostic) -> BundleError {
    let pos = diagnostic
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .and_then(|label| u32::try_from(label.offset()).ok());
    BundleError::compile(id, diagnostic.message.to_string(), pos)
}
