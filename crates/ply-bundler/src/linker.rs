//! Module linking.
//!
//! Transformed modules are still ES modules. To run them as one script the
//! bundler wraps each module in a function and rewrites its module syntax to
//! calls into a small registry runtime (see [`crate::emit`]):
//!
//! ```text
//! import D, { a as b } from './x'   ->  const __ply_m0 = __ply_require("src/x.js");
//!                                       D -> __ply_m0.default, b -> __ply_m0.a
//! import * as ns from 'react'       ->  const __ply_m1 = __ply_require("https://esm.sh/react@18.2.0");
//!                                       ns -> __ply_m1
//! import './style.css'              ->  __ply_require("src/style.css");
//! import('./lazy')                  ->  Promise.resolve().then(() => __ply_require("src/lazy.js"))
//! export const x = 1                ->  const x = 1            + getter x
//! export { x as y }                 ->  (removed)              + getter y
//! export default expr               ->  __ply_exports.default = expr;
//! export * from './x'               ->  __ply_star(__ply_exports, __ply_require("src/x.js"));
//! ```
//!
//! Static requests are hoisted to the top of the module function in source
//! order, so an imported name can be used above its `import`. References to
//! imported names are resolved with oxc's semantic analysis and read through
//! the source module's exports object on every access, which keeps them live.
//! Export getters are installed before the requests run: in a cycle the other
//! module sees this module's hoisted functions, and its `let`/`const`/`class`
//! bindings stay in their temporal dead zone until initialised.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, CallExpression, Declaration, ExportAllDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference,
    ImportDeclaration, ImportDeclarationSpecifier, ImportExpression, ModuleDeclaration,
    ModuleExportName, ObjectProperty, TaggedTemplateExpression,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::{GetSpan, SourceType, Span};
use rustc_hash::FxHashMap;

use crate::diagnostics::NON_JS_IMPORT_NOTE;
use crate::error::{BundleError, Result};

/// Parameter name of the module function's exports object.
pub const EXPORTS: &str = "__ply_exports";
/// Registry lookup function.
pub const REQUIRE: &str = "__ply_require";
/// Getter definition helper.
pub const DEFINE: &str = "__ply_define";
/// `export *` helper.
pub const STAR: &str = "__ply_star";
/// Prefix of the locals holding imported modules' exports objects.
pub const NAMESPACE_PREFIX: &str = "__ply_m";

/// A static request, evaluated before the module body.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Hoisted {
    specifier: String,
    /// Local bound to the exports object, when anything is imported by name.
    namespace: Option<String>,
    /// `export * from` copies the exports onto this module's.
    star: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rewrite {
    DynamicImport { specifier: String },
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    start: u32,
    end: u32,
    rewrite: Rewrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ExportGetter {
    Local {
        exported: String,
        local: String,
    },
    /// `export { a as b } from 'x'` (`imported: Some("a")`) or
    /// `export * as b from 'x'` (`imported: None`).
    Reexport {
        exported: String,
        specifier: String,
        imported: Option<String>,
    },
}

/// Module syntax found in one transformed module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRecord {
    requests: Vec<String>,
    hoisted: Vec<Hoisted>,
    /// Imported local name to the expression that reads it.
    imports: FxHashMap<String, String>,
    edits: Vec<Edit>,
    exports: Vec<ExportGetter>,
}

impl ModuleRecord {
    /// Parses transformed JavaScript and records its imports and exports.
    ///
    /// A parse failure here means a plugin produced something that is not
    /// JavaScript.
    pub fn analyze(code: &str, id: &str) -> Result<Self> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, code, SourceType::mjs()).parse();
        if let Some(error) = parsed.errors.first() {
            let mut error = crate::transform::diagnostic_to_error(id, error);
            if let BundleError::Compile { message, .. } = &mut error {
                message.push_str(NON_JS_IMPORT_NOTE);
            }
            return Err(error);
        }

        let program = parsed.program;
        let semantic = SemanticBuilder::new().build(&program).semantic;

        let mut record = ModuleRecord::default();
        for statement in &program.body {
            if let Some(declaration) = statement.as_module_declaration() {
                record.collect_declaration(declaration);
            }
        }

        let mut references = ModuleReferences {
            scoping: semantic.scoping(),
            imports: &record.imports,
            dynamic: Vec::new(),
            rewrites: Vec::new(),
        };
        references.visit_program(&program);
        let ModuleReferences { dynamic, rewrites, .. } = references;

        for (span, specifier) in dynamic {
            record.request(&specifier);
            record.edit(span.start, span.end, Rewrite::DynamicImport { specifier });
        }
        for (span, text) in rewrites {
            record.edit(span.start, span.end, Rewrite::Text(text));
        }

        record.edits.sort_by_key(|edit| (edit.start, edit.end));
        Ok(record)
    }

    /// Every specifier the module imports, in first-seen order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    pub fn export_names(&self) -> impl Iterator<Item = &str> {
        self.exports.iter().map(|getter| match getter {
            ExportGetter::Local { exported, .. } | ExportGetter::Reexport { exported, .. } => {
                exported.as_str()
            }
        })
    }

    fn request(&mut self, specifier: &str) {
        if !self.requests.iter().any(|known| known == specifier) {
            self.requests.push(specifier.to_string());
        }
    }

    fn edit(&mut self, start: u32, end: u32, rewrite: Rewrite) {
        self.edits.push(Edit { start, end, rewrite });
    }

    fn remove(&mut self, span: Span) {
        self.edit(span.start, span.end, Rewrite::Text(String::new()));
    }

    /// Records a static request, returning the namespace local when `bind`.
    fn hoist(&mut self, specifier: &str, bind: bool, star: bool) -> Option<String> {
        self.request(specifier);
        let index = match self.hoisted.iter().position(|entry| entry.specifier == specifier) {
            Some(index) => index,
            None => {
                self.hoisted.push(Hoisted {
                    specifier: specifier.to_string(),
                    namespace: None,
                    star: false,
                });
                self.hoisted.len() - 1
            }
        };
        let bound = self.hoisted.iter().filter(|entry| entry.namespace.is_some()).count();
        let entry = &mut self.hoisted[index];
        entry.star |= star;
        if bind && entry.namespace.is_none() {
            entry.namespace = Some(format!("{NAMESPACE_PREFIX}{bound}"));
        }
        entry.namespace.clone()
    }

    fn collect_declaration(&mut self, declaration: &ModuleDeclaration<'_>) {
        match declaration {
            ModuleDeclaration::ImportDeclaration(import) => {
                let specifier = import.source.value.as_str();
                let specifiers = import.specifiers.as_ref().filter(|list| !list.is_empty());
                if let Some(specifiers) = specifiers {
                    if let Some(namespace) = self.hoist(specifier, true, false) {
                        for spec in specifiers {
                            let (local, read) = match spec {
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                                    (spec.local.name.as_str(), member(&namespace, "default"))
                                }
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                                    (spec.local.name.as_str(), namespace.clone())
                                }
                                ImportDeclarationSpecifier::ImportSpecifier(spec) => (
                                    spec.local.name.as_str(),
                                    member(&namespace, &export_name(&spec.imported)),
                                ),
                            };
                            self.imports.insert(local.to_string(), read);
                        }
                    }
                } else {
                    self.hoist(specifier, false, false);
                }
                self.remove(import.span);
            }
            ModuleDeclaration::ExportNamedDeclaration(export) => {
                if let Some(source) = &export.source {
                    let specifier = source.value.to_string();
                    for spec in &export.specifiers {
                        self.exports.push(ExportGetter::Reexport {
                            exported: export_name(&spec.exported),
                            specifier: specifier.clone(),
                            imported: Some(export_name(&spec.local)),
                        });
                    }
                    self.hoist(&specifier, false, false);
                    self.remove(export.span);
                } else if let Some(declaration) = &export.declaration {
                    for name in declared_names(declaration) {
                        self.exports.push(ExportGetter::Local {
                            exported: name.clone(),
                            local: name,
                        });
                    }
                    self.edit(export.span.start, declaration.span().start, Rewrite::Text(String::new()));
                } else {
                    for spec in &export.specifiers {
                        self.exports.push(ExportGetter::Local {
                            exported: export_name(&spec.exported),
                            local: export_name(&spec.local),
                        });
                    }
                    self.remove(export.span);
                }
            }
            ModuleDeclaration::ExportDefaultDeclaration(export) => {
                let named = match &export.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(function) => function
                        .id
                        .as_ref()
                        .map(|id| (id.name.to_string(), function.span.start)),
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => class
                        .id
                        .as_ref()
                        .map(|id| (id.name.to_string(), class.span.start)),
                    _ => None,
                };
                match named {
                    Some((local, start)) => {
                        self.exports.push(ExportGetter::Local {
                            exported: "default".to_string(),
                            local,
                        });
                        self.edit(export.span.start, start, Rewrite::Text(String::new()));
                    }
                    None => {
                        let start = export.declaration.span().start;
                        self.edit(export.span.start, start, Rewrite::Text(format!("{EXPORTS}.default = ")));
                        self.edit(export.span.end, export.span.end, Rewrite::Text(";".to_string()));
                    }
                }
            }
            ModuleDeclaration::ExportAllDeclaration(export) => {
                let specifier = export.source.value.to_string();
                match &export.exported {
                    Some(name) => {
                        self.exports.push(ExportGetter::Reexport {
                            exported: export_name(name),
                            specifier: specifier.clone(),
                            imported: None,
                        });
                        self.hoist(&specifier, false, false);
                    }
                    None => {
                        self.hoist(&specifier, false, true);
                    }
                }
                self.remove(export.span);
            }
            _ => {}
        }
    }

    /// Rewrites `code` into a registry module body.
    ///
    /// `targets` maps every requested specifier to its graph key.
    pub fn render(&self, code: &str, targets: &FxHashMap<String, String>) -> Result<String> {
        let target = |specifier: &str| -> Result<String> {
            targets
                .get(specifier)
                .map(|key| js_string(key))
                .ok_or_else(|| BundleError::generic(format!("'{specifier}' was never resolved")))
        };

        let mut out = String::with_capacity(code.len() + 128);
        if !self.exports.is_empty() {
            out.push_str(DEFINE);
            out.push('(');
            out.push_str(EXPORTS);
            out.push_str(", {");
            for (index, getter) in self.exports.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let (exported, value) = match getter {
                    ExportGetter::Local { exported, local } => {
                        let read = self.imports.get(local).unwrap_or(local);
                        (exported, read.clone())
                    }
                    ExportGetter::Reexport {
                        exported,
                        specifier,
                        imported: Some(imported),
                    } => (
                        exported,
                        format!("{REQUIRE}({})[{}]", target(specifier)?, js_string(imported)),
                    ),
                    ExportGetter::Reexport {
                        exported,
                        specifier,
                        imported: None,
                    } => (exported, format!("{REQUIRE}({})", target(specifier)?)),
                };
                out.push_str(&format!(" {}: () => {}", js_string(exported), value));
            }
            out.push_str(" });\n");
        }

        for entry in &self.hoisted {
            let module = format!("{REQUIRE}({})", target(&entry.specifier)?);
            match (&entry.namespace, entry.star) {
                (Some(namespace), star) => {
                    out.push_str(&format!("const {namespace} = {module};\n"));
                    if star {
                        out.push_str(&format!("{STAR}({EXPORTS}, {namespace});\n"));
                    }
                }
                (None, true) => out.push_str(&format!("{STAR}({EXPORTS}, {module});\n")),
                (None, false) => out.push_str(&format!("{module};\n")),
            }
        }

        let mut cursor = 0usize;
        for edit in &self.edits {
            let (start, end) = (edit.start as usize, edit.end as usize);
            let kept = code.get(cursor..start).ok_or_else(|| {
                BundleError::generic(format!("Overlapping module rewrite at offset {start}"))
            })?;
            out.push_str(kept);

            match &edit.rewrite {
                Rewrite::DynamicImport { specifier } => {
                    out.push_str(&format!(
                        "Promise.resolve().then(() => {REQUIRE}({}))",
                        target(specifier)?
                    ));
                }
                Rewrite::Text(text) => out.push_str(text),
            }
            cursor = end;
        }
        out.push_str(code.get(cursor..).unwrap_or_default());
        Ok(out)
    }
}

/// Quotes `value` as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

/// Property access on `object`, dotted when `name` is an identifier.
fn member(object: &str, name: &str) -> String {
    let mut chars = name.chars();
    let identifier = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if identifier {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", js_string(name))
    }
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(literal) => literal.value.to_string(),
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    let mut names = Vec::new();
    match declaration {
        Declaration::VariableDeclaration(variables) => {
            for declarator in &variables.declarations {
                binding_names(&declarator.id, &mut names);
            }
        }
        Declaration::FunctionDeclaration(function) => {
            names.extend(function.id.as_ref().map(|id| id.name.to_string()));
        }
        Declaration::ClassDeclaration(class) => {
            names.extend(class.id.as_ref().map(|id| id.name.to_string()));
        }
        _ => {}
    }
    names
}

fn binding_names(pattern: &BindingPattern<'_>, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(ident) => names.push(ident.name.to_string()),
        BindingPatternKind::ObjectPattern(object) => {
            for property in &object.properties {
                binding_names(&property.value, names);
            }
            if let Some(rest) = &object.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(array) => {
            for element in array.elements.iter().flatten() {
                binding_names(element, names);
            }
            if let Some(rest) = &array.rest {
                binding_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assignment) => binding_names(&assignment.left, names),
    }
}

/// Walks the module body for `import("literal")` calls and for references
/// that resolve to an imported binding.
struct ModuleReferences<'s> {
    scoping: &'s Scoping,
    imports: &'s FxHashMap<String, String>,
    dynamic: Vec<(Span, String)>,
    rewrites: Vec<(Span, String)>,
}

impl ModuleReferences<'_> {
    /// The read expression for `ident` if it names a module-scope import.
    fn import_read(&self, ident: &IdentifierReference<'_>) -> Option<String> {
        let reference = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference).symbol_id()?;
        if self.scoping.symbol_scope_id(symbol) != self.scoping.root_scope_id() {
            return None;
        }
        self.imports.get(ident.name.as_str()).cloned()
    }

    /// Rewrites a callee so the call keeps an undefined `this`.
    fn unbound_callee(&mut self, callee: &Expression<'_>) -> bool {
        let Expression::Identifier(ident) = callee else {
            return false;
        };
        match self.import_read(ident) {
            Some(read) => {
                self.rewrites.push((ident.span, format!("(0, {read})")));
                true
            }
            None => false,
        }
    }
}

impl<'a> Visit<'a> for ModuleReferences<'_> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(read) = self.import_read(it) {
            self.rewrites.push((it.span, read));
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(ident) = &it.value {
                if let Some(read) = self.import_read(ident) {
                    self.rewrites.push((it.span, format!("{}: {read}", ident.name)));
                    return;
                }
            }
        }
        walk::walk_object_property(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if self.unbound_callee(&it.callee) {
            for argument in &it.arguments {
                self.visit_argument(argument);
            }
            return;
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        if self.unbound_callee(&it.tag) {
            self.visit_template_literal(&it.quasi);
            return;
        }
        walk::walk_tagged_template_expression(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            self.dynamic.push((it.span, literal.value.to_string()));
            return;
        }
        walk::walk_import_expression(self, it);
    }

    // Module declarations are rewritten whole; only exported declarations
    // carry a body worth walking.
    fn visit_import_declaration(&mut self, _it: &ImportDeclaration<'a>) {}

    fn visit_export_all_declaration(&mut self, _it: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
    }
}
