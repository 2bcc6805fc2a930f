//! Bundle assembly.
//!
//! The bundle is a single ES module. CDN dependencies are hoisted to
//! top-level `import * as` statements; every local module becomes a function
//! in a registry keyed by its path, evaluated on first `__ply_require`.

use std::fmt::Write as _;

use crate::error::Result;
use crate::graph::ModuleGraph;
use crate::linker::{EXPORTS, REQUIRE, js_string};

const RUNTIME: &str = r#"const __ply_cache = Object.create(null);
function __ply_define(exports, getters) {
  for (const name in getters) {
    Object.defineProperty(exports, name, { enumerable: true, configurable: true, get: getters[name] });
  }
}
function __ply_star(exports, source) {
  for (const name of Object.keys(source)) {
    if (name === "default" || Object.prototype.hasOwnProperty.call(exports, name)) continue;
    Object.defineProperty(exports, name, { enumerable: true, get: () => source[name] });
  }
}
function __ply_require(id) {
  if (Object.prototype.hasOwnProperty.call(__ply_externals, id)) return __ply_externals[id];
  const cached = __ply_cache[id];
  if (cached) return cached;
  const factory = __ply_modules[id];
  if (!factory) throw new Error("Module not found in bundle: " + id);
  const exports = Object.create(null);
  __ply_cache[id] = exports;
  factory.call(undefined, exports);
  return exports;
}
"#;

/// Links every module of `graph` and assembles the bundle text.
pub fn emit_bundle(graph: &ModuleGraph) -> Result<String> {
    let mut out = String::new();

    let externals: Vec<&str> = graph.externals().collect();
    for (index, url) in externals.iter().enumerate() {
        let _ = writeln!(out, "import * as __ply_ext_{index} from {};", js_string(url));
    }
    out.push_str("const __ply_externals = {");
    for (index, url) in externals.iter().enumerate() {
        let _ = write!(out, "\n  {}: __ply_ext_{index},", js_string(url));
    }
    out.push_str("\n};\n");

    out.push_str("const __ply_modules = {\n");
    for module in graph.modules() {
        let body = module.record.render(&module.code, &module.targets())?;
        let _ = writeln!(out, "{}: function ({EXPORTS}) {{", js_string(module.id.as_str()));
        out.push_str(&body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("},\n");
    }
    out.push_str("};\n");

    out.push_str(RUNTIME);
    let _ = writeln!(out, "{REQUIRE}({});", js_string(graph.entry().as_str()));

    Ok(out)
}
